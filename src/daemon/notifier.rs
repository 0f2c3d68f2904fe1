//! Platform-native notifications for the listener.

use async_trait::async_trait;

/// Terminal window to bring to front. Only all-digit ids are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTarget(String);

impl FocusTarget {
    pub fn parse(session_id: &str) -> Option<Self> {
        let id = session_id.trim();
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(id.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Everything the renderer needs for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Spoken text, never contains emoji
    pub announcement: String,
    /// Dialog text
    pub display: String,
    pub focus: Option<FocusTarget>,
    /// 0-100 override for the duration of the announcement
    pub volume: Option<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {code:?}")]
    Exit {
        program: &'static str,
        code: Option<i32>,
    },
    #[error("no notification renderer available on this platform")]
    Unsupported,
}

/// Renders a notification. Called off the connection path; the result is
/// only logged.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn announce(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Desktop renderer: AppleScript on macOS, `notify-send` on Linux
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopSink;

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn announce(&self, notification: &Notification) -> Result<(), DispatchError> {
        #[cfg(target_os = "macos")]
        {
            let script = build_applescript(notification);
            return run("osascript", &["-e", &script]).await;
        }

        #[cfg(target_os = "linux")]
        {
            return run(
                "notify-send",
                &[notification.announcement.as_str(), notification.display.as_str()],
            )
            .await;
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            let _ = notification;
            return Err(DispatchError::Unsupported);
        }
    }
}

/// Logs the composed notification instead of rendering it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn announce(&self, notification: &Notification) -> Result<(), DispatchError> {
        tracing::info!(
            announcement = %notification.announcement,
            display = %notification.display,
            focus = notification.focus.as_ref().map(FocusTarget::as_str),
            volume = notification.volume,
            "dry run: notification not rendered"
        );
        Ok(())
    }
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
async fn run(program: &'static str, args: &[&str]) -> Result<(), DispatchError> {
    use std::process::Stdio;
    use tokio::process::Command;

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| DispatchError::Spawn { program, source })?;

    if status.success() {
        Ok(())
    } else {
        Err(DispatchError::Exit {
            program,
            code: status.code(),
        })
    }
}

/// Escape backslashes and double quotes for an AppleScript string literal
pub fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Script that speaks the announcement, shows the dialog, then focuses the
/// Terminal window when one was requested.
pub fn build_applescript(notification: &Notification) -> String {
    let announcement = escape_applescript(&notification.announcement);
    let speak = match notification.volume {
        None => format!("say \"{}\"", announcement),
        Some(level) => format!(
            "set oldVolume to output volume of (get volume settings)\n\
             set volume output volume {}\n\
             say \"{}\"\n\
             set volume output volume oldVolume",
            level.min(100),
            announcement
        ),
    };

    let mut script = format!(
        "{}\ntell application \"Terminal\" to display dialog \"{}\" with icon note buttons {{\"OK\"}} default button \"OK\"",
        speak,
        escape_applescript(&notification.display)
    );

    if let Some(target) = &notification.focus {
        script.push_str(&format!(
            "\ntell application \"Terminal\"\n\
             set index of (first window whose id is {}) to 1\n\
             activate\n\
             end tell",
            target.as_str()
        ));
    }

    script
}

/// Check if the notification system is available
pub fn is_notification_available() -> bool {
    #[cfg(target_os = "macos")]
    {
        return true;
    }

    #[cfg(target_os = "linux")]
    {
        return std::process::Command::new("which")
            .arg("notify-send")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        return false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(focus: Option<&str>, volume: Option<u8>) -> Notification {
        Notification {
            announcement: "claude-man task complete".to_string(),
            display: "claudeman ✅\nAll done".to_string(),
            focus: focus.and_then(FocusTarget::parse),
            volume,
        }
    }

    #[test]
    fn test_focus_target_numeric_only() {
        assert_eq!(FocusTarget::parse("1234").map(|t| t.0), Some("1234".to_string()));
        assert_eq!(FocusTarget::parse(" 42 ").map(|t| t.0), Some("42".to_string()));
        assert!(FocusTarget::parse("").is_none());
        assert!(FocusTarget::parse("abc").is_none());
        assert!(FocusTarget::parse("12a").is_none());
        assert!(FocusTarget::parse("-5").is_none());
    }

    #[test]
    fn test_script_without_volume_or_focus() {
        let script = build_applescript(&notification(None, None));
        assert!(script.starts_with("say \"claude-man task complete\""));
        assert!(!script.contains("output volume"));
        assert!(!script.contains("first window whose id"));
        assert!(script.contains("display dialog \"claudeman ✅\nAll done\""));
    }

    #[test]
    fn test_script_with_volume_brackets_announcement() {
        let script = build_applescript(&notification(None, Some(60)));
        let set = script.find("set volume output volume 60").unwrap();
        let say = script.find("say \"claude-man task complete\"").unwrap();
        let restore = script.find("set volume output volume oldVolume").unwrap();
        assert!(set < say && say < restore);
    }

    #[test]
    fn test_script_with_focus() {
        let script = build_applescript(&notification(Some("9876"), None));
        assert!(script.contains("first window whose id is 9876"));
        assert!(script.trim_end().ends_with("end tell"));
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_applescript(r#"say "hi" \ bye"#), r#"say \"hi\" \\ bye"#);
        let mut n = notification(None, None);
        n.display = "quote \" here".to_string();
        assert!(build_applescript(&n).contains(r#"display dialog "quote \" here""#));
    }

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        assert!(LogSink.announce(&notification(Some("1"), Some(10))).await.is_ok());
    }
}
