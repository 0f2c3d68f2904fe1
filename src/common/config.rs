//! Listener and sender configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;

/// Podman's name for the host as seen from inside a container
pub const DEFAULT_HOST: &str = "host.containers.internal";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

pub const DEFAULT_MESSAGE: &str = "Task complete";

/// Environment variable holding the terminal window id of the session
pub const SESSION_ENV: &str = "WINID";

/// Audio volume for the spoken announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Volume {
    /// Leave the system volume alone
    #[default]
    Auto,
    /// Override to 0-100 while speaking, then restore
    Level(u8),
}

impl Volume {
    pub fn level(self) -> Option<u8> {
        match self {
            Volume::Auto => None,
            Volume::Level(level) => Some(level),
        }
    }
}

impl FromStr for Volume {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Volume::Auto);
        }
        match s.parse::<u8>() {
            Ok(level) if level <= 100 => Ok(Volume::Level(level)),
            _ => Err(format!("volume must be \"auto\" or 0-100, got {:?}", s)),
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Volume::Auto => f.write_str("auto"),
            Volume::Level(level) => write!(f, "{}", level),
        }
    }
}

/// Listener settings
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub volume: Volume,
    /// Idle bound on reading one payload; `None` waits for the sender's EOF
    pub read_timeout: Option<Duration>,
}

impl ListenerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            volume: Volume::Auto,
            read_timeout: None,
        }
    }
}

/// Sender settings
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Resolve the legacy positional form `[port] [message...]`.
///
/// A numeric first word is a port; everything else is the message.
pub fn split_port_and_message(words: &[String]) -> (Option<u16>, Option<String>) {
    let (port, rest) = match words.first().map(|w| w.parse::<u16>()) {
        Some(Ok(port)) if words[0].bytes().all(|b| b.is_ascii_digit()) => (Some(port), &words[1..]),
        _ => (None, words),
    };
    let message = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (port, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_volume_parse() {
        assert_eq!("auto".parse::<Volume>(), Ok(Volume::Auto));
        assert_eq!("AUTO".parse::<Volume>(), Ok(Volume::Auto));
        assert_eq!("0".parse::<Volume>(), Ok(Volume::Level(0)));
        assert_eq!("100".parse::<Volume>(), Ok(Volume::Level(100)));
        assert!("101".parse::<Volume>().is_err());
        assert!("-1".parse::<Volume>().is_err());
        assert!("loud".parse::<Volume>().is_err());
    }

    #[test]
    fn test_volume_level() {
        assert_eq!(Volume::Auto.level(), None);
        assert_eq!(Volume::Level(60).level(), Some(60));
        assert_eq!(Volume::Level(60).to_string(), "60");
    }

    #[test]
    fn test_defaults() {
        let listener = ListenerConfig::default();
        assert_eq!(listener.port, 8080);
        assert_eq!(listener.volume, Volume::Auto);
        assert!(listener.read_timeout.is_none());

        let sender = SenderConfig::default();
        assert_eq!(sender.host, "host.containers.internal");
        assert_eq!(sender.timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_positional_port_only() {
        assert_eq!(split_port_and_message(&words(&["9000"])), (Some(9000), None));
    }

    #[test]
    fn test_positional_port_and_message() {
        assert_eq!(
            split_port_and_message(&words(&["9000", "build", "done"])),
            (Some(9000), Some("build done".to_string()))
        );
    }

    #[test]
    fn test_positional_message_only() {
        assert_eq!(
            split_port_and_message(&words(&["Hello", "there"])),
            (None, Some("Hello there".to_string()))
        );
        assert_eq!(split_port_and_message(&[]), (None, None));
    }

    #[test]
    fn test_positional_out_of_range_is_message() {
        assert_eq!(
            split_port_and_message(&words(&["99999"])),
            (None, Some("99999".to_string()))
        );
    }
}
