//! Turn a received event into the notification to render.

use crate::common::config::Volume;
use crate::daemon::notifier::{FocusTarget, Notification};
use crate::ipc::messages::Event;

/// Dialog prefix
pub const DISPLAY_PREFIX: &str = "claudeman";

/// Name used in the spoken announcement, spelled for speech synthesis
pub const SPOKEN_NAME: &str = "claude-man";

/// Dialog text: prefix and emoji, then the message on its own line if any
pub fn display_message(event: &Event) -> String {
    let head = format!("{} {}", DISPLAY_PREFIX, event.event_type.emoji());
    if event.message.is_empty() {
        head
    } else {
        format!("{}\n{}", head, event.message)
    }
}

/// Spoken text. Carries the label only, never the emoji or message.
pub fn announcement(event: &Event) -> String {
    format!("{} {}", SPOKEN_NAME, event.event_type.label())
}

/// Build the full notification for an event
pub fn compose(event: &Event, volume: Volume) -> Notification {
    Notification {
        announcement: announcement(event),
        display: display_message(event),
        focus: FocusTarget::parse(&event.session_id),
        volume: volume.level(),
    }
}
