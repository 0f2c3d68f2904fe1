//! Wire types for sender-listener communication.
//!
//! One event per connection, newline-delimited, terminated by the sender's
//! half-close:
//!
//! ```text
//! line 1: event type   (blank means "complete")
//! line 2: session id   (may be blank)
//! line 3..N: message   (rest of the payload, trimmed)
//! ```

use std::fmt;

/// Acknowledgment written back for every non-HTTP payload
pub const ACK_RESPONSE: &str = "received\n";

/// Minimal reply for stray HTTP requests hitting the listener port
pub const HTTP_OK_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\r\n";

/// Request methods recognized as an HTTP probe
const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"];

/// Kind of event reported by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventType {
    /// Task finished
    #[default]
    Complete,
    /// Assistant asked the user something
    Question,
    /// Assistant is idle, waiting for input
    Idle,
    /// Informational notice
    Info,
    /// Anything else; kept verbatim, never rejected
    Other(String),
}

impl EventType {
    /// Parse a wire tag. Blank input maps to `Complete`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim() {
            "" | "complete" => EventType::Complete,
            "question" => EventType::Question,
            "idle" => EventType::Idle,
            "info" => EventType::Info,
            other => EventType::Other(other.to_string()),
        }
    }

    /// Wire tag for this event type
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Complete => "complete",
            EventType::Question => "question",
            EventType::Idle => "idle",
            EventType::Info => "info",
            EventType::Other(tag) => tag,
        }
    }

    /// Human label, also used for the spoken announcement
    pub fn label(&self) -> &'static str {
        match self {
            EventType::Complete => "task complete",
            EventType::Question | EventType::Idle => "needs input",
            EventType::Info => "info",
            EventType::Other(_) => "finished",
        }
    }

    /// Emoji shown in the dialog; empty for unrecognized types
    pub fn emoji(&self) -> &'static str {
        match self {
            EventType::Complete => "✅",
            EventType::Question | EventType::Idle => "❓",
            EventType::Info => "ℹ️",
            EventType::Other(_) => "",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: EventType,
    /// Originating terminal window id; empty when no focusing is wanted
    pub session_id: String,
    pub message: String,
}

impl Event {
    pub fn new(
        event_type: EventType,
        session_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    /// Serialize to the three-line wire form
    pub fn encode(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            self.event_type.as_str(),
            self.session_id,
            self.message
        )
    }

    /// Parse the three-line wire form. Never fails: missing lines become
    /// defaults.
    pub fn decode(raw: &str) -> Self {
        let normalized = raw.replace("\r\n", "\n");
        let mut lines = normalized.split('\n');
        let event_type = EventType::parse(lines.next().unwrap_or(""));
        let session_id = lines.next().unwrap_or("").trim().to_string();
        let message = lines.collect::<Vec<_>>().join("\n").trim().to_string();

        Self {
            event_type,
            session_id,
            message,
        }
    }
}

/// What a fully buffered connection turned out to contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Stray HTTP request
    HttpProbe,
    /// Nothing was sent before the half-close
    Empty,
    Event(Event),
}

impl Payload {
    pub fn classify(raw: &str) -> Self {
        if is_http_request(raw) {
            Payload::HttpProbe
        } else if raw.is_empty() {
            Payload::Empty
        } else {
            Payload::Event(Event::decode(raw))
        }
    }

    /// Bytes to write back before closing
    pub fn response(&self) -> &'static str {
        match self {
            Payload::HttpProbe => HTTP_OK_RESPONSE,
            Payload::Empty | Payload::Event(_) => ACK_RESPONSE,
        }
    }
}

/// True when the first line looks like `METHOD <whitespace>...`
pub fn is_http_request(raw: &str) -> bool {
    let first_line = raw.split('\n').next().unwrap_or("").trim();
    match first_line.split_once(char::is_whitespace) {
        Some((method, _)) => HTTP_METHODS.contains(&method),
        None => false,
    }
}
