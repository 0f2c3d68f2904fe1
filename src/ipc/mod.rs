//! Sender-listener protocol and the sending client.

pub mod client;
pub mod messages;
