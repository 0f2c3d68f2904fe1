//! Long-running listener that turns relay events into desktop notifications.

pub mod compose;
pub mod notifier;
pub mod server;
