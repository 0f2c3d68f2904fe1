//! Relay "task finished / needs attention" events from a sandboxed coding
//! assistant to the operator's desktop.

pub mod common;
pub mod daemon;
pub mod ipc;
