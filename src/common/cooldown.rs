//! Cooldown and dedup gating in front of notification triggers.
//!
//! Check-then-write is not atomic across processes. Two callers racing on
//! the same key can both pass; an occasional duplicate notification is
//! acceptable here.

use crate::common::persistence::KeyedTimestampStore;
use chrono::{DateTime, Utc};
use std::process::Command;
use std::time::Duration;

/// Cooldown between completion notifications for one window
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(15_000);

/// Lifetime of a dedup lock
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_millis(2_000);

/// Rate gate over a timestamp store
#[derive(Debug)]
pub struct Gate<S> {
    store: S,
}

impl<S: KeyedTimestampStore> Gate<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Allow the trigger for `key` unless one was allowed less than `window`
    /// ago. Records "now" when allowing.
    pub fn should_proceed(&self, key: &str, window: Duration) -> bool {
        self.should_proceed_at(key, window, Utc::now())
    }

    /// Same as [`Gate::should_proceed`] with an explicit clock
    pub fn should_proceed_at(&self, key: &str, window: Duration, now: DateTime<Utc>) -> bool {
        let recorded = match self.store.get(key) {
            Ok(recorded) => recorded,
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable gate marker, treating as stale");
                None
            }
        };

        if let Some(last) = recorded {
            let age = now.signed_duration_since(last);
            // A marker from the future (clock skew) counts as fresh
            let fresh = age.to_std().map(|age| age < window).unwrap_or(true);
            if fresh {
                tracing::debug!(key, age_ms = age.num_milliseconds(), "suppressed by gate");
                return false;
            }
        }

        if let Err(e) = self.store.set(key, now) {
            tracing::warn!(key, error = %e, "failed to record gate marker");
        }
        true
    }
}

/// Run `program args...` only if the gate lets `key` through.
///
/// Returns the child's exit code, or 0 when the run was suppressed.
pub fn run_gated<S: KeyedTimestampStore>(
    gate: &Gate<S>,
    key: &str,
    window: Duration,
    program: &str,
    args: &[String],
) -> std::io::Result<i32> {
    if !gate.should_proceed(key, window) {
        return Ok(0);
    }

    let status = Command::new(program).args(args).status()?;
    Ok(exit_code(status))
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
