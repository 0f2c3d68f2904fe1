//! Log initialization.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Install the stderr subscriber. Safe to call more than once; only the first
/// call takes effect.
pub fn init_logging(debug: bool) {
    if DEBUG_ENABLED.set(debug).is_err() {
        return;
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(debug))
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_filter(debug: bool) -> EnvFilter {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(env.as_deref(), debug)
}

/// `RUST_LOG` wins when set and valid; otherwise our own crate at info, or
/// debug with `--debug`
fn filter_from(env: Option<&str>, debug: bool) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(debug)))
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "claudeman=debug"
    } else {
        "claudeman=info"
    }
}

/// Whether `--debug` was requested
pub fn is_debug_enabled() -> bool {
    *DEBUG_ENABLED.get().unwrap_or(&false)
}
