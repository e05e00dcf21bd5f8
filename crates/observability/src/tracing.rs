//! Tracing/logging initialization.
//!
//! JSON lines with timestamps. `RUST_LOG` overrides the level picked from the
//! server mode.

use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset: `debug` in debug mode, `info` otherwise.
pub fn default_directive(mode: &str) -> &'static str {
    if mode.trim().eq_ignore_ascii_case("debug") {
        "debug"
    } else {
        "info"
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(mode: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(mode)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
