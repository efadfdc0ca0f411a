//! Logging initialization for embedding applications and tests.
//!
//! The library itself only emits `log` macros and `tracing` spans; this
//! helper wires both into a formatted subscriber. Safe to call more than
//! once — repeat initialization is a no-op.

use tracing_subscriber::EnvFilter;

pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Bridge `log` macro output into tracing events.
    let _ = tracing_log::LogTracer::init();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
