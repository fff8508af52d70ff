// fptrap/src/logging.rs

//! Logging for the library's own diagnostics.
//!
//! Only load-time and exit-time code logs through `tracing`; the fault path
//! never does.

use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber filtered by `directive`.
///
/// Leaves an already-installed global subscriber untouched.
///
/// # Arguments
///
/// * `directive` - An `EnvFilter` directive such as `fptrap=debug`; an
///   unparsable one falls back to `warn`.
pub fn init(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
