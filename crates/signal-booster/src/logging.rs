//! Tracing initialization for the CLI.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber once, before anything logs.
/// `RUST_LOG` controls verbosity; the default is `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
