//! Utilities for logging.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Filtering is controlled through `RUST_LOG`, defaulting to `info` when the
/// variable is unset or fails to parse.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .init();
}

/// Initialize the global subscriber for tests.
///
/// Safe to call from multiple tests; only the first call installs the
/// subscriber. Output is captured per test.
pub fn try_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
