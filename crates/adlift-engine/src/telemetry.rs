//! Tracing subscriber setup
//!
//! Call once from a binary or test; respects `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; safe to call more than once
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
