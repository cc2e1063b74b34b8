//! Tracing subscriber setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the embedding application's call. These helpers cover the common case:
//! a global fmt subscriber filtered by `RUST_LOG`, falling back to a given
//! directive when the variable is unset.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs the global fmt subscriber with an `info` fallback filter.
///
/// Idempotent: repeat calls (and subscribers installed elsewhere) are
/// silently ignored.
pub fn init() {
    init_with_filter("info");
}

/// Installs the global fmt subscriber, using `default_directive` whenever
/// `RUST_LOG` is unset or fails to parse.
pub fn init_with_filter(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
