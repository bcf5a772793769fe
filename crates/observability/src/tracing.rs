//! Subscriber installation.
//!
//! Filtering comes from `RUST_LOG` in both modes.

use tracing_subscriber::EnvFilter;

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// JSON logs with timestamps, `info` unless `RUST_LOG` says otherwise.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("info"))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Human-readable logs captured per test, `debug` for the workspace crates.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("warden_auth=debug,warden_infra=debug"))
        .with_test_writer()
        .try_init();
}
