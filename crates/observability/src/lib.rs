//! Shared tracing setup for services and tests.

/// Initialize process-wide tracing for a service.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize tracing for a test binary; output goes through the test harness.
pub fn init_test() {
    tracing::init_test();
}

/// Subscriber configuration (filters, formatters).
pub mod tracing;
