//! Tracing/logging setup shared by hosts and test harnesses.

/// Tracing configuration (filters, output shape).
pub mod tracing;

/// Initialize process-wide observability.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialization for test binaries: human-readable output, honoring
/// `RUST_LOG` but defaulting to `debug` for the workspace crates.
pub fn init_for_tests() {
    tracing::init_for_tests();
}
