//! Tracing/logging setup shared by binaries and black-box tests.

/// Initialize process-wide structured logging with the `info` default filter.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init("info");
}

/// Tracing configuration (filters, layers).
pub mod tracing;
