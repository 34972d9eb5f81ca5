//! Tracing/logging setup shared by the API binary and tests.

/// Initialize process-wide tracing with the format chosen by
/// `TRIPSTAY_LOG_FORMAT` (`json` by default, `pretty` for local runs).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Subscriber configuration (filters, formats).
pub mod tracing;

pub use self::tracing::LogFormat;
