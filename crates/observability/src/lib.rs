//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing in the given output format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}

pub mod tracing;

pub use self::tracing::{LogFormat, UnknownLogFormat};
