//! Error types for the media context layer
//!
//! Every operation in this crate reports failure through [`Error`]. Nothing
//! panics in non-test code: callers are expected to abort the current frame
//! on an error, not the process.

use std::fmt;

/// Result type for media context operations
pub type Result<T> = std::result::Result<T, Error>;

/// Media context errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Null, out-of-range or otherwise unusable input (no state was mutated)
    InvalidParameter(String),

    /// A required collaborator or resource was missing
    NullPointer(String),

    /// A bounded pool or table is full, or a buffer is too small
    NotEnoughBuffer(String),

    /// The requested function or mapping has no hardware counterpart
    NotSupported(String),

    /// An internal invariant was violated (likely a bug)
    Unknown(String),

    /// The OS layer could not provide memory
    OutOfMemory,

    /// OS / hardware submission failure reported by the backend
    BackendError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            Error::NullPointer(msg) => write!(f, "Null pointer: {}", msg),
            Error::NotEnoughBuffer(msg) => write!(f, "Not enough buffer: {}", msg),
            Error::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            Error::Unknown(msg) => write!(f, "Unknown error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR (with file:line) and build the matching [`Error`] variant
///
/// # Example
///
/// ```ignore
/// let err = mos_err!("media::GpuContext", InvalidParameter, "bad flags {}", flags);
/// ```
#[macro_export]
macro_rules! mos_err {
    ($source:expr, $kind:ident, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::media::Driver::log_detailed(
            $crate::media::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::media::Error::$kind(message)
    }};
}

/// Log an ERROR and return early with the matching [`Error`] variant
#[macro_export]
macro_rules! mos_bail {
    ($source:expr, $kind:ident, $($arg:tt)*) => {
        return Err($crate::mos_err!($source, $kind, $($arg)*))
    };
}

/// Log a WARN and build the matching [`Error`] variant
///
/// Used for failures the caller is expected to recover from (resize and retry,
/// pick another engine, ...).
#[macro_export]
macro_rules! mos_warn_err {
    ($source:expr, $kind:ident, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::media::Driver::log(
            $crate::media::log::LogSeverity::Warn,
            $source,
            message.clone()
        );
        $crate::media::Error::$kind(message)
    }};
}

/// Log a WARN and return early with the matching [`Error`] variant
#[macro_export]
macro_rules! mos_bail_warn {
    ($source:expr, $kind:ident, $($arg:tt)*) => {
        return Err($crate::mos_warn_err!($source, $kind, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
