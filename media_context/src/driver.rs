/// Driver - process-wide logging dispatch for the media context layer
///
/// Holds the global logger and the minimum severity that reaches it. All
/// `mos_*!` macros funnel through [`Driver::log`] / [`Driver::log_detailed`].

use std::sync::{OnceLock, RwLock};
use std::sync::atomic::{AtomicU8, Ordering};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Minimum severity forwarded to the logger (stored as the enum discriminant)
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(LogSeverity::Info as u8);

fn logger_lock() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn dispatch(entry: &LogEntry) {
    let logger = logger_lock().read().unwrap_or_else(|poisoned| poisoned.into_inner());
    logger.log(entry);
}

// ===== PUBLIC API =====

/// Process-wide driver services
///
/// # Example
///
/// ```no_run
/// use media_context::media::Driver;
/// use media_context::media::log::LogSeverity;
///
/// Driver::set_log_level(LogSeverity::Trace);
/// Driver::log(LogSeverity::Info, "app", "session opened".to_string());
/// Driver::reset_logger();
/// ```
pub struct Driver;

impl Driver {
    /// Replace the default logger with a custom implementation
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(DefaultLogger);
        }
    }

    /// Set the minimum severity forwarded to the logger
    pub fn set_log_level(severity: LogSeverity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    /// Current minimum severity
    pub fn log_level() -> LogSeverity {
        LogSeverity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Forward an entry without location (the leveled `mos_*!` macros)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if severity < Self::log_level() {
            return;
        }
        dispatch(&LogEntry::new(severity, source, message));
    }

    /// Forward an entry with the file:line that raised it (the error macros)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if severity < Self::log_level() {
            return;
        }
        dispatch(&LogEntry::new(severity, source, message).at(file, line));
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
