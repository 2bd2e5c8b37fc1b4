//! Driver logging for the media context layer
//!
//! Entries are routed through a process-wide [`Logger`] held by
//! [`Driver`](crate::media::Driver). The default logger prints one colored
//! line per entry to stderr; errors carry the file and line that raised them.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Destination of driver log entries
///
/// Install a custom implementation with `Driver::set_logger` to capture
/// entries in a trace buffer, a file or a test.
///
/// # Example
///
/// ```no_run
/// use media_context::media::log::{Logger, LogEntry};
///
/// struct StderrJson;
///
/// impl Logger for StderrJson {
///     fn log(&self, entry: &LogEntry) {
///         eprintln!("{{\"source\":\"{}\",\"msg\":\"{}\"}}", entry.source, entry.message);
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Component tag, e.g. "media::GpuContextMgr"
    pub source: String,
    pub message: String,
    /// Set for entries raised by the error macros
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

impl LogEntry {
    /// Entry stamped with the current time and no source location
    pub fn new(severity: LogSeverity, source: &str, message: String) -> Self {
        Self {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        }
    }

    /// Attach the file and line that produced the entry
    pub fn at(mut self, file: &'static str, line: u32) -> Self {
        self.file = Some(file);
        self.line = Some(line);
        self
    }
}

/// Log severity levels, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-call tracing (context switches, buffer picks)
    Trace,
    /// Object lifetimes and pool decisions
    Debug,
    /// Session-level events
    Info,
    /// Recoverable problems (resize and retry, missing engine)
    Warn,
    /// Failed operations
    Error,
}

impl LogSeverity {
    /// Fixed-width label used by the default logger
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    /// Inverse of `severity as u8`; out-of-range values saturate to Error
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogSeverity::Trace,
            1 => LogSeverity::Debug,
            2 => LogSeverity::Info,
            3 => LogSeverity::Warn,
            _ => LogSeverity::Error,
        }
    }

    fn colored_label(self) -> ColoredString {
        let label = self.label();
        match self {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        }
    }
}

/// Colored stderr logger
///
/// `[timestamp] [SEVERITY] [source] message`, followed by ` (file:line)` when
/// the entry has a location.
pub struct DefaultLogger;

impl DefaultLogger {
    fn format(entry: &LogEntry) -> String {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.severity.colored_label(),
            entry.source.bright_blue(),
            entry.message
        );
        if let (Some(file), Some(number)) = (entry.file, entry.line) {
            line.push_str(&format!(" ({}:{})", file, number));
        }
        line
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        eprintln!("{}", Self::format(entry));
    }
}

// ===== LOGGING MACROS =====

/// Dispatch a formatted message at `severity` (shared by the leveled macros)
#[doc(hidden)]
#[macro_export]
macro_rules! mos_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        $crate::media::Driver::log(
            $crate::media::log::LogSeverity::$severity,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log at TRACE
///
/// ```ignore
/// mos_trace!("media::GpuContext", "Picked command buffer {}", index);
/// ```
#[macro_export]
macro_rules! mos_trace {
    ($source:expr, $($arg:tt)*) => { $crate::mos_log!(Trace, $source, $($arg)*) };
}

#[macro_export]
macro_rules! mos_debug {
    ($source:expr, $($arg:tt)*) => { $crate::mos_log!(Debug, $source, $($arg)*) };
}

#[macro_export]
macro_rules! mos_info {
    ($source:expr, $($arg:tt)*) => { $crate::mos_log!(Info, $source, $($arg)*) };
}

#[macro_export]
macro_rules! mos_warn {
    ($source:expr, $($arg:tt)*) => { $crate::mos_log!(Warn, $source, $($arg)*) };
}

/// Log at ERROR with the caller's file and line
///
/// ```ignore
/// mos_error!("media::MediaContext", "Row {} has no scalability state", index);
/// ```
#[macro_export]
macro_rules! mos_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::media::Driver::log_detailed(
            $crate::media::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
