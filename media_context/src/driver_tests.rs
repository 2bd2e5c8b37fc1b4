//! Unit tests for the Driver logging dispatch
//!
//! IMPORTANT: the logger and the minimum severity are process-wide.
//! All tests are marked with #[serial] and restore the defaults on exit.

use crate::media::Driver;
use crate::log::{Logger, LogEntry, LogSeverity};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// Install a capturing logger; only entries from `source` are returned later
fn capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Driver::set_logger(TestLogger { entries: Arc::clone(&entries) });
    entries
}

fn from_source(entries: &Arc<Mutex<Vec<LogEntry>>>, source: &str) -> Vec<LogEntry> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.source == source)
        .cloned()
        .collect()
}

fn teardown() {
    Driver::reset_logger();
    Driver::set_log_level(LogSeverity::Info);
}

// ============================================================================
// LOG LEVEL TESTS
// ============================================================================

#[test]
#[serial]
fn test_default_log_level_is_info() {
    teardown();
    assert_eq!(Driver::log_level(), LogSeverity::Info);
}

#[test]
#[serial]
fn test_set_log_level_round_trips() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        Driver::set_log_level(severity);
        assert_eq!(Driver::log_level(), severity);
    }
    teardown();
}

#[test]
#[serial]
fn test_entries_below_level_are_dropped() {
    let entries = capture();
    Driver::set_log_level(LogSeverity::Warn);

    Driver::log(LogSeverity::Debug, "media::DriverTests", "hidden".to_string());
    Driver::log(LogSeverity::Info, "media::DriverTests", "hidden".to_string());
    Driver::log(LogSeverity::Warn, "media::DriverTests", "shown".to_string());

    let captured = from_source(&entries, "media::DriverTests");
    teardown();

    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Warn);
    assert_eq!(captured[0].message, "shown");
}

// ============================================================================
// LOGGER DISPATCH TESTS
// ============================================================================

#[test]
#[serial]
fn test_log_has_no_location() {
    let entries = capture();
    Driver::log(LogSeverity::Info, "media::DriverTests", "plain".to_string());
    let captured = from_source(&entries, "media::DriverTests");
    teardown();

    assert_eq!(captured.len(), 1);
    assert!(captured[0].file.is_none());
    assert!(captured[0].line.is_none());
}

#[test]
#[serial]
fn test_log_detailed_carries_location() {
    let entries = capture();
    Driver::log_detailed(LogSeverity::Error, "media::DriverTests", "failed".to_string(), "x.rs", 42);
    let captured = from_source(&entries, "media::DriverTests");
    teardown();

    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].file, Some("x.rs"));
    assert_eq!(captured[0].line, Some(42));
}

#[test]
#[serial]
fn test_error_macros_log_with_location() {
    let entries = capture();
    let _ = crate::mos_err!("media::DriverTests", Unknown, "broken {}", 1);
    crate::mos_error!("media::DriverTests", "also broken");
    let captured = from_source(&entries, "media::DriverTests");
    teardown();

    assert_eq!(captured.len(), 2);
    assert!(captured.iter().all(|e| e.severity == LogSeverity::Error));
    assert!(captured.iter().all(|e| e.file.is_some() && e.line.is_some()));
    assert_eq!(captured[0].message, "broken 1");
}

#[test]
#[serial]
fn test_trace_macro_respects_level() {
    let entries = capture();
    crate::mos_trace!("media::DriverTests", "dropped");
    Driver::set_log_level(LogSeverity::Trace);
    crate::mos_trace!("media::DriverTests", "kept {}", 2);
    let captured = from_source(&entries, "media::DriverTests");
    teardown();

    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "kept 2");
}

#[test]
#[serial]
fn test_reset_logger_stops_capture() {
    let entries = capture();
    Driver::reset_logger();
    Driver::log(LogSeverity::Warn, "media::DriverTests", "to stderr".to_string());
    let captured = from_source(&entries, "media::DriverTests");
    teardown();

    assert!(captured.is_empty());
}
