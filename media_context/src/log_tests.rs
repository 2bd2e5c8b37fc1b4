//! Unit tests for log.rs
//!
//! Severity ordering and labels, entry construction and the default format.

use crate::log::{DefaultLogger, Logger, LogEntry, LogSeverity};

const ALL: [LogSeverity; 5] = [
    LogSeverity::Trace,
    LogSeverity::Debug,
    LogSeverity::Info,
    LogSeverity::Warn,
    LogSeverity::Error,
];

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    for pair in ALL.windows(2) {
        assert!(pair[0] < pair[1], "{:?} should sort before {:?}", pair[0], pair[1]);
    }
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    assert!(ALL.iter().all(|s| s.label().len() == 5));
    assert_eq!(LogSeverity::Info.label(), "INFO ");
    assert_eq!(LogSeverity::Error.label(), "ERROR");
}

#[test]
fn test_log_severity_from_u8() {
    for severity in ALL {
        assert_eq!(LogSeverity::from_u8(severity as u8), severity);
    }
    assert_eq!(LogSeverity::from_u8(200), LogSeverity::Error);
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_new_has_no_location() {
    let entry = LogEntry::new(LogSeverity::Info, "media::MediaContext", "stream opened".to_string());
    assert_eq!(entry.source, "media::MediaContext");
    assert_eq!(entry.message, "stream opened");
    assert!(entry.file.is_none());
    assert!(entry.line.is_none());
}

#[test]
fn test_log_entry_at_sets_location() {
    let entry = LogEntry::new(LogSeverity::Error, "media::GpuContext", "submit failed".to_string())
        .at("gpu_context.rs", 12);
    assert_eq!(entry.file, Some("gpu_context.rs"));
    assert_eq!(entry.line, Some(12));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_format_contains_fields() {
    colored::control::set_override(false);
    let line = DefaultLogger::format(&LogEntry::new(
        LogSeverity::Warn,
        "media::CmdBufMgr",
        "pool exhausted".to_string(),
    ));
    assert!(line.contains("[WARN ]"));
    assert!(line.contains("[media::CmdBufMgr]"));
    assert!(line.ends_with("pool exhausted"));
}

#[test]
fn test_default_format_appends_location() {
    colored::control::set_override(false);
    let entry = LogEntry::new(LogSeverity::Error, "media::GpuContext", "hang".to_string())
        .at("gpu_context.rs", 99);
    assert!(DefaultLogger::format(&entry).ends_with("hang (gpu_context.rs:99)"));
}

#[test]
fn test_default_logger_handles_all_severities() {
    for severity in ALL {
        DefaultLogger.log(&LogEntry::new(severity, "media::LogTests", "message".to_string()));
    }
}
