/// Null backend statistics - allocation and submission counters with a colored report

use colored::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a null device's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullStats {
    /// Resources allocated since the device was created
    pub allocations: u64,
    /// Resources released (freed or dropped)
    pub frees: u64,
    /// Bytes currently held by live resources
    pub live_bytes: u64,
    /// Highest value `live_bytes` reached
    pub peak_bytes: u64,
    /// Idle waits requested by the context core
    pub idle_waits: u64,
    /// Command buffers executed
    pub submissions: u64,
}

impl NullStats {
    /// Resources not yet released
    pub fn live_resources(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }
}

/// Thread-safe counters shared between a device and its resources
#[derive(Debug, Default)]
pub(crate) struct StatsTracker {
    allocations: AtomicU64,
    frees: AtomicU64,
    live_bytes: AtomicU64,
    peak_bytes: AtomicU64,
    idle_waits: AtomicU64,
    submissions: AtomicU64,
}

impl StatsTracker {
    pub(crate) fn record_allocation(&self, size: u64) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let live = self.live_bytes.fetch_add(size, Ordering::Relaxed) + size;
        self.peak_bytes.fetch_max(live, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, size: u64) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_wait(&self) {
        self.idle_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> NullStats {
        NullStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            idle_waits: self.idle_waits.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
        }
    }
}

/// Print a null device statistics report
pub fn print_null_stats_report(stats: &NullStats) {
    println!("\n{}", "=== Null Device Statistics Report ===".bright_blue().bold());

    println!("  {} {}", "Allocations:".cyan(), stats.allocations);
    println!("  {} {}", "Frees:".cyan(), stats.frees);
    println!("  {} {} bytes (peak {})", "Live memory:".cyan(), stats.live_bytes, stats.peak_bytes);
    println!("  {} {}", "Idle waits:".bright_black(), stats.idle_waits);
    println!("  {} {}", "Submissions:".white().bold(), stats.submissions);

    if stats.live_resources() > 0 {
        println!("\n  {} {} resource(s) still alive",
            "⚠".yellow(),
            stats.live_resources()
        );
    } else {
        println!("\n  {}", "✓ No leaked resources".green().bold());
    }

    println!("{}\n", "=====================================".bright_blue().bold());
}
