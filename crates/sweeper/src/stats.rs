//! Run statistics for hevc-sweep
//!
//! Process-wide accumulators of bytes before/after conversion plus per-outcome
//! file counts, safe under concurrent recording from in-flight tasks. Updates
//! are commutative atomic adds; no ordering between concurrent recordings is
//! guaranteed or needed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared statistics handle passed into each task.
pub type SharedStats = Arc<RunStats>;

/// Creates a new SharedStats instance with zeroed counters.
pub fn new_shared_stats() -> SharedStats {
    Arc::new(RunStats::default())
}

/// Process-wide run accumulators. Never decremented; live for the whole run.
#[derive(Debug, Default)]
pub struct RunStats {
    input_bytes: AtomicU64,
    output_bytes: AtomicU64,
    converted_files: AtomicU64,
    skipped_files: AtomicU64,
    failed_files: AtomicU64,
}

impl RunStats {
    /// Folds in one verified conversion. Called exactly once per successful
    /// attempt sequence, with the original and final output sizes as a pair.
    pub fn record_success(&self, original_bytes: u64, output_bytes: u64) {
        self.input_bytes.fetch_add(original_bytes, Ordering::Relaxed);
        self.output_bytes.fetch_add(output_bytes, Ordering::Relaxed);
        self.converted_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a skipped file.
    pub fn record_skip(&self) {
        self.skipped_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a file whose attempts were exhausted.
    pub fn record_failure(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent-enough snapshot of the counters for reporting.
    pub fn snapshot(&self) -> StatsSnapshot {
        let total_input_bytes = self.input_bytes.load(Ordering::Relaxed);
        let total_output_bytes = self.output_bytes.load(Ordering::Relaxed);
        StatsSnapshot {
            total_input_bytes,
            total_output_bytes,
            percent_saved: percent_saved(total_input_bytes, total_output_bytes),
            converted_files: self.converted_files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the run statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSnapshot {
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
    pub percent_saved: f64,
    pub converted_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
}

/// Space saved as a percentage of input; 0.0 before anything was recorded.
///
/// Negative when the outputs grew, which the caller reports as-is.
pub fn percent_saved(input_bytes: u64, output_bytes: u64) -> f64 {
    if input_bytes == 0 {
        return 0.0;
    }
    (input_bytes as f64 - output_bytes as f64) / input_bytes as f64 * 100.0
}
