//! Metrics tracking for venue synchronization.
//!
//! Provides atomic counters for monitoring sync runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for venue synchronization.
#[derive(Debug)]
pub struct SyncMetrics {
    /// Number of sync runs completed.
    runs_completed: AtomicU64,

    /// Number of sync runs aborted by an error.
    runs_failed: AtomicU64,

    /// Number of pages fetched from venues.
    pages_fetched: AtomicU64,

    /// Number of native records fetched.
    records_fetched: AtomicU64,

    /// Number of records converted and handed to the reconciler.
    records_reconciled: AtomicU64,

    /// Number of records rejected by an adapter.
    records_unsupported: AtomicU64,

    /// Number of records skipped as already seen.
    records_skipped: AtomicU64,

    /// Number of liveness probes issued.
    probes: AtomicU64,

    /// Total time spent in sync runs, in nanoseconds.
    total_run_time_ns: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            pages_fetched: AtomicU64::new(0),
            records_fetched: AtomicU64::new(0),
            records_reconciled: AtomicU64::new(0),
            records_unsupported: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            probes: AtomicU64::new(0),
            total_run_time_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a completed run with its duration.
    pub fn record_run(&self, duration: Duration) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.total_run_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Records an aborted run.
    pub fn record_failed_run(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a fetched page with its record count.
    pub fn record_page(&self, records: u64) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        self.records_fetched.fetch_add(records, Ordering::Relaxed);
    }

    /// Records a reconciled record.
    pub fn record_reconciled(&self) {
        self.records_reconciled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an adapter rejection.
    pub fn record_unsupported(&self) {
        self.records_unsupported.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record skipped as already seen.
    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a liveness probe.
    pub fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of completed runs.
    #[must_use]
    pub fn runs_completed(&self) -> u64 {
        self.runs_completed.load(Ordering::Relaxed)
    }

    /// Returns the number of failed runs.
    #[must_use]
    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    /// Returns the number of pages fetched.
    #[must_use]
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    /// Returns the number of records fetched.
    #[must_use]
    pub fn records_fetched(&self) -> u64 {
        self.records_fetched.load(Ordering::Relaxed)
    }

    /// Returns the number of records reconciled.
    #[must_use]
    pub fn records_reconciled(&self) -> u64 {
        self.records_reconciled.load(Ordering::Relaxed)
    }

    /// Returns the number of adapter rejections.
    #[must_use]
    pub fn records_unsupported(&self) -> u64 {
        self.records_unsupported.load(Ordering::Relaxed)
    }

    /// Returns the number of skipped records.
    #[must_use]
    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    /// Returns the number of probes issued.
    #[must_use]
    pub fn probes(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    /// Returns the average run duration.
    #[must_use]
    pub fn average_run_time(&self) -> Duration {
        let runs = self.runs_completed();
        if runs == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_run_time_ns.load(Ordering::Relaxed) / runs)
    }

    /// Returns completed runs per second since start.
    #[must_use]
    pub fn runs_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.runs_completed() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_completed: self.runs_completed(),
            runs_failed: self.runs_failed(),
            pages_fetched: self.pages_fetched(),
            records_fetched: self.records_fetched(),
            records_reconciled: self.records_reconciled(),
            records_unsupported: self.records_unsupported(),
            records_skipped: self.records_skipped(),
            probes: self.probes(),
        }
    }
}

/// Point-in-time snapshot of sync metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of completed runs.
    pub runs_completed: u64,
    /// Number of failed runs.
    pub runs_failed: u64,
    /// Number of pages fetched.
    pub pages_fetched: u64,
    /// Number of records fetched.
    pub records_fetched: u64,
    /// Number of records reconciled.
    pub records_reconciled: u64,
    /// Number of adapter rejections.
    pub records_unsupported: u64,
    /// Number of skipped records.
    pub records_skipped: u64,
    /// Number of probes issued.
    pub probes: u64,
}
