//! Batch progress tracking
//!
//! Accumulates completed/cached/failed counts from concurrently finishing
//! units and derives throughput and an ETA on demand. Counters are atomic
//! and monotonic; there is no rollback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time view of batch progress
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    /// Expected total units (pre-pass estimate)
    pub total: u64,
    /// Units finished, successes and failures alike
    pub completed: u64,
    /// Finished units served from cache
    pub cached: u64,
    /// Finished units that failed
    pub failed: u64,
    /// Time since tracking started
    pub elapsed: Duration,
    /// Units per second
    pub throughput: f64,
    /// Estimated time remaining, when derivable
    pub eta: Option<Duration>,
}

/// Thread-safe progress tracker shared across executing units
#[derive(Debug)]
pub struct ProgressTracker {
    total: AtomicU64,
    completed: AtomicU64,
    cached: AtomicU64,
    failed: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    /// Create a tracker starting now
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cached: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Set the expected total unit count (from the pre-pass)
    #[inline]
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Record one successfully finished unit
    pub fn update(&self, label: &str, from_cache: bool) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if from_cache {
            self.cached.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(
            unit = label,
            done,
            total = self.total.load(Ordering::Relaxed),
            from_cache,
            "unit finished"
        );
    }

    /// Record one failed unit
    pub fn fail(&self, label: &str) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(unit = label, "unit failed");
    }

    /// Log a completion summary for a finished scope
    pub fn complete(&self, label: &str) {
        let snapshot = self.snapshot();
        tracing::info!(
            scope = label,
            completed = snapshot.completed,
            cached = snapshot.cached,
            failed = snapshot.failed,
            elapsed_ms = snapshot.elapsed.as_millis() as u64,
            "progress complete"
        );
    }

    /// Current counters plus derived throughput and ETA
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let cached = self.cached.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed();

        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { completed as f64 / secs } else { 0.0 };

        let remaining = total.saturating_sub(completed);
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if throughput > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / throughput))
        } else {
            None
        };

        ProgressSnapshot {
            total,
            completed,
            cached,
            failed,
            elapsed,
            throughput,
            eta,
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
