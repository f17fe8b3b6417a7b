//! Run instrumentation
//!
//! Counters are atomics so the stats handle can be shared with observers
//! (tests, CLI summary) while the orchestration loop updates it.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Statistics for one or more engine runs
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Chunks handed to the cluster
    pub chunks_submitted: AtomicU64,

    /// Computations handed to the cluster
    pub pairs_submitted: AtomicU64,

    /// Computations resolved (successfully or not)
    pub pairs_resolved: AtomicU64,

    /// Failed computations recorded as NaN under the skip policy
    pub pairs_skipped: AtomicU64,

    /// Pending computations cancelled after a failure
    pub pairs_cancelled: AtomicU64,

    /// Sub-batches delivered by the collector
    pub batches_delivered: AtomicU64,

    /// Computations currently submitted but not resolved
    pub in_flight: AtomicU64,

    /// Highest value `in_flight` has reached
    pub peak_in_flight: AtomicU64,

    /// Largest sub-batch of buffered results
    pub peak_buffered: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk_submitted(&self) {
        self.chunks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one submission and update the in-flight peak
    pub fn record_submitted(&self) {
        self.pairs_submitted.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
    }

    pub fn record_resolved(&self) {
        self.pairs_resolved.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.pairs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self, count: u64) {
        self.pairs_cancelled.fetch_add(count, Ordering::Relaxed);
        self.in_flight.fetch_sub(count, Ordering::Relaxed);
    }

    /// Record a delivered sub-batch of `size` results
    pub fn record_batch(&self, size: usize) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.peak_buffered.fetch_max(size as u64, Ordering::Relaxed);
    }

    pub fn chunks_submitted(&self) -> u64 {
        self.chunks_submitted.load(Ordering::Relaxed)
    }

    pub fn pairs_submitted(&self) -> u64 {
        self.pairs_submitted.load(Ordering::Relaxed)
    }

    pub fn pairs_resolved(&self) -> u64 {
        self.pairs_resolved.load(Ordering::Relaxed)
    }

    pub fn pairs_skipped(&self) -> u64 {
        self.pairs_skipped.load(Ordering::Relaxed)
    }

    pub fn pairs_cancelled(&self) -> u64 {
        self.pairs_cancelled.load(Ordering::Relaxed)
    }

    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_buffered(&self) -> u64 {
        self.peak_buffered.load(Ordering::Relaxed)
    }

    /// Average results per delivered sub-batch
    pub fn avg_batch_size(&self) -> f64 {
        let batches = self.batches_delivered();
        if batches == 0 {
            return 0.0;
        }
        self.pairs_resolved() as f64 / batches as f64
    }

    /// Log statistics summary
    pub fn print_summary(&self) {
        info!(
            chunks = self.chunks_submitted(),
            submitted = self.pairs_submitted(),
            resolved = self.pairs_resolved(),
            skipped = self.pairs_skipped(),
            cancelled = self.pairs_cancelled(),
            batches = self.batches_delivered(),
            peak_in_flight = self.peak_in_flight(),
            peak_buffered = self.peak_buffered(),
            avg_batch_size = format!("{:.1}", self.avg_batch_size()),
            "Engine statistics"
        );
    }
}
