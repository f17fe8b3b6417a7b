//! Progress reporting
//!
//! Purely observational: reporters never slow down or block the engine.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info};

/// Snapshot sent after every delivered sub-batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Chunk being collected (zero-based)
    pub chunk: usize,
    pub chunk_count: usize,

    /// Results delivered for this chunk so far
    pub chunk_completed: usize,
    pub chunk_total: usize,

    /// Results delivered for the whole run so far
    pub completed: usize,
    pub total: usize,
}

impl ProgressUpdate {
    /// Completed fraction of the whole run (0.0 - 1.0)
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn chunk_done(&self) -> bool {
        self.chunk_completed == self.chunk_total
    }
}

/// Receiver of progress updates
pub trait ProgressReporter: Send + Sync {
    /// Called once before the first chunk
    fn start(&self, _total_pairs: usize, _chunk_count: usize) {}

    fn update(&self, update: &ProgressUpdate);

    /// Called once after the last chunk
    fn finish(&self) {}
}

/// Discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&self, _update: &ProgressUpdate) {}
}

/// Reports through tracing: one info line per finished chunk
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn start(&self, total_pairs: usize, chunk_count: usize) {
        info!(pairs = total_pairs, chunks = chunk_count, "Computing kernel matrix");
    }

    fn update(&self, update: &ProgressUpdate) {
        if update.chunk_done() {
            info!(
                chunk = update.chunk + 1,
                chunks = update.chunk_count,
                completed = update.completed,
                total = update.total,
                percent = format!("{:.1}", update.fraction() * 100.0),
                "Chunk complete"
            );
        } else {
            debug!(
                chunk = update.chunk + 1,
                chunk_completed = update.chunk_completed,
                chunk_total = update.chunk_total,
                "Chunk progress"
            );
        }
    }

    fn finish(&self) {
        info!("All chunks complete");
    }
}

/// Terminal progress bar over all pairs
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(4));
        if let Ok(style) = ProgressStyle::with_template(
            "{msg} {wide_bar} {pos}/{len} {elapsed}/{eta} {per_sec}",
        ) {
            bar.set_style(style);
        }
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarProgress {
    fn start(&self, total_pairs: usize, _chunk_count: usize) {
        self.bar.set_length(total_pairs as u64);
        self.bar.set_position(0);
    }

    fn update(&self, update: &ProgressUpdate) {
        self.bar
            .set_message(format!("chunk {}/{}", update.chunk + 1, update.chunk_count));
        self.bar.set_position(update.completed as u64);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
