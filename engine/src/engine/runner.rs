//! Chunk-synchronous orchestration loop
//!
//! ## State machine
//!
//! ```text
//! Idle → Enumerating → SubmittingChunk → CollectingChunk ─┐
//!            ↑                                             │
//!            └─────────────────────────────────────────────┘
//!        Enumerating → AllChunksDone → Persisting → Finished
//!
//!        any non-terminal state → Failed
//! ```
//!
//! Chunk N+1 is not submitted until every result of chunk N has been
//! recorded. In-flight work is therefore bounded by the submission batch size
//! and buffered results by the processing batch size, independent of `n`.

use super::assembler::{KernelMatrix, MatrixAssembler};
use super::collector::ResultCollector;
use super::stats::EngineStats;
use super::submitter::TaskSubmitter;
use crate::cluster::ClusterClient;
use crate::config::EngineSettings;
use crate::discovery::{Item, ItemSource};
use crate::errors::{EngineError, Result};
use crate::executor::PairwiseTask;
use crate::persistence::{PersistenceSink, RunReport};
use crate::progress::{NoProgress, ProgressReporter, ProgressUpdate};
use crate::scheduler::{PairEnumerator, PairTask};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// Orchestration state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Enumerating,
    SubmittingChunk,
    CollectingChunk,
    AllChunksDone,
    Persisting,
    Finished,
    Failed,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Finished | EngineState::Failed)
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: EngineState) -> bool {
        use EngineState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Enumerating)
            | (Enumerating, SubmittingChunk)
            | (Enumerating, AllChunksDone)
            | (SubmittingChunk, CollectingChunk)
            | (CollectingChunk, Enumerating)
            | (AllChunksDone, Persisting)
            | (Persisting, Finished) => true,
            _ => false,
        }
    }
}

/// Output of the chunk loop
struct Computed {
    matrix: KernelMatrix,
    skipped: Vec<PairTask>,
    chunks: usize,
}

/// Chunked pairwise-matrix engine
pub struct Engine {
    settings: EngineSettings,
    cluster: Arc<dyn ClusterClient>,
    task: Arc<dyn PairwiseTask>,
    progress: Box<dyn ProgressReporter>,
    stats: Arc<EngineStats>,
    state: EngineState,
    run_id: Uuid,
}

impl Engine {
    /// Create an engine over an explicitly provided cluster client
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the batch settings are invalid.
    pub fn new(
        settings: EngineSettings,
        cluster: Arc<dyn ClusterClient>,
        task: Arc<dyn PairwiseTask>,
    ) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            settings,
            cluster,
            task,
            progress: Box::new(NoProgress),
            stats: Arc::new(EngineStats::new()),
            state: EngineState::Idle,
            run_id: Uuid::new_v4(),
        })
    }

    /// Set the progress reporter
    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Identifier of the current (or last) run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Discover items, compute the full matrix and persist it
    ///
    /// Nothing is persisted unless every pair has been computed and recorded.
    pub async fn run(
        &mut self,
        source: &dyn ItemSource,
        sink: &dyn PersistenceSink,
    ) -> Result<RunReport> {
        self.run_id = Uuid::new_v4();
        self.state = EngineState::Idle;

        let span = info_span!("run", run_id = %self.run_id, task = self.task.name());
        let result = self.execute(source, sink).instrument(span).await;

        if let Err(e) = &result {
            self.transition(EngineState::Failed);
            error!(
                run_id = %self.run_id,
                error = %e,
                pair = ?e.pair(),
                "Run failed"
            );
        }

        self.stats.print_summary();
        result
    }

    async fn execute(
        &mut self,
        source: &dyn ItemSource,
        sink: &dyn PersistenceSink,
    ) -> Result<RunReport> {
        let start = Instant::now();

        let items = self.discover(source)?;
        let computed = self.compute(&items).await?;

        let finished_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let report = RunReport {
            run_id: self.run_id,
            pairs: crate::scheduler::total_pairs(items.len()),
            items,
            chunks: computed.chunks,
            submission_batch_size: self.settings.submission_batch_size,
            processing_batch_size: self.settings.processing_batch_size,
            skipped_pairs: computed.skipped,
            finished_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        self.transition(EngineState::Persisting);
        sink.persist(&computed.matrix, &report)?;
        self.transition(EngineState::Finished);

        info!(
            n = report.item_count(),
            pairs = report.pairs,
            chunks = report.chunks,
            skipped = report.skipped_pairs.len(),
            elapsed_ms = report.elapsed_ms,
            "Kernel matrix computed"
        );

        Ok(report)
    }

    /// Load the ordered item list, applying the `max_items` cap
    fn discover(&self, source: &dyn ItemSource) -> Result<Vec<Item>> {
        let mut items = source.discover()?;

        if let Some(max) = self.settings.max_items {
            if items.len() > max {
                info!(found = items.len(), max_items = max, "Truncating item list");
                items.truncate(max);
            }
        }

        if items.is_empty() {
            return Err(EngineError::Discovery(format!(
                "no items found in {}",
                source.location()
            )));
        }

        Ok(items)
    }

    /// The chunk loop: enumerate, submit, collect, record
    async fn compute(&mut self, items: &[Item]) -> Result<Computed> {
        let n = items.len();
        let enumerator = PairEnumerator::new(n, self.settings.submission_batch_size)?;
        let total = enumerator.total_pairs();
        let chunk_count = enumerator.chunk_count();

        let stats = Arc::clone(&self.stats);
        let cluster = Arc::clone(&self.cluster);
        let submitter = TaskSubmitter::new(cluster.as_ref(), Arc::clone(&self.task), items, &stats);

        let mut assembler = MatrixAssembler::new(n);
        let mut skipped = Vec::new();
        let mut completed = 0;

        info!(
            n = n,
            pairs = total,
            chunks = chunk_count,
            submission_batch_size = self.settings.submission_batch_size,
            processing_batch_size = self.settings.processing_batch_size,
            cluster = cluster.name(),
            "Starting chunked computation"
        );
        self.progress.start(total, chunk_count);
        self.transition(EngineState::Enumerating);

        for chunk in enumerator {
            self.transition(EngineState::SubmittingChunk);
            let submitted = submitter.submit_chunk(chunk)?;

            self.transition(EngineState::CollectingChunk);
            let mut collector = ResultCollector::new(
                submitted,
                self.settings.processing_batch_size,
                self.settings.failure_policy,
                &stats,
            );

            while let Some(batch) = collector.next_batch().await? {
                for result in &batch {
                    assembler.record(result.pair.i, result.pair.j, result.value)?;
                }
                completed += batch.len();

                self.progress.update(&ProgressUpdate {
                    chunk: collector.chunk(),
                    chunk_count,
                    chunk_completed: collector.delivered(),
                    chunk_total: collector.total(),
                    completed,
                    total,
                });
            }

            skipped.extend(collector.take_skipped());
            debug!(
                chunk = collector.chunk(),
                pairs = collector.total(),
                "Chunk recorded"
            );
            self.transition(EngineState::Enumerating);
        }

        self.transition(EngineState::AllChunksDone);
        self.progress.finish();

        Ok(Computed {
            matrix: assembler.finish(),
            skipped,
            chunks: chunk_count,
        })
    }

    fn transition(&mut self, next: EngineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EngineState::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            Idle,
            Enumerating,
            SubmittingChunk,
            CollectingChunk,
            Enumerating,
            SubmittingChunk,
            CollectingChunk,
            Enumerating,
            AllChunksDone,
            Persisting,
            Finished,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_states() {
        for state in [
            Idle,
            Enumerating,
            SubmittingChunk,
            CollectingChunk,
            AllChunksDone,
            Persisting,
        ] {
            assert!(state.can_transition_to(Failed));
        }
        assert!(!Finished.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn test_no_overlapping_chunks() {
        // Next chunk cannot be submitted straight from collection
        assert!(!CollectingChunk.can_transition_to(SubmittingChunk));
        assert!(!SubmittingChunk.can_transition_to(Enumerating));
        assert!(!Enumerating.can_transition_to(Persisting));
    }
}
