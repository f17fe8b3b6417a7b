//! Completion-order result collection
//!
//! The collector owns the pending computations of one chunk and hands back
//! results in sub-batches as they finish. Each call to `next_batch` waits for
//! at least one completion, then drains whatever else is already finished
//! (up to the processing batch size) without waiting further. A slow task
//! therefore never holds back results that are already available.

use super::stats::EngineStats;
use super::submitter::{SubmittedChunk, TaggedComputation};
use crate::config::FailurePolicy;
use crate::errors::{EngineError, Result};
use crate::executor::ComputationResult;
use crate::scheduler::PairTask;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{debug, warn};

/// One delivered result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedPair {
    pub pair: PairTask,
    pub value: f64,
}

/// Drains a submitted chunk in completion order
pub struct ResultCollector<'a> {
    chunk: usize,
    pending: FuturesUnordered<TaggedComputation>,
    batch_size: usize,
    policy: FailurePolicy,
    stats: &'a EngineStats,
    total: usize,
    delivered: usize,
    skipped: Vec<PairTask>,
}

impl<'a> ResultCollector<'a> {
    pub fn new(
        submitted: SubmittedChunk,
        batch_size: usize,
        policy: FailurePolicy,
        stats: &'a EngineStats,
    ) -> Self {
        let total = submitted.pending.len();
        Self {
            chunk: submitted.index,
            pending: submitted.pending,
            batch_size: batch_size.max(1),
            policy,
            stats,
            total,
            delivered: 0,
            skipped: Vec::new(),
        }
    }

    /// Chunk being collected
    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// Computations submitted for this chunk
    pub fn total(&self) -> usize {
        self.total
    }

    /// Results delivered so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Computations not yet resolved
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Pairs recorded as NaN under the skip policy
    pub fn skipped(&self) -> &[PairTask] {
        &self.skipped
    }

    pub fn take_skipped(&mut self) -> Vec<PairTask> {
        std::mem::take(&mut self.skipped)
    }

    /// Wait for the next sub-batch of completed results
    ///
    /// Returns `Ok(None)` once every computation of the chunk has been delivered.
    ///
    /// # Errors
    ///
    /// Under `FailurePolicy::FailFast`, the first failed computation cancels
    /// the remaining ones and is returned as `EngineError::Computation`.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<CompletedPair>>> {
        let Some(first) = self.pending.next().await else {
            return Ok(None);
        };

        let mut batch = Vec::with_capacity(self.batch_size.min(self.pending.len() + 1));
        self.accept(first, &mut batch)?;

        // Drain completions that are already ready, without waiting
        while batch.len() < self.batch_size {
            match self.pending.next().now_or_never() {
                Some(Some(completion)) => self.accept(completion, &mut batch)?,
                _ => break,
            }
        }

        self.delivered += batch.len();
        self.stats.record_batch(batch.len());

        debug!(
            chunk = self.chunk,
            batch = batch.len(),
            delivered = self.delivered,
            total = self.total,
            "Sub-batch collected"
        );

        Ok(Some(batch))
    }

    fn accept(
        &mut self,
        (pair, outcome): (PairTask, ComputationResult<f64>),
        batch: &mut Vec<CompletedPair>,
    ) -> Result<()> {
        self.stats.record_resolved();

        let source = match outcome {
            Ok(value) => {
                batch.push(CompletedPair { pair, value });
                return Ok(());
            }
            Err(source) => source,
        };

        if !source.is_task_failure() {
            // Cancellation is never skippable, whatever the policy
            let cancelled = self.cancel_remaining();
            warn!(
                chunk = self.chunk,
                pair = %pair,
                cancelled = cancelled,
                "Computation cancelled by the cluster, aborting chunk"
            );
            return Err(EngineError::Submission {
                chunk: self.chunk,
                pair,
                reason: "computation cancelled by the cluster".to_string(),
            });
        }

        match self.policy {
            FailurePolicy::FailFast => {
                let cancelled = self.cancel_remaining();
                warn!(
                    chunk = self.chunk,
                    pair = %pair,
                    error = %source,
                    cancelled = cancelled,
                    "Computation failed, aborting chunk"
                );
                Err(EngineError::Computation {
                    chunk: self.chunk,
                    pair,
                    source,
                })
            }
            FailurePolicy::SkipAsNan => {
                warn!(
                    chunk = self.chunk,
                    pair = %pair,
                    error = %source,
                    "Computation failed, recording NaN"
                );
                self.stats.record_skipped();
                self.skipped.push(pair);
                batch.push(CompletedPair {
                    pair,
                    value: f64::NAN,
                });
                Ok(())
            }
        }
    }

    /// Cancel every unresolved computation of this chunk
    pub fn cancel_remaining(&mut self) -> usize {
        let count = self.pending.len();
        for computation in self.pending.iter() {
            computation.cancel();
        }
        self.pending.clear();
        self.stats.record_cancelled(count as u64);
        count
    }
}

impl Drop for ResultCollector<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.cancel_remaining();
        }
    }
}
