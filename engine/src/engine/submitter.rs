//! Chunk submission
//!
//! Turns a chunk of pairs into a set of pending computations, each tagged
//! with the pair it was submitted for. The tag travels with the handle, so a
//! completion never has to be matched back to its pair by searching.

use super::stats::EngineStats;
use crate::cluster::{ClusterClient, PendingComputation};
use crate::discovery::Item;
use crate::errors::{EngineError, Result};
use crate::executor::{ComputationResult, PairwiseTask};
use crate::scheduler::{Chunk, PairTask};
use futures::stream::FuturesUnordered;
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, error};

/// A pending computation carrying the pair it belongs to
#[derive(Debug)]
pub struct TaggedComputation {
    pair: PairTask,
    pending: PendingComputation,
}

impl TaggedComputation {
    pub fn new(pair: PairTask, pending: PendingComputation) -> Self {
        Self { pair, pending }
    }

    pub fn cancel(&self) {
        self.pending.cancel();
    }
}

impl Future for TaggedComputation {
    type Output = (PairTask, ComputationResult<f64>);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.pending.poll_unpin(cx).map(|outcome| (this.pair, outcome))
    }
}

/// All pending computations of one chunk
#[derive(Debug)]
pub struct SubmittedChunk {
    pub index: usize,
    pub pending: FuturesUnordered<TaggedComputation>,
}

/// Submits chunks of pairs to a cluster client
pub struct TaskSubmitter<'a> {
    cluster: &'a dyn ClusterClient,
    task: Arc<dyn PairwiseTask>,
    items: &'a [Item],
    stats: &'a EngineStats,
}

impl<'a> TaskSubmitter<'a> {
    pub fn new(
        cluster: &'a dyn ClusterClient,
        task: Arc<dyn PairwiseTask>,
        items: &'a [Item],
        stats: &'a EngineStats,
    ) -> Self {
        Self {
            cluster,
            task,
            items,
            stats,
        }
    }

    /// Submit every pair of `chunk` before any is awaited
    ///
    /// # Errors
    ///
    /// - `EngineError::Bounds` if a pair references a missing item
    /// - `EngineError::Submission` if the cluster rejects a submission; the
    ///   computations already submitted for this chunk are cancelled
    pub fn submit_chunk(&self, chunk: Chunk) -> Result<SubmittedChunk> {
        let pending = FuturesUnordered::new();

        for pair in chunk.pairs {
            match self.submit_pair(chunk.index, pair) {
                Ok(computation) => {
                    self.stats.record_submitted();
                    pending.push(TaggedComputation::new(pair, computation));
                }
                Err(e) => {
                    let cancelled = pending.len();
                    for computation in pending.iter() {
                        computation.cancel();
                    }
                    drop(pending);
                    self.stats.record_cancelled(cancelled as u64);
                    return Err(e);
                }
            }
        }

        self.stats.record_chunk_submitted();
        debug!(
            chunk = chunk.index,
            pairs = pending.len(),
            cluster = self.cluster.name(),
            "Chunk submitted"
        );

        Ok(SubmittedChunk {
            index: chunk.index,
            pending,
        })
    }

    fn submit_pair(&self, chunk: usize, pair: PairTask) -> Result<PendingComputation> {
        let n = self.items.len();
        let (a, b) = match (self.items.get(pair.i), self.items.get(pair.j)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => {
                return Err(EngineError::Bounds {
                    i: pair.i,
                    j: pair.j,
                    n,
                })
            }
        };

        self.cluster
            .submit(Arc::clone(&self.task), a, b)
            .map_err(|e| {
                error!(chunk = chunk, pair = %pair, error = %e, "Submission failed");
                EngineError::Submission {
                    chunk,
                    pair,
                    reason: e.to_string(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SubmissionError;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct IndexSum;

    #[async_trait]
    impl PairwiseTask for IndexSum {
        async fn compute(&self, a: &Item, b: &Item) -> ComputationResult<f64> {
            let a: f64 = a.as_str().parse().unwrap_or(0.0);
            let b: f64 = b.as_str().parse().unwrap_or(0.0);
            Ok(a + b)
        }

        fn name(&self) -> &str {
            "index-sum"
        }
    }

    /// Runs tasks inline and refuses work after `limit` submissions
    struct InlineCluster {
        limit: usize,
        submitted: AtomicUsize,
    }

    impl ClusterClient for InlineCluster {
        fn submit(
            &self,
            task: Arc<dyn PairwiseTask>,
            a: Item,
            b: Item,
        ) -> std::result::Result<PendingComputation, SubmissionError> {
            if self.submitted.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err(SubmissionError::Rejected("queue full".into()));
            }
            Ok(PendingComputation::new(async move {
                task.compute(&a, &b).await
            }))
        }

        fn name(&self) -> &str {
            "inline"
        }
    }

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::from(i.to_string())).collect()
    }

    fn chunk(pairs: Vec<PairTask>) -> Chunk {
        Chunk {
            index: 4,
            start_offset: 0,
            pairs,
        }
    }

    #[tokio::test]
    async fn test_results_are_tagged_with_pairs() {
        let cluster = InlineCluster {
            limit: usize::MAX,
            submitted: AtomicUsize::new(0),
        };
        let items = items(3);
        let stats = EngineStats::new();
        let submitter = TaskSubmitter::new(&cluster, Arc::new(IndexSum), &items, &stats);

        let submitted = submitter
            .submit_chunk(chunk(vec![PairTask::new(0, 1), PairTask::new(1, 2)]))
            .unwrap();
        assert_eq!(submitted.index, 4);
        assert_eq!(submitted.pending.len(), 2);
        assert_eq!(stats.in_flight(), 2);
        assert_eq!(stats.chunks_submitted(), 1);

        let mut results: Vec<(PairTask, ComputationResult<f64>)> =
            submitted.pending.collect().await;
        results.sort_by_key(|(pair, _)| *pair);
        assert_eq!(
            results,
            vec![(PairTask::new(0, 1), Ok(1.0)), (PairTask::new(1, 2), Ok(3.0))]
        );
    }

    #[test]
    fn test_rejected_submission_reports_chunk_and_pair() {
        let cluster = InlineCluster {
            limit: 1,
            submitted: AtomicUsize::new(0),
        };
        let items = items(3);
        let stats = EngineStats::new();
        let submitter = TaskSubmitter::new(&cluster, Arc::new(IndexSum), &items, &stats);

        let err = submitter
            .submit_chunk(chunk(vec![PairTask::new(0, 0), PairTask::new(0, 1)]))
            .unwrap_err();

        match err {
            EngineError::Submission { chunk, pair, .. } => {
                assert_eq!(chunk, 4);
                assert_eq!(pair, PairTask::new(0, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.pairs_cancelled(), 1);
        assert_eq!(stats.chunks_submitted(), 0);
    }

    #[test]
    fn test_pair_outside_items_is_bounds_error() {
        let cluster = InlineCluster {
            limit: usize::MAX,
            submitted: AtomicUsize::new(0),
        };
        let items = items(2);
        let stats = EngineStats::new();
        let submitter = TaskSubmitter::new(&cluster, Arc::new(IndexSum), &items, &stats);

        let err = submitter
            .submit_chunk(chunk(vec![PairTask::new(1, 5)]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Bounds { i: 1, j: 5, n: 2 }));
    }
}
