//! In-process cluster backed by the tokio runtime
//!
//! Each submission becomes a spawned task that waits for one of `workers`
//! slots before running. This gives the same contract as a remote scheduler
//! (independent, concurrently running computations, completion in any order)
//! without leaving the process.

use super::{ClusterClient, PendingComputation, SubmissionError};
use crate::discovery::Item;
use crate::executor::{ComputationError, PairwiseTask};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Local worker pool implementing `ClusterClient`
#[derive(Debug, Clone)]
pub struct LocalCluster {
    workers: usize,
    slots: Arc<Semaphore>,
    task_timeout: Option<Duration>,
}

impl LocalCluster {
    /// Create a pool with `workers` concurrent slots (minimum 1)
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        info!(workers = workers, "Local cluster started");
        Self {
            workers,
            slots: Arc::new(Semaphore::new(workers)),
            task_timeout: None,
        }
    }

    /// Pool sized to the machine's available parallelism
    pub fn with_available_parallelism() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(workers)
    }

    /// Abort any single task running longer than `timeout`
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Stop accepting work; later submissions fail as unreachable
    pub fn shutdown(&self) {
        warn!("Local cluster shutting down");
        self.slots.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.slots.is_closed()
    }
}

impl ClusterClient for LocalCluster {
    fn submit(
        &self,
        task: Arc<dyn PairwiseTask>,
        a: Item,
        b: Item,
    ) -> Result<PendingComputation, SubmissionError> {
        if self.slots.is_closed() {
            return Err(SubmissionError::Unreachable(
                "local cluster is shut down".into(),
            ));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SubmissionError::Unreachable(e.to_string()))?;

        let slots = Arc::clone(&self.slots);
        let task_timeout = self.task_timeout;

        let handle = runtime.spawn(async move {
            let _permit = slots
                .acquire_owned()
                .await
                .map_err(|_| ComputationError::Cancelled)?;

            match task_timeout {
                Some(limit) => tokio::time::timeout(limit, task.compute(&a, &b))
                    .await
                    .map_err(|_| ComputationError::Timeout(limit.as_millis() as u64))?,
                None => task.compute(&a, &b).await,
            }
        });

        Ok(PendingComputation::from_join_handle(handle))
    }

    fn name(&self) -> &str {
        "local"
    }
}
