//! Cluster client capability
//!
//! The engine never talks to a scheduler directly. It is handed a
//! `ClusterClient` at construction time and only uses two operations:
//!
//! - `submit`: start one pairwise computation, returning a `PendingComputation`
//! - awaiting the returned handles, multiplexed by the result collector
//!
//! ## Architecture
//!
//! ```text
//! TaskSubmitter → ClusterClient::submit → PendingComputation
//!                                              ↓
//!                         ResultCollector (FuturesUnordered, completion order)
//! ```
//!
//! Dropping an unresolved `PendingComputation` cancels the underlying work.

mod local;

pub use local::LocalCluster;

use crate::discovery::Item;
use crate::executor::{ComputationError, ComputationResult, PairwiseTask};
use futures::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::task::{AbortHandle, JoinHandle};

/// Failure to hand a computation to the cluster
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmissionError {
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// Backend that runs pairwise tasks on some set of workers
pub trait ClusterClient: Send + Sync {
    /// Start computing `task(a, b)` and return a handle to its eventual result
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if the cluster cannot accept work.
    fn submit(
        &self,
        task: Arc<dyn PairwiseTask>,
        a: Item,
        b: Item,
    ) -> Result<PendingComputation, SubmissionError>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// In-flight handle for one submitted computation
///
/// Resolves to the computed value or the task's failure. Dropping it before
/// resolution aborts the work when the backend supports cancellation.
pub struct PendingComputation {
    result: BoxFuture<'static, ComputationResult<f64>>,
    abort: Option<AbortHandle>,
}

impl PendingComputation {
    /// Wrap an arbitrary future (no cancellation beyond dropping it)
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = ComputationResult<f64>> + Send + 'static,
    {
        Self {
            result: Box::pin(future),
            abort: None,
        }
    }

    /// Wrap a spawned tokio task, aborting it on cancellation
    pub fn from_join_handle(handle: JoinHandle<ComputationResult<f64>>) -> Self {
        let abort = handle.abort_handle();
        let result = Box::pin(async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Err(ComputationError::Cancelled),
                Err(e) => Err(ComputationError::Panicked(e.to_string())),
            }
        });

        Self {
            result,
            abort: Some(abort),
        }
    }

    /// Request cancellation of the underlying work (best effort)
    pub fn cancel(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

impl Future for PendingComputation {
    type Output = ComputationResult<f64>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().result.as_mut().poll(cx)
    }
}

impl Drop for PendingComputation {
    fn drop(&mut self) {
        // no-op for tasks that already finished
        self.cancel();
    }
}

impl std::fmt::Debug for PendingComputation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingComputation")
            .field("cancellable", &self.abort.is_some())
            .finish()
    }
}
