//! Pairwise task functions
//!
//! A task computes one kernel entry from two items. The engine treats it as
//! an opaque, deterministic, concurrency-safe function:
//!
//! - `CommandTask`: delegates to an external overlap program per pair
//!
//! Any other implementation of `PairwiseTask` (in-process simulators, test
//! doubles) plugs into the cluster client the same way.

pub mod command;
pub mod types;

pub use command::CommandTask;
pub use types::{ComputationError, ComputationResult};

use crate::discovery::Item;
use async_trait::async_trait;

/// A pure function of two items producing one kernel value
///
/// Implementations must be safe to invoke concurrently on disjoint pairs.
#[async_trait]
pub trait PairwiseTask: Send + Sync + 'static {
    /// Compute the similarity of `a` and `b`
    async fn compute(&self, a: &Item, b: &Item) -> ComputationResult<f64>;

    /// Short task name for logs
    fn name(&self) -> &str;
}
