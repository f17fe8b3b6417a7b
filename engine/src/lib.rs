pub mod cluster;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod observability;
pub mod persistence;
pub mod progress;
pub mod scheduler;

pub use cluster::{ClusterClient, LocalCluster, PendingComputation, SubmissionError};
pub use config::{EngineConfig, EngineSettings, FailurePolicy};
pub use discovery::{DirectoryItemSource, Item, ItemSource};
pub use engine::{Engine, EngineState, EngineStats, KernelMatrix, MatrixAssembler};
pub use errors::{EngineError, Result};
pub use executor::{CommandTask, ComputationError, ComputationResult, PairwiseTask};
pub use observability::{init_logging, init_production_logging, init_simple_logging};
pub use persistence::{JsonFileSink, PersistenceSink, RunReport};
pub use progress::{BarProgress, LogProgress, NoProgress, ProgressReporter, ProgressUpdate};
pub use scheduler::{Chunk, PairEnumerator, PairTask};
