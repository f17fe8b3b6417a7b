//! Chunked distributed pairwise-matrix engine
//!
//! - `submitter`: chunk of pairs → tagged pending computations
//! - `collector`: pending computations → sub-batches in completion order
//! - `assembler`: single writer of the symmetric matrix
//! - `runner`: the chunk-synchronous state machine tying them together
//! - `stats`: instrumentation counters

pub mod assembler;
pub mod collector;
pub mod runner;
pub mod stats;
pub mod submitter;

pub use assembler::{KernelMatrix, MatrixAssembler};
pub use collector::{CompletedPair, ResultCollector};
pub use runner::{Engine, EngineState};
pub use stats::EngineStats;
pub use submitter::{SubmittedChunk, TaggedComputation, TaskSubmitter};
