use crate::executor::ComputationError;
use crate::scheduler::PairTask;
use thiserror::Error;

/// Errors that abort a kernel matrix run.
///
/// Every variant is fatal: the orchestration loop stops, transitions to
/// `Failed` and nothing is persisted.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No items found, or the item source could not be read
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The cluster rejected a submission or is unreachable
    #[error("Submission error in chunk {chunk} at pair {pair}: {reason}")]
    Submission {
        chunk: usize,
        pair: PairTask,
        reason: String,
    },

    /// An individual pairwise computation failed
    #[error("Computation error in chunk {chunk} at pair {pair}: {source}")]
    Computation {
        chunk: usize,
        pair: PairTask,
        #[source]
        source: ComputationError,
    },

    /// A recorded pair fell outside the matrix
    #[error("Bounds error: pair ({i}, {j}) outside matrix of size {n}")]
    Bounds { i: usize, j: usize, n: usize },

    /// The finished matrix could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error (invalid config, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred (file operations, process spawning, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The run was interrupted before completion
    #[error("Run interrupted: {0}")]
    Interrupted(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<toml::ser::Error> for EngineError {
    fn from(e: toml::ser::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl EngineError {
    /// The pair this error is attributed to, if known
    pub fn pair(&self) -> Option<PairTask> {
        match self {
            EngineError::Submission { pair, .. } | EngineError::Computation { pair, .. } => {
                Some(*pair)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Config("submission_batch_size must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: submission_batch_size must be > 0"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let engine_err: EngineError = io_err.into();
        assert!(engine_err.to_string().contains("IO error"));
    }

    #[test]
    fn test_computation_error_carries_context() {
        let err = EngineError::Computation {
            chunk: 3,
            pair: PairTask::new(2, 7),
            source: ComputationError::Failed("malformed circuit".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("chunk 3"));
        assert!(msg.contains("(2, 7)"));
        assert!(msg.contains("malformed circuit"));
        assert_eq!(err.pair(), Some(PairTask::new(2, 7)));
    }

    #[test]
    fn test_bounds_error_display() {
        let err = EngineError::Bounds { i: 4, j: 1, n: 3 };
        assert_eq!(
            err.to_string(),
            "Bounds error: pair (4, 1) outside matrix of size 3"
        );
        assert_eq!(err.pair(), None);
    }
}
