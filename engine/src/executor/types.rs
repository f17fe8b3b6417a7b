//! Error types for pairwise task execution

use thiserror::Error;

/// Failure of a single pairwise computation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("Task failed: {0}")]
    Failed(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid task output: {0}")]
    InvalidOutput(String),

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl ComputationError {
    /// Whether this is a failure of the task itself rather than of the
    /// cluster running it
    ///
    /// Cancellation means the backend dropped the work (shutdown, lost
    /// worker, abort), so it never counts as a per-pair failure.
    pub fn is_task_failure(&self) -> bool {
        !matches!(self, ComputationError::Cancelled)
    }
}

/// Result type for a single pairwise computation
pub type ComputationResult<T> = Result<T, ComputationError>;

impl From<std::io::Error> for ComputationError {
    fn from(e: std::io::Error) -> Self {
        ComputationError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        assert_eq!(
            ComputationError::Timeout(1500).to_string(),
            "Timeout after 1500ms"
        );
    }

    #[test]
    fn test_cancellation_is_not_a_task_failure() {
        assert!(!ComputationError::Cancelled.is_task_failure());
        assert!(ComputationError::Failed("bad".into()).is_task_failure());
        assert!(ComputationError::Timeout(10).is_task_failure());
        assert!(ComputationError::Panicked("boom".into()).is_task_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "circuit.qasm");
        let err: ComputationError = io_err.into();
        assert!(matches!(err, ComputationError::Io(ref m) if m.contains("circuit.qasm")));
    }
}
