//! Checkpoint error types.

use thiserror::Error;
use tributary_core::PartitionId;

/// Result type for checkpoint operations.
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors that can occur while loading or saving checkpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    /// The store returned a record for a different partition.
    #[error("store returned checkpoint for {returned}, expected {requested}")]
    PartitionMismatch {
        /// The partition that was asked for.
        requested: PartitionId,
        /// The partition the returned record carries.
        returned: PartitionId,
    },

    /// A stored checkpoint could not be decoded.
    #[error("corrupt checkpoint for {partition_id}: {message}")]
    Corrupt {
        /// The partition whose checkpoint is unreadable.
        partition_id: PartitionId,
        /// Decoder error message.
        message: String,
    },

    /// Invalid store configuration.
    #[error("invalid checkpoint store config: {message}")]
    InvalidConfig {
        /// Configuration error description.
        message: String,
    },

    /// I/O error during storage operation.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CheckpointError::PartitionMismatch {
            requested: PartitionId::new("3"),
            returned: PartitionId::new("4"),
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 3"));
        assert!(msg.contains("for 4"));

        let err = CheckpointError::Io {
            operation: "save",
            message: "disk full".into(),
        };
        assert_eq!(err.to_string(), "I/O error: save: disk full");
    }
}
