//! Listener error types.

use thiserror::Error;
use tributary_assign::AssignmentError;
use tributary_checkpoint::CheckpointError;
use tributary_core::PartitionId;

use crate::broker::BrokerError;
use crate::topology::TopologyError;

/// Result type for listener operations.
pub type ListenerResult<T> = Result<T, ListenerError>;

/// Result type for configuration building.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors detected while building a [`crate::ListenerConfig`].
///
/// All of these are raised before the broker is contacted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was never provided.
    #[error("missing required setting '{field}'")]
    MissingField {
        /// Name of the setting.
        field: &'static str,
    },

    /// Both a start offset and a start timestamp were configured.
    #[error("start offset and start time are mutually exclusive")]
    ConflictingStartOptions,

    /// Single mode was selected without an assigned partition id.
    #[error("single mode requires an assigned partition id")]
    MissingAssignedPartition,

    /// An explicit node list contains an empty id.
    #[error("node list entry {index} is empty")]
    EmptyNodeId {
        /// Position of the empty entry.
        index: usize,
    },

    /// An explicit node list contains the same id twice.
    #[error("node list contains duplicate id '{node_id}'")]
    DuplicateNodeId {
        /// The repeated id.
        node_id: String,
    },

    /// Neither a node list nor a topology source was configured.
    #[error("a node list or a topology source is required unless the mode is single")]
    NoNodeSource,

    /// A setting is outside the configured limits.
    #[error("limit violated: {0}")]
    Limit(#[from] tributary_core::Error),
}

/// Errors raised by the listener and its partition receivers.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Partitions could not be assigned to this node.
    #[error("assignment failed: {0}")]
    Assignment(#[from] AssignmentError),

    /// Node ids could not be discovered.
    #[error("topology lookup failed: {0}")]
    Topology(#[from] TopologyError),

    /// A broker call failed.
    #[error("broker {operation} failed: {source}")]
    Broker {
        /// The broker operation that failed.
        operation: &'static str,
        /// The broker error.
        #[source]
        source: BrokerError,
    },

    /// Loading or saving a checkpoint failed.
    #[error("checkpoint failed for partition {partition_id}: {source}")]
    Checkpoint {
        /// The partition whose checkpoint failed.
        partition_id: PartitionId,
        /// The store error.
        #[source]
        source: CheckpointError,
    },

    /// The processor reported an error for a batch.
    #[error("processor failed on partition {partition_id}: {message}")]
    Processor {
        /// The partition being processed.
        partition_id: PartitionId,
        /// Error message from the processor.
        message: String,
    },

    /// An operation was called in the wrong lifecycle state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the component was in.
        state: &'static str,
    },

    /// A receive task panicked or was cancelled.
    #[error("receive task for partition {partition_id} ended abnormally: {message}")]
    TaskFailed {
        /// The partition whose task failed.
        partition_id: PartitionId,
        /// Join error description.
        message: String,
    },
}

impl ListenerError {
    /// Wraps a broker error with the operation that produced it.
    #[must_use]
    pub const fn broker(operation: &'static str, source: BrokerError) -> Self {
        Self::Broker { operation, source }
    }

    /// Returns true if the error is a lifecycle misuse.
    #[must_use]
    pub const fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ListenerError::InvalidState {
            operation: "start",
            state: "running",
        };
        assert_eq!(err.to_string(), "cannot start while running");
        assert!(err.is_invalid_state());

        let err = ListenerError::from(ConfigError::MissingField {
            field: "stream_name",
        });
        assert!(err.to_string().contains("stream_name"));
    }

    #[test]
    fn test_limit_error_converts() {
        let err = ConfigError::from(tributary_core::Error::InvalidArgument {
            name: "batch_size",
            reason: "must be positive",
        });
        assert!(matches!(err, ConfigError::Limit(_)));
    }
}
