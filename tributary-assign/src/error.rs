//! Assignment error types.

use thiserror::Error;
use tributary_core::{NodeId, PartitionId};

/// Result type for assignment operations.
pub type AssignmentResult<T> = Result<T, AssignmentError>;

/// Errors that make an assignment impossible.
///
/// Every variant is fatal: the listener refuses to start rather than guess.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    /// Mode name did not match any known mode.
    #[error("can not resolve partitions for unknown mode '{name}'")]
    UnknownMode {
        /// The name that failed to parse.
        name: String,
    },

    /// Single mode was selected without an assigned partition.
    #[error("single mode requires an assigned partition id")]
    MissingAssignedPartition,

    /// The assigned partition is not among the live partitions.
    #[error("assigned partition {partition_id} not found among live partitions")]
    AssignedPartitionNotFound {
        /// The configured partition.
        partition_id: PartitionId,
    },

    /// One-to-one mode with unequal node and partition counts.
    #[error("one-to-one mode requires equal counts: {nodes} nodes, {partitions} partitions")]
    CountMismatch {
        /// Number of nodes.
        nodes: usize,
        /// Number of live partitions.
        partitions: usize,
    },

    /// Safe-distribute mode with more nodes than partitions.
    #[error("safe-distribute mode has more nodes than partitions: {nodes} > {partitions}")]
    MoreNodesThanPartitions {
        /// Number of nodes.
        nodes: usize,
        /// Number of live partitions.
        partitions: usize,
    },

    /// The current node does not appear in the node list.
    #[error("current node {node_id} not found in node list")]
    NodeNotFound {
        /// The current node.
        node_id: NodeId,
    },

    /// The node list is empty.
    #[error("node list is empty")]
    NoNodes,

    /// A node id appears more than once.
    #[error("duplicate node id {node_id}")]
    DuplicateNode {
        /// The repeated node.
        node_id: NodeId,
    },

    /// A partition id appears more than once.
    #[error("duplicate partition id {partition_id}")]
    DuplicatePartition {
        /// The repeated partition.
        partition_id: PartitionId,
    },
}
