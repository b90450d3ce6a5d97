//! Cluster topology discovery.
//!
//! When a listener is not given an explicit node list it asks a [`Topology`]
//! for the ids of every node running the consuming service.

use async_trait::async_trait;
use thiserror::Error;
use tributary_core::NodeId;

/// Error returned by a topology source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TopologyError {
    /// Error message.
    pub message: String,
}

impl TopologyError {
    /// Creates a topology error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Source of the node list used for rank-based assignment.
#[async_trait]
pub trait Topology: Send + Sync {
    /// Returns the ids of all nodes of the consuming service.
    ///
    /// Order does not matter; the resolver sorts.
    ///
    /// # Errors
    ///
    /// Returns an error if the node list cannot be retrieved.
    async fn list_node_ids(&self) -> Result<Vec<NodeId>, TopologyError>;
}

/// A topology with a fixed node list.
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    nodes: Vec<NodeId>,
}

impl StaticTopology {
    /// Creates a static topology.
    #[must_use]
    pub fn new(nodes: impl IntoIterator<Item = impl Into<NodeId>>) -> Self {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Topology for StaticTopology {
    async fn list_node_ids(&self) -> Result<Vec<NodeId>, TopologyError> {
        if self.nodes.is_empty() {
            return Err(TopologyError::new("static topology has no nodes"));
        }
        Ok(self.nodes.clone())
    }
}
