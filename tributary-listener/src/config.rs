//! Listener configuration.
//!
//! A [`ListenerConfig`] is produced once by [`ListenerConfigBuilder::build`],
//! which runs every validation before anything touches the broker. The
//! resulting value is immutable.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tributary_assign::AssignmentMode;
use tributary_checkpoint::CheckpointStore;
use tributary_core::{Epoch, Limits, NodeId, Offset, PartitionId};

use crate::broker::{Endpoint, StartPosition};
use crate::error::{ConfigError, ConfigResult};
use crate::processor::EventProcessor;
use crate::topology::Topology;

/// What a receiver does with a partial batch when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Discard events buffered below the batch size.
    ///
    /// They were never checkpointed, so the next owner receives them again.
    #[default]
    DropOnStop,
    /// Hand the partial buffer to the processor once before stopping.
    FlushOnStop,
}

// -----------------------------------------------------------------------------
// ListenerConfig
// -----------------------------------------------------------------------------

/// Validated, immutable listener configuration.
#[derive(Clone)]
pub struct ListenerConfig {
    endpoint: Endpoint,
    node_id: NodeId,
    mode: AssignmentMode,
    batch_size: u32,
    node_ids: Option<Vec<NodeId>>,
    assigned_partition: Option<PartitionId>,
    start_position: StartPosition,
    epoch: Option<Epoch>,
    flush_policy: FlushPolicy,
    processor: Arc<dyn EventProcessor>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    topology: Option<Arc<dyn Topology>>,
    limits: Limits,
}

impl ListenerConfig {
    /// Starts building a configuration.
    #[must_use]
    pub fn builder() -> ListenerConfigBuilder {
        ListenerConfigBuilder::default()
    }

    /// Returns the broker endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns this node's id.
    #[must_use]
    pub const fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Returns the assignment mode.
    #[must_use]
    pub const fn mode(&self) -> AssignmentMode {
        self.mode
    }

    /// Returns the number of events per processor call.
    #[must_use]
    pub const fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Returns the explicit node list, if one was configured.
    #[must_use]
    pub fn node_ids(&self) -> Option<&[NodeId]> {
        self.node_ids.as_deref()
    }

    /// Returns the partition assigned in single mode.
    #[must_use]
    pub const fn assigned_partition(&self) -> Option<&PartitionId> {
        self.assigned_partition.as_ref()
    }

    /// Returns the configured start position for partitions without a
    /// checkpoint.
    #[must_use]
    pub const fn start_position(&self) -> &StartPosition {
        &self.start_position
    }

    /// Returns the fencing epoch.
    #[must_use]
    pub const fn epoch(&self) -> Option<Epoch> {
        self.epoch
    }

    /// Returns the flush policy.
    #[must_use]
    pub const fn flush_policy(&self) -> FlushPolicy {
        self.flush_policy
    }

    /// Returns the processor.
    #[must_use]
    pub fn processor(&self) -> Arc<dyn EventProcessor> {
        Arc::clone(&self.processor)
    }

    /// Returns the checkpoint store.
    #[must_use]
    pub fn checkpoint_store(&self) -> Arc<dyn CheckpointStore> {
        Arc::clone(&self.checkpoint_store)
    }

    /// Returns the topology source, if one was configured.
    #[must_use]
    pub fn topology(&self) -> Option<Arc<dyn Topology>> {
        self.topology.clone()
    }

    /// Returns the limits this configuration was validated against.
    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }
}

impl fmt::Debug for ListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("endpoint", &self.endpoint)
            .field("node_id", &self.node_id)
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .field("node_ids", &self.node_ids)
            .field("assigned_partition", &self.assigned_partition)
            .field("start_position", &self.start_position)
            .field("epoch", &self.epoch)
            .field("flush_policy", &self.flush_policy)
            .field("has_topology", &self.topology.is_some())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ListenerConfigBuilder
// -----------------------------------------------------------------------------

/// Builder for [`ListenerConfig`].
#[derive(Default)]
pub struct ListenerConfigBuilder {
    connection_target: Option<String>,
    stream_name: Option<String>,
    consumer_group: String,
    node_id: Option<NodeId>,
    mode: AssignmentMode,
    batch_size: Option<u32>,
    node_ids: Option<Vec<NodeId>>,
    assigned_partition: Option<PartitionId>,
    start_offset: Option<(Offset, bool)>,
    start_time_us: Option<u64>,
    epoch: Option<Epoch>,
    flush_policy: FlushPolicy,
    processor: Option<Arc<dyn EventProcessor>>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    topology: Option<Arc<dyn Topology>>,
    limits: Option<Limits>,
}

impl ListenerConfigBuilder {
    /// Sets the broker connection string or address.
    #[must_use]
    pub fn connection_target(mut self, target: impl Into<String>) -> Self {
        self.connection_target = Some(target.into());
        self
    }

    /// Sets the stream name.
    #[must_use]
    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    /// Sets the consumer group. Empty selects the default group.
    #[must_use]
    pub fn consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = group.into();
        self
    }

    /// Sets this node's id.
    #[must_use]
    pub fn node_id(mut self, node_id: impl Into<NodeId>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Sets the assignment mode.
    #[must_use]
    pub const fn mode(mut self, mode: AssignmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the number of events per processor call.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Sets an explicit node list, bypassing topology discovery.
    #[must_use]
    pub fn node_ids(mut self, nodes: impl IntoIterator<Item = impl Into<NodeId>>) -> Self {
        self.node_ids = Some(nodes.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the partition owned in single mode.
    #[must_use]
    pub fn assigned_partition(mut self, partition_id: impl Into<PartitionId>) -> Self {
        self.assigned_partition = Some(partition_id.into());
        self
    }

    /// Starts partitions without a checkpoint at `offset`.
    #[must_use]
    pub fn start_offset(mut self, offset: impl Into<Offset>, inclusive: bool) -> Self {
        self.start_offset = Some((offset.into(), inclusive));
        self
    }

    /// Starts partitions without a checkpoint after a point in time
    /// (microseconds since the Unix epoch, UTC).
    #[must_use]
    pub const fn start_time_us(mut self, timestamp_us: u64) -> Self {
        self.start_time_us = Some(timestamp_us);
        self
    }

    /// Sets the fencing epoch passed to every session.
    #[must_use]
    pub const fn epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Sets the flush policy.
    #[must_use]
    pub const fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Sets the processor.
    #[must_use]
    pub fn processor(mut self, processor: Arc<dyn EventProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Sets the checkpoint store.
    #[must_use]
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    /// Sets the topology source used when no node list is given.
    #[must_use]
    pub fn topology(mut self, topology: Arc<dyn Topology>) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Overrides the default limits.
    #[must_use]
    pub const fn limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Validates the settings and produces the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required setting is missing, the start options
    /// conflict, single mode has no partition, the node list is unusable, or
    /// a value is outside the limits.
    pub fn build(self) -> ConfigResult<ListenerConfig> {
        let limits = self.limits.unwrap_or_default();
        limits.validate()?;

        let connection_target = required("connection_target", self.connection_target)?;
        let stream_name = required("stream_name", self.stream_name)?;
        let node_id = self
            .node_id
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingField { field: "node_id" })?;
        let processor = self
            .processor
            .ok_or(ConfigError::MissingField { field: "processor" })?;
        let checkpoint_store = self.checkpoint_store.ok_or(ConfigError::MissingField {
            field: "checkpoint_store",
        })?;

        let batch_size = self.batch_size.unwrap_or(limits.default_batch_size);
        limits.check_batch_size(batch_size)?;

        let start_position = match (self.start_offset, self.start_time_us) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingStartOptions),
            (Some((offset, inclusive)), None) => StartPosition::Offset { offset, inclusive },
            (None, Some(timestamp_us)) => StartPosition::EnqueuedAfter { timestamp_us },
            (None, None) => StartPosition::Default,
        };

        let assigned_partition = self.assigned_partition.filter(|p| !p.is_empty());
        if self.mode == AssignmentMode::Single && assigned_partition.is_none() {
            return Err(ConfigError::MissingAssignedPartition);
        }

        if let Some(nodes) = &self.node_ids {
            validate_node_ids(nodes)?;
            limits.check_node_count(nodes.len())?;
        } else if self.topology.is_none() && self.mode.uses_rank() {
            return Err(ConfigError::NoNodeSource);
        }

        Ok(ListenerConfig {
            endpoint: Endpoint::new(connection_target, stream_name, self.consumer_group),
            node_id,
            mode: self.mode,
            batch_size,
            node_ids: self.node_ids,
            assigned_partition,
            start_position,
            epoch: self.epoch,
            flush_policy: self.flush_policy,
            processor,
            checkpoint_store,
            topology: self.topology,
            limits,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> ConfigResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField { field })
}

fn validate_node_ids(nodes: &[NodeId]) -> ConfigResult<()> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        if node.is_empty() {
            return Err(ConfigError::EmptyNodeId { index });
        }
        if !seen.insert(node.as_str()) {
            return Err(ConfigError::DuplicateNodeId {
                node_id: node.as_str().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorError;
    use crate::topology::StaticTopology;
    use async_trait::async_trait;
    use tributary_checkpoint::{CheckpointHandle, SimulatedCheckpointStore};
    use tributary_core::Event;

    struct NoopProcessor;

    #[async_trait]
    impl EventProcessor for NoopProcessor {
        async fn process(
            &self,
            _events: &[Event],
            _checkpoint: &mut CheckpointHandle,
        ) -> Result<bool, ProcessorError> {
            Ok(true)
        }
    }

    fn base() -> ListenerConfigBuilder {
        ListenerConfig::builder()
            .connection_target("Endpoint=sb://ns.example.net/")
            .stream_name("orders")
            .node_id("n0")
            .node_ids(["n0", "n1"])
            .processor(Arc::new(NoopProcessor))
            .checkpoint_store(Arc::new(SimulatedCheckpointStore::new(1)))
    }

    #[test]
    fn test_defaults() {
        let config = base().build().unwrap();
        assert_eq!(config.mode(), AssignmentMode::SafeDistribute);
        assert_eq!(config.batch_size(), 200);
        assert_eq!(config.start_position(), &StartPosition::Default);
        assert_eq!(config.flush_policy(), FlushPolicy::DropOnStop);
        assert_eq!(config.epoch(), None);
        assert_eq!(
            config.endpoint().identity(),
            "ns.example.net/orders/<default group>"
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let err = ListenerConfig::builder().build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingField {
                field: "connection_target"
            }
        );

        let err = base().stream_name("  ").build().unwrap_err();
        assert_eq!(err, ConfigError::MissingField { field: "stream_name" });

        let err = ListenerConfig::builder()
            .connection_target("t")
            .stream_name("s")
            .node_id("n0")
            .node_ids(["n0"])
            .checkpoint_store(Arc::new(SimulatedCheckpointStore::new(1)))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingField { field: "processor" });
    }

    #[test]
    fn test_conflicting_start_options() {
        let err = base()
            .start_offset("10", true)
            .start_time_us(1_000)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ConflictingStartOptions);
    }

    #[test]
    fn test_start_offset() {
        let config = base().start_offset("10", false).build().unwrap();
        assert_eq!(
            config.start_position(),
            &StartPosition::Offset {
                offset: Offset::new("10"),
                inclusive: false
            }
        );
    }

    #[test]
    fn test_single_requires_partition() {
        let err = base().mode(AssignmentMode::Single).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingAssignedPartition);

        let config = ListenerConfig::builder()
            .connection_target("t")
            .stream_name("s")
            .node_id("n0")
            .mode(AssignmentMode::Single)
            .assigned_partition("3")
            .processor(Arc::new(NoopProcessor))
            .checkpoint_store(Arc::new(SimulatedCheckpointStore::new(1)))
            .build()
            .unwrap();
        assert_eq!(config.assigned_partition(), Some(&PartitionId::new("3")));
        assert!(config.node_ids().is_none());
    }

    #[test]
    fn test_bad_node_lists() {
        let err = base().node_ids(["n0", ""]).build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyNodeId { index: 1 });

        let err = base().node_ids(["n0", "n0"]).build().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateNodeId { .. }));
    }

    #[test]
    fn test_node_source_required() {
        let err = ListenerConfig::builder()
            .connection_target("t")
            .stream_name("s")
            .node_id("n0")
            .processor(Arc::new(NoopProcessor))
            .checkpoint_store(Arc::new(SimulatedCheckpointStore::new(1)))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NoNodeSource);

        let config = ListenerConfig::builder()
            .connection_target("t")
            .stream_name("s")
            .node_id("n0")
            .topology(Arc::new(StaticTopology::new(["n0"])))
            .processor(Arc::new(NoopProcessor))
            .checkpoint_store(Arc::new(SimulatedCheckpointStore::new(1)))
            .build()
            .unwrap();
        assert!(config.topology().is_some());
    }

    #[test]
    fn test_batch_size_limits() {
        assert!(matches!(
            base().batch_size(0).build(),
            Err(ConfigError::Limit(_))
        ));
        assert!(matches!(
            base().batch_size(1_000_000).build(),
            Err(ConfigError::Limit(_))
        ));
        assert_eq!(base().batch_size(3).build().unwrap().batch_size(), 3);
    }
}
