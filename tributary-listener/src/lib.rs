//! Tributary Listener - Sharded, checkpointed consumption of a partitioned stream.
//!
//! Each node of a horizontally-scaled service runs one [`Listener`]. The
//! listener works out which stream partitions this node owns (see
//! `tributary-assign`), then runs one [`PartitionReceiver`] per owned
//! partition. Receivers deliver fixed-size batches to an [`EventProcessor`]
//! and checkpoint progress so a restarted node resumes where it stopped.
//!
//! # Collaborators
//!
//! - [`Broker`] / [`BrokerConnection`] / [`PartitionSession`]: the event stream
//! - [`tributary_checkpoint::CheckpointStore`]: durable per-partition progress
//! - [`Topology`]: node discovery when no explicit node list is configured
//!
//! [`SimulatedBroker`] implements the broker traits in memory for tests and
//! the sample service.
//!
//! # Delivery
//!
//! At-least-once. Events after the last checkpoint are redelivered to the
//! next owner of the partition. A partial batch is dropped on stop unless
//! [`FlushPolicy::FlushOnStop`] is configured.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod broker;
mod config;
mod error;
mod listener;
mod processor;
mod receiver;
mod simulated;
mod topology;

pub use broker::{
    Broker, BrokerConnection, BrokerError, BrokerResult, Endpoint, PartitionSession,
    SessionOptions, StartPosition, DEFAULT_CONSUMER_GROUP, DEFAULT_GROUP_LABEL,
};
pub use config::{FlushPolicy, ListenerConfig, ListenerConfigBuilder};
pub use error::{ConfigError, ConfigResult, ListenerError, ListenerResult};
pub use listener::{Listener, ListenerState};
pub use processor::{EventProcessor, ProcessorError};
pub use receiver::{resolve_start_position, PartitionReceiver, ReceiverOptions, ReceiverState};
pub use simulated::{
    SimulatedBroker, SimulatedBrokerConfig, SimulatedConnection, SimulatedSession,
    DEFAULT_RECEIVE_WAIT,
};
pub use topology::{StaticTopology, Topology, TopologyError};
