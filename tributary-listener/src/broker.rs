//! Broker abstraction.
//!
//! The listener talks to the event stream through three narrow traits:
//!
//! - [`Broker`]: connects to one stream for one consumer group
//! - [`BrokerConnection`]: lists partitions and opens partition sessions
//! - [`PartitionSession`]: receives ordered batches from one partition
//!
//! Production code wraps a real broker client. Tests use
//! [`crate::SimulatedBroker`].

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tributary_core::{Epoch, Event, Offset, PartitionId};

/// Consumer group used when none is configured.
pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";

/// Consumer group label used in listener identities when none is configured.
pub const DEFAULT_GROUP_LABEL: &str = "<default group>";

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

/// Errors returned by broker collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("connection to '{target}' failed: {message}")]
    ConnectionFailed {
        /// Connection target.
        target: String,
        /// Error message.
        message: String,
    },

    /// The partition does not exist on the stream.
    #[error("partition {partition_id} not found")]
    PartitionNotFound {
        /// The partition.
        partition_id: PartitionId,
    },

    /// A start offset could not be interpreted.
    #[error("invalid offset '{offset}' for partition {partition_id}")]
    InvalidOffset {
        /// The partition.
        partition_id: PartitionId,
        /// The rejected offset.
        offset: Offset,
    },

    /// A newer session holds the partition.
    #[error("session on partition {partition_id} fenced: held {held}, current {current}")]
    Fenced {
        /// The partition.
        partition_id: PartitionId,
        /// Epoch of the fenced session.
        held: Epoch,
        /// Epoch now owning the partition.
        current: Epoch,
    },

    /// The connection or session was closed.
    #[error("connection closed")]
    Closed,

    /// A receive call failed.
    #[error("receive on partition {partition_id} failed: {message}")]
    ReceiveFailed {
        /// The partition.
        partition_id: PartitionId,
        /// Error message.
        message: String,
    },
}

// -----------------------------------------------------------------------------
// Endpoint & Session Options
// -----------------------------------------------------------------------------

/// What a listener connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Connection string or address of the broker.
    pub connection_target: String,
    /// Name of the stream.
    pub stream_name: String,
    /// Consumer group. Empty selects the broker's default group.
    pub consumer_group: String,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(
        connection_target: impl Into<String>,
        stream_name: impl Into<String>,
        consumer_group: impl Into<String>,
    ) -> Self {
        Self {
            connection_target: connection_target.into(),
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
        }
    }

    /// Returns the consumer group to read with, substituting the default
    /// group when none is configured.
    #[must_use]
    pub fn effective_consumer_group(&self) -> &str {
        if self.consumer_group.is_empty() {
            DEFAULT_CONSUMER_GROUP
        } else {
            &self.consumer_group
        }
    }

    /// Returns the namespace the target points at.
    ///
    /// For `key=value;...` connection strings this is the host of the
    /// `Endpoint` element (`sb://ns.example.net/` gives `ns.example.net`).
    /// Any other target is returned unchanged.
    #[must_use]
    pub fn namespace(&self) -> &str {
        parse_namespace(&self.connection_target)
    }

    /// Returns the listener identity: `{namespace}/{stream}/{group}`.
    #[must_use]
    pub fn identity(&self) -> String {
        let group = if self.consumer_group.is_empty() {
            DEFAULT_GROUP_LABEL
        } else {
            &self.consumer_group
        };
        format!("{}/{}/{group}", self.namespace(), self.stream_name)
    }
}

fn parse_namespace(target: &str) -> &str {
    let endpoint = target.split(';').find_map(|element| {
        let (key, value) = element.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("endpoint")
            .then(|| value.trim())
    });

    let Some(endpoint) = endpoint else {
        return target;
    };

    let without_scheme = endpoint
        .split_once("://")
        .map_or(endpoint, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or(without_scheme);

    if host.is_empty() {
        target
    } else {
        host
    }
}

/// Where a partition session begins reading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Broker default (usually the start of retained data).
    #[default]
    Default,
    /// At a specific offset.
    Offset {
        /// The offset.
        offset: Offset,
        /// Whether the event at `offset` itself is delivered.
        inclusive: bool,
    },
    /// With the first event enqueued after a point in time.
    EnqueuedAfter {
        /// Microseconds since the Unix epoch (UTC).
        timestamp_us: u64,
    },
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Offset {
                offset,
                inclusive: true,
            } => write!(f, "offset>={offset}"),
            Self::Offset {
                offset,
                inclusive: false,
            } => write!(f, "offset>{offset}"),
            Self::EnqueuedAfter { timestamp_us } => write!(f, "enqueued>{timestamp_us}us"),
        }
    }
}

/// Options for opening a partition session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionOptions {
    /// Where to begin reading.
    pub start: StartPosition,
    /// Fencing epoch, if any.
    pub epoch: Option<Epoch>,
}

impl SessionOptions {
    /// Creates session options.
    #[must_use]
    pub const fn new(start: StartPosition, epoch: Option<Epoch>) -> Self {
        Self { start, epoch }
    }
}

// -----------------------------------------------------------------------------
// Traits
// -----------------------------------------------------------------------------

/// Factory for broker connections.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Connection type produced by this broker.
    type Connection: BrokerConnection;

    /// Connects to the stream named by `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker cannot be reached.
    async fn connect(&self, endpoint: &Endpoint) -> BrokerResult<Self::Connection>;
}

/// An open connection to one stream for one consumer group.
///
/// Shared by every receiver of a listener, so it must be `Sync`.
#[async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    /// Session type produced by this connection.
    type Session: PartitionSession;

    /// Lists the live partition ids of the stream, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream metadata cannot be read.
    async fn list_partition_ids(&self) -> BrokerResult<Vec<PartitionId>>;

    /// Opens a receive session on one partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition does not exist, the start position
    /// is invalid or the epoch is stale.
    async fn open_session(
        &self,
        partition_id: &PartitionId,
        options: SessionOptions,
    ) -> BrokerResult<Self::Session>;

    /// Closes the connection. Pending receives on its sessions return.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker reports a failure while closing.
    async fn close(&self) -> BrokerResult<()>;
}

/// An ordered reader over one partition.
///
/// Owned exclusively by one receive loop.
#[async_trait]
pub trait PartitionSession: Send + 'static {
    /// Receives up to `max_count` events.
    ///
    /// May return an empty batch when the broker-side wait elapses.
    ///
    /// # Errors
    ///
    /// Returns an error if the session was fenced or closed, or the broker
    /// failed.
    async fn receive(&mut self, max_count: u32) -> BrokerResult<Vec<Event>>;

    /// Closes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker reports a failure while closing.
    async fn close(&mut self) -> BrokerResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_from_connection_string() {
        let endpoint = Endpoint::new(
            "Endpoint=sb://orders-ns.servicebus.example.net/;SharedAccessKeyName=listen;SharedAccessKey=abc=",
            "orders",
            "",
        );
        assert_eq!(endpoint.namespace(), "orders-ns.servicebus.example.net");
        assert_eq!(
            endpoint.identity(),
            "orders-ns.servicebus.example.net/orders/<default group>"
        );
    }

    #[test]
    fn test_namespace_falls_back_to_target() {
        let endpoint = Endpoint::new("localhost:5672", "orders", "billing");
        assert_eq!(endpoint.namespace(), "localhost:5672");
        assert_eq!(endpoint.identity(), "localhost:5672/orders/billing");
    }

    #[test]
    fn test_namespace_key_is_case_insensitive() {
        let endpoint = Endpoint::new("endpoint = amqps://ns.local:5671 ; x=y", "s", "g");
        assert_eq!(endpoint.namespace(), "ns.local");
    }

    #[test]
    fn test_effective_consumer_group() {
        assert_eq!(
            Endpoint::new("t", "s", "").effective_consumer_group(),
            DEFAULT_CONSUMER_GROUP
        );
        assert_eq!(Endpoint::new("t", "s", "g").effective_consumer_group(), "g");
    }

    #[test]
    fn test_start_position_display() {
        let start = StartPosition::Offset {
            offset: Offset::new("42"),
            inclusive: false,
        };
        assert_eq!(start.to_string(), "offset>42");
        assert_eq!(StartPosition::Default.to_string(), "default");
    }
}
