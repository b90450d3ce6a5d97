//! Listener coordinator.
//!
//! A [`Listener`] ties the pieces together for one node:
//!
//! 1. `open`: resolve the node list (explicit or via topology) and connect
//! 2. `start`: list live partitions, resolve this node's share, start one
//!    [`PartitionReceiver`] per owned partition
//! 3. `close`: stop every receiver and close the connection concurrently
//! 4. `abort`: best-effort teardown that never fails

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use tributary_assign::{resolve_assignment, AssignmentRequest};
use tributary_core::{NodeId, PartitionId};

use crate::broker::{Broker, BrokerConnection};
use crate::config::ListenerConfig;
use crate::error::{ListenerError, ListenerResult};
use crate::receiver::{PartitionReceiver, ReceiverOptions};

// -----------------------------------------------------------------------------
// State
// -----------------------------------------------------------------------------

/// Listener lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// Constructed, not yet opened.
    Unopened,
    /// Connected, no receivers yet.
    Opened,
    /// Receivers were created.
    Started,
    /// Close in progress.
    Closing,
    /// Closed.
    Closed,
    /// Aborted.
    Aborted,
}

impl ListenerState {
    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unopened => "unopened",
            Self::Opened => "opened",
            Self::Started => "started",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// Listener
// -----------------------------------------------------------------------------

/// Consumes this node's share of a partitioned stream.
pub struct Listener<B: Broker> {
    config: ListenerConfig,
    broker: B,
    state: ListenerState,
    node_ids: Vec<NodeId>,
    connection: Option<Arc<B::Connection>>,
    receivers: Vec<PartitionReceiver<B::Connection>>,
}

impl<B: Broker> Listener<B> {
    /// Creates a listener. Nothing is contacted until [`Self::open`].
    #[must_use]
    pub fn new(config: ListenerConfig, broker: B) -> Self {
        Self {
            config,
            broker,
            state: ListenerState::Unopened,
            node_ids: Vec::new(),
            connection: None,
            receivers: Vec::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ListenerState {
        self.state
    }

    /// Returns `{namespace}/{stream}/{group}` for this listener.
    #[must_use]
    pub fn identity(&self) -> String {
        self.config.endpoint().identity()
    }

    /// Returns the node list resolved by `open`.
    #[must_use]
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Returns the partitions with a registered receiver, in start order.
    #[must_use]
    pub fn owned_partitions(&self) -> Vec<PartitionId> {
        self.receivers
            .iter()
            .map(|r| r.partition_id().clone())
            .collect()
    }

    /// Returns the registered receivers.
    #[must_use]
    pub fn receivers(&self) -> &[PartitionReceiver<B::Connection>] {
        &self.receivers
    }

    /// Resolves the node list and connects to the broker.
    ///
    /// Returns the listener identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener was already opened, topology lookup
    /// fails, the node list exceeds the limits, or the broker is unreachable.
    #[instrument(skip(self), fields(node = %self.config.node_id()))]
    pub async fn open(&mut self) -> ListenerResult<String> {
        self.require_state("open", &[ListenerState::Unopened])?;

        let node_ids = match (self.config.node_ids(), self.config.topology()) {
            (Some(explicit), _) => explicit.to_vec(),
            (None, Some(topology)) if self.config.mode().uses_rank() => {
                topology.list_node_ids().await?
            }
            (None, _) => Vec::new(),
        };
        self.config
            .limits()
            .check_node_count(node_ids.len())
            .map_err(|e| ListenerError::Config(e.into()))?;

        let connection = self
            .broker
            .connect(self.config.endpoint())
            .await
            .map_err(|source| ListenerError::broker("connect", source))?;

        self.node_ids = node_ids;
        self.connection = Some(Arc::new(connection));
        self.state = ListenerState::Opened;

        let identity = self.identity();
        info!(
            identity = %identity,
            mode = %self.config.mode(),
            nodes = self.node_ids.len(),
            "Listener opened"
        );
        Ok(identity)
    }

    /// Resolves owned partitions and starts a receiver for each.
    ///
    /// Returns the owned partition ids in sorted order. If a receiver fails
    /// to start, the ones already started stay registered so `close` can
    /// stop them, and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener is not opened, partitions cannot be
    /// listed, assignment fails, or a receiver fails to start.
    #[instrument(skip(self), fields(node = %self.config.node_id()))]
    pub async fn start(&mut self) -> ListenerResult<Vec<PartitionId>> {
        self.require_state("start", &[ListenerState::Opened])?;
        let connection = self.connection()?;

        let live = connection
            .list_partition_ids()
            .await
            .map_err(|source| ListenerError::broker("list_partition_ids", source))?;
        self.config
            .limits()
            .check_partition_count(live.len())
            .map_err(|e| ListenerError::Config(e.into()))?;

        let request = AssignmentRequest::new(
            self.config.mode(),
            &live,
            &self.node_ids,
            self.config.node_id(),
        )
        .with_assigned_partition(self.config.assigned_partition());
        let owned = resolve_assignment(&request)?;

        info!(
            live = live.len(),
            owned = ?owned,
            "Resolved partition assignment"
        );

        self.state = ListenerState::Started;
        let options = ReceiverOptions::from_config(&self.config);
        for partition_id in &owned {
            let mut receiver = PartitionReceiver::new(
                partition_id.clone(),
                options.clone(),
                Arc::clone(&connection),
                self.config.processor(),
                self.config.checkpoint_store(),
            );
            receiver.start().await?;
            self.receivers.push(receiver);
        }

        Ok(owned)
    }

    /// Stops every receiver and closes the connection, concurrently.
    ///
    /// Waits for all of them without a timeout, then returns the first
    /// failure, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener is not open, a receive loop ended
    /// with an error, or the connection failed to close.
    #[instrument(skip(self), fields(node = %self.config.node_id()))]
    pub async fn close(&mut self) -> ListenerResult<()> {
        self.require_state("close", &[ListenerState::Opened, ListenerState::Started])?;
        self.state = ListenerState::Closing;

        let mut receivers = std::mem::take(&mut self.receivers);
        let connection = self.connection.take();

        let stops = join_all(receivers.iter_mut().map(|r| r.stop()));
        let close = async {
            match &connection {
                Some(connection) => connection
                    .close()
                    .await
                    .map_err(|source| ListenerError::broker("close", source)),
                None => Ok(()),
            }
        };
        let (stop_results, close_result) = tokio::join!(stops, close);

        self.state = ListenerState::Closed;

        let mut first_error = None;
        for result in stop_results.into_iter().chain(std::iter::once(close_result)) {
            if let Err(e) = result {
                warn!(error = %e, "Error while closing listener");
                first_error.get_or_insert(e);
            }
        }

        info!(receivers = receivers.len(), "Listener closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Tears everything down without waiting for receive loops.
    ///
    /// Never fails; connection errors are logged and ignored.
    #[instrument(skip(self), fields(node = %self.config.node_id()))]
    pub async fn abort(&mut self) {
        for receiver in &mut self.receivers {
            receiver.abort();
        }
        self.receivers.clear();

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                debug!(error = %e, "Ignoring connection close error during abort");
            }
        }

        self.state = ListenerState::Aborted;
        info!("Listener aborted");
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: &[ListenerState],
    ) -> ListenerResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ListenerError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    fn connection(&self) -> ListenerResult<Arc<B::Connection>> {
        self.connection
            .clone()
            .ok_or(ListenerError::InvalidState {
                operation: "use connection",
                state: self.state.as_str(),
            })
    }
}

impl<B: Broker> fmt::Debug for Listener<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("identity", &self.identity())
            .field("state", &self.state)
            .field("node_ids", &self.node_ids)
            .field("owned_partitions", &self.owned_partitions())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
