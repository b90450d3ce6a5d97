//! In-memory simulated broker for testing.
//!
//! [`SimulatedBroker`] keeps an append-only event log per partition and
//! serves it through the [`Broker`] traits. It supports:
//!
//! - Publishing events from the test (or sample) side
//! - A broker-side receive wait, after which `receive` returns empty
//! - Recording of every session-open call and its options
//! - One-shot failure injection for connect, open and receive
//! - Epoch fencing: a session with a higher epoch invalidates older ones
//!
//! Offsets are the decimal sequence number of the event in its partition.

#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use tributary_core::{now_us, Epoch, Event, Offset, PartitionId};

use crate::broker::{
    Broker, BrokerConnection, BrokerError, BrokerResult, Endpoint, PartitionSession,
    SessionOptions, StartPosition,
};

/// Default broker-side receive wait.
pub const DEFAULT_RECEIVE_WAIT: Duration = Duration::from_millis(50);

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for a simulated broker.
#[derive(Debug, Clone)]
pub struct SimulatedBrokerConfig {
    /// Partitions of the stream.
    pub partition_ids: Vec<PartitionId>,
    /// How long `receive` waits for events before returning empty.
    pub receive_wait: Duration,
}

impl SimulatedBrokerConfig {
    /// Creates a configuration with the given partitions.
    #[must_use]
    pub fn new(partition_ids: impl IntoIterator<Item = impl Into<PartitionId>>) -> Self {
        Self {
            partition_ids: partition_ids.into_iter().map(Into::into).collect(),
            receive_wait: DEFAULT_RECEIVE_WAIT,
        }
    }

    /// Creates a configuration with partitions named `"0"` to `"{count-1}"`.
    #[must_use]
    pub fn with_partition_count(count: u32) -> Self {
        Self::new((0..count).map(|i| i.to_string()))
    }

    /// Builder: set the receive wait.
    #[must_use]
    pub const fn with_receive_wait(mut self, wait: Duration) -> Self {
        self.receive_wait = wait;
        self
    }
}

// -----------------------------------------------------------------------------
// Shared State
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PartitionLog {
    events: Vec<Event>,
    epoch: Option<Epoch>,
    delivered: u64,
}

#[derive(Debug, Default)]
struct BrokerState {
    partitions: BTreeMap<PartitionId, PartitionLog>,
    opened_sessions: Vec<(PartitionId, SessionOptions)>,
    endpoints: Vec<Endpoint>,
    fail_next_connect: bool,
    fail_next_open: HashSet<PartitionId>,
    fail_next_receive: HashSet<PartitionId>,
}

#[derive(Debug)]
struct BrokerInner {
    receive_wait: Duration,
    state: Mutex<BrokerState>,
    /// Woken on publish and on connection close.
    activity: Notify,
}

impl BrokerInner {
    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().expect("broker state lock poisoned")
    }
}

// -----------------------------------------------------------------------------
// SimulatedBroker
// -----------------------------------------------------------------------------

/// In-memory broker. Clones share state.
#[derive(Debug, Clone)]
pub struct SimulatedBroker {
    inner: Arc<BrokerInner>,
}

impl SimulatedBroker {
    /// Creates a broker with empty partitions.
    #[must_use]
    pub fn new(config: SimulatedBrokerConfig) -> Self {
        let partitions = config
            .partition_ids
            .into_iter()
            .map(|id| (id, PartitionLog::default()))
            .collect();
        Self {
            inner: Arc::new(BrokerInner {
                receive_wait: config.receive_wait,
                state: Mutex::new(BrokerState {
                    partitions,
                    ..BrokerState::default()
                }),
                activity: Notify::new(),
            }),
        }
    }

    /// Appends an event to a partition and returns its offset.
    ///
    /// # Panics
    ///
    /// Panics if the partition does not exist.
    pub fn publish(&self, partition_id: &PartitionId, body: impl Into<Bytes>) -> Offset {
        let offset = {
            let mut state = self.inner.state();
            let log = state
                .partitions
                .get_mut(partition_id)
                .unwrap_or_else(|| panic!("unknown partition {partition_id}"));
            let sequence = log.events.len() as u64;
            let offset = Offset::new(sequence.to_string());
            log.events
                .push(Event::new(offset.clone(), sequence, now_us(), body));
            offset
        };
        self.inner.activity.notify_waiters();
        offset
    }

    /// Appends several events to a partition and returns the last offset.
    ///
    /// # Panics
    ///
    /// Panics if the partition does not exist.
    pub fn publish_all<B: Into<Bytes>>(
        &self,
        partition_id: &PartitionId,
        bodies: impl IntoIterator<Item = B>,
    ) -> Option<Offset> {
        bodies
            .into_iter()
            .map(|body| self.publish(partition_id, body))
            .last()
    }

    /// Returns the partition ids, sorted.
    #[must_use]
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.inner.state().partitions.keys().cloned().collect()
    }

    /// Returns the number of events published to a partition.
    #[must_use]
    pub fn event_count(&self, partition_id: &PartitionId) -> usize {
        self.inner
            .state()
            .partitions
            .get(partition_id)
            .map_or(0, |log| log.events.len())
    }

    /// Returns the number of events handed out by `receive` on a partition,
    /// across all sessions.
    #[must_use]
    pub fn delivered_count(&self, partition_id: &PartitionId) -> u64 {
        self.inner
            .state()
            .partitions
            .get(partition_id)
            .map_or(0, |log| log.delivered)
    }

    /// Returns the highest epoch seen on a partition.
    #[must_use]
    pub fn current_epoch(&self, partition_id: &PartitionId) -> Option<Epoch> {
        self.inner
            .state()
            .partitions
            .get(partition_id)
            .and_then(|log| log.epoch)
    }

    /// Returns every session-open call in order.
    #[must_use]
    pub fn opened_sessions(&self) -> Vec<(PartitionId, SessionOptions)> {
        self.inner.state().opened_sessions.clone()
    }

    /// Returns every endpoint a connection was made to.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.inner.state().endpoints.clone()
    }

    /// Makes the next `connect` fail.
    pub fn fail_next_connect(&self) {
        self.inner.state().fail_next_connect = true;
    }

    /// Makes the next `open_session` on a partition fail.
    pub fn fail_next_open(&self, partition_id: &PartitionId) {
        self.inner
            .state()
            .fail_next_open
            .insert(partition_id.clone());
    }

    /// Makes the next `receive` on a partition fail.
    pub fn fail_next_receive(&self, partition_id: &PartitionId) {
        self.inner
            .state()
            .fail_next_receive
            .insert(partition_id.clone());
        self.inner.activity.notify_waiters();
    }
}

#[async_trait]
impl Broker for SimulatedBroker {
    type Connection = SimulatedConnection;

    async fn connect(&self, endpoint: &Endpoint) -> BrokerResult<SimulatedConnection> {
        {
            let mut state = self.inner.state();
            if state.fail_next_connect {
                state.fail_next_connect = false;
                return Err(BrokerError::ConnectionFailed {
                    target: endpoint.connection_target.clone(),
                    message: "simulated failure (forced)".to_string(),
                });
            }
            state.endpoints.push(endpoint.clone());
        }

        debug!(
            stream = %endpoint.stream_name,
            group = endpoint.effective_consumer_group(),
            "Simulated broker connected"
        );
        Ok(SimulatedConnection {
            inner: Arc::clone(&self.inner),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

// -----------------------------------------------------------------------------
// SimulatedConnection
// -----------------------------------------------------------------------------

/// Connection to a [`SimulatedBroker`].
#[derive(Debug)]
pub struct SimulatedConnection {
    inner: Arc<BrokerInner>,
    closed: Arc<AtomicBool>,
}

impl SimulatedConnection {
    /// Returns true once the connection was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerConnection for SimulatedConnection {
    type Session = SimulatedSession;

    async fn list_partition_ids(&self) -> BrokerResult<Vec<PartitionId>> {
        self.ensure_open()?;
        // Reverse order: callers must not rely on the order returned.
        Ok(self.inner.state().partitions.keys().rev().cloned().collect())
    }

    async fn open_session(
        &self,
        partition_id: &PartitionId,
        options: SessionOptions,
    ) -> BrokerResult<SimulatedSession> {
        self.ensure_open()?;

        let mut state = self.inner.state();
        if state.fail_next_open.remove(partition_id) {
            return Err(BrokerError::ReceiveFailed {
                partition_id: partition_id.clone(),
                message: "simulated open failure (forced)".to_string(),
            });
        }

        let log = state
            .partitions
            .get_mut(partition_id)
            .ok_or_else(|| BrokerError::PartitionNotFound {
                partition_id: partition_id.clone(),
            })?;

        if let (Some(requested), Some(current)) = (options.epoch, log.epoch) {
            if requested < current {
                return Err(BrokerError::Fenced {
                    partition_id: partition_id.clone(),
                    held: requested,
                    current,
                });
            }
        }
        if options.epoch.is_some() {
            log.epoch = options.epoch.max(log.epoch);
        }

        let cursor = start_index(partition_id, &log.events, &options.start)?;
        state
            .opened_sessions
            .push((partition_id.clone(), options.clone()));

        Ok(SimulatedSession {
            inner: Arc::clone(&self.inner),
            partition_id: partition_id.clone(),
            epoch: options.epoch,
            cursor,
            connection_closed: Arc::clone(&self.closed),
            closed: false,
        })
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::Release);
        self.inner.activity.notify_waiters();
        Ok(())
    }
}

fn start_index(
    partition_id: &PartitionId,
    events: &[Event],
    start: &StartPosition,
) -> BrokerResult<usize> {
    let index = match start {
        StartPosition::Default => 0,
        StartPosition::Offset { offset, inclusive } => {
            let invalid = || BrokerError::InvalidOffset {
                partition_id: partition_id.clone(),
                offset: offset.clone(),
            };
            let sequence: usize = offset.as_str().parse().map_err(|_| invalid())?;
            if *inclusive {
                sequence
            } else {
                sequence.checked_add(1).ok_or_else(invalid)?
            }
        }
        StartPosition::EnqueuedAfter { timestamp_us } => events
            .iter()
            .position(|e| e.enqueued_at_us > *timestamp_us)
            .unwrap_or(events.len()),
    };
    Ok(index)
}

// -----------------------------------------------------------------------------
// SimulatedSession
// -----------------------------------------------------------------------------

/// Receive session on one partition of a [`SimulatedBroker`].
#[derive(Debug)]
pub struct SimulatedSession {
    inner: Arc<BrokerInner>,
    partition_id: PartitionId,
    epoch: Option<Epoch>,
    cursor: usize,
    connection_closed: Arc<AtomicBool>,
    closed: bool,
}

impl SimulatedSession {
    /// Tries to take up to `max_count` events without waiting.
    fn poll_events(&mut self, max_count: usize) -> BrokerResult<Option<Vec<Event>>> {
        if self.closed || self.connection_closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }

        let mut state = self.inner.state();
        if state.fail_next_receive.remove(&self.partition_id) {
            return Err(BrokerError::ReceiveFailed {
                partition_id: self.partition_id.clone(),
                message: "simulated receive failure (forced)".to_string(),
            });
        }

        let log = state.partitions.get_mut(&self.partition_id).ok_or_else(|| {
            BrokerError::PartitionNotFound {
                partition_id: self.partition_id.clone(),
            }
        })?;

        if let (Some(held), Some(current)) = (self.epoch, log.epoch) {
            if held < current {
                return Err(BrokerError::Fenced {
                    partition_id: self.partition_id.clone(),
                    held,
                    current,
                });
            }
        }

        if self.cursor >= log.events.len() {
            return Ok(None);
        }

        let end = (self.cursor + max_count).min(log.events.len());
        let batch = log.events[self.cursor..end].to_vec();
        self.cursor = end;
        log.delivered += batch.len() as u64;
        Ok(Some(batch))
    }
}

#[async_trait]
impl PartitionSession for SimulatedSession {
    async fn receive(&mut self, max_count: u32) -> BrokerResult<Vec<Event>> {
        assert!(max_count > 0, "max_count must be positive");

        let deadline = Instant::now() + self.inner.receive_wait;
        let inner = Arc::clone(&self.inner);
        loop {
            let notified = inner.activity.notified();
            tokio::pin!(notified);
            // Register before polling so a publish in between is not missed.
            notified.as_mut().enable();

            if let Some(batch) = self.poll_events(max_count as usize)? {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.closed = true;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
