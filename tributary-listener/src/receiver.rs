//! Per-partition receiver.
//!
//! A [`PartitionReceiver`] owns one partition for the lifetime of a
//! listener. Starting it loads the partition's checkpoint, decides where to
//! begin reading, opens a broker session and spawns the receive loop:
//!
//! ```text
//! receive(batch_size) -> buffer -> (buffer full) -> processor -> checkpoint
//!        ^                                                          |
//!        +----------------------------------------------------------+
//! ```
//!
//! The loop is an independent tokio task. It shares nothing mutable with
//! other receivers; the checkpoint handle and buffer belong to it alone.
//! Stopping is cooperative and observed only after a receive returns.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use tributary_checkpoint::{CheckpointError, CheckpointHandle, CheckpointRecord, CheckpointStore};
use tributary_core::{Epoch, Event, PartitionId};

use crate::broker::{BrokerConnection, PartitionSession, SessionOptions, StartPosition};
use crate::config::{FlushPolicy, ListenerConfig};
use crate::error::{ListenerError, ListenerResult};
use crate::processor::EventProcessor;

// -----------------------------------------------------------------------------
// State
// -----------------------------------------------------------------------------

/// Receiver lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReceiverState {
    /// Constructed, not yet started.
    Created,
    /// Loading the checkpoint and opening the session.
    Starting,
    /// Receive loop is running.
    Running,
    /// Stop requested, waiting for the loop to exit.
    Stopping,
    /// Loop has exited (or start failed).
    Stopped,
}

impl ReceiverState {
    /// Returns the lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// Options
// -----------------------------------------------------------------------------

/// Settings shared by every receiver of one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverOptions {
    /// Events per processor call.
    pub batch_size: u32,
    /// Start position for partitions without a checkpoint.
    pub start_position: StartPosition,
    /// Fencing epoch forwarded to the broker.
    pub epoch: Option<Epoch>,
    /// What to do with a partial buffer on stop.
    pub flush_policy: FlushPolicy,
}

impl ReceiverOptions {
    /// Creates options with the given batch size and defaults otherwise.
    #[must_use]
    pub fn new(batch_size: u32) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        Self {
            batch_size,
            start_position: StartPosition::Default,
            epoch: None,
            flush_policy: FlushPolicy::DropOnStop,
        }
    }

    /// Extracts receiver options from a listener configuration.
    #[must_use]
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            batch_size: config.batch_size(),
            start_position: config.start_position().clone(),
            epoch: config.epoch(),
            flush_policy: config.flush_policy(),
        }
    }

    /// Builder: set the start position.
    #[must_use]
    pub fn with_start_position(mut self, start: StartPosition) -> Self {
        self.start_position = start;
        self
    }

    /// Builder: set the epoch.
    #[must_use]
    pub const fn with_epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Builder: set the flush policy.
    #[must_use]
    pub const fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }
}

/// Chooses where a partition session begins.
///
/// A stored checkpoint always wins and resumes strictly after the stored
/// offset. Otherwise the configured position applies.
#[must_use]
pub fn resolve_start_position(record: &CheckpointRecord, configured: &StartPosition) -> StartPosition {
    if record.has_offset() {
        StartPosition::Offset {
            offset: record.offset.clone(),
            inclusive: false,
        }
    } else {
        configured.clone()
    }
}

// -----------------------------------------------------------------------------
// PartitionReceiver
// -----------------------------------------------------------------------------

/// Receives, batches and checkpoints one partition.
pub struct PartitionReceiver<C: BrokerConnection> {
    partition_id: PartitionId,
    options: ReceiverOptions,
    connection: Arc<C>,
    processor: Arc<dyn EventProcessor>,
    store: Arc<dyn CheckpointStore>,
    state: ReceiverState,
    stop_requested: Arc<AtomicBool>,
    task: Option<JoinHandle<ListenerResult<()>>>,
}

impl<C: BrokerConnection> PartitionReceiver<C> {
    /// Creates a receiver in the `Created` state.
    #[must_use]
    pub fn new(
        partition_id: PartitionId,
        options: ReceiverOptions,
        connection: Arc<C>,
        processor: Arc<dyn EventProcessor>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        assert!(!partition_id.is_empty(), "partition_id must not be empty");
        Self {
            partition_id,
            options,
            connection,
            processor,
            store,
            state: ReceiverState::Created,
            stop_requested: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Returns the partition this receiver owns.
    #[must_use]
    pub const fn partition_id(&self) -> &PartitionId {
        &self.partition_id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ReceiverState {
        self.state
    }

    /// Returns true once the receive loop has exited on its own or been
    /// stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(
            self.state == ReceiverState::Stopped,
            JoinHandle::is_finished,
        )
    }

    /// Loads the checkpoint, opens the session and spawns the receive loop.
    ///
    /// On failure the receiver ends in `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver was already started, the checkpoint
    /// cannot be loaded or belongs to another partition, or the session
    /// cannot be opened.
    #[instrument(skip(self), fields(partition = %self.partition_id))]
    pub async fn start(&mut self) -> ListenerResult<()> {
        if self.state != ReceiverState::Created {
            return Err(ListenerError::InvalidState {
                operation: "start receiver",
                state: self.state.as_str(),
            });
        }
        self.state = ReceiverState::Starting;

        match self.open().await {
            Ok((session, checkpoint)) => {
                let receive_loop = ReceiveLoop {
                    checkpoint,
                    processor: Arc::clone(&self.processor),
                    batch_size: self.options.batch_size,
                    flush_policy: self.options.flush_policy,
                    stop_requested: Arc::clone(&self.stop_requested),
                };
                self.task = Some(tokio::spawn(receive_loop.run(session)));
                self.state = ReceiverState::Running;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Receiver failed to start");
                self.state = ReceiverState::Stopped;
                Err(e)
            }
        }
    }

    async fn open(&self) -> ListenerResult<(C::Session, CheckpointHandle)> {
        let record = self
            .store
            .get_or_create(&self.partition_id)
            .await
            .map_err(|source| self.checkpoint_error(source))?;

        if record.partition_id != self.partition_id {
            return Err(self.checkpoint_error(CheckpointError::PartitionMismatch {
                requested: self.partition_id.clone(),
                returned: record.partition_id,
            }));
        }

        let start = resolve_start_position(&record, &self.options.start_position);
        info!(
            start = %start,
            epoch = ?self.options.epoch,
            checkpointed = record.has_offset(),
            "Opening partition session"
        );

        let session = self
            .connection
            .open_session(
                &self.partition_id,
                SessionOptions::new(start, self.options.epoch),
            )
            .await
            .map_err(|source| ListenerError::broker("open_session", source))?;

        Ok((session, CheckpointHandle::new(record, Arc::clone(&self.store))))
    }

    /// Requests the loop to stop and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver is not running, or the loop ended
    /// with a broker, processor or checkpoint error.
    #[instrument(skip(self), fields(partition = %self.partition_id))]
    pub async fn stop(&mut self) -> ListenerResult<()> {
        if self.state != ReceiverState::Running {
            return Err(ListenerError::InvalidState {
                operation: "stop receiver",
                state: self.state.as_str(),
            });
        }
        self.state = ReceiverState::Stopping;
        self.stop_requested.store(true, Ordering::Release);

        let result = match self.task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(ListenerError::TaskFailed {
                    partition_id: self.partition_id.clone(),
                    message: e.to_string(),
                }),
            },
            None => Ok(()),
        };

        self.state = ReceiverState::Stopped;
        debug!(ok = result.is_ok(), "Receiver stopped");
        result
    }

    /// Signals the loop and cancels its task without waiting.
    pub fn abort(&mut self) {
        self.stop_requested.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state = ReceiverState::Stopped;
    }

    fn checkpoint_error(&self, source: CheckpointError) -> ListenerError {
        ListenerError::Checkpoint {
            partition_id: self.partition_id.clone(),
            source,
        }
    }
}

impl<C: BrokerConnection> fmt::Debug for PartitionReceiver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionReceiver")
            .field("partition_id", &self.partition_id)
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: BrokerConnection> Drop for PartitionReceiver<C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.stop_requested.store(true, Ordering::Release);
            task.abort();
        }
    }
}

// -----------------------------------------------------------------------------
// Receive Loop
// -----------------------------------------------------------------------------

struct ReceiveLoop {
    checkpoint: CheckpointHandle,
    processor: Arc<dyn EventProcessor>,
    batch_size: u32,
    flush_policy: FlushPolicy,
    stop_requested: Arc<AtomicBool>,
}

impl ReceiveLoop {
    async fn run<S: PartitionSession>(mut self, mut session: S) -> ListenerResult<()> {
        let partition_id = self.checkpoint.partition_id().clone();
        let result = self.receive_until_stopped(&mut session).await;

        if let Err(e) = session.close().await {
            debug!(partition = %partition_id, error = %e, "Session close failed");
        }

        match &result {
            Ok(()) => info!(
                partition = %partition_id,
                checkpoints = self.checkpoint.save_count(),
                "Receive loop stopped"
            ),
            Err(e) => warn!(partition = %partition_id, error = %e, "Receive loop failed"),
        }
        result
    }

    async fn receive_until_stopped<S: PartitionSession>(
        &mut self,
        session: &mut S,
    ) -> ListenerResult<()> {
        let batch_size = self.batch_size as usize;
        let mut buffer: Vec<Event> = Vec::with_capacity(batch_size);

        loop {
            let events = match session.receive(self.batch_size).await {
                Ok(events) => events,
                // Closing the connection during stop surfaces as a receive
                // error; that is a normal exit.
                Err(_) if self.stop_requested.load(Ordering::Acquire) => break,
                Err(source) => return Err(ListenerError::broker("receive", source)),
            };

            for event in events {
                buffer.push(event);
                if buffer.len() == batch_size {
                    self.deliver(&mut buffer).await?;
                }
            }

            if self.stop_requested.load(Ordering::Acquire) {
                break;
            }
        }

        if !buffer.is_empty() {
            match self.flush_policy {
                FlushPolicy::FlushOnStop => self.deliver(&mut buffer).await?,
                FlushPolicy::DropOnStop => debug!(
                    partition = %self.checkpoint.partition_id(),
                    dropped = buffer.len(),
                    "Dropping partial batch on stop"
                ),
            }
        }
        Ok(())
    }

    /// Hands the buffer to the processor and checkpoints on request.
    async fn deliver(&mut self, buffer: &mut Vec<Event>) -> ListenerResult<()> {
        debug_assert!(!buffer.is_empty());

        let commit = self
            .processor
            .process(buffer.as_slice(), &mut self.checkpoint)
            .await
            .map_err(|e| ListenerError::Processor {
                partition_id: self.checkpoint.partition_id().clone(),
                message: e.to_string(),
            })?;

        if commit {
            if let Some(last) = buffer.last() {
                self.checkpoint.set_offset(last.offset.clone());
                self.checkpoint
                    .save()
                    .await
                    .map_err(|source| ListenerError::Checkpoint {
                        partition_id: self.checkpoint.partition_id().clone(),
                        source,
                    })?;
            }
        }

        debug!(
            partition = %self.checkpoint.partition_id(),
            events = buffer.len(),
            committed = commit,
            "Delivered batch"
        );
        buffer.clear();
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broker, Endpoint};
    use crate::processor::ProcessorError;
    use crate::simulated::{SimulatedBroker, SimulatedBrokerConfig, SimulatedConnection};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tributary_checkpoint::SimulatedCheckpointStore;
    use tributary_core::Offset;

    /// Records every batch and returns a fixed commit decision.
    struct RecordingProcessor {
        batches: Mutex<Vec<Vec<String>>>,
        commit: bool,
    }

    impl RecordingProcessor {
        fn new(commit: bool) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
                commit,
            })
        }

        fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventProcessor for RecordingProcessor {
        async fn process(
            &self,
            events: &[Event],
            _checkpoint: &mut CheckpointHandle,
        ) -> Result<bool, ProcessorError> {
            let bodies = events
                .iter()
                .map(|e| String::from_utf8_lossy(&e.body).into_owned())
                .collect();
            self.batches.lock().unwrap().push(bodies);
            Ok(self.commit)
        }
    }

    struct FailingProcessor;

    #[async_trait]
    impl EventProcessor for FailingProcessor {
        async fn process(
            &self,
            _events: &[Event],
            _checkpoint: &mut CheckpointHandle,
        ) -> Result<bool, ProcessorError> {
            Err("downstream unavailable".into())
        }
    }

    async fn connect(broker: &SimulatedBroker) -> Arc<SimulatedConnection> {
        Arc::new(
            broker
                .connect(&Endpoint::new("sim", "orders", ""))
                .await
                .unwrap(),
        )
    }

    fn broker() -> SimulatedBroker {
        SimulatedBroker::new(
            SimulatedBrokerConfig::new(["0", "1"]).with_receive_wait(Duration::from_millis(5)),
        )
    }

    async fn wait_for_batches(processor: &RecordingProcessor, count: usize) {
        for _ in 0..400 {
            if processor.batches().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("processor saw {} batches, wanted {count}", processor.batches().len());
    }

    #[test]
    fn test_resolve_start_position_precedence() {
        let partition = PartitionId::new("0");
        let configured = StartPosition::EnqueuedAfter { timestamp_us: 5 };

        let stored = CheckpointRecord::new(partition.clone(), Offset::new("7"));
        assert_eq!(
            resolve_start_position(&stored, &configured),
            StartPosition::Offset {
                offset: Offset::new("7"),
                inclusive: false
            }
        );

        let empty = CheckpointRecord::empty(partition);
        assert_eq!(resolve_start_position(&empty, &configured), configured);
        assert_eq!(
            resolve_start_position(&empty, &StartPosition::Default),
            StartPosition::Default
        );
    }

    #[tokio::test]
    async fn test_receiver_batches_align_to_batch_size() {
        let broker = broker();
        let store = SimulatedCheckpointStore::new(1);
        let processor = RecordingProcessor::new(true);
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(3),
            connect(&broker).await,
            processor.clone(),
            Arc::new(store.clone()),
        );

        receiver.start().await.unwrap();
        assert_eq!(receiver.state(), ReceiverState::Running);

        broker.publish_all(&PartitionId::new("0"), ["e1", "e2", "e3", "e4"]);
        wait_for_batches(&processor, 1).await;
        broker.publish_all(&PartitionId::new("0"), ["e5", "e6", "e7"]);
        wait_for_batches(&processor, 2).await;

        receiver.stop().await.unwrap();
        assert_eq!(receiver.state(), ReceiverState::Stopped);
        assert_eq!(
            processor.batches(),
            vec![vec!["e1", "e2", "e3"], vec!["e4", "e5", "e6"]]
        );
        // e7 was buffered and dropped; the checkpoint points at e6.
        assert_eq!(
            store.get(&PartitionId::new("0")).unwrap().offset,
            Offset::new("5")
        );
    }

    #[tokio::test]
    async fn test_receiver_flush_on_stop_delivers_partial_batch() {
        let broker = broker();
        let store = SimulatedCheckpointStore::new(1);
        let processor = RecordingProcessor::new(true);
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(3).with_flush_policy(FlushPolicy::FlushOnStop),
            connect(&broker).await,
            processor.clone(),
            Arc::new(store.clone()),
        );

        receiver.start().await.unwrap();
        broker.publish_all(&PartitionId::new("0"), ["e1", "e2"]);
        for _ in 0..400 {
            if broker.delivered_count(&PartitionId::new("0")) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        receiver.stop().await.unwrap();

        assert_eq!(processor.batches(), vec![vec!["e1", "e2"]]);
        assert_eq!(
            store.get(&PartitionId::new("0")).unwrap().offset,
            Offset::new("1")
        );
    }

    #[tokio::test]
    async fn test_receiver_without_commit_leaves_checkpoint() {
        let broker = broker();
        let store = SimulatedCheckpointStore::new(1);
        let processor = RecordingProcessor::new(false);
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(2),
            connect(&broker).await,
            processor.clone(),
            Arc::new(store.clone()),
        );

        receiver.start().await.unwrap();
        broker.publish_all(&PartitionId::new("0"), ["e1", "e2"]);
        wait_for_batches(&processor, 1).await;
        receiver.stop().await.unwrap();

        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_receiver_resumes_after_checkpoint() {
        let broker = broker();
        broker.publish_all(&PartitionId::new("0"), ["e1", "e2", "e3", "e4"]);

        let store = SimulatedCheckpointStore::new(1);
        store.insert(CheckpointRecord::new(PartitionId::new("0"), Offset::new("1")));
        let processor = RecordingProcessor::new(true);
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(2)
                .with_start_position(StartPosition::Offset {
                    offset: Offset::new("0"),
                    inclusive: true,
                })
                .with_epoch(Epoch::new(3)),
            connect(&broker).await,
            processor.clone(),
            Arc::new(store.clone()),
        );

        receiver.start().await.unwrap();
        wait_for_batches(&processor, 1).await;
        receiver.stop().await.unwrap();

        assert_eq!(processor.batches(), vec![vec!["e3", "e4"]]);
        let opened = broker.opened_sessions();
        assert_eq!(opened.len(), 1);
        assert_eq!(
            opened[0].1,
            SessionOptions::new(
                StartPosition::Offset {
                    offset: Offset::new("1"),
                    inclusive: false
                },
                Some(Epoch::new(3))
            )
        );
    }

    #[tokio::test]
    async fn test_receiver_double_start_fails() {
        let broker = broker();
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(2),
            connect(&broker).await,
            RecordingProcessor::new(true),
            Arc::new(SimulatedCheckpointStore::new(1)),
        );

        receiver.start().await.unwrap();
        let err = receiver.start().await.unwrap_err();
        assert!(err.is_invalid_state());
        receiver.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_receiver_stop_without_start_fails() {
        let broker = broker();
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(2),
            connect(&broker).await,
            RecordingProcessor::new(true),
            Arc::new(SimulatedCheckpointStore::new(1)),
        );

        let err = receiver.stop().await.unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(receiver.state(), ReceiverState::Created);
    }

    #[tokio::test]
    async fn test_receiver_start_failure_ends_stopped() {
        let broker = broker();
        let store = SimulatedCheckpointStore::new(1);
        store.fault_config().force_get_fail = true;
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(2),
            connect(&broker).await,
            RecordingProcessor::new(true),
            Arc::new(store),
        );

        let err = receiver.start().await.unwrap_err();
        assert!(matches!(err, ListenerError::Checkpoint { .. }));
        assert_eq!(receiver.state(), ReceiverState::Stopped);
        assert!(broker.opened_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_receiver_unknown_partition_fails_to_start() {
        let broker = broker();
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("9"),
            ReceiverOptions::new(2),
            connect(&broker).await,
            RecordingProcessor::new(true),
            Arc::new(SimulatedCheckpointStore::new(1)),
        );

        let err = receiver.start().await.unwrap_err();
        assert!(matches!(err, ListenerError::Broker { .. }));
        assert_eq!(receiver.state(), ReceiverState::Stopped);
    }

    #[tokio::test]
    async fn test_receiver_processor_error_ends_loop() {
        let broker = broker();
        let store = SimulatedCheckpointStore::new(1);
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(1),
            connect(&broker).await,
            Arc::new(FailingProcessor),
            Arc::new(store.clone()),
        );

        receiver.start().await.unwrap();
        broker.publish_all(&PartitionId::new("0"), ["e1"]);
        for _ in 0..400 {
            if receiver.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(receiver.is_finished());

        let err = receiver.stop().await.unwrap_err();
        assert!(matches!(err, ListenerError::Processor { .. }));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_receiver_broker_error_ends_loop() {
        let broker = broker();
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(2),
            connect(&broker).await,
            RecordingProcessor::new(true),
            Arc::new(SimulatedCheckpointStore::new(1)),
        );

        receiver.start().await.unwrap();
        broker.fail_next_receive(&PartitionId::new("0"));
        for _ in 0..400 {
            if receiver.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = receiver.stop().await.unwrap_err();
        assert!(matches!(
            err,
            ListenerError::Broker {
                operation: "receive",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_receiver_checkpoint_save_error_ends_loop() {
        let broker = broker();
        let store = SimulatedCheckpointStore::new(1);
        store.fault_config().force_save_fail = true;
        let processor = RecordingProcessor::new(true);
        let mut receiver = PartitionReceiver::new(
            PartitionId::new("0"),
            ReceiverOptions::new(1),
            connect(&broker).await,
            processor.clone(),
            Arc::new(store.clone()),
        );

        receiver.start().await.unwrap();
        broker.publish_all(&PartitionId::new("0"), ["e1", "e2"]);
        for _ in 0..400 {
            if receiver.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let err = receiver.stop().await.unwrap_err();
        assert!(matches!(err, ListenerError::Checkpoint { .. }));
        assert_eq!(processor.batches().len(), 1);
        assert!(store.get(&PartitionId::new("0")).is_none());
    }
}
