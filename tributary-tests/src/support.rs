//! Test support: a recording processor and polling helpers.

#![allow(clippy::significant_drop_tightening)]

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tributary_checkpoint::CheckpointHandle;
use tributary_core::{Event, PartitionId};
use tributary_listener::{EventProcessor, ProcessorError};

/// One processor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    /// Partition the batch came from.
    pub partition_id: PartitionId,
    /// Event bodies, as UTF-8.
    pub bodies: Vec<String>,
}

/// Processor that records every batch.
///
/// Commits every batch by default. Clones share the recording.
#[derive(Debug, Clone)]
pub struct RecordingProcessor {
    batches: Arc<Mutex<Vec<RecordedBatch>>>,
    commit: bool,
}

impl RecordingProcessor {
    /// Creates a processor that asks for a checkpoint after every batch.
    #[must_use]
    pub fn committing() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            commit: true,
        }
    }

    /// Creates a processor that never asks for a checkpoint.
    #[must_use]
    pub fn non_committing() -> Self {
        Self {
            commit: false,
            ..Self::committing()
        }
    }

    /// Returns all batches in invocation order.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn batches(&self) -> Vec<RecordedBatch> {
        self.batches.lock().expect("batches lock poisoned").clone()
    }

    /// Returns the bodies seen per partition, in order.
    #[must_use]
    pub fn bodies_by_partition(&self) -> BTreeMap<PartitionId, Vec<String>> {
        let mut by_partition: BTreeMap<PartitionId, Vec<String>> = BTreeMap::new();
        for batch in self.batches() {
            by_partition
                .entry(batch.partition_id)
                .or_default()
                .extend(batch.bodies);
        }
        by_partition
    }

    /// Returns the total number of events seen.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.batches().iter().map(|b| b.bodies.len()).sum()
    }
}

#[async_trait]
impl EventProcessor for RecordingProcessor {
    async fn process(
        &self,
        events: &[Event],
        checkpoint: &mut CheckpointHandle,
    ) -> Result<bool, ProcessorError> {
        let batch = RecordedBatch {
            partition_id: checkpoint.partition_id().clone(),
            bodies: events
                .iter()
                .map(|e| String::from_utf8_lossy(&e.body).into_owned())
                .collect(),
        };
        self.batches.lock().expect("batches lock poisoned").push(batch);
        Ok(self.commit)
    }
}

/// Polls `condition` every few milliseconds until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within two seconds.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Awaits `future` with a generous timeout.
///
/// # Panics
///
/// Panics if the future does not complete within five seconds.
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}
