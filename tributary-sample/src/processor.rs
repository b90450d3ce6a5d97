//! Sample processor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tributary_checkpoint::CheckpointHandle;
use tributary_core::{Event, NodeId};
use tributary_listener::{EventProcessor, ProcessorError};

/// Logs every batch and asks for a checkpoint after each one.
#[derive(Debug, Clone)]
pub struct LoggingProcessor {
    node_id: NodeId,
    events: Arc<AtomicU64>,
    batches: Arc<AtomicU64>,
}

impl LoggingProcessor {
    /// Creates a processor for one node.
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            events: Arc::new(AtomicU64::new(0)),
            batches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the number of events processed.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Returns the number of batches processed.
    #[must_use]
    pub fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventProcessor for LoggingProcessor {
    async fn process(
        &self,
        events: &[Event],
        checkpoint: &mut CheckpointHandle,
    ) -> Result<bool, ProcessorError> {
        self.events.fetch_add(events.len() as u64, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);

        let bytes: usize = events.iter().map(Event::body_len).sum();
        info!(
            node = %self.node_id,
            partition = %checkpoint.partition_id(),
            events = events.len(),
            bytes,
            first = ?events.first().map(|e| e.offset.as_str()),
            last = ?events.last().map(|e| e.offset.as_str()),
            "Processed batch"
        );
        Ok(true)
    }
}
