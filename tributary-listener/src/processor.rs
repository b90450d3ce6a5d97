//! User-supplied batch processing.

use async_trait::async_trait;
use tributary_checkpoint::CheckpointHandle;
use tributary_core::Event;

/// Error type processors may return.
pub type ProcessorError = Box<dyn std::error::Error + Send + Sync>;

/// Handles batches of events from one partition.
///
/// Calls for the same partition are strictly sequential. Calls for
/// different partitions may run concurrently, hence `Send + Sync`.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Processes one batch.
    ///
    /// Return `Ok(true)` to have the receiver checkpoint at the last event of
    /// the batch, or `Ok(false)` to leave the checkpoint alone (the handle
    /// can still be moved and saved here directly).
    ///
    /// # Errors
    ///
    /// An error ends the receive loop of this partition.
    async fn process(
        &self,
        events: &[Event],
        checkpoint: &mut CheckpointHandle,
    ) -> Result<bool, ProcessorError>;
}
