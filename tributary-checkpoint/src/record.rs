//! Checkpoint records and the handle given to processors.

use std::fmt;
use std::sync::Arc;

use tributary_core::{Offset, PartitionId};

use crate::error::CheckpointResult;
use crate::storage::CheckpointStore;

// -----------------------------------------------------------------------------
// Checkpoint Record
// -----------------------------------------------------------------------------

/// Durable progress marker for one partition.
///
/// An empty offset means the partition was never checkpointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    /// Partition this record belongs to.
    pub partition_id: PartitionId,
    /// Offset of the last processed event.
    pub offset: Offset,
}

impl CheckpointRecord {
    /// Creates a record that has never been checkpointed.
    #[must_use]
    pub fn empty(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            offset: Offset::default(),
        }
    }

    /// Creates a record at the given offset.
    #[must_use]
    pub const fn new(partition_id: PartitionId, offset: Offset) -> Self {
        Self {
            partition_id,
            offset,
        }
    }

    /// Returns true if an offset has been stored.
    #[must_use]
    pub fn has_offset(&self) -> bool {
        !self.offset.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Checkpoint Handle
// -----------------------------------------------------------------------------

/// A partition's checkpoint record bound to the store it came from.
///
/// Each partition receiver owns exactly one handle. Processors get `&mut`
/// access so they can move the offset and save mid-batch when they opt out
/// of automatic checkpointing.
pub struct CheckpointHandle {
    record: CheckpointRecord,
    store: Arc<dyn CheckpointStore>,
    saves: u64,
}

impl CheckpointHandle {
    /// Binds a record to its store.
    #[must_use]
    pub fn new(record: CheckpointRecord, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            record,
            store,
            saves: 0,
        }
    }

    /// Returns the partition this handle tracks.
    #[must_use]
    pub const fn partition_id(&self) -> &PartitionId {
        &self.record.partition_id
    }

    /// Returns the current (possibly unsaved) offset.
    #[must_use]
    pub const fn offset(&self) -> &Offset {
        &self.record.offset
    }

    /// Returns the underlying record.
    #[must_use]
    pub const fn record(&self) -> &CheckpointRecord {
        &self.record
    }

    /// Moves the offset. Nothing is persisted until [`Self::save`].
    pub fn set_offset(&mut self, offset: Offset) {
        self.record.offset = offset;
    }

    /// Number of successful saves through this handle.
    #[must_use]
    pub const fn save_count(&self) -> u64 {
        self.saves
    }

    /// Persists the current record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to persist the record.
    pub async fn save(&mut self) -> CheckpointResult<()> {
        self.store.save(&self.record).await?;
        self.saves += 1;
        Ok(())
    }
}

impl fmt::Debug for CheckpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointHandle")
            .field("record", &self.record)
            .field("saves", &self.saves)
            .finish_non_exhaustive()
    }
}
