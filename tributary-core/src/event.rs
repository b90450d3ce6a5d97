//! Event type delivered by the broker.
//!
//! An event is the unit handed to processors. Each event carries the opaque
//! offset the broker assigned to it, which is what gets checkpointed.
//!
//! # Event Fields
//!
//! - **Offset**: Opaque cursor within the partition (assigned by broker)
//! - **Sequence number**: Monotonic position within the partition
//! - **Enqueued at**: Broker enqueue time, microseconds since the Unix epoch (UTC)
//! - **Partition key**: Optional key the publisher used for routing
//! - **Body**: The payload

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::types::Offset;

/// A single event read from a stream partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Broker-assigned cursor for this event.
    pub offset: Offset,
    /// Position of the event within its partition.
    pub sequence_number: u64,
    /// Enqueue time in microseconds since the Unix epoch.
    pub enqueued_at_us: u64,
    /// Routing key supplied by the publisher, if any.
    pub partition_key: Option<String>,
    /// Event payload.
    pub body: Bytes,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(
        offset: Offset,
        sequence_number: u64,
        enqueued_at_us: u64,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            offset,
            sequence_number,
            enqueued_at_us,
            partition_key: None,
            body: body.into(),
        }
    }

    /// Builder: set the partition key.
    #[must_use]
    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

/// Returns the current wall-clock time in microseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch.
#[must_use]
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = Event::new(Offset::new("128"), 4, 1_000, "hello").with_partition_key("k1");
        assert_eq!(event.offset.as_str(), "128");
        assert_eq!(event.sequence_number, 4);
        assert_eq!(event.partition_key.as_deref(), Some("k1"));
        assert_eq!(event.body_len(), 5);
    }

    #[test]
    fn test_now_is_after_2020() {
        // 2020-01-01T00:00:00Z in microseconds.
        assert!(now_us() > 1_577_836_800_000_000);
    }
}
