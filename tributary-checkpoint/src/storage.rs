//! Checkpoint storage abstraction.
//!
//! Provides the `CheckpointStore` trait for persisting per-partition
//! checkpoints, and `SimulatedCheckpointStore` for deterministic testing.

#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tributary_core::PartitionId;

use crate::error::{CheckpointError, CheckpointResult};
use crate::record::CheckpointRecord;

// -----------------------------------------------------------------------------
// Checkpoint Store Trait
// -----------------------------------------------------------------------------

/// Checkpoint store trait for persistence.
///
/// Implementations provide durable storage keyed by partition. Each call is
/// atomic for its own partition; nothing spans partitions.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the record for a partition.
    ///
    /// Returns an empty record (no offset) if nothing was ever saved. The
    /// returned record must carry `partition_id`.
    async fn get_or_create(&self, partition_id: &PartitionId) -> CheckpointResult<CheckpointRecord>;

    /// Persists a record.
    ///
    /// Completes only once the record is durable.
    async fn save(&self, record: &CheckpointRecord) -> CheckpointResult<()>;
}

// -----------------------------------------------------------------------------
// Fault Configuration
// -----------------------------------------------------------------------------

/// Fault configuration for simulated checkpoint store.
#[derive(Debug, Clone, Default)]
pub struct CheckpointStoreFaultConfig {
    /// Probability of get operations failing (0.0 - 1.0).
    pub get_fail_rate: f64,
    /// Probability of save operations failing (0.0 - 1.0).
    pub save_fail_rate: f64,
    /// Force next get to fail (one-shot).
    pub force_get_fail: bool,
    /// Force next save to fail (one-shot).
    pub force_save_fail: bool,
}

impl CheckpointStoreFaultConfig {
    /// No faults (all operations succeed).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            get_fail_rate: 0.0,
            save_fail_rate: 0.0,
            force_get_fail: false,
            force_save_fail: false,
        }
    }

    /// Flaky configuration for stress testing.
    #[must_use]
    pub const fn flaky() -> Self {
        Self {
            get_fail_rate: 0.05,
            save_fail_rate: 0.05,
            force_get_fail: false,
            force_save_fail: false,
        }
    }

    /// Builder: set get fail rate.
    #[must_use]
    pub const fn with_get_fail_rate(mut self, rate: f64) -> Self {
        self.get_fail_rate = rate;
        self
    }

    /// Builder: set save fail rate.
    #[must_use]
    pub const fn with_save_fail_rate(mut self, rate: f64) -> Self {
        self.save_fail_rate = rate;
        self
    }
}

// -----------------------------------------------------------------------------
// Simulated Checkpoint Store
// -----------------------------------------------------------------------------

/// In-memory simulated checkpoint store.
///
/// Clones share state via `Arc`, so a test can keep one clone for assertions
/// while the listener owns another. Supports deterministic fault injection.
#[derive(Debug, Clone)]
pub struct SimulatedCheckpointStore {
    /// Stored records by partition.
    records: Arc<Mutex<HashMap<PartitionId, CheckpointRecord>>>,
    /// Fault configuration.
    fault_config: Arc<Mutex<CheckpointStoreFaultConfig>>,
    /// RNG seed for deterministic faults.
    seed: u64,
    /// Operation counter for deterministic RNG.
    counter: Arc<AtomicU64>,
    /// Number of successful saves.
    saves: Arc<AtomicU64>,
}

impl SimulatedCheckpointStore {
    /// Creates a new simulated store with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, CheckpointStoreFaultConfig::none())
    }

    /// Creates a simulated store with fault injection.
    #[must_use]
    pub fn with_faults(seed: u64, config: CheckpointStoreFaultConfig) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            counter: Arc::new(AtomicU64::new(0)),
            saves: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns fault config for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, CheckpointStoreFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Seeds a record directly (bypasses faults).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn insert(&self, record: CheckpointRecord) {
        let mut records = self.records.lock().expect("records lock poisoned");
        records.insert(record.partition_id.clone(), record);
    }

    /// Returns the stored record for a partition (bypasses faults).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn get(&self, partition_id: &PartitionId) -> Option<CheckpointRecord> {
        let records = self.records.lock().expect("records lock poisoned");
        records.get(partition_id).cloned()
    }

    /// Returns all stored records sorted by partition (bypasses faults).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn all_records(&self) -> Vec<CheckpointRecord> {
        let records = self.records.lock().expect("records lock poisoned");
        let mut all: Vec<CheckpointRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.partition_id.cmp(&b.partition_id));
        all
    }

    /// Returns the number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Deterministic RNG: `(seed + counter) * M`, normalized to [0, 1).
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let hash = self
            .seed
            .wrapping_add(counter)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }
}

#[async_trait]
impl CheckpointStore for SimulatedCheckpointStore {
    async fn get_or_create(&self, partition_id: &PartitionId) -> CheckpointResult<CheckpointRecord> {
        // Check for forced failure.
        {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            if config.force_get_fail {
                config.force_get_fail = false;
                return Err(CheckpointError::Io {
                    operation: "get_or_create",
                    message: "simulated failure (forced)".into(),
                });
            }
        }

        // Check for probabilistic failure.
        let get_fail_rate = self.fault_config.lock().expect("lock").get_fail_rate;
        if self.should_inject_fault(get_fail_rate) {
            return Err(CheckpointError::Io {
                operation: "get_or_create",
                message: "simulated failure (random)".into(),
            });
        }

        let records = self.records.lock().expect("records lock poisoned");
        Ok(records
            .get(partition_id)
            .cloned()
            .unwrap_or_else(|| CheckpointRecord::empty(partition_id.clone())))
    }

    async fn save(&self, record: &CheckpointRecord) -> CheckpointResult<()> {
        // TigerStyle: Assert precondition.
        assert!(
            !record.partition_id.is_empty(),
            "partition_id must be non-empty"
        );

        // Check for forced failure.
        {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            if config.force_save_fail {
                config.force_save_fail = false;
                return Err(CheckpointError::Io {
                    operation: "save",
                    message: "simulated failure (forced)".into(),
                });
            }
        }

        // Check for probabilistic failure.
        let save_fail_rate = self.fault_config.lock().expect("lock").save_fail_rate;
        if self.should_inject_fault(save_fail_rate) {
            return Err(CheckpointError::Io {
                operation: "save",
                message: "simulated failure (random)".into(),
            });
        }

        let mut records = self.records.lock().expect("records lock poisoned");
        records.insert(record.partition_id.clone(), record.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);

        // TigerStyle: Assert postcondition.
        assert!(records.contains_key(&record.partition_id));
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tributary_core::Offset;

    #[tokio::test]
    async fn test_get_or_create_returns_empty_record() {
        let store = SimulatedCheckpointStore::new(42);
        let record = store.get_or_create(&PartitionId::new("0")).await.unwrap();
        assert_eq!(record.partition_id, PartitionId::new("0"));
        assert!(!record.has_offset());
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = SimulatedCheckpointStore::new(42);
        let record = CheckpointRecord::new(PartitionId::new("0"), Offset::new("100"));
        store.save(&record).await.unwrap();

        let loaded = store.get_or_create(&PartitionId::new("0")).await.unwrap();
        assert_eq!(loaded, record);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let store = SimulatedCheckpointStore::new(42);
        store
            .save(&CheckpointRecord::new(PartitionId::new("0"), Offset::new("5")))
            .await
            .unwrap();

        let other = store.get_or_create(&PartitionId::new("1")).await.unwrap();
        assert!(!other.has_offset());
        assert_eq!(store.all_records().len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = SimulatedCheckpointStore::new(42);
        let clone = store.clone();
        clone
            .save(&CheckpointRecord::new(PartitionId::new("0"), Offset::new("5")))
            .await
            .unwrap();
        assert!(store.get(&PartitionId::new("0")).is_some());
    }

    #[tokio::test]
    async fn test_forced_failures_are_one_shot() {
        let store = SimulatedCheckpointStore::new(42);
        store.fault_config().force_save_fail = true;
        store.fault_config().force_get_fail = true;

        let record = CheckpointRecord::new(PartitionId::new("0"), Offset::new("1"));
        assert!(store.save(&record).await.is_err());
        assert!(store.save(&record).await.is_ok());

        assert!(store.get_or_create(&PartitionId::new("0")).await.is_err());
        assert!(store.get_or_create(&PartitionId::new("0")).await.is_ok());
    }

    #[tokio::test]
    async fn test_fault_injection_is_deterministic() {
        let config = CheckpointStoreFaultConfig::none().with_save_fail_rate(0.5);
        let a = SimulatedCheckpointStore::with_faults(99, config.clone());
        let b = SimulatedCheckpointStore::with_faults(99, config);
        let record = CheckpointRecord::new(PartitionId::new("0"), Offset::new("1"));

        let mut outcomes_a = Vec::new();
        let mut outcomes_b = Vec::new();
        for _ in 0..32 {
            outcomes_a.push(a.save(&record).await.is_ok());
            outcomes_b.push(b.save(&record).await.is_ok());
        }
        assert_eq!(outcomes_a, outcomes_b);
    }
}
