//! Tributary Checkpoint - Per-partition progress records and their stores.
//!
//! A checkpoint is the offset of the last event a processor finished with.
//! Receivers load it when they start so a restarted node resumes where its
//! predecessor left off.
//!
//! # Stores
//!
//! - [`SimulatedCheckpointStore`]: in-memory, with deterministic fault injection
//! - [`FilesystemCheckpointStore`]: one TOML file per partition, atomic saves
//!
//! Both implement [`CheckpointStore`]; anything else (a table, a blob store)
//! plugs in the same way.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod filesystem;
mod record;
mod storage;

pub use error::{CheckpointError, CheckpointResult};
pub use filesystem::{FilesystemCheckpointStore, FilesystemConfig, DEFAULT_STORE_NAME};
pub use record::{CheckpointHandle, CheckpointRecord};
pub use storage::{CheckpointStore, CheckpointStoreFaultConfig, SimulatedCheckpointStore};
