//! Tributary Core - Strongly-typed identifiers, events and limits.
//!
//! This crate provides the vocabulary shared by every other Tributary crate.
//! It does NOT talk to a broker or a checkpoint store; those are collaborators
//! defined in `tributary-listener` and `tributary-checkpoint`.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: Prevent mixing up `NodeId` with `PartitionId`
//! - **Explicit limits**: Every resource has a bounded maximum
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod event;
mod limits;
mod types;

pub use error::{Error, Result};
pub use event::{now_us, Event};
pub use limits::{Limits, BATCH_SIZE_DEFAULT};
pub use types::{Epoch, NodeId, Offset, PartitionId};
