//! Tributary Assign - Deterministic partition-to-node assignment.
//!
//! Every node of a sharded consumer decides on its own which stream
//! partitions it owns. No coordinator is consulted; instead each node sorts
//! the live partition list and the node list the same way and derives its
//! share from its rank in the sorted node list.
//!
//! # Modes
//!
//! - **SafeDistribute** (default): contiguous slices, fails if nodes > partitions
//! - **Distribute**: contiguous slices, extra nodes stay idle
//! - **OneToOne**: exactly one partition per node, counts must match
//! - **Single**: one explicitly configured partition
//!
//! # Example
//!
//! ```
//! use tributary_assign::{resolve_assignment, AssignmentMode, AssignmentRequest};
//! use tributary_core::{NodeId, PartitionId};
//!
//! let partitions: Vec<PartitionId> = ["p0", "p1", "p2", "p3", "p4"].map(PartitionId::from).to_vec();
//! let nodes: Vec<NodeId> = ["n0", "n1"].map(NodeId::from).to_vec();
//! let me = NodeId::new("n1");
//!
//! let owned = resolve_assignment(&AssignmentRequest::new(
//!     AssignmentMode::SafeDistribute,
//!     &partitions,
//!     &nodes,
//!     &me,
//! ))
//! .unwrap();
//! assert_eq!(owned, ["p2", "p3", "p4"].map(PartitionId::from).to_vec());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod mode;
mod resolver;

pub use error::{AssignmentError, AssignmentResult};
pub use mode::AssignmentMode;
pub use resolver::{distribute_over_nodes, plan_assignments, resolve_assignment, AssignmentRequest};
