//! Property checkers for assignment plans.
//!
//! A plan maps every node to the partitions it would own. The checkers
//! verify the cluster-wide guarantees no single node can see on its own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tributary_core::{NodeId, PartitionId};

// ============================================================================
// Property Violation Types
// ============================================================================

/// A violation of an assignment property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentViolation {
    /// A partition is owned by more than one node.
    Overlap {
        /// The contested partition.
        partition_id: PartitionId,
        /// Every node claiming it.
        owners: Vec<NodeId>,
    },
    /// A live partition is owned by no node.
    Orphaned {
        /// The unowned partition.
        partition_id: PartitionId,
    },
    /// A node owns a partition that is not live.
    Unknown {
        /// The node.
        node_id: NodeId,
        /// The partition.
        partition_id: PartitionId,
    },
    /// A node's share is not sorted ascending.
    Unsorted {
        /// The node.
        node_id: NodeId,
    },
}

impl fmt::Display for AssignmentViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap {
                partition_id,
                owners,
            } => write!(f, "partition {partition_id} owned by {owners:?}"),
            Self::Orphaned { partition_id } => write!(f, "partition {partition_id} has no owner"),
            Self::Unknown {
                node_id,
                partition_id,
            } => write!(f, "node {node_id} owns unknown partition {partition_id}"),
            Self::Unsorted { node_id } => write!(f, "node {node_id} share is not sorted"),
        }
    }
}

// ============================================================================
// Checkers
// ============================================================================

/// Checks that a plan covers every live partition exactly once.
///
/// Returns every violation found; an empty vector means the plan is sound.
#[must_use]
pub fn check_exact_cover(
    live: &[PartitionId],
    plan: &BTreeMap<NodeId, Vec<PartitionId>>,
) -> Vec<AssignmentViolation> {
    let live_set: BTreeSet<&PartitionId> = live.iter().collect();
    let mut owners: BTreeMap<&PartitionId, Vec<NodeId>> = BTreeMap::new();
    let mut violations = Vec::new();

    for (node_id, share) in plan {
        if share.windows(2).any(|w| w[0] >= w[1]) {
            violations.push(AssignmentViolation::Unsorted {
                node_id: node_id.clone(),
            });
        }
        for partition_id in share {
            if !live_set.contains(partition_id) {
                violations.push(AssignmentViolation::Unknown {
                    node_id: node_id.clone(),
                    partition_id: partition_id.clone(),
                });
            }
            owners.entry(partition_id).or_default().push(node_id.clone());
        }
    }

    for partition_id in live_set {
        match owners.get(partition_id) {
            None => violations.push(AssignmentViolation::Orphaned {
                partition_id: partition_id.clone(),
            }),
            Some(nodes) if nodes.len() > 1 => violations.push(AssignmentViolation::Overlap {
                partition_id: partition_id.clone(),
                owners: nodes.clone(),
            }),
            Some(_) => {}
        }
    }

    violations
}

/// Returns the number of nodes that own nothing.
#[must_use]
pub fn idle_node_count(plan: &BTreeMap<NodeId, Vec<PartitionId>>) -> usize {
    plan.values().filter(|share| share.is_empty()).count()
}

/// Returns the expected share size of the node at `rank`.
///
/// Every rank gets `p / n`; the last rank also gets the `p % n` remainder.
/// With at least as many nodes as partitions, the first `p` ranks get one.
#[must_use]
pub const fn expected_share(partitions: usize, nodes: usize, rank: usize) -> usize {
    if nodes >= partitions {
        return if rank < partitions { 1 } else { 0 };
    }
    let base = partitions / nodes;
    if rank == nodes - 1 {
        base + partitions % nodes
    } else {
        base
    }
}
