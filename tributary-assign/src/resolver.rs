//! Partition assignment resolver.
//!
//! Computes which stream partitions the current node owns. The resolver is a
//! pure function: no I/O, no clocks, no shared state. Every node runs it on
//! its own and must reach the same answer, so both input lists are sorted
//! ordinally before anything else happens. That sort is the only thing that
//! makes assignments line up across nodes without a coordinator round-trip.
//!
//! # Distribution
//!
//! With `p` partitions and `n` nodes (`n < p`):
//! - Base slice size = p / n
//! - Remainder = p % n
//! - Node at rank r owns `partitions[r * base .. r * base + base]`
//! - The last rank also owns the final `remainder` partitions
//!
//! With 7 partitions and 3 nodes:
//! - Base = 2, remainder = 1
//! - Rank 0: [p0, p1]
//! - Rank 1: [p2, p3]
//! - Rank 2: [p4, p5, p6] (gets the remainder)
//!
//! With `n >= p` each rank below `p` owns exactly `partitions[rank]` and the
//! rest own nothing.

use std::collections::BTreeMap;

use tributary_core::{NodeId, PartitionId};

use crate::error::{AssignmentError, AssignmentResult};
use crate::mode::AssignmentMode;

// -----------------------------------------------------------------------------
// Request
// -----------------------------------------------------------------------------

/// Input to the resolver.
///
/// The slices may be in any order; the resolver sorts copies of them.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentRequest<'a> {
    /// Assignment mode.
    pub mode: AssignmentMode,
    /// Live partition ids as reported by the broker.
    pub partitions: &'a [PartitionId],
    /// Configured or discovered node ids.
    pub nodes: &'a [NodeId],
    /// The node doing the resolving.
    pub current_node: &'a NodeId,
    /// Partition configured for `Single` mode.
    pub assigned_partition: Option<&'a PartitionId>,
}

impl<'a> AssignmentRequest<'a> {
    /// Creates a request without a single-mode partition.
    #[must_use]
    pub const fn new(
        mode: AssignmentMode,
        partitions: &'a [PartitionId],
        nodes: &'a [NodeId],
        current_node: &'a NodeId,
    ) -> Self {
        Self {
            mode,
            partitions,
            nodes,
            current_node,
            assigned_partition: None,
        }
    }

    /// Builder: set the single-mode partition.
    #[must_use]
    pub const fn with_assigned_partition(mut self, partition: Option<&'a PartitionId>) -> Self {
        self.assigned_partition = partition;
        self
    }
}

// -----------------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------------

/// Resolves the partitions owned by `request.current_node`.
///
/// The result is in ascending partition order: the last rank's remainder is
/// the sorted tail, appended after its base slice.
///
/// # Errors
///
/// Returns an error if the inputs make the requested mode impossible; see
/// [`AssignmentError`] for the cases.
pub fn resolve_assignment(request: &AssignmentRequest<'_>) -> AssignmentResult<Vec<PartitionId>> {
    let partitions = sorted_unique_partitions(request.partitions)?;

    if request.mode == AssignmentMode::Single {
        return resolve_single(&partitions, request.assigned_partition);
    }

    let nodes = sorted_unique_nodes(request.nodes)?;
    let rank = rank_of(&nodes, request.current_node)?;

    if request.mode == AssignmentMode::OneToOne && nodes.len() != partitions.len() {
        return Err(AssignmentError::CountMismatch {
            nodes: nodes.len(),
            partitions: partitions.len(),
        });
    }

    if request.mode == AssignmentMode::SafeDistribute && nodes.len() > partitions.len() {
        return Err(AssignmentError::MoreNodesThanPartitions {
            nodes: nodes.len(),
            partitions: partitions.len(),
        });
    }

    // One-to-one with equal counts is the `n >= p` branch of the distribution.
    Ok(distribute_over_nodes(&partitions, nodes.len(), rank))
}

/// Resolves the assignment of every node in `nodes`.
///
/// Useful for operators and tests that want the whole cluster plan. Each node
/// is resolved independently, exactly as it would resolve itself.
///
/// # Errors
///
/// Returns the first error any node would hit.
pub fn plan_assignments(
    mode: AssignmentMode,
    partitions: &[PartitionId],
    nodes: &[NodeId],
    assigned_partition: Option<&PartitionId>,
) -> AssignmentResult<BTreeMap<NodeId, Vec<PartitionId>>> {
    let mut plan = BTreeMap::new();
    for node in nodes {
        let request = AssignmentRequest::new(mode, partitions, nodes, node)
            .with_assigned_partition(assigned_partition);
        plan.insert(node.clone(), resolve_assignment(&request)?);
    }
    Ok(plan)
}

/// Splits sorted `partitions` across `node_count` nodes and returns the share
/// of the node at `rank`.
///
/// # Panics
///
/// Panics if `node_count` is zero or `rank >= node_count`.
#[must_use]
pub fn distribute_over_nodes(
    partitions: &[PartitionId],
    node_count: usize,
    rank: usize,
) -> Vec<PartitionId> {
    // TigerStyle: Assert preconditions.
    assert!(node_count > 0, "node_count must be positive");
    assert!(rank < node_count, "rank ({rank}) must be < node_count ({node_count})");

    // More nodes than partitions (or equal): at most one each, by rank.
    if node_count >= partitions.len() {
        return partitions.get(rank).cloned().into_iter().collect();
    }

    let per_node = partitions.len() / node_count;
    let remainder = partitions.len() % node_count;

    let start = rank * per_node;
    let mut owned: Vec<PartitionId> = partitions[start..start + per_node].to_vec();

    // Last rank picks up the tail.
    if rank == node_count - 1 {
        owned.extend_from_slice(&partitions[partitions.len() - remainder..]);
    }

    // TigerStyle: Assert postcondition.
    debug_assert!(
        owned.len() == per_node || (rank == node_count - 1 && owned.len() == per_node + remainder)
    );
    owned
}

fn resolve_single(
    partitions: &[PartitionId],
    assigned: Option<&PartitionId>,
) -> AssignmentResult<Vec<PartitionId>> {
    let assigned = match assigned {
        Some(p) if !p.is_empty() => p,
        _ => return Err(AssignmentError::MissingAssignedPartition),
    };

    if partitions.binary_search(assigned).is_err() {
        return Err(AssignmentError::AssignedPartitionNotFound {
            partition_id: assigned.clone(),
        });
    }

    Ok(vec![assigned.clone()])
}

fn rank_of(nodes: &[NodeId], current: &NodeId) -> AssignmentResult<usize> {
    if nodes.is_empty() {
        return Err(AssignmentError::NoNodes);
    }
    nodes
        .binary_search(current)
        .map_err(|_| AssignmentError::NodeNotFound {
            node_id: current.clone(),
        })
}

fn sorted_unique_partitions(partitions: &[PartitionId]) -> AssignmentResult<Vec<PartitionId>> {
    let mut sorted = partitions.to_vec();
    sorted.sort();
    if let Some(dup) = first_duplicate(&sorted) {
        return Err(AssignmentError::DuplicatePartition {
            partition_id: dup.clone(),
        });
    }
    Ok(sorted)
}

fn sorted_unique_nodes(nodes: &[NodeId]) -> AssignmentResult<Vec<NodeId>> {
    let mut sorted = nodes.to_vec();
    sorted.sort();
    if let Some(dup) = first_duplicate(&sorted) {
        return Err(AssignmentError::DuplicateNode {
            node_id: dup.clone(),
        });
    }
    Ok(sorted)
}

fn first_duplicate<T: PartialEq>(sorted: &[T]) -> Option<&T> {
    sorted.windows(2).find(|w| w[0] == w[1]).map(|w| &w[0])
}
