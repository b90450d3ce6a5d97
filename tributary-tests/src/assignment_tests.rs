//! Assignment integration tests.
//!
//! Whole-cluster plans checked against the cover and sizing properties,
//! with inputs shuffled by seed to show that input order never matters.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tributary_assign::{plan_assignments, AssignmentError, AssignmentMode};
use tributary_core::{NodeId, PartitionId};

use crate::properties::{check_exact_cover, expected_share, idle_node_count};
use crate::scenarios::clusters::{ORDINAL_TRAP, THREE_NODE, TWO_NODE};
use crate::scenarios::seeds::REGRESSION_SEEDS;
use crate::scenarios::{node_names, partition_names};

fn partitions(names: &[impl AsRef<str>]) -> Vec<PartitionId> {
    names.iter().map(|n| PartitionId::new(n.as_ref())).collect()
}

fn nodes(names: &[impl AsRef<str>]) -> Vec<NodeId> {
    names.iter().map(|n| NodeId::new(n.as_ref())).collect()
}

#[test]
fn test_assignment_scenario_a_even_split() {
    let plan = plan_assignments(
        AssignmentMode::SafeDistribute,
        &partitions(&["p0", "p1", "p2", "p3"]),
        &nodes(TWO_NODE),
        None,
    )
    .unwrap();

    assert_eq!(plan[&NodeId::new("n0")], partitions(&["p0", "p1"]));
    assert_eq!(plan[&NodeId::new("n1")], partitions(&["p2", "p3"]));
}

#[test]
fn test_assignment_scenario_b_remainder_to_last_rank() {
    let plan = plan_assignments(
        AssignmentMode::SafeDistribute,
        &partitions(&["p0", "p1", "p2", "p3", "p4"]),
        &nodes(TWO_NODE),
        None,
    )
    .unwrap();

    assert_eq!(plan[&NodeId::new("n0")], partitions(&["p0", "p1"]));
    assert_eq!(plan[&NodeId::new("n1")], partitions(&["p2", "p3", "p4"]));
}

#[test]
fn test_assignment_scenario_c_idle_nodes() {
    let live = partitions(&["p0", "p1"]);
    let plan = plan_assignments(AssignmentMode::Distribute, &live, &nodes(THREE_NODE), None)
        .unwrap();

    assert_eq!(plan[&NodeId::new("n0")], partitions(&["p0"]));
    assert_eq!(plan[&NodeId::new("n1")], partitions(&["p1"]));
    assert!(plan[&NodeId::new("n2")].is_empty());

    let err = plan_assignments(AssignmentMode::SafeDistribute, &live, &nodes(THREE_NODE), None)
        .unwrap_err();
    assert_eq!(
        err,
        AssignmentError::MoreNodesThanPartitions {
            nodes: 3,
            partitions: 2
        }
    );
}

#[test]
fn test_assignment_cover_and_share_sizes() {
    for p in 1..=32 {
        let live = partitions(&partition_names(p));
        for n in 1..=p + 4 {
            let cluster = nodes(&node_names(n));
            let mode = if n > p {
                AssignmentMode::Distribute
            } else {
                AssignmentMode::SafeDistribute
            };
            let plan = plan_assignments(mode, &live, &cluster, None).unwrap();

            let violations = check_exact_cover(&live, &plan);
            assert!(violations.is_empty(), "p={p} n={n}: {violations:?}");
            assert_eq!(idle_node_count(&plan), n.saturating_sub(p), "p={p} n={n}");

            let mut sorted = cluster.clone();
            sorted.sort();
            for (rank, node) in sorted.iter().enumerate() {
                assert_eq!(
                    plan[node].len(),
                    expected_share(p, n, rank),
                    "p={p} n={n} rank={rank}"
                );
            }
        }
    }
}

#[test]
fn test_assignment_independent_of_input_order() {
    let live = partitions(&partition_names(11));
    let cluster = nodes(&node_names(4));
    let expected = plan_assignments(AssignmentMode::SafeDistribute, &live, &cluster, None).unwrap();

    for &seed in REGRESSION_SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut shuffled_live = live.clone();
        let mut shuffled_cluster = cluster.clone();
        shuffled_live.shuffle(&mut rng);
        shuffled_cluster.shuffle(&mut rng);

        let plan = plan_assignments(
            AssignmentMode::SafeDistribute,
            &shuffled_live,
            &shuffled_cluster,
            None,
        )
        .unwrap();
        assert_eq!(plan, expected, "seed={seed}");
    }
}

#[test]
fn test_assignment_uses_ordinal_order() {
    // Ordinal order: node-1 < node-10 < node-2.
    let live = partitions(&["a", "b", "c"]);
    let plan = plan_assignments(AssignmentMode::OneToOne, &live, &nodes(ORDINAL_TRAP), None)
        .unwrap();

    assert_eq!(plan[&NodeId::new("node-1")], partitions(&["a"]));
    assert_eq!(plan[&NodeId::new("node-10")], partitions(&["b"]));
    assert_eq!(plan[&NodeId::new("node-2")], partitions(&["c"]));
}

#[test]
fn test_assignment_one_to_one_bijection() {
    for n in 1..=16 {
        let live = partitions(&partition_names(n));
        let plan = plan_assignments(AssignmentMode::OneToOne, &live, &nodes(&node_names(n)), None)
            .unwrap();

        assert!(plan.values().all(|share| share.len() == 1));
        assert!(check_exact_cover(&live, &plan).is_empty());
    }

    let err = plan_assignments(
        AssignmentMode::OneToOne,
        &partitions(&partition_names(4)),
        &nodes(THREE_NODE),
        None,
    )
    .unwrap_err();
    assert_eq!(
        err,
        AssignmentError::CountMismatch {
            nodes: 3,
            partitions: 4
        }
    );
}

#[test]
fn test_assignment_single_ignores_rank() {
    let live = partitions(&partition_names(4));
    let assigned = PartitionId::new("p2");
    let plan = plan_assignments(
        AssignmentMode::Single,
        &live,
        &nodes(THREE_NODE),
        Some(&assigned),
    )
    .unwrap();

    // Every node configured with the same id claims it; single mode leaves
    // exclusivity to the operator.
    assert!(plan.values().all(|share| share == &vec![assigned.clone()]));

    let missing = PartitionId::new("p9");
    let err = plan_assignments(
        AssignmentMode::Single,
        &live,
        &nodes(THREE_NODE),
        Some(&missing),
    )
    .unwrap_err();
    assert_eq!(
        err,
        AssignmentError::AssignedPartitionNotFound {
            partition_id: missing
        }
    );
}

#[test]
fn test_assignment_rebalances_deterministically_on_scale_out() {
    let live = partitions(&partition_names(12));
    let before = plan_assignments(
        AssignmentMode::SafeDistribute,
        &live,
        &nodes(&node_names(3)),
        None,
    )
    .unwrap();
    let after = plan_assignments(
        AssignmentMode::SafeDistribute,
        &live,
        &nodes(&node_names(4)),
        None,
    )
    .unwrap();

    assert!(check_exact_cover(&live, &before).is_empty());
    assert!(check_exact_cover(&live, &after).is_empty());
    assert!(after.values().all(|share| share.len() == 3));
}
