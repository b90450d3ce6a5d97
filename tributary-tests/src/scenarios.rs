//! Reusable test scenarios for Tributary.

/// Standard cluster shapes.
pub mod clusters {
    /// Two-node service.
    pub const TWO_NODE: &[&str] = &["n0", "n1"];

    /// Three-node service.
    pub const THREE_NODE: &[&str] = &["n0", "n1", "n2"];

    /// Node ids that sort differently ordinally than numerically.
    pub const ORDINAL_TRAP: &[&str] = &["node-10", "node-2", "node-1"];
}

/// Seeds for reproducible testing.
pub mod seeds {
    /// Standard test seeds.
    pub const REGRESSION_SEEDS: &[u64] = &[42, 12345, 0xDEAD_BEEF, 999, 7777, 1, u64::MAX, 0];
}

/// Returns partition ids `p0..p{count-1}`.
#[must_use]
pub fn partition_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("p{i}")).collect()
}

/// Returns node ids `n0..n{count-1}`.
#[must_use]
pub fn node_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("n{i}")).collect()
}
