//! System limits and configuration bounds.
//!
//! Following TigerStyle: put limits on everything.
//! Batch buffers, node lists and partition lists all have an explicit
//! maximum so a misconfigured deployment fails fast instead of growing
//! without bound.

/// Default number of events handed to a processor per invocation.
pub const BATCH_SIZE_DEFAULT: u32 = 200;

/// System-wide limits for Tributary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    // Batching.
    /// Default batch size when none is configured.
    pub default_batch_size: u32,
    /// Maximum batch size a listener may be configured with.
    pub max_batch_size: u32,

    // Topology.
    /// Maximum number of nodes in the node list.
    pub max_nodes: u32,
    /// Maximum number of live partitions on a stream.
    pub max_partitions: u32,
}

impl Limits {
    /// Creates limits with safe defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            // Batching: 200 default, 10k max.
            default_batch_size: BATCH_SIZE_DEFAULT,
            max_batch_size: 10_000,

            // Topology: 4096 nodes, 4096 partitions.
            max_nodes: 4096,
            max_partitions: 4096,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns an error if any limits are invalid or inconsistent.
    pub fn validate(&self) -> crate::Result<()> {
        if self.default_batch_size == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "default_batch_size",
                reason: "must be positive",
            });
        }

        if self.default_batch_size > self.max_batch_size {
            return Err(crate::Error::InvalidArgument {
                name: "default_batch_size",
                reason: "must be <= max_batch_size",
            });
        }

        if self.max_nodes == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_nodes",
                reason: "must be positive",
            });
        }

        if self.max_partitions == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_partitions",
                reason: "must be positive",
            });
        }

        Ok(())
    }

    /// Checks a configured batch size against these limits.
    ///
    /// # Errors
    /// Returns an error if the batch size is zero or above `max_batch_size`.
    pub fn check_batch_size(&self, batch_size: u32) -> crate::Result<()> {
        if batch_size == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "batch_size",
                reason: "must be positive",
            });
        }
        if batch_size > self.max_batch_size {
            return Err(crate::Error::LimitExceeded {
                limit: "batch_size",
                max: u64::from(self.max_batch_size),
                actual: u64::from(batch_size),
            });
        }
        Ok(())
    }

    /// Checks a node count against these limits.
    ///
    /// # Errors
    /// Returns an error if the count exceeds `max_nodes`.
    pub fn check_node_count(&self, count: usize) -> crate::Result<()> {
        if count > self.max_nodes as usize {
            return Err(crate::Error::LimitExceeded {
                limit: "nodes",
                max: u64::from(self.max_nodes),
                actual: count as u64,
            });
        }
        Ok(())
    }

    /// Checks a partition count against these limits.
    ///
    /// # Errors
    /// Returns an error if the count exceeds `max_partitions`.
    pub fn check_partition_count(&self, count: usize) -> crate::Result<()> {
        if count > self.max_partitions as usize {
            return Err(crate::Error::LimitExceeded {
                limit: "partitions",
                max: u64::from(self.max_partitions),
                actual: count as u64,
            });
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}
