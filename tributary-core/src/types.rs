//! Strongly-typed identifiers for Tributary entities.
//!
//! Partition ids, node ids and offsets are all opaque strings handed to us by
//! external collaborators. Wrapping them keeps a `NodeId` from being passed
//! where a `PartitionId` is expected. Ordering is plain byte-wise (ordinal)
//! string ordering, which is what every node must agree on for assignment.

use std::borrow::Borrow;
use std::fmt;

/// Macro to generate strongly-typed string wrappers.
///
/// Each name type wraps a `String` and provides:
/// - Type safety (can't mix `NodeId` with `PartitionId`)
/// - Ordinal `Ord`, so sorting is identical on every node
/// - Debug/Display formatting
macro_rules! define_name {
    ($name:ident, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new value from anything string-like.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the raw string value.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the underlying string is empty.
            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consumes the wrapper and returns the raw string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> Self {
                name.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

// Stream and cluster identification.
define_name!(PartitionId, "partition", "Identifier of a stream partition.");
define_name!(NodeId, "node", "Identifier of one running shard of the consuming service.");

// Read positions.
define_name!(
    Offset,
    "offset",
    "Opaque cursor into a partition. Empty means \"never checkpointed\"."
);

/// Fencing token used to invalidate stale readers of a partition.
///
/// The listener never interprets the value, it only forwards it to the broker
/// when opening a partition session.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Epoch(u64);

impl Epoch {
    /// Creates a new epoch from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch({})", self.0)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch-{}", self.0)
    }
}

impl From<u64> for Epoch {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}
