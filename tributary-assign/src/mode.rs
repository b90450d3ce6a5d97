//! Assignment modes.

use std::fmt;
use std::str::FromStr;

use crate::error::AssignmentError;

/// How stream partitions are spread over the nodes of the consuming service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssignmentMode {
    /// Maps 1..n partitions to each node.
    ///
    /// Fails when there are more nodes than partitions.
    #[default]
    SafeDistribute,

    /// Maps 1..n partitions to each node.
    ///
    /// When there are more nodes than partitions, the extra nodes own nothing.
    Distribute,

    /// Maps exactly one partition to each node.
    ///
    /// Requires the node count to equal the partition count.
    OneToOne,

    /// Maps one explicitly configured partition to this node.
    Single,
}

impl AssignmentMode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::SafeDistribute,
        Self::Distribute,
        Self::OneToOne,
        Self::Single,
    ];

    /// Returns the canonical kebab-case name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SafeDistribute => "safe-distribute",
            Self::Distribute => "distribute",
            Self::OneToOne => "one-to-one",
            Self::Single => "single",
        }
    }

    /// Returns true if this mode derives ownership from the node rank.
    #[must_use]
    pub const fn uses_rank(self) -> bool {
        !matches!(self, Self::Single)
    }
}

impl fmt::Display for AssignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentMode {
    type Err = AssignmentError;

    /// Parses a mode name. Case, `-` and `_` are ignored, so
    /// `SafeDistribute`, `safe-distribute` and `SAFE_DISTRIBUTE` all match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "safedistribute" => Ok(Self::SafeDistribute),
            "distribute" => Ok(Self::Distribute),
            "onetoone" => Ok(Self::OneToOne),
            "single" => Ok(Self::Single),
            _ => Err(AssignmentError::UnknownMode {
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(AssignmentMode::default(), AssignmentMode::SafeDistribute);
    }

    #[test]
    fn test_parse_round_trips_display() {
        for mode in AssignmentMode::ALL {
            assert_eq!(mode.to_string().parse::<AssignmentMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(
            "SafeDistribute".parse::<AssignmentMode>().unwrap(),
            AssignmentMode::SafeDistribute
        );
        assert_eq!(
            "ONE_TO_ONE".parse::<AssignmentMode>().unwrap(),
            AssignmentMode::OneToOne
        );
    }

    #[test]
    fn test_parse_unknown_mode() {
        let err = "round-robin".parse::<AssignmentMode>().unwrap_err();
        assert_eq!(
            err,
            AssignmentError::UnknownMode {
                name: "round-robin".to_string()
            }
        );
    }
}
