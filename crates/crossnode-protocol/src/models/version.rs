//! Protocol versions and generations.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A protocol version this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V1_1,
    V1_2,
}

/// Behavioural family of a protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolGeneration {
    Legacy,
    Current,
}

impl ProtocolVersion {
    /// Versions in ascending order.
    pub const ALL: [ProtocolVersion; 2] = [Self::V1_1, Self::V1_2];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1_1 => "1.1",
            Self::V1_2 => "1.2",
        }
    }

    /// Parses a version string. Unrecognized strings yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == value.trim())
    }

    #[must_use]
    pub fn generation(&self) -> ProtocolGeneration {
        match self {
            Self::V1_1 => ProtocolGeneration::Legacy,
            Self::V1_2 => ProtocolGeneration::Current,
        }
    }
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for ProtocolGeneration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Current => f.write_str("current"),
        }
    }
}

/// Recognized versions among `advertised`, highest first, without duplicates.
#[must_use]
pub fn recognized_versions<S: AsRef<str>>(advertised: &[S]) -> Vec<ProtocolVersion> {
    let mut versions: Vec<ProtocolVersion> = advertised
        .iter()
        .filter_map(|v| ProtocolVersion::parse(v.as_ref()))
        .collect();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.dedup();
    versions
}

/// Highest recognized version among `advertised`.
#[must_use]
pub fn highest_version<S: AsRef<str>>(advertised: &[S]) -> Option<ProtocolVersion> {
    recognized_versions(advertised).into_iter().next()
}

/// Generation of a peer from the versions it advertises.
///
/// A peer that advertises no recognized version is treated as legacy.
#[must_use]
pub fn generation_of<S: AsRef<str>>(advertised: &[S]) -> ProtocolGeneration {
    highest_version(advertised).map_or(ProtocolGeneration::Legacy, |v| v.generation())
}

/// Versions present in both lists, highest first.
#[must_use]
pub fn common_versions<A: AsRef<str>, B: AsRef<str>>(
    local: &[A],
    remote: &[B],
) -> Vec<ProtocolVersion> {
    let remote = recognized_versions(remote);
    recognized_versions(local)
        .into_iter()
        .filter(|v| remote.contains(v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_versions_are_ignored() {
        assert_eq!(recognized_versions(&["23.3", "1.1"]), vec![ProtocolVersion::V1_1]);
        assert_eq!(highest_version(&["foo"]), None);
    }

    #[test]
    fn test_generation_of() {
        assert_eq!(generation_of(&["1.1"]), ProtocolGeneration::Legacy);
        assert_eq!(generation_of(&["1.1", "1.2"]), ProtocolGeneration::Current);
        assert_eq!(generation_of::<&str>(&[]), ProtocolGeneration::Legacy);
    }

    #[test]
    fn test_common_versions() {
        assert_eq!(
            common_versions(&["1.2", "1.1"], &["1.1"]),
            vec![ProtocolVersion::V1_1]
        );
        assert!(common_versions(&["1.2"], &["1.1", "2.0"]).is_empty());
    }
}
