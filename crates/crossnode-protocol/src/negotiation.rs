//! Level-of-assurance negotiation.
//!
//! The assurance level a node publishes is an ordered list mixing notified
//! levels with non-notified ones. Legacy peers only read the first entry of
//! that list, so for them the first entry must be the highest notified
//! level. Current peers read the whole list and have no positional
//! constraint.

use crate::error::{ProtocolError, ProtocolResult};
use crate::models::{LevelOfAssurance, LoaComparison, NotifiedLevel, ProtocolGeneration};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// How a published list is interpreted for a given peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    /// Positional: the first published level is authoritative.
    Legacy,
    /// Whole-list: the highest notified level anywhere is authoritative.
    Current,
}

impl From<ProtocolGeneration> for CompatibilityMode {
    fn from(generation: ProtocolGeneration) -> Self {
        match generation {
            ProtocolGeneration::Legacy => Self::Legacy,
            ProtocolGeneration::Current => Self::Current,
        }
    }
}

impl Display for CompatibilityMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Current => f.write_str("current"),
        }
    }
}

/// Result of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NegotiationOutcome {
    pub level: LevelOfAssurance,
    pub mode: CompatibilityMode,
}

/// Highest notified level anywhere in `levels`.
#[must_use]
pub fn max_notified(levels: &[LevelOfAssurance]) -> Option<NotifiedLevel> {
    levels.iter().filter_map(LevelOfAssurance::notified).max()
}

/// Lowest notified level anywhere in `levels`.
#[must_use]
pub fn min_notified(levels: &[LevelOfAssurance]) -> Option<NotifiedLevel> {
    levels.iter().filter_map(LevelOfAssurance::notified).min()
}

/// Returns true if the first entry is the highest notified level of the list.
#[must_use]
pub fn first_is_highest_notified(published: &[LevelOfAssurance]) -> bool {
    match (published.first(), max_notified(published)) {
        (Some(first), Some(highest)) => first.notified() == Some(highest),
        _ => false,
    }
}

/// Resolves the level a published list grants to a peer in `mode`.
///
/// # Errors
///
/// - `NoNotifiedLoa` when the list has no notified level
/// - `InvalidLoa` when a legacy peer would read a first entry that is not the
///   highest notified level
pub fn negotiate(
    published: &[LevelOfAssurance],
    mode: CompatibilityMode,
) -> ProtocolResult<NegotiationOutcome> {
    let highest = max_notified(published).ok_or(ProtocolError::NoNotifiedLoa)?;

    if mode == CompatibilityMode::Legacy && !first_is_highest_notified(published) {
        let first = published
            .first()
            .map_or_else(String::new, ToString::to_string);
        return Err(ProtocolError::InvalidLoa(format!(
            "legacy peers read {first} but the highest published level is {highest}"
        )));
    }

    Ok(NegotiationOutcome {
        level: highest.into(),
        mode,
    })
}

/// Returns true if some candidate satisfies the requested levels.
///
/// A candidate satisfies a requested notified level when it is that level or
/// a higher notified level; a non-notified level is only satisfied by itself.
#[must_use]
pub fn is_equal_or_better(requested: &[LevelOfAssurance], candidates: &[LevelOfAssurance]) -> bool {
    let mut acceptable: HashSet<LevelOfAssurance> = requested.iter().cloned().collect();
    for level in requested.iter().filter_map(LevelOfAssurance::notified) {
        acceptable.extend(level.and_above().map(LevelOfAssurance::from));
    }
    candidates.iter().any(|c| acceptable.contains(c))
}

/// Returns true if both lists share a level.
#[must_use]
pub fn has_common_loa(a: &[LevelOfAssurance], b: &[LevelOfAssurance]) -> bool {
    a.iter().any(|level| b.contains(level))
}

/// Checks the shape of the levels carried by a request.
///
/// - the list is not empty
/// - a single kind of notified request uses `minimum` with exactly one level
/// - non-notified levels require `exact`
/// - a mixed list names the top-down contiguous notified levels
///   (HIGH; HIGH and SUBSTANTIAL; or all three)
pub fn validate_requested_loas(
    levels: &[LevelOfAssurance],
    comparison: LoaComparison,
) -> ProtocolResult<()> {
    if levels.is_empty() {
        return Err(ProtocolError::InvalidLoa(
            "no level of assurance requested".to_string(),
        ));
    }

    let notified: Vec<NotifiedLevel> = levels.iter().filter_map(LevelOfAssurance::notified).collect();
    let has_non_notified = notified.len() < levels.len();

    if !has_non_notified {
        if notified.len() != 1 {
            return Err(ProtocolError::InvalidLoa(
                "only one notified level may be requested".to_string(),
            ));
        }
        if comparison != LoaComparison::Minimum {
            return Err(ProtocolError::InvalidLoa(
                "a notified level must be requested with comparison minimum".to_string(),
            ));
        }
        return Ok(());
    }

    if comparison != LoaComparison::Exact {
        return Err(ProtocolError::InvalidLoa(
            "non-notified levels must be requested with comparison exact".to_string(),
        ));
    }

    let distinct: HashSet<NotifiedLevel> = notified.iter().copied().collect();
    if distinct.len() != notified.len() {
        return Err(ProtocolError::InvalidLoa(
            "notified levels are repeated".to_string(),
        ));
    }

    let expected: HashSet<NotifiedLevel> = NotifiedLevel::ALL
        .into_iter()
        .rev()
        .take(notified.len())
        .collect();
    if distinct != expected {
        return Err(ProtocolError::InvalidLoa(
            "requested notified levels must include every level from high downwards".to_string(),
        ));
    }

    Ok(())
}
