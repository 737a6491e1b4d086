//! Levels of assurance.
//!
//! Notified levels form a total order LOW < SUBSTANTIAL < HIGH. Any other
//! value is a non-notified level: it is unranked, compares equal only to
//! itself and sits below every notified level.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Namespace shared by the three notified levels.
pub const NOTIFIED_LOA_PREFIX: &str = "http://eidas.europa.eu/LoA/";

/// Error returned when a level-of-assurance value cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseLoaError {
    #[error("Level of assurance is empty")]
    Empty,

    #[error("Unknown notified level of assurance: {0}")]
    UnknownNotified(String),
}

/// One of the three notified assurance tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotifiedLevel {
    Low,
    Substantial,
    High,
}

impl NotifiedLevel {
    /// All notified levels, lowest first.
    pub const ALL: [NotifiedLevel; 3] = [Self::Low, Self::Substantial, Self::High];

    /// The URI of this level.
    #[must_use]
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Low => "http://eidas.europa.eu/LoA/low",
            Self::Substantial => "http://eidas.europa.eu/LoA/substantial",
            Self::High => "http://eidas.europa.eu/LoA/high",
        }
    }

    /// Parses a notified level from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.uri() == uri)
    }

    /// This level and every level above it, lowest first.
    pub fn and_above(self) -> impl Iterator<Item = NotifiedLevel> {
        Self::ALL.into_iter().filter(move |level| *level >= self)
    }
}

impl Display for NotifiedLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.uri())
    }
}

/// A level of assurance as published in metadata or carried in a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LevelOfAssurance {
    Notified(NotifiedLevel),
    NonNotified(String),
}

impl LevelOfAssurance {
    /// Returns true for LOW, SUBSTANTIAL and HIGH.
    #[must_use]
    pub fn is_notified(&self) -> bool {
        matches!(self, Self::Notified(_))
    }

    /// Returns the notified tier, if this is one.
    #[must_use]
    pub fn notified(&self) -> Option<NotifiedLevel> {
        match self {
            Self::Notified(level) => Some(*level),
            Self::NonNotified(_) => None,
        }
    }

    /// The URI of this level.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Notified(level) => level.uri(),
            Self::NonNotified(uri) => uri,
        }
    }
}

impl From<NotifiedLevel> for LevelOfAssurance {
    fn from(level: NotifiedLevel) -> Self {
        Self::Notified(level)
    }
}

impl FromStr for LevelOfAssurance {
    type Err = ParseLoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(ParseLoaError::Empty);
        }
        if let Some(level) = NotifiedLevel::from_uri(value) {
            return Ok(Self::Notified(level));
        }
        if value.starts_with(NOTIFIED_LOA_PREFIX) {
            return Err(ParseLoaError::UnknownNotified(value.to_string()));
        }
        Ok(Self::NonNotified(value.to_string()))
    }
}

impl TryFrom<String> for LevelOfAssurance {
    type Error = ParseLoaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LevelOfAssurance> for String {
    fn from(loa: LevelOfAssurance) -> Self {
        match loa {
            LevelOfAssurance::Notified(level) => level.uri().to_string(),
            LevelOfAssurance::NonNotified(uri) => uri,
        }
    }
}

impl Display for LevelOfAssurance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the requested levels are to be compared with the granted level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaComparison {
    #[default]
    Minimum,
    Exact,
}

/// Parses a `;` or `,` separated list of levels, keeping the order.
pub fn parse_loa_list(value: &str) -> Result<Vec<LevelOfAssurance>, ParseLoaError> {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notified_ordering() {
        assert!(NotifiedLevel::Low < NotifiedLevel::Substantial);
        assert!(NotifiedLevel::Substantial < NotifiedLevel::High);
    }

    #[test]
    fn test_and_above() {
        let above: Vec<_> = NotifiedLevel::Substantial.and_above().collect();
        assert_eq!(above, vec![NotifiedLevel::Substantial, NotifiedLevel::High]);
    }

    #[test]
    fn test_parse_notified_and_non_notified() {
        let high: LevelOfAssurance = "http://eidas.europa.eu/LoA/high".parse().unwrap();
        assert_eq!(high, LevelOfAssurance::Notified(NotifiedLevel::High));

        let custom: LevelOfAssurance = "http://service.memberstate.ms/NotNotified/LoA/low"
            .parse()
            .unwrap();
        assert!(!custom.is_notified());
    }

    #[test]
    fn test_unknown_value_in_notified_namespace_is_refused() {
        let err = "http://eidas.europa.eu/LoA/extreme"
            .parse::<LevelOfAssurance>()
            .unwrap_err();
        assert!(matches!(err, ParseLoaError::UnknownNotified(_)));
    }

    #[test]
    fn test_parse_list_keeps_order() {
        let list = parse_loa_list(
            "http://eidas.europa.eu/LoA/high; urn:nn:a ,http://eidas.europa.eu/LoA/low",
        )
        .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], NotifiedLevel::High.into());
        assert_eq!(list[1].as_str(), "urn:nn:a");
        assert_eq!(list[2], NotifiedLevel::Low.into());
    }

    #[test]
    fn test_serde_uses_uri() {
        let json = serde_json::to_string(&LevelOfAssurance::from(NotifiedLevel::Low)).unwrap();
        assert_eq!(json, "\"http://eidas.europa.eu/LoA/low\"");
        let back: LevelOfAssurance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.notified(), Some(NotifiedLevel::Low));
    }
}
