//! Strongly Typed Identifiers
//!
//! Protocol messages, trust entities and countries are all plain strings on
//! the wire. Wrapping them in newtypes keeps a message identifier from being
//! passed where an entity identifier is expected, and guarantees that every
//! value was validated once at the edge.
//!
//! # Example
//!
//! ```
//! use crossnode_core::{EntityId, MessageId};
//!
//! fn lookup(issuer: &EntityId) -> String {
//!     issuer.to_string()
//! }
//!
//! let issuer: EntityId = "https://sp.example/metadata".parse().unwrap();
//! let _id = MessageId::generate();
//! assert_eq!(lookup(&issuer), "https://sp.example/metadata");
//! // lookup(&_id); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for identifier parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of identifier that failed to parse
    pub id_type: &'static str,
    /// Why the value was refused
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed, string-backed identifier.
///
/// The validator receives the trimmed input and returns an error message
/// when the value is refused.
macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident, $validate:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let value = s.trim();
                let validate: fn(&str) -> std::result::Result<(), String> = $validate;
                validate(value).map_err(|message| ParseIdError {
                    id_type: stringify!($name),
                    message,
                })?;
                Ok(Self(value.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Longest identifier accepted from a remote party.
pub const MAX_IDENTIFIER_LENGTH: usize = 1024;

fn validate_token(value: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("value is empty".to_string());
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(format!("longer than {MAX_IDENTIFIER_LENGTH} characters"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err("contains whitespace".to_string());
    }
    Ok(())
}

fn validate_country(value: &str) -> std::result::Result<(), String> {
    if value.len() == 2 && value.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a two-letter uppercase country code"))
    }
}

define_string_id!(
    /// Identifier of a protocol message (request or response).
    ///
    /// Remote parties choose their own identifiers, so any non-empty token is
    /// accepted. Locally generated identifiers start with an underscore so
    /// they are valid XML IDs.
    ///
    /// # Example
    ///
    /// ```
    /// use crossnode_core::MessageId;
    ///
    /// let id: MessageId = "_4f2a".parse().unwrap();
    /// assert_eq!(id.as_str(), "_4f2a");
    /// assert!("".parse::<MessageId>().is_err());
    /// ```
    MessageId,
    validate_token
);

define_string_id!(
    /// Identifier of a trust entity, usually the URL of its metadata.
    EntityId,
    validate_token
);

define_string_id!(
    /// Two-letter uppercase country code (ISO 3166-1 alpha-2 style).
    ///
    /// # Example
    ///
    /// ```
    /// use crossnode_core::CountryCode;
    ///
    /// assert!("ES".parse::<CountryCode>().is_ok());
    /// assert!("es".parse::<CountryCode>().is_err());
    /// assert!("ESP".parse::<CountryCode>().is_err());
    /// ```
    CountryCode,
    validate_country
);

impl MessageId {
    /// Generates a fresh identifier for a locally issued message.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("_{}", Uuid::new_v4().simple()))
    }
}
