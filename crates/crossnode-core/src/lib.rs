//! crossnode Core Library
//!
//! Shared types and traits for the crossnode validation engine.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (MessageId, EntityId, CountryCode)
//! - [`error`] - Error categories shared by every crossnode crate
//!
//! # Example
//!
//! ```
//! use crossnode_core::{CountryCode, EntityId, MessageId};
//!
//! let id = MessageId::generate();
//! assert!(id.as_str().starts_with('_'));
//!
//! let issuer: EntityId = "https://sp.example/metadata".parse().unwrap();
//! let country: CountryCode = "BE".parse().unwrap();
//! assert_eq!(country.as_str(), "BE");
//! # let _ = issuer;
//! ```

pub mod error;
pub mod ids;

pub use error::{Classified, ErrorCategory};
pub use ids::{CountryCode, EntityId, MessageId, ParseIdError, MAX_IDENTIFIER_LENGTH};
