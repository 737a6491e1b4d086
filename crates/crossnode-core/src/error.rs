//! Error Categories
//!
//! Every failure raised by the engine falls into exactly one category. The
//! category drives what a caller is allowed to do with the failure: a
//! validation failure is answered with a signed protocol error response, a
//! security failure only produces a generic error and a security log event,
//! a configuration failure prevents startup and an internal failure is
//! answered generically with the detail kept in local logs.
//!
//! # Example
//!
//! ```
//! use crossnode_core::{Classified, ErrorCategory};
//!
//! struct Timeout;
//!
//! impl Classified for Timeout {
//!     fn category(&self) -> ErrorCategory {
//!         ErrorCategory::Internal
//!     }
//!
//!     fn error_code(&self) -> &'static str {
//!         "timeout"
//!     }
//! }
//!
//! assert!(!Timeout.is_security());
//! assert!(Timeout.discloses_generic_response());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Category of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Recoverable; a detailed, signed error response may be sent back.
    Validation,
    /// Possible attack; logged as a security event, only a generic failure is exposed.
    Security,
    /// Fatal at initialization.
    Configuration,
    /// Collaborator or engine failure; generic response, detail in local logs only.
    Internal,
}

impl ErrorCategory {
    /// Returns the lowercase label used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Security => "security",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every error that crosses a crate boundary.
pub trait Classified {
    /// The category of this failure.
    fn category(&self) -> ErrorCategory;

    /// Stable snake_case code, safe to log and to return to callers.
    fn error_code(&self) -> &'static str;

    /// Returns true when this failure must be reported as a security event.
    fn is_security(&self) -> bool {
        self.category() == ErrorCategory::Security
    }

    /// Returns true when a detailed protocol error response may be produced.
    fn discloses_detail(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// Returns true when only a generic protocol error response may be produced.
    fn discloses_generic_response(&self) -> bool {
        self.category() == ErrorCategory::Internal
    }
}
