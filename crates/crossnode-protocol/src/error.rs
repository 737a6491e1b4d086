//! Protocol engine error types
//!
//! Every variant belongs to one [`ErrorCategory`]. The category decides what
//! leaves the node: validation errors produce a detailed, signed error
//! response, internal errors a generic one, security errors nothing but a
//! generic failure and a security log event.

use crate::cache::CacheError;
use crate::correlation::CorrelationError;
use crate::models::{Binding, HttpMethod, Role};
use crossnode_core::{Classified, ErrorCategory};
use thiserror::Error;

/// Result type for protocol engine operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

pub const STATUS_REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";
pub const STATUS_RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
pub const STATUS_REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";
pub const STATUS_NO_AUTHN_CONTEXT: &str = "urn:oasis:names:tc:SAML:2.0:status:NoAuthnContext";
pub const STATUS_INVALID_NAME_ID_POLICY: &str =
    "urn:oasis:names:tc:SAML:2.0:status:InvalidNameIDPolicy";
pub const STATUS_INVALID_ATTR: &str = "urn:oasis:names:tc:SAML:2.0:status:InvalidAttrNameOrValue";
pub const STATUS_REQUEST_UNSUPPORTED: &str =
    "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported";
pub const STATUS_REQUEST_VERSION_TOO_HIGH: &str =
    "urn:oasis:names:tc:SAML:2.0:status:RequestVersionTooHigh";

/// Protocol engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    // ── Validation ────────────────────────────────────────────────────────
    /// Message could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// HTTP method does not match the declared binding
    #[error("Unacceptable binding: {method} with declared binding {declared}")]
    UnacceptableBinding { method: HttpMethod, declared: String },

    /// Baseline attributes missing for a requested person type
    #[error("Missing mandatory attributes: {}", missing.join(", "))]
    MissingMandatoryAttributes { missing: Vec<String> },

    /// Representative attribute requested together with its counterpart
    #[error("Representative attribute {representative} requested with {counterpart}")]
    RepresentativeAttributeConflict {
        representative: String,
        counterpart: String,
    },

    /// A required attribute is not supported by this node
    #[error("Unsupported mandatory attribute: {0}")]
    UnsupportedMandatoryAttribute(String),

    /// An optional attribute is not supported and the policy rejects it
    #[error("Unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    #[error("Requester id is required for private sector requests")]
    MissingRequesterId,

    #[error("Invalid requester id: {0}")]
    InvalidRequesterId(String),

    /// Published list has no notified level
    #[error("No notified level of assurance published")]
    NoNotifiedLoa,

    #[error("Invalid level of assurance: {0}")]
    InvalidLoa(String),

    #[error("Unsupported name identifier format: {0}")]
    InvalidNameIdFormat(String),

    #[error("No common protocol version: local {local:?}, remote {remote:?}")]
    ProtocolVersionUnsupported {
        local: Vec<String>,
        remote: Vec<String>,
    },

    #[error("Request destination not served by this node: {0}")]
    InvalidDestination(String),

    #[error("Assertion consumer endpoint mismatch: expected {expected}, got {actual}")]
    InvalidConsumerEndpoint { expected: String, actual: String },

    #[error("Response country {actual} does not match citizen country {expected}")]
    InvalidResponseCountry { expected: String, actual: String },

    /// Granted level is lower than requested
    #[error("Response level of assurance does not satisfy the request: {0}")]
    InvalidResponseLoa(String),

    /// Granted level was never published by the responder
    #[error("Response level of assurance not published by responder: {0}")]
    UnpublishedResponseLoa(String),

    #[error("Invalid identifier format: {0}")]
    InvalidIdentifierFormat(String),

    // ── Security ──────────────────────────────────────────────────────────
    #[error("Replay detected for message {message_id} ({scope})")]
    Replay { message_id: String, scope: String },

    /// Issue instant outside the accepted validity window
    #[error("Message {message_id} is outside its validity window")]
    MessageExpired { message_id: String },

    #[error("Signature validation failed: {0}")]
    InvalidSignature(String),

    /// No live correlation entry for the response
    #[error("Invalid or expired session: {0}")]
    InvalidSession(String),

    #[error("Audience mismatch: expected {expected}, got {actual}")]
    InvalidAudience { expected: String, actual: String },

    /// Response issued by a peer other than the one the request went to
    #[error("Response issued by {actual}, request was sent to {expected}")]
    UnexpectedResponder { expected: String, actual: String },

    #[error("Untrusted metadata for {entity_id}: {reason}")]
    UntrustedMetadata { entity_id: String, reason: String },

    #[error("Metadata of {entity_id} has no {role} role")]
    DescriptorRoleNotFound { entity_id: String, role: Role },

    // ── Configuration ─────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Internal ──────────────────────────────────────────────────────────
    /// Metadata fetch failure or collaborator timeout
    #[error("Unreachable: {resource}: {reason}")]
    Unreachable { resource: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    pub fn unacceptable_binding(method: HttpMethod, declared: Option<Binding>) -> Self {
        Self::UnacceptableBinding {
            method,
            declared: declared.map_or_else(|| "none".to_string(), |b| b.to_string()),
        }
    }

    /// Top-level status code URN used in error responses.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => STATUS_REQUESTER,
            _ => STATUS_RESPONDER,
        }
    }

    /// Second-level status code URN, for validation failures only.
    #[must_use]
    pub fn sub_status_code(&self) -> Option<&'static str> {
        match self {
            Self::MissingMandatoryAttributes { .. }
            | Self::RepresentativeAttributeConflict { .. }
            | Self::UnsupportedMandatoryAttribute(_)
            | Self::UnsupportedAttribute(_) => Some(STATUS_INVALID_ATTR),
            Self::NoNotifiedLoa
            | Self::InvalidLoa(_)
            | Self::InvalidResponseLoa(_)
            | Self::UnpublishedResponseLoa(_) => Some(STATUS_NO_AUTHN_CONTEXT),
            Self::InvalidNameIdFormat(_) => Some(STATUS_INVALID_NAME_ID_POLICY),
            Self::ProtocolVersionUnsupported { .. } => Some(STATUS_REQUEST_VERSION_TOO_HIGH),
            Self::UnacceptableBinding { .. } | Self::MalformedMessage(_) => {
                Some(STATUS_REQUEST_UNSUPPORTED)
            }
            Self::MissingRequesterId
            | Self::InvalidRequesterId(_)
            | Self::InvalidDestination(_)
            | Self::InvalidConsumerEndpoint { .. }
            | Self::InvalidResponseCountry { .. }
            | Self::InvalidIdentifierFormat(_) => Some(STATUS_REQUEST_DENIED),
            _ => None,
        }
    }

    /// Localization key carried as the status message of error responses.
    #[must_use]
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::MalformedMessage(_) => "message.malformed",
            Self::UnacceptableBinding { .. } => "binding.unacceptable",
            Self::MissingMandatoryAttributes { .. } => "attributes.mandatory.missing",
            Self::RepresentativeAttributeConflict { .. } => "attributes.representative.conflict",
            Self::UnsupportedMandatoryAttribute(_) => "attributes.mandatory.unsupported",
            Self::UnsupportedAttribute(_) => "attributes.unsupported",
            Self::MissingRequesterId => "requester_id.missing",
            Self::InvalidRequesterId(_) => "requester_id.invalid",
            Self::NoNotifiedLoa => "loa.notified.missing",
            Self::InvalidLoa(_) => "loa.invalid",
            Self::InvalidNameIdFormat(_) => "name_id_format.invalid",
            Self::ProtocolVersionUnsupported { .. } => "protocol_version.unsupported",
            Self::InvalidDestination(_) => "destination.invalid",
            Self::InvalidConsumerEndpoint { .. } => "consumer_endpoint.invalid",
            Self::InvalidResponseCountry { .. } => "response.country.invalid",
            Self::InvalidResponseLoa(_) => "response.loa.invalid",
            Self::UnpublishedResponseLoa(_) => "response.loa.unpublished",
            Self::InvalidIdentifierFormat(_) => "response.identifier.invalid",
            Self::Replay { .. }
            | Self::MessageExpired { .. }
            | Self::InvalidSignature(_)
            | Self::InvalidSession(_)
            | Self::InvalidAudience { .. }
            | Self::UnexpectedResponder { .. }
            | Self::UntrustedMetadata { .. }
            | Self::DescriptorRoleNotFound { .. } => "security.rejected",
            Self::Configuration(_) | Self::Unreachable { .. } | Self::Internal(_) => {
                "internal.error"
            }
        }
    }

    /// Message that may be shown to a remote party.
    ///
    /// Only validation errors keep their detail.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::Validation => self.to_string(),
            ErrorCategory::Security => "The message was rejected".to_string(),
            ErrorCategory::Configuration | ErrorCategory::Internal => {
                "An internal error occurred".to_string()
            }
        }
    }
}

impl Classified for ProtocolError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedMessage(_)
            | Self::UnacceptableBinding { .. }
            | Self::MissingMandatoryAttributes { .. }
            | Self::RepresentativeAttributeConflict { .. }
            | Self::UnsupportedMandatoryAttribute(_)
            | Self::UnsupportedAttribute(_)
            | Self::MissingRequesterId
            | Self::InvalidRequesterId(_)
            | Self::NoNotifiedLoa
            | Self::InvalidLoa(_)
            | Self::InvalidNameIdFormat(_)
            | Self::ProtocolVersionUnsupported { .. }
            | Self::InvalidDestination(_)
            | Self::InvalidConsumerEndpoint { .. }
            | Self::InvalidResponseCountry { .. }
            | Self::InvalidResponseLoa(_)
            | Self::UnpublishedResponseLoa(_)
            | Self::InvalidIdentifierFormat(_) => ErrorCategory::Validation,
            Self::Replay { .. }
            | Self::MessageExpired { .. }
            | Self::InvalidSignature(_)
            | Self::InvalidSession(_)
            | Self::InvalidAudience { .. }
            | Self::UnexpectedResponder { .. }
            | Self::UntrustedMetadata { .. }
            | Self::DescriptorRoleNotFound { .. } => ErrorCategory::Security,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Unreachable { .. } | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedMessage(_) => "malformed_message",
            Self::UnacceptableBinding { .. } => "unacceptable_binding",
            Self::MissingMandatoryAttributes { .. } => "missing_mandatory_attributes",
            Self::RepresentativeAttributeConflict { .. } => "representative_attribute_conflict",
            Self::UnsupportedMandatoryAttribute(_) => "unsupported_mandatory_attribute",
            Self::UnsupportedAttribute(_) => "unsupported_attribute",
            Self::MissingRequesterId => "missing_requester_id",
            Self::InvalidRequesterId(_) => "invalid_requester_id",
            Self::NoNotifiedLoa => "no_notified_loa",
            Self::InvalidLoa(_) => "invalid_loa",
            Self::InvalidNameIdFormat(_) => "invalid_name_id_format",
            Self::ProtocolVersionUnsupported { .. } => "protocol_version_unsupported",
            Self::InvalidDestination(_) => "invalid_destination",
            Self::InvalidConsumerEndpoint { .. } => "invalid_consumer_endpoint",
            Self::InvalidResponseCountry { .. } => "invalid_response_country",
            Self::InvalidResponseLoa(_) => "invalid_response_loa",
            Self::UnpublishedResponseLoa(_) => "unpublished_response_loa",
            Self::InvalidIdentifierFormat(_) => "invalid_identifier_format",
            Self::Replay { .. } => "replay_detected",
            Self::MessageExpired { .. } => "message_expired",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::InvalidSession(_) => "invalid_session",
            Self::InvalidAudience { .. } => "invalid_audience",
            Self::UnexpectedResponder { .. } => "unexpected_responder",
            Self::UntrustedMetadata { .. } => "untrusted_metadata",
            Self::DescriptorRoleNotFound { .. } => "descriptor_role_not_found",
            Self::Configuration(_) => "configuration_error",
            Self::Unreachable { .. } => "unreachable",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<CacheError> for ProtocolError {
    fn from(err: CacheError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<CorrelationError> for ProtocolError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::NotFound(id) => Self::InvalidSession(id),
            CorrelationError::PeerMismatch {
                expected, actual, ..
            } => Self::UnexpectedResponder { expected, actual },
            CorrelationError::Duplicate(_) | CorrelationError::Backend(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}
