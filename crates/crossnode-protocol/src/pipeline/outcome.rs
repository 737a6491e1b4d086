//! Pipeline inputs and outcomes.

use crate::codec::HttpMethod;
use crate::error::ProtocolError;
use crate::metadata::VerifiedDescriptor;
use crate::models::{
    AuthenticationRequest, AuthenticationResponse, Binding, ProtocolGeneration, ResponseStatus,
};
use crate::negotiation::NegotiationOutcome;
use crossnode_core::{Classified, EntityId, ErrorCategory, MessageId};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Pipeline stage reached by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Received,
    MetadataResolved,
    VersionNegotiated,
    BindingChecked,
    ReplayChecked,
    SignatureVerified,
    AttributesValidated,
    SectorPolicyChecked,
    #[serde(rename = "LoANegotiated")]
    LoaNegotiated,
    Correlated,
    AudienceValidated,
    ResponseChecked,
    Accepted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::MetadataResolved => "MetadataResolved",
            Self::VersionNegotiated => "VersionNegotiated",
            Self::BindingChecked => "BindingChecked",
            Self::ReplayChecked => "ReplayChecked",
            Self::SignatureVerified => "SignatureVerified",
            Self::AttributesValidated => "AttributesValidated",
            Self::SectorPolicyChecked => "SectorPolicyChecked",
            Self::LoaNegotiated => "LoANegotiated",
            Self::Correlated => "Correlated",
            Self::AudienceValidated => "AudienceValidated",
            Self::ResponseChecked => "ResponseChecked",
            Self::Accepted => "Accepted",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded message as received from the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub method: HttpMethod,
    pub payload: Vec<u8>,
    /// Address of the sending party, kept with correlation entries.
    pub remote_address: Option<String>,
}

impl InboundMessage {
    pub fn new(method: HttpMethod, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            method,
            payload: payload.into(),
            remote_address: None,
        }
    }

    #[must_use]
    pub fn from_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }
}

/// Where an error response for a refused exchange is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponseContext {
    /// Identifier of the request being answered.
    pub in_response_to: MessageId,
    /// Issuer of that request, audience of the error response.
    pub recipient: EntityId,
    /// Assertion consumer endpoint of the recipient.
    pub destination: Option<String>,
    pub binding: Option<Binding>,
    pub relay_state: Option<String>,
}

impl ErrorResponseContext {
    pub fn for_request(request: &AuthenticationRequest) -> Self {
        Self {
            in_response_to: request.id().clone(),
            recipient: request.issuer().clone(),
            destination: request.assertion_consumer_url().map(String::from),
            binding: request.binding(),
            relay_state: request.relay_state().map(String::from),
        }
    }

    #[must_use]
    pub fn with_destination(mut self, destination: Option<String>) -> Self {
        self.destination = destination;
        self
    }
}

/// A message refused by the pipeline.
#[derive(Debug, Clone, Error)]
#[error("rejected at {stage}: {error}")]
pub struct Rejection {
    pub stage: Stage,
    pub error: ProtocolError,
    context: Option<ErrorResponseContext>,
}

impl Rejection {
    /// Security and configuration failures never keep a response context.
    pub(crate) fn new(
        stage: Stage,
        error: ProtocolError,
        context: Option<ErrorResponseContext>,
    ) -> Self {
        let context = match error.category() {
            ErrorCategory::Validation | ErrorCategory::Internal => context,
            ErrorCategory::Security | ErrorCategory::Configuration => None,
        };
        Self {
            stage,
            error,
            context,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }

    pub fn context(&self) -> Option<&ErrorResponseContext> {
        self.context.as_ref()
    }

    /// The failure response owed to the requester, if any.
    ///
    /// Validation failures carry their status codes and message key.
    /// Internal failures get a generic responder status.
    #[must_use]
    pub fn error_response(&self, issuer: &EntityId) -> Option<AuthenticationResponse> {
        let context = self.context.as_ref()?;

        let status = match self.category() {
            ErrorCategory::Validation => ResponseStatus::Failure {
                status_code: self.error.status_code().to_string(),
                sub_code: self.error.sub_status_code().map(String::from),
                message: Some(self.error.message_key().to_string()),
            },
            ErrorCategory::Internal => ResponseStatus::Failure {
                status_code: self.error.status_code().to_string(),
                sub_code: None,
                message: Some(self.error.public_message()),
            },
            ErrorCategory::Security | ErrorCategory::Configuration => return None,
        };

        Some(
            AuthenticationResponse::builder(
                MessageId::generate(),
                context.in_response_to.clone(),
                issuer.clone(),
                status,
            )
            .destination(context.destination.clone())
            .audience(Some(context.recipient.to_string()))
            .binding(context.binding)
            .relay_state(context.relay_state.clone())
            .build(),
        )
    }
}

/// An inbound request that passed every stage.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// The request with unsupported optional attributes removed, consumer
    /// endpoint filled from metadata and the resolved level attached.
    pub request: AuthenticationRequest,
    pub issuer: VerifiedDescriptor,
    pub negotiation: NegotiationOutcome,
}

/// An outbound request ready to be sent.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub request: AuthenticationRequest,
    /// Signed, encoded request.
    pub payload: Vec<u8>,
    /// Endpoint of the destination the payload is sent to.
    pub endpoint: String,
    pub generation: ProtocolGeneration,
    pub destination: VerifiedDescriptor,
}

/// An inbound response matched with the request it answers.
#[derive(Debug, Clone)]
pub struct ValidatedResponse {
    pub response: AuthenticationResponse,
    /// The original request, consumed from the correlation store.
    pub request: AuthenticationRequest,
    pub remote_address: Option<String>,
    pub responder: VerifiedDescriptor,
}
