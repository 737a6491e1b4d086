//! Authentication response model.

use super::binding::Binding;
use super::loa::LevelOfAssurance;
use chrono::{DateTime, Utc};
use crossnode_core::{CountryCode, EntityId, MessageId};
use serde::{Deserialize, Serialize};

/// Top-level status code of a successful response.
pub const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Outcome carried by a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Failure {
        /// Top-level status code URN.
        status_code: String,
        /// Second-level status code URN.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_code: Option<String>,
        /// Status message, a localization key for locally produced failures.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ResponseStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// An attribute returned by an identity source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// An authentication response travelling through the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    id: MessageId,
    in_response_to: MessageId,
    issuer: EntityId,
    status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level_of_assurance: Option<LevelOfAssurance>,
    #[serde(default)]
    attributes: Vec<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    country: Option<CountryCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binding: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relay_state: Option<String>,
    #[serde(default = "Utc::now")]
    issued_at: DateTime<Utc>,
}

impl AuthenticationResponse {
    pub fn builder(
        id: MessageId,
        in_response_to: MessageId,
        issuer: EntityId,
        status: ResponseStatus,
    ) -> AuthenticationResponseBuilder {
        AuthenticationResponseBuilder {
            inner: Self {
                id,
                in_response_to,
                issuer,
                status,
                destination: None,
                level_of_assurance: None,
                attributes: Vec::new(),
                audience: None,
                origin_ip: None,
                country: None,
                binding: None,
                relay_state: None,
                issued_at: Utc::now(),
            },
        }
    }

    #[must_use]
    pub fn to_builder(&self) -> AuthenticationResponseBuilder {
        AuthenticationResponseBuilder {
            inner: self.clone(),
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn in_response_to(&self) -> &MessageId {
        &self.in_response_to
    }

    pub fn issuer(&self) -> &EntityId {
        &self.issuer
    }

    pub fn status(&self) -> &ResponseStatus {
        &self.status
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Level the identity source authenticated the citizen at.
    pub fn level_of_assurance(&self) -> Option<&LevelOfAssurance> {
        self.level_of_assurance.as_ref()
    }

    pub fn attributes(&self) -> &[AttributeValue] {
        &self.attributes
    }

    /// Values of an attribute, empty when it was not returned.
    pub fn attribute_values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.values.as_slice())
            .unwrap_or_default()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn origin_ip(&self) -> Option<&str> {
        self.origin_ip.as_deref()
    }

    /// Country the citizen was authenticated in.
    pub fn country(&self) -> Option<&CountryCode> {
        self.country.as_ref()
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub fn relay_state(&self) -> Option<&str> {
        self.relay_state.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Builder for [`AuthenticationResponse`].
#[derive(Debug, Clone)]
#[must_use]
pub struct AuthenticationResponseBuilder {
    inner: AuthenticationResponse,
}

impl AuthenticationResponseBuilder {
    pub fn destination(mut self, destination: Option<String>) -> Self {
        self.inner.destination = destination;
        self
    }

    pub fn level_of_assurance(mut self, level: Option<LevelOfAssurance>) -> Self {
        self.inner.level_of_assurance = level;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.inner.attributes.push(AttributeValue {
            name: name.into(),
            values,
        });
        self
    }

    pub fn audience(mut self, audience: Option<String>) -> Self {
        self.inner.audience = audience;
        self
    }

    pub fn origin_ip(mut self, origin_ip: Option<String>) -> Self {
        self.inner.origin_ip = origin_ip;
        self
    }

    pub fn country(mut self, country: Option<CountryCode>) -> Self {
        self.inner.country = country;
        self
    }

    pub fn binding(mut self, binding: Option<Binding>) -> Self {
        self.inner.binding = binding;
        self
    }

    pub fn relay_state(mut self, relay_state: Option<String>) -> Self {
        self.inner.relay_state = relay_state;
        self
    }

    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.inner.issued_at = issued_at;
        self
    }

    pub fn build(self) -> AuthenticationResponse {
        self.inner
    }
}
