//! Authentication request model.
//!
//! A request is immutable once built. Pipeline stages never mutate it: a
//! stage that normalizes a request derives a new value through
//! [`AuthenticationRequest::to_builder`].

use super::binding::Binding;
use super::loa::{LevelOfAssurance, LoaComparison};
use chrono::{DateTime, Utc};
use crossnode_core::{CountryCode, EntityId, MessageId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Name-identifier format used when a legacy peer leaves it unspecified.
pub const NAME_ID_FORMAT_UNSPECIFIED: &str =
    "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";
pub const NAME_ID_FORMAT_PERSISTENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";
pub const NAME_ID_FORMAT_TRANSIENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:transient";

/// Sector of the relying party behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectorType {
    Public,
    Private,
}

impl Display for SectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

impl FromStr for SectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown sector type: {other}")),
        }
    }
}

/// An attribute asked for by a relying party.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// Attribute name URI.
    pub name: String,
    /// Whether the relying party cannot proceed without it.
    #[serde(default)]
    pub required: bool,
}

impl RequestedAttribute {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// An authentication request travelling through the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    id: MessageId,
    issuer: EntityId,
    destination: String,
    citizen_country: CountryCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin_country: Option<CountryCode>,
    #[serde(default)]
    requested_attributes: Vec<RequestedAttribute>,
    #[serde(default)]
    levels_of_assurance: Vec<LevelOfAssurance>,
    #[serde(default)]
    loa_comparison: LoaComparison,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sector_type: Option<SectorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requester_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name_id_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assertion_consumer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binding: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relay_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protocol_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_name: Option<String>,
    #[serde(default = "Utc::now")]
    issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_loa: Option<LevelOfAssurance>,
}

impl AuthenticationRequest {
    /// Starts building a request with its mandatory fields.
    pub fn builder(
        id: MessageId,
        issuer: EntityId,
        destination: impl Into<String>,
        citizen_country: CountryCode,
    ) -> AuthenticationRequestBuilder {
        AuthenticationRequestBuilder {
            inner: Self {
                id,
                issuer,
                destination: destination.into(),
                citizen_country,
                origin_country: None,
                requested_attributes: Vec::new(),
                levels_of_assurance: Vec::new(),
                loa_comparison: LoaComparison::default(),
                sector_type: None,
                requester_id: None,
                name_id_format: None,
                assertion_consumer_url: None,
                binding: None,
                relay_state: None,
                protocol_version: None,
                provider_name: None,
                issued_at: Utc::now(),
                resolved_loa: None,
            },
        }
    }

    /// Returns a builder seeded with this request, for deriving a new value.
    #[must_use]
    pub fn to_builder(&self) -> AuthenticationRequestBuilder {
        AuthenticationRequestBuilder {
            inner: self.clone(),
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn issuer(&self) -> &EntityId {
        &self.issuer
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn citizen_country(&self) -> &CountryCode {
        &self.citizen_country
    }

    /// Country of the node that sent the request, when declared.
    pub fn origin_country(&self) -> Option<&CountryCode> {
        self.origin_country.as_ref()
    }

    pub fn requested_attributes(&self) -> &[RequestedAttribute] {
        &self.requested_attributes
    }

    /// Requested levels, minimum level first.
    pub fn levels_of_assurance(&self) -> &[LevelOfAssurance] {
        &self.levels_of_assurance
    }

    pub fn loa_comparison(&self) -> LoaComparison {
        self.loa_comparison
    }

    pub fn sector_type(&self) -> Option<SectorType> {
        self.sector_type
    }

    pub fn requester_id(&self) -> Option<&str> {
        self.requester_id.as_deref()
    }

    pub fn name_id_format(&self) -> Option<&str> {
        self.name_id_format.as_deref()
    }

    pub fn assertion_consumer_url(&self) -> Option<&str> {
        self.assertion_consumer_url.as_deref()
    }

    pub fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub fn relay_state(&self) -> Option<&str> {
        self.relay_state.as_deref()
    }

    /// Protocol version the issuer declared in the message.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider_name.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Level attached by negotiation, absent until the request is accepted.
    pub fn resolved_loa(&self) -> Option<&LevelOfAssurance> {
        self.resolved_loa.as_ref()
    }

    /// Returns true if an attribute with this name is requested.
    pub fn requests(&self, name: &str) -> bool {
        self.requested_attributes.iter().any(|a| a.name == name)
    }
}

/// Builder for [`AuthenticationRequest`].
#[derive(Debug, Clone)]
#[must_use]
pub struct AuthenticationRequestBuilder {
    inner: AuthenticationRequest,
}

impl AuthenticationRequestBuilder {
    pub fn id(mut self, id: MessageId) -> Self {
        self.inner.id = id;
        self
    }

    pub fn issuer(mut self, issuer: EntityId) -> Self {
        self.inner.issuer = issuer;
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.inner.destination = destination.into();
        self
    }

    pub fn origin_country(mut self, country: Option<CountryCode>) -> Self {
        self.inner.origin_country = country;
        self
    }

    pub fn attribute(mut self, attribute: RequestedAttribute) -> Self {
        self.inner.requested_attributes.push(attribute);
        self
    }

    pub fn attributes(mut self, attributes: Vec<RequestedAttribute>) -> Self {
        self.inner.requested_attributes = attributes;
        self
    }

    pub fn levels_of_assurance(mut self, levels: Vec<LevelOfAssurance>) -> Self {
        self.inner.levels_of_assurance = levels;
        self
    }

    pub fn loa_comparison(mut self, comparison: LoaComparison) -> Self {
        self.inner.loa_comparison = comparison;
        self
    }

    pub fn sector_type(mut self, sector: Option<SectorType>) -> Self {
        self.inner.sector_type = sector;
        self
    }

    pub fn requester_id(mut self, requester_id: Option<String>) -> Self {
        self.inner.requester_id = requester_id;
        self
    }

    pub fn name_id_format(mut self, format: Option<String>) -> Self {
        self.inner.name_id_format = format;
        self
    }

    pub fn assertion_consumer_url(mut self, url: Option<String>) -> Self {
        self.inner.assertion_consumer_url = url;
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

    pub fn protocol_version(mut self, version: Option<String>) -> Self {
        self.inner.protocol_version = version;
        self
    }

    pub fn provider_name(mut self, name: Option<String>) -> Self {
        self.inner.provider_name = name;
        self
    }

    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.inner.issued_at = issued_at;
        self
    }

    pub fn resolved_loa(mut self, level: Option<LevelOfAssurance>) -> Self {
        self.inner.resolved_loa = level;
        self
    }

    pub fn build(self) -> AuthenticationRequest {
        self.inner
    }
}
