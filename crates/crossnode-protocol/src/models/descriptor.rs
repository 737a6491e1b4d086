//! Trust descriptors published by remote parties.

use super::binding::Binding;
use super::loa::LevelOfAssurance;
use super::request::SectorType;
use super::version::{self, ProtocolGeneration, ProtocolVersion};
use chrono::{DateTime, Utc};
use crossnode_core::{CountryCode, EntityId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Role a party plays in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sends authentication requests (connector or relying party).
    Requester,
    /// Answers authentication requests (proxy service or identity source).
    Responder,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requester => f.write_str("requester"),
            Self::Responder => f.write_str("responder"),
        }
    }
}

/// Opaque reference to a certificate, interpreted only by the message codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateRef(pub String);

/// A location a role accepts messages at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub binding: Binding,
    pub location: String,
}

/// Capabilities of one role of a trust entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub role: Role,
    /// Endpoint used when a message does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_endpoint: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub signing_certificates: Vec<CertificateRef>,
    #[serde(default)]
    pub encryption_certificates: Vec<CertificateRef>,
    #[serde(default)]
    pub name_id_formats: Vec<String>,
}

impl RoleDescriptor {
    /// Location published for a binding.
    pub fn endpoint_for(&self, binding: Binding) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|e| e.binding == binding)
            .map(|e| e.location.as_str())
    }
}

/// Trust metadata of a remote party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDescriptor {
    pub entity_id: EntityId,
    #[serde(default)]
    pub roles: Vec<RoleDescriptor>,
    /// Published levels in publication order.
    #[serde(default)]
    pub assurance_levels: Vec<LevelOfAssurance>,
    /// Advertised protocol version strings, possibly including unknown ones.
    #[serde(default)]
    pub protocol_versions: Vec<String>,
    #[serde(default)]
    pub requester_id_flag: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_type: Option<SectorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_country: Option<CountryCode>,
    /// Cache lifetime declared by the publisher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl TrustDescriptor {
    /// The descriptor of a role, if published.
    pub fn role(&self, role: Role) -> Option<&RoleDescriptor> {
        self.roles.iter().find(|r| r.role == role)
    }

    /// Highest recognized protocol version.
    pub fn max_protocol_version(&self) -> Option<ProtocolVersion> {
        version::highest_version(&self.protocol_versions)
    }

    /// Generation the party behaves as.
    pub fn generation(&self) -> ProtocolGeneration {
        version::generation_of(&self.protocol_versions)
    }

    /// Returns true if the descriptor is past its validity.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until <= now)
    }
}
