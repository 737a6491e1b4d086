//! Engine configuration.
//!
//! A single normalized value object built once at startup, either in code
//! or from environment variables. Loading is fail-fast: a missing required
//! variable or an unusable value stops the node with a clear message, and
//! [`EngineConfig::validate`] refuses combinations the engine cannot run
//! safely with.

use crate::attributes::UnsupportedAttributePolicy;
use crate::error::ProtocolError;
use crate::models::request::{
    NAME_ID_FORMAT_PERSISTENT, NAME_ID_FORMAT_TRANSIENT, NAME_ID_FORMAT_UNSPECIFIED,
};
use crate::models::{parse_loa_list, version, LevelOfAssurance};
use crate::negotiation::max_notified;
use crossnode_core::{CountryCode, EntityId};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted retention, validity or skew setting (7 days).
pub const MAX_WINDOW: Duration = Duration::from_secs(7 * 24 * 3600);

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ProtocolError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Side of the exchange this node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Receives requests from local relying parties and forwards them abroad.
    Connector,
    /// Receives requests from foreign connectors and delegates to identity sources.
    ProxyService,
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "connector" => Ok(Self::Connector),
            "proxy-service" | "proxy_service" | "proxyservice" => Ok(Self::ProxyService),
            other => Err(format!("unknown node role: {other}")),
        }
    }
}

impl Display for NodeRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connector => f.write_str("connector"),
            Self::ProxyService => f.write_str("proxy-service"),
        }
    }
}

/// Normalized engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Entity identifier (metadata URL) of this node.
    pub node_entity_id: EntityId,
    pub node_role: NodeRole,
    pub node_country: Option<CountryCode>,
    /// Destinations this node answers at.
    pub local_endpoints: Vec<String>,
    /// Published levels, in publication order.
    pub published_loas: Vec<LevelOfAssurance>,
    /// Protocol versions this node speaks.
    pub protocol_versions: Vec<String>,
    pub requester_id_required: bool,
    pub unsupported_attributes: HashSet<String>,
    pub unsupported_attribute_policy: UnsupportedAttributePolicy,
    pub name_id_formats: Vec<String>,
    pub replay_ttl: Duration,
    pub correlation_ttl: Duration,
    pub metadata_default_ttl: Duration,
    /// How long a signed message is considered fresh.
    pub message_validity: Duration,
    pub clock_skew: Duration,
    /// Bound on each metadata or cache operation.
    pub operation_timeout: Duration,
    pub validate_binding: bool,
    pub validate_identifier_prefix: bool,
    pub check_response_country: bool,
    pub metadata_https_only: bool,
}

impl EngineConfig {
    /// Configuration with defaults for everything but identity and levels.
    pub fn new(
        node_entity_id: EntityId,
        node_role: NodeRole,
        published_loas: Vec<LevelOfAssurance>,
    ) -> Self {
        Self {
            node_entity_id,
            node_role,
            node_country: None,
            local_endpoints: Vec::new(),
            published_loas,
            protocol_versions: vec!["1.2".to_string(), "1.1".to_string()],
            requester_id_required: false,
            unsupported_attributes: HashSet::new(),
            unsupported_attribute_policy: UnsupportedAttributePolicy::default(),
            name_id_formats: vec![
                NAME_ID_FORMAT_PERSISTENT.to_string(),
                NAME_ID_FORMAT_TRANSIENT.to_string(),
                NAME_ID_FORMAT_UNSPECIFIED.to_string(),
            ],
            replay_ttl: Duration::from_secs(3600),
            correlation_ttl: Duration::from_secs(600),
            metadata_default_ttl: Duration::from_secs(86_400),
            message_validity: Duration::from_secs(300),
            clock_skew: Duration::from_secs(60),
            operation_timeout: Duration::from_millis(5000),
            validate_binding: true,
            validate_identifier_prefix: true,
            check_response_country: true,
            metadata_https_only: true,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        let node_entity_id: EntityId = parse_var("NODE_ENTITY_ID", &require("NODE_ENTITY_ID")?)?;
        let node_role = match get("NODE_ROLE") {
            Some(v) => parse_var("NODE_ROLE", &v)?,
            None => NodeRole::ProxyService,
        };
        let published_loas =
            parse_loa_list(&require("PUBLISHED_LOAS")?).map_err(|e| ConfigError::InvalidValue {
                var: "PUBLISHED_LOAS".to_string(),
                message: e.to_string(),
            })?;

        let mut config = Self::new(node_entity_id, node_role, published_loas);

        if let Some(v) = get("NODE_COUNTRY") {
            config.node_country = Some(parse_var("NODE_COUNTRY", &v)?);
        }
        if let Some(v) = get("NODE_ENDPOINTS") {
            config.local_endpoints = split_list(&v);
        }
        if let Some(v) = get("PROTOCOL_VERSIONS") {
            config.protocol_versions = split_list(&v);
        }
        if let Some(v) = get("REQUESTER_ID_REQUIRED") {
            config.requester_id_required = parse_bool("REQUESTER_ID_REQUIRED", &v)?;
        }
        if let Some(v) = get("UNSUPPORTED_ATTRIBUTES") {
            config.unsupported_attributes = split_list(&v).into_iter().collect();
        }
        if let Some(v) = get("UNSUPPORTED_ATTRIBUTE_POLICY") {
            config.unsupported_attribute_policy = parse_var("UNSUPPORTED_ATTRIBUTE_POLICY", &v)?;
        }
        if let Some(v) = get("NAME_ID_FORMATS") {
            config.name_id_formats = split_list(&v)
                .into_iter()
                .map(|f| expand_name_id_format(&f))
                .collect();
        }
        if let Some(v) = get("REPLAY_TTL_SECS") {
            config.replay_ttl = Duration::from_secs(parse_var("REPLAY_TTL_SECS", &v)?);
        }
        if let Some(v) = get("CORRELATION_TTL_SECS") {
            config.correlation_ttl = Duration::from_secs(parse_var("CORRELATION_TTL_SECS", &v)?);
        }
        if let Some(v) = get("METADATA_TTL_SECS") {
            config.metadata_default_ttl = Duration::from_secs(parse_var("METADATA_TTL_SECS", &v)?);
        }
        if let Some(v) = get("MESSAGE_VALIDITY_SECS") {
            config.message_validity = Duration::from_secs(parse_var("MESSAGE_VALIDITY_SECS", &v)?);
        }
        if let Some(v) = get("CLOCK_SKEW_SECS") {
            config.clock_skew = Duration::from_secs(parse_var("CLOCK_SKEW_SECS", &v)?);
        }
        if let Some(v) = get("OPERATION_TIMEOUT_MS") {
            config.operation_timeout = Duration::from_millis(parse_var("OPERATION_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("VALIDATE_BINDING") {
            config.validate_binding = parse_bool("VALIDATE_BINDING", &v)?;
        }
        if let Some(v) = get("VALIDATE_IDENTIFIER_PREFIX") {
            config.validate_identifier_prefix = parse_bool("VALIDATE_IDENTIFIER_PREFIX", &v)?;
        }
        if let Some(v) = get("CHECK_RESPONSE_COUNTRY") {
            config.check_response_country = parse_bool("CHECK_RESPONSE_COUNTRY", &v)?;
        }
        if let Some(v) = get("METADATA_HTTPS_ONLY") {
            config.metadata_https_only = parse_bool("METADATA_HTTPS_ONLY", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Refuses configurations the engine cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.published_loas.is_empty() {
            return Err(ConfigError::Invalid(
                "no level of assurance published".to_string(),
            ));
        }
        if max_notified(&self.published_loas).is_none() {
            return Err(ConfigError::Invalid(
                "published levels include no notified level".to_string(),
            ));
        }
        if version::recognized_versions(&self.protocol_versions).is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no supported protocol version in {:?}",
                self.protocol_versions
            )));
        }
        for (name, value) in [
            ("replay TTL", self.replay_ttl),
            ("correlation TTL", self.correlation_ttl),
            ("message validity", self.message_validity),
            ("clock skew", self.clock_skew),
        ] {
            if value > MAX_WINDOW {
                return Err(ConfigError::Invalid(format!(
                    "{name} of {}s exceeds the limit of {}s",
                    value.as_secs(),
                    MAX_WINDOW.as_secs()
                )));
            }
        }
        let window = self.message_validity + self.clock_skew;
        if self.replay_ttl < window {
            return Err(ConfigError::Invalid(format!(
                "replay TTL of {}s is shorter than the signature validity window of {}s",
                self.replay_ttl.as_secs(),
                window.as_secs()
            )));
        }
        if self.correlation_ttl.is_zero() {
            return Err(ConfigError::Invalid("correlation TTL is zero".to_string()));
        }
        if self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid("operation timeout is zero".to_string()));
        }
        if self.name_id_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "no name identifier format supported".to_string(),
            ));
        }
        if self.node_role == NodeRole::ProxyService {
            if self.node_country.is_none() {
                return Err(ConfigError::Invalid(
                    "a proxy service requires NODE_COUNTRY".to_string(),
                ));
            }
            if self.local_endpoints.is_empty() {
                return Err(ConfigError::Invalid(
                    "a proxy service requires at least one endpoint in NODE_ENDPOINTS".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_var<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn expand_name_id_format(value: &str) -> String {
    match value {
        "persistent" => NAME_ID_FORMAT_PERSISTENT.to_string(),
        "transient" => NAME_ID_FORMAT_TRANSIENT.to_string(),
        "unspecified" => NAME_ID_FORMAT_UNSPECIFIED.to_string(),
        other => other.to_string(),
    }
}
