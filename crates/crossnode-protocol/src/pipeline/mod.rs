//! Request and response validation pipeline.
//!
//! Each message moves through a fixed sequence of [`Stage`]s. A message
//! leaves the pipeline either accepted, carrying the negotiated outcome, or
//! as a [`Rejection`] naming the stage that refused it.
//!
//! Inbound request (proxy service):
//! `Received → BindingChecked → ReplayChecked → SignatureVerified →
//! VersionNegotiated → AttributesValidated → SectorPolicyChecked →
//! LoANegotiated → Accepted`
//!
//! Outbound request (connector):
//! `MetadataResolved → VersionNegotiated → AttributesValidated →
//! SectorPolicyChecked → LoANegotiated → Correlated → Accepted`
//!
//! Inbound response (connector):
//! `Received → BindingChecked → ReplayChecked → SignatureVerified →
//! Correlated → AudienceValidated → ResponseChecked → Accepted`
//!
//! Every call to a cache or to the metadata resolver is bounded by the
//! configured operation timeout.

mod outcome;
mod request;
mod response;

pub use outcome::{
    ErrorResponseContext, InboundMessage, PreparedRequest, Rejection, Stage, ValidatedRequest,
    ValidatedResponse,
};

use crate::anti_replay::{AntiReplayGuard, ReplayKey, ReplayRecord};
use crate::attributes::AttributeRegistry;
use crate::cache::{CacheBackend, InMemoryCacheBackend};
use crate::clock::{Clock, SystemClock};
use crate::codec::MessageCodec;
use crate::config::EngineConfig;
use crate::correlation::{CorrelationEntry, CorrelationStore};
use crate::error::{ProtocolError, ProtocolResult};
use crate::metadata::{MetadataTrustResolver, VerifiedDescriptor};
use crate::models::{AuthenticationRequest, Role, RoleDescriptor};
use chrono::{DateTime, Utc};
use crossnode_core::{Classified, EntityId, ErrorCategory, MessageId};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Name of the correlation store holding outbound requests.
const REQUEST_STORE: &str = "requests";

/// The validation engine.
///
/// Cheap to clone; clones share caches and collaborators.
#[derive(Clone)]
pub struct ValidationEngine {
    config: Arc<EngineConfig>,
    codec: Arc<dyn MessageCodec>,
    resolver: MetadataTrustResolver,
    replay_guard: AntiReplayGuard,
    correlation: CorrelationStore<AuthenticationRequest>,
    attributes: AttributeRegistry,
    clock: Arc<dyn Clock>,
}

impl ValidationEngine {
    pub fn builder(
        config: EngineConfig,
        codec: Arc<dyn MessageCodec>,
        resolver: MetadataTrustResolver,
    ) -> ValidationEngineBuilder {
        ValidationEngineBuilder {
            config,
            codec,
            resolver,
            replay_backend: None,
            correlation_backend: None,
            attributes: None,
            clock: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &MetadataTrustResolver {
        &self.resolver
    }

    pub fn correlation(&self) -> &CorrelationStore<AuthenticationRequest> {
        &self.correlation
    }

    /// Runs a collaborator call under the operation timeout.
    async fn bounded<T, E, F>(&self, resource: &str, operation: F) -> ProtocolResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<ProtocolError>,
    {
        let timeout = self.config.operation_timeout;
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(ProtocolError::Unreachable {
                resource: resource.to_string(),
                reason: format!("timed out after {}ms", timeout.as_millis()),
            }),
        }
    }

    /// Records the message identifier once for its scope.
    async fn check_replay(&self, message_id: &MessageId, scope: &str) -> ProtocolResult<()> {
        let key = ReplayKey::new(message_id.clone(), scope);
        let fresh = self
            .bounded("anti-replay", self.replay_guard.mark_if_absent(&key))
            .await?;
        if fresh {
            Ok(())
        } else {
            Err(ProtocolError::Replay {
                message_id: message_id.to_string(),
                scope: scope.to_string(),
            })
        }
    }

    /// Refuses messages issued outside the validity window.
    ///
    /// The replay TTL covers the whole window, so a message old enough to
    /// have left the replay cache is refused here.
    fn check_freshness(
        &self,
        message_id: &MessageId,
        issued_at: DateTime<Utc>,
    ) -> ProtocolResult<()> {
        let now = self.clock.now();
        let skew = chrono::Duration::from_std(self.config.clock_skew)
            .map_err(|e| ProtocolError::Internal(e.to_string()))?;
        let validity = chrono::Duration::from_std(self.config.message_validity)
            .map_err(|e| ProtocolError::Internal(e.to_string()))?;

        let (Some(latest), Some(earliest)) = (
            now.checked_add_signed(skew),
            now.checked_sub_signed(validity)
                .and_then(|t| t.checked_sub_signed(skew)),
        ) else {
            return Err(ProtocolError::Internal(
                "validity window out of range".to_string(),
            ));
        };
        if issued_at > latest || issued_at < earliest {
            return Err(ProtocolError::MessageExpired {
                message_id: message_id.to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the sender's metadata and checks the message signature
    /// against the signing certificates it publishes for `role`.
    async fn verify_signature(
        &self,
        sender: &EntityId,
        role: Role,
        payload: &[u8],
    ) -> ProtocolResult<VerifiedDescriptor> {
        let descriptor = self
            .resolver
            .resolve(sender, role, self.config.operation_timeout)
            .await?;
        let certificates = &role_of(&descriptor, role)?.signing_certificates;
        if certificates.is_empty() {
            return Err(ProtocolError::InvalidSignature(format!(
                "{sender} publishes no signing certificate"
            )));
        }
        self.codec
            .verify(payload, certificates)
            .map_err(|e| ProtocolError::InvalidSignature(e.to_string()))?;
        Ok(descriptor)
    }

    /// Logs a refusal and turns it into a [`Rejection`].
    fn reject(
        &self,
        stage: Stage,
        error: ProtocolError,
        context: Option<&ErrorResponseContext>,
    ) -> Rejection {
        match error.category() {
            ErrorCategory::Security => warn!(
                target: "security",
                stage = %stage,
                error_code = error.error_code(),
                error = %error,
                "Message rejected"
            ),
            ErrorCategory::Internal | ErrorCategory::Configuration => error!(
                stage = %stage,
                error_code = error.error_code(),
                error = %error,
                "Message processing failed"
            ),
            ErrorCategory::Validation => info!(
                stage = %stage,
                error_code = error.error_code(),
                error = %error,
                "Message failed validation"
            ),
        }
        Rejection::new(stage, error, context.cloned())
    }

    /// Encodes and signs the error response owed for a rejection.
    ///
    /// Returns `None` when the rejection must not be answered with detail,
    /// which is the case for security failures and messages that could not
    /// be decoded.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the codec cannot encode or sign the response.
    pub fn error_response(&self, rejection: &Rejection) -> ProtocolResult<Option<Vec<u8>>> {
        let Some(response) = rejection.error_response(&self.config.node_entity_id) else {
            return Ok(None);
        };
        let encoded = self
            .codec
            .marshal_response(&response)
            .map_err(|e| ProtocolError::Internal(e.to_string()))?;
        let signed = self
            .codec
            .sign(encoded)
            .map_err(|e| ProtocolError::Internal(e.to_string()))?;
        Ok(Some(signed))
    }
}

/// Builder for [`ValidationEngine`].
///
/// Cache backends default to in-memory ones; swap them for shared backends
/// when several node instances serve the same traffic.
pub struct ValidationEngineBuilder {
    config: EngineConfig,
    codec: Arc<dyn MessageCodec>,
    resolver: MetadataTrustResolver,
    replay_backend: Option<Arc<dyn CacheBackend<ReplayRecord>>>,
    correlation_backend: Option<Arc<dyn CacheBackend<CorrelationEntry<AuthenticationRequest>>>>,
    attributes: Option<AttributeRegistry>,
    clock: Option<Arc<dyn Clock>>,
}

impl ValidationEngineBuilder {
    #[must_use]
    pub fn replay_backend(mut self, backend: Arc<dyn CacheBackend<ReplayRecord>>) -> Self {
        self.replay_backend = Some(backend);
        self
    }

    #[must_use]
    pub fn correlation_backend(
        mut self,
        backend: Arc<dyn CacheBackend<CorrelationEntry<AuthenticationRequest>>>,
    ) -> Self {
        self.correlation_backend = Some(backend);
        self
    }

    #[must_use]
    pub fn attributes(mut self, registry: AttributeRegistry) -> Self {
        self.attributes = Some(registry);
        self
    }

    /// Clock used for freshness checks and both caches.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is refused by
    /// [`EngineConfig::validate`].
    pub fn build(self) -> ProtocolResult<ValidationEngine> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let replay_backend = self
            .replay_backend
            .unwrap_or_else(|| Arc::new(InMemoryCacheBackend::<ReplayRecord>::new()));
        let correlation_backend = self
            .correlation_backend
            .unwrap_or_else(|| {
                Arc::new(InMemoryCacheBackend::<CorrelationEntry<AuthenticationRequest>>::new())
            });

        let replay_guard = AntiReplayGuard::new(replay_backend, self.config.replay_ttl)
            .with_clock(Arc::clone(&clock));
        let correlation =
            CorrelationStore::new(REQUEST_STORE, correlation_backend, self.config.correlation_ttl)
                .with_clock(Arc::clone(&clock));

        info!(
            entity_id = %self.config.node_entity_id,
            role = %self.config.node_role,
            versions = ?self.config.protocol_versions,
            "Validation engine ready"
        );

        Ok(ValidationEngine {
            config: Arc::new(self.config),
            codec: self.codec,
            resolver: self.resolver,
            replay_guard,
            correlation,
            attributes: self.attributes.unwrap_or_else(AttributeRegistry::baseline),
            clock,
        })
    }
}

pub(crate) fn role_of(descriptor: &VerifiedDescriptor, role: Role) -> ProtocolResult<&RoleDescriptor> {
    descriptor
        .role(role)
        .ok_or_else(|| ProtocolError::DescriptorRoleNotFound {
            entity_id: descriptor.entity_id.to_string(),
            role,
        })
}

/// Compares two endpoint URLs ignoring case of scheme and host and a
/// trailing slash. Unparseable values compare verbatim.
pub(crate) fn same_endpoint(a: &str, b: &str) -> bool {
    match (normalize_url(a), normalize_url(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

fn normalize_url(value: &str) -> Option<String> {
    let parsed = url::Url::parse(value).ok()?;

    let mut normalized = format!(
        "{}://{}",
        parsed.scheme().to_lowercase(),
        parsed.host_str().unwrap_or("").to_lowercase()
    );
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    Some(normalized)
}
