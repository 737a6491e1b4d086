//! Metadata trust resolver.
//!
//! Resolves the trust descriptor of a remote entity, fetching and verifying
//! it on a cache miss. Only verified descriptors enter the cache, failures
//! are never cached and there is no fallback to an unverified document.
//! Concurrent resolutions of the same entity share one fetch.

use super::fetcher::MetadataFetcher;
use super::verifier::{MetadataVerifier, MetadataVerifyError};
use crate::clock::{Clock, SystemClock};
use crate::error::{ProtocolError, ProtocolResult};
use crate::models::{Role, TrustDescriptor};
use chrono::{DateTime, Utc};
use crossnode_core::EntityId;
use moka::future::Cache;
use moka::Expiry;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Default TTL of a cached descriptor that declares none (24 hours).
pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(86_400);

/// Maximum number of cached descriptors.
const MAX_CACHED_DESCRIPTORS: u64 = 10_000;

/// A trust descriptor whose authenticity was established at fetch time.
///
/// Only the resolver can create one.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedDescriptor(Arc<TrustDescriptor>);

impl VerifiedDescriptor {
    pub(crate) fn new(descriptor: TrustDescriptor) -> Self {
        Self(Arc::new(descriptor))
    }

    pub fn descriptor(&self) -> &TrustDescriptor {
        &self.0
    }
}

impl Deref for VerifiedDescriptor {
    type Target = TrustDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Clone)]
struct CachedDescriptor {
    descriptor: VerifiedDescriptor,
    ttl: Duration,
}

struct DescriptorTtl;

impl Expiry<String, CachedDescriptor> for DescriptorTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedDescriptor,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Resolves, verifies and caches trust descriptors.
#[derive(Clone)]
pub struct MetadataTrustResolver {
    fetcher: Arc<dyn MetadataFetcher>,
    verifier: Arc<dyn MetadataVerifier>,
    cache: Cache<String, CachedDescriptor>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MetadataTrustResolver {
    pub fn new(
        fetcher: Arc<dyn MetadataFetcher>,
        verifier: Arc<dyn MetadataVerifier>,
        default_ttl: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHED_DESCRIPTORS)
            .expire_after(DescriptorTtl)
            .build();
        Self {
            fetcher,
            verifier,
            cache,
            default_ttl,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolves the verified descriptor of `entity_id` and checks that it
    /// publishes `role`.
    ///
    /// # Errors
    ///
    /// - `UntrustedMetadata` when verification fails
    /// - `Unreachable` on fetch or parse failure, or when `timeout` elapses
    /// - `DescriptorRoleNotFound` when the descriptor lacks `role`
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        entity_id: &EntityId,
        role: Role,
        timeout: Duration,
    ) -> ProtocolResult<VerifiedDescriptor> {
        let lookup = self
            .cache
            .try_get_with(entity_id.to_string(), self.load(entity_id));

        let cached = match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(cached)) => cached,
            Ok(Err(err)) => return Err(err.as_ref().clone()),
            Err(_) => {
                warn!(entity_id = %entity_id, ?timeout, "Metadata resolution timed out");
                return Err(ProtocolError::Unreachable {
                    resource: entity_id.to_string(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                });
            }
        };

        if cached.descriptor.role(role).is_none() {
            return Err(ProtocolError::DescriptorRoleNotFound {
                entity_id: entity_id.to_string(),
                role,
            });
        }

        Ok(cached.descriptor)
    }

    /// Drops the cached descriptor of an entity.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, entity_id: &EntityId) {
        self.cache.invalidate(entity_id.as_str()).await;
        info!(entity_id = %entity_id, "Metadata cache entry invalidated");
    }

    /// Fetches and verifies again, bypassing the cache.
    #[instrument(skip(self))]
    pub async fn refresh(
        &self,
        entity_id: &EntityId,
        role: Role,
        timeout: Duration,
    ) -> ProtocolResult<VerifiedDescriptor> {
        self.invalidate(entity_id).await;
        self.resolve(entity_id, role, timeout).await
    }

    /// Returns true if a verified descriptor is cached for the entity.
    pub fn is_cached(&self, entity_id: &EntityId) -> bool {
        self.cache.contains_key(entity_id.as_str())
    }

    async fn load(&self, entity_id: &EntityId) -> ProtocolResult<CachedDescriptor> {
        debug!(entity_id = %entity_id, "Metadata cache miss, fetching");

        let raw = self
            .fetcher
            .fetch(entity_id.as_str())
            .await
            .map_err(|e| ProtocolError::Unreachable {
                resource: entity_id.to_string(),
                reason: e.to_string(),
            })?;

        let descriptor = self.verifier.verify(&raw).map_err(|e| match e {
            MetadataVerifyError::Parse(reason) => ProtocolError::Unreachable {
                resource: entity_id.to_string(),
                reason,
            },
            other => {
                warn!(
                    target: "security",
                    entity_id = %entity_id,
                    error = %other,
                    "Metadata verification failed"
                );
                ProtocolError::UntrustedMetadata {
                    entity_id: entity_id.to_string(),
                    reason: other.to_string(),
                }
            }
        })?;

        let now = self.clock.now();
        if descriptor.is_expired_at(now) {
            warn!(target: "security", entity_id = %entity_id, "Metadata validity has passed");
            return Err(ProtocolError::UntrustedMetadata {
                entity_id: entity_id.to_string(),
                reason: "metadata validity has passed".to_string(),
            });
        }

        let ttl = self.ttl_for(&descriptor, now);
        info!(
            entity_id = %entity_id,
            ttl_secs = ttl.as_secs(),
            versions = ?descriptor.protocol_versions,
            "Metadata verified and cached"
        );

        Ok(CachedDescriptor {
            descriptor: VerifiedDescriptor::new(descriptor),
            ttl,
        })
    }

    fn ttl_for(&self, descriptor: &TrustDescriptor, now: DateTime<Utc>) -> Duration {
        let declared = descriptor
            .cache_duration_secs
            .map_or(self.default_ttl, Duration::from_secs);
        let remaining = descriptor
            .valid_until
            .and_then(|until| (until - now).to_std().ok());
        remaining.map_or(declared, |r| declared.min(r))
    }
}
