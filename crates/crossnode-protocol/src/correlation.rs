//! Request/response correlation.
//!
//! Before a request leaves the node it is stored under its identifier; the
//! response names that identifier in `in_response_to` and takes the entry
//! back. Taking is destructive, so a second delivery of the same response
//! finds nothing. Expired entries are treated as absent even when the
//! backend has not purged them yet.
//!
//! An entry may name the peer the request was sent to; taking it on behalf
//! of any other peer is refused and leaves the entry in place.
//!
//! The store is generic over the stored request so the same type serves the
//! connector hop and the proxy-service hop.

use crate::cache::{CacheBackend, CacheError};
use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use crossnode_core::{EntityId, MessageId};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Default lifetime of a correlation entry (10 minutes).
pub const DEFAULT_CORRELATION_TTL: Duration = Duration::from_secs(600);

/// Correlation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// No live entry for the identifier (never stored, consumed or expired)
    #[error("No correlation entry for request: {0}")]
    NotFound(String),

    /// A live entry already exists for the identifier
    #[error("Duplicate correlation entry for request: {0}")]
    Duplicate(String),

    /// The entry belongs to an exchange with another peer
    #[error("Request {request_id} was sent to {expected}, not {actual}")]
    PeerMismatch {
        request_id: String,
        expected: String,
        actual: String,
    },

    #[error("Correlation backend error: {0}")]
    Backend(#[from] CacheError),
}

/// A stored request awaiting its response.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationEntry<R> {
    pub request: R,
    /// Peer expected to answer, when known.
    pub peer: Option<EntityId>,
    /// Address of the party that started the exchange.
    pub remote_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One-shot store of in-flight requests.
pub struct CorrelationStore<R>
where
    R: Clone + Send + Sync + 'static,
{
    name: &'static str,
    backend: Arc<dyn CacheBackend<CorrelationEntry<R>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<R> Clone for CorrelationStore<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            backend: Arc::clone(&self.backend),
            ttl: self.ttl,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R> CorrelationStore<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Creates a store. `name` labels the hop in logs and keys.
    pub fn new(
        name: &'static str,
        backend: Arc<dyn CacheBackend<CorrelationEntry<R>>>,
        ttl: Duration,
    ) -> Self {
        Self {
            name,
            backend,
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn cache_key(&self, id: &MessageId) -> String {
        format!("correlation/{}/{}", self.name, id)
    }

    /// Stores a request under its identifier.
    pub async fn put(
        &self,
        id: &MessageId,
        request: R,
        remote_address: Option<String>,
    ) -> Result<(), CorrelationError> {
        self.store(id, request, None, remote_address).await
    }

    /// Stores a request that only `peer` may answer.
    pub async fn put_for_peer(
        &self,
        id: &MessageId,
        request: R,
        peer: EntityId,
        remote_address: Option<String>,
    ) -> Result<(), CorrelationError> {
        self.store(id, request, Some(peer), remote_address).await
    }

    #[instrument(skip(self, request, remote_address), fields(store = self.name))]
    async fn store(
        &self,
        id: &MessageId,
        request: R,
        peer: Option<EntityId>,
        remote_address: Option<String>,
    ) -> Result<(), CorrelationError> {
        let entry = CorrelationEntry {
            request,
            peer,
            remote_address,
            created_at: self.clock.now(),
        };
        let inserted = self
            .backend
            .put_if_absent(&self.cache_key(id), entry, self.ttl)
            .await?;
        if !inserted {
            return Err(CorrelationError::Duplicate(id.to_string()));
        }
        debug!(request_id = %id, "Correlation entry stored");
        Ok(())
    }

    /// Removes and returns the entry for an identifier.
    #[instrument(skip(self), fields(store = self.name))]
    pub async fn take(&self, id: &MessageId) -> Result<CorrelationEntry<R>, CorrelationError> {
        let entry = self
            .backend
            .remove(&self.cache_key(id))
            .await?
            .ok_or_else(|| CorrelationError::NotFound(id.to_string()))?;

        if self.is_expired(&entry) {
            info!(request_id = %id, created_at = %entry.created_at, "Correlation entry expired");
            return Err(CorrelationError::NotFound(id.to_string()));
        }

        debug!(request_id = %id, "Correlation entry consumed");
        Ok(entry)
    }

    /// Takes the entry on behalf of `peer`.
    ///
    /// An entry bound to another peer is refused without being consumed.
    #[instrument(skip(self, peer), fields(store = self.name, peer = %peer))]
    pub async fn take_from(
        &self,
        id: &MessageId,
        peer: &EntityId,
    ) -> Result<CorrelationEntry<R>, CorrelationError> {
        if let Some(entry) = self.backend.get(&self.cache_key(id)).await? {
            check_peer(id, &entry, peer)?;
        }
        let entry = self.take(id).await?;
        check_peer(id, &entry, peer)?;
        Ok(entry)
    }

    fn is_expired(&self, entry: &CorrelationEntry<R>) -> bool {
        (self.clock.now() - entry.created_at)
            .to_std()
            .is_ok_and(|age| age >= self.ttl)
    }
}

fn check_peer<R>(
    id: &MessageId,
    entry: &CorrelationEntry<R>,
    peer: &EntityId,
) -> Result<(), CorrelationError> {
    match &entry.peer {
        Some(expected) if expected != peer => {
            warn!(
                target: "security",
                request_id = %id,
                expected = %expected,
                actual = %peer,
                "Response from a peer the request was not sent to"
            );
            Err(CorrelationError::PeerMismatch {
                request_id: id.to_string(),
                expected: expected.to_string(),
                actual: peer.to_string(),
            })
        }
        _ => Ok(()),
    }
}
