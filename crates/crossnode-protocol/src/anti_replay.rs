//! Anti-replay guard.
//!
//! Records message identifiers so that a message is accepted at most once
//! within the replay window. Markers are never rolled back: a message that
//! fails a later validation step stays recorded.

use crate::cache::{CacheBackend, CacheResult};
use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use crossnode_core::MessageId;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default retention of replay markers (1 hour).
pub const DEFAULT_REPLAY_TTL: Duration = Duration::from_secs(3600);

/// Identifies a message for replay detection.
///
/// The scope qualifies the identifier with its origin (for example a
/// country code), since identifiers are only unique per issuing party.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplayKey {
    pub message_id: MessageId,
    pub scope: String,
}

impl ReplayKey {
    pub fn new(message_id: MessageId, scope: impl Into<String>) -> Self {
        Self {
            message_id,
            scope: scope.into(),
        }
    }

    /// The scope is length-prefixed, so neither part can absorb a `/` from
    /// the other.
    fn cache_key(&self) -> String {
        format!(
            "replay/{}:{}/{}",
            self.scope.len(),
            self.scope,
            self.message_id
        )
    }
}

impl Display for ReplayKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message_id, self.scope)
    }
}

/// Presence marker stored for each accepted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayRecord {
    pub first_seen: DateTime<Utc>,
}

/// One-time acceptance of message identifiers.
#[derive(Clone)]
pub struct AntiReplayGuard {
    backend: Arc<dyn CacheBackend<ReplayRecord>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AntiReplayGuard {
    pub fn new(backend: Arc<dyn CacheBackend<ReplayRecord>>, ttl: Duration) -> Self {
        Self {
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

    /// Retention of replay markers.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Records the key unless it is already present.
    ///
    /// Returns `true` if the key was recorded by this call and `false` if it
    /// was already present, in which case nothing is changed.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn mark_if_absent(&self, key: &ReplayKey) -> CacheResult<bool> {
        let record = ReplayRecord {
            first_seen: self.clock.now(),
        };
        let inserted = self
            .backend
            .put_if_absent(&key.cache_key(), record, self.ttl)
            .await?;

        if inserted {
            debug!(message_id = %key.message_id, scope = %key.scope, "Message recorded");
        } else {
            warn!(
                target: "security",
                message_id = %key.message_id,
                scope = %key.scope,
                "Replayed message identifier"
            );
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;

    fn guard() -> AntiReplayGuard {
        AntiReplayGuard::new(Arc::new(InMemoryCacheBackend::new()), DEFAULT_REPLAY_TTL)
    }

    fn key(id: &str, scope: &str) -> ReplayKey {
        ReplayKey::new(id.parse().unwrap(), scope)
    }

    #[tokio::test]
    async fn test_second_mark_is_rejected() {
        let guard = guard();
        assert!(guard.mark_if_absent(&key("_m1", "BE")).await.unwrap());
        assert!(!guard.mark_if_absent(&key("_m1", "BE")).await.unwrap());
        assert!(!guard.mark_if_absent(&key("_m1", "BE")).await.unwrap());
    }

    #[tokio::test]
    async fn test_scope_qualifies_identifier() {
        let guard = guard();
        assert!(guard.mark_if_absent(&key("_m1", "BE")).await.unwrap());
        assert!(guard.mark_if_absent(&key("_m1", "ES")).await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_released_after_ttl() {
        let guard = AntiReplayGuard::new(
            Arc::new(InMemoryCacheBackend::new()),
            Duration::from_millis(50),
        );
        assert!(guard.mark_if_absent(&key("_m1", "BE")).await.unwrap());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(guard.mark_if_absent(&key("_m1", "BE")).await.unwrap());
    }

    #[tokio::test]
    async fn test_separator_in_scope_or_id_does_not_collide() {
        let guard = guard();
        assert_ne!(
            key("x/_m1", "BE").cache_key(),
            key("_m1", "BE/x").cache_key()
        );
        assert!(guard.mark_if_absent(&key("x/_m1", "BE")).await.unwrap());
        assert!(guard.mark_if_absent(&key("_m1", "BE/x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_flood_does_not_evict_marker() {
        let guard = AntiReplayGuard::new(
            Arc::new(InMemoryCacheBackend::<ReplayRecord>::with_capacity(100)),
            DEFAULT_REPLAY_TTL,
        );
        assert!(guard.mark_if_absent(&key("_victim", "BE")).await.unwrap());

        for i in 0..2000 {
            // Once the store is full new identifiers are refused, not admitted.
            let _ = guard.mark_if_absent(&key(&format!("_flood{i}"), "BE")).await;
        }

        assert!(!guard.mark_if_absent(&key("_victim", "BE")).await.unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(key("_m1", "BE").to_string(), "_m1 (BE)");
    }
}
