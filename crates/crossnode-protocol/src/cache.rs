//! Cache backend abstraction.
//!
//! The anti-replay guard and the correlation store keep their state behind
//! [`CacheBackend`], so a deployment can move that state to a shared store
//! without touching the engine. Only the in-process backend ships here.
//!
//! - Every write carries its own TTL
//! - `put_if_absent` is an atomic test-and-set
//! - `remove` returns the removed value, so a read-and-delete is one call
//! - Entries leave only by TTL or `remove`; a bounded backend refuses new
//!   keys when full instead of evicting live ones

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors raised by a cache backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Cache full: {0} entries")]
    CapacityReached(u64),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store with per-entry TTL.
#[async_trait]
pub trait CacheBackend<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Look up a live entry.
    async fn get(&self, key: &str) -> CacheResult<Option<V>>;

    /// Insert or replace an entry.
    async fn put(&self, key: &str, value: V, ttl: Duration) -> CacheResult<()>;

    /// Insert only when no live entry exists.
    ///
    /// Returns `true` if this call inserted the value. Concurrent callers on
    /// the same key observe exactly one `true`.
    async fn put_if_absent(&self, key: &str, value: V, ttl: Duration) -> CacheResult<bool>;

    /// Remove an entry, returning it if it was live.
    async fn remove(&self, key: &str) -> CacheResult<Option<V>>;
}

#[derive(Clone)]
struct Timed<V> {
    value: V,
    ttl: Duration,
}

struct PerEntryTtl;

impl<V> Expiry<String, Timed<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Timed<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Timed<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process backend on a `moka` async cache.
///
/// The cache has no size-based eviction. An unbounded backend grows until
/// entries expire; a bounded one fails writes of new keys with
/// [`CacheError::CapacityReached`] while it is full.
#[derive(Clone)]
pub struct InMemoryCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<String, Timed<V>>,
    max_entries: Option<u64>,
}

impl<V> InMemoryCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().expire_after(PerEntryTtl).build(),
            max_entries: None,
        }
    }

    #[must_use]
    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::new()
        }
    }

    async fn ensure_room(&self) -> CacheResult<()> {
        let Some(max) = self.max_entries else {
            return Ok(());
        };
        if self.cache.entry_count() >= max {
            return Err(CacheError::CapacityReached(max));
        }
        // The count lags behind recent writes until pending tasks run.
        self.cache.run_pending_tasks().await;
        if self.cache.entry_count() >= max {
            return Err(CacheError::CapacityReached(max));
        }
        Ok(())
    }

    /// Approximate number of live entries.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl<V> Default for InMemoryCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> CacheBackend<V> for InMemoryCacheBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> CacheResult<Option<V>> {
        Ok(self.cache.get(key).await.map(|timed| timed.value))
    }

    async fn put(&self, key: &str, value: V, ttl: Duration) -> CacheResult<()> {
        if !self.cache.contains_key(key) {
            self.ensure_room().await?;
        }
        self.cache.insert(key.to_string(), Timed { value, ttl }).await;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: V, ttl: Duration) -> CacheResult<bool> {
        if self.cache.contains_key(key) {
            return Ok(false);
        }
        self.ensure_room().await?;
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert(Timed { value, ttl })
            .await;
        Ok(entry.is_fresh())
    }

    async fn remove(&self, key: &str) -> CacheResult<Option<V>> {
        Ok(self.cache.remove(key).await.map(|timed| timed.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_put_if_absent_only_first_wins() {
        let backend = InMemoryCacheBackend::<u32>::new();
        assert!(backend.put_if_absent("k", 1, TTL).await.unwrap());
        assert!(!backend.put_if_absent("k", 2, TTL).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let backend = InMemoryCacheBackend::<u32>::new();
        backend.put("k", 1, TTL).await.unwrap();
        backend.put("k", 2, TTL).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_remove_returns_value_once() {
        let backend = InMemoryCacheBackend::<String>::new();
        backend.put("k", "v".to_string(), TTL).await.unwrap();
        assert_eq!(backend.remove("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(backend.remove("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let backend = InMemoryCacheBackend::<u32>::new();
        backend
            .put("short", 1, Duration::from_millis(50))
            .await
            .unwrap();
        backend.put("long", 2, TTL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert_eq!(backend.get("long").await.unwrap(), Some(2));
        assert!(backend.put_if_absent("short", 3, TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_bounded_backend_refuses_instead_of_evicting() {
        let backend = InMemoryCacheBackend::<u32>::with_capacity(10);
        for i in 0..10 {
            assert!(backend.put_if_absent(&format!("k{i}"), i, TTL).await.unwrap());
        }

        let mut refused = 0;
        for i in 10..200 {
            match backend.put_if_absent(&format!("k{i}"), i, TTL).await {
                Err(CacheError::CapacityReached(10)) => refused += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(refused, 190);

        for i in 0..10 {
            assert_eq!(backend.get(&format!("k{i}")).await.unwrap(), Some(i));
            assert!(!backend.put_if_absent(&format!("k{i}"), 0, TTL).await.unwrap());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_put_if_absent_single_winner() {
        let backend = Arc::new(InMemoryCacheBackend::<usize>::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move { backend.put_if_absent("race", i, TTL).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
