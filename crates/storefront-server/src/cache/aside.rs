//! Cache-aside reads with fail-open semantics.
//!
//! The store is an optimization, never a dependency: when it is down or
//! slow, reads go straight to the datastore and nothing is written back.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::backend::{DynCacheStore, with_timeout};
use super::key::CacheKey;
use crate::metrics;

/// Outcome of a single cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    StoreUnavailable,
}

#[derive(Clone)]
pub struct CacheAside {
    store: DynCacheStore,
    op_timeout: Duration,
}

impl CacheAside {
    pub fn new(store: DynCacheStore, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    pub fn store(&self) -> &DynCacheStore {
        &self.store
    }

    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    /// Read and decode `key`. A payload that no longer decodes is a miss, so
    /// the next successful compute overwrites it.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheLookup<T> {
        let mode = self.store.mode();
        match with_timeout(self.op_timeout, self.store.get(key.as_str())).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key = %key, "cache hit");
                    metrics::record_cache_hit(mode);
                    CacheLookup::Hit(value)
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "undecodable cache entry, treating as miss");
                    metrics::record_cache_miss(mode);
                    CacheLookup::Miss
                }
            },
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_cache_miss(mode);
                CacheLookup::Miss
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache GET failed, serving uncached");
                metrics::record_cache_unavailable(mode, "get");
                CacheLookup::StoreUnavailable
            }
        }
    }

    /// Return the cached value for `key`, or compute, store for `ttl` and return it.
    ///
    /// `compute` runs at most once per call. Its errors are returned as-is
    /// and never cached. Concurrent misses on the same key may each compute.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let writable = match self.lookup::<T>(key).await {
            CacheLookup::Hit(value) => return Ok(value),
            CacheLookup::Miss => true,
            CacheLookup::StoreUnavailable => false,
        };

        let value = compute().await?;
        if writable {
            self.store_value(key, &value, ttl).await;
        }
        Ok(value)
    }

    async fn store_value<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode value for cache");
                return;
            }
        };
        match with_timeout(self.op_timeout, self.store.set_ex(key.as_str(), encoded, ttl)).await {
            Ok(()) => tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set"),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache SET failed");
                metrics::record_cache_unavailable(self.store.mode(), "set");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::{CacheStore, LocalCacheStore};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn aside() -> (CacheAside, LocalCacheStore) {
        let local = LocalCacheStore::new();
        let aside = CacheAside::new(Arc::new(local.clone()), Duration::from_millis(100));
        (aside, local)
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let (aside, _) = aside();
        let key = CacheKey::for_document("products", "p1");
        let calls = &AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u64, ()> = aside
                .get_or_set(&key, Duration::from_secs(60), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let (aside, local) = aside();
        let key = CacheKey::for_document("products", "p1");

        let err: Result<u64, &str> = aside
            .get_or_set(&key, Duration::from_secs(60), || async { Err("db down") })
            .await;
        assert_eq!(err, Err("db down"));
        assert!(local.is_empty());

        let ok: Result<u64, &str> = aside
            .get_or_set(&key, Duration::from_secs(60), || async { Ok(7) })
            .await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn undecodable_entries_are_recomputed_and_overwritten() {
        let (aside, local) = aside();
        let key = CacheKey::for_document("products", "p1");
        local
            .set_ex(key.as_str(), "not json".into(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(aside.lookup::<u64>(&key).await, CacheLookup::Miss);
        let value: Result<u64, ()> = aside
            .get_or_set(&key, Duration::from_secs(60), || async { Ok(5) })
            .await;
        assert_eq!(value, Ok(5));
        assert_eq!(local.get(key.as_str()).await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn expired_entries_recompute() {
        let (aside, _) = aside();
        let key = CacheKey::for_document("banners", "b1");
        let calls = &AtomicUsize::new(0);
        let compute = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(1u8)
        };

        aside.get_or_set(&key, Duration::from_millis(20), compute).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        aside.get_or_set(&key, Duration::from_millis(20), compute).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
