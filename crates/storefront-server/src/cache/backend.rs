//! Cache store backends: in-process (DashMap) and shared (Redis).
//!
//! Both speak the same four primitives the cache layer needs: `GET`,
//! `SET EX`, cursor-based `SCAN MATCH COUNT` and multi-key `DEL`. Values are
//! opaque strings; encoding is the caller's business.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use thiserror::Error;

use super::pattern::glob_matches;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("cache payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
        {
            Self::Unavailable(e.to_string())
        } else {
            Self::Command(e.to_string())
        }
    }
}

/// Bound a store call by `limit`, turning an elapsed timer into [`CacheError::Timeout`].
pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, CacheError>>,
) -> Result<T, CacheError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout(limit)),
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short label for logs and readiness output (`local`, `redis`).
    fn mode(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// One `SCAN` step. A returned cursor of `0` means the iteration is complete.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;

    /// Delete `keys`, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

pub type DynCacheStore = Arc<dyn CacheStore>;

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<str>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: String, ttl: Duration) -> Self {
        Self {
            data: Arc::from(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Writes between two expiry sweeps of the whole map.
const CLEANUP_EVERY_WRITES: u64 = 1024;

/// Single-instance store on a concurrent map.
///
/// `scan` walks keys in the order of their 64-bit hash and uses the next
/// unvisited hash as the cursor, so keys deleted between steps never cause
/// others to be skipped. Keys sharing a hash always land in the same batch.
///
/// Expired entries are dropped when read, at the start of every scan and
/// every [`CLEANUP_EVERY_WRITES`] writes.
#[derive(Clone, Default)]
pub struct LocalCacheStore {
    entries: Arc<DashMap<String, CachedEntry>>,
    writes: Arc<AtomicU64>,
}

impl LocalCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (non-expired) entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.value().is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            tracing::trace!(removed, "expired local cache entries dropped");
        }
        removed
    }
}

fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    fn mode(&self) -> &'static str {
        "local"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired());
            return Ok(None);
        }
        Ok(Some(entry.data.to_string()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if self.writes.fetch_add(1, Ordering::Relaxed) % CLEANUP_EVERY_WRITES
            == CLEANUP_EVERY_WRITES - 1
        {
            self.cleanup_expired();
        }
        self.entries
            .insert(key.to_string(), CachedEntry::new(value, ttl));
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let count = count.max(1);
        if cursor == 0 {
            self.cleanup_expired();
        }
        let mut pending: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired())
            .map(|e| (key_hash(e.key()), e.key().clone()))
            .filter(|(hash, _)| *hash >= cursor)
            .collect();
        pending.sort_unstable();

        let mut batch = Vec::new();
        let mut next = 0;
        let mut previous: Option<u64> = None;
        for (visited, (hash, key)) in pending.into_iter().enumerate() {
            if visited >= count && previous != Some(hash) {
                next = hash.max(1);
                break;
            }
            if glob_matches(pattern, &key) {
                batch.push(key);
            }
            previous = Some(hash);
        }
        Ok((next, batch))
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        let removed = keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Multi-instance store backed by a Redis connection pool.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::unavailable(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn mode(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        // Redis rejects EX 0.
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let mut conn = self.conn().await?;
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }

    async fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
