//! Topic-based invalidation via cursor scans.
//!
//! A sweep for `orders` deletes every key containing `orders`, not just keys
//! that start with it. That over-invalidates (a payments query filtered by an
//! order code goes too) but never misses a key built through [`CacheKey`].
//!
//! [`CacheKey`]: super::key::CacheKey

use std::time::Duration;

use super::backend::{CacheError, DynCacheStore, with_timeout};
use super::pattern::escape_glob;
use crate::metrics;

#[derive(Clone)]
pub struct InvalidationSweeper {
    store: DynCacheStore,
    batch_size: usize,
    op_timeout: Duration,
}

impl InvalidationSweeper {
    pub fn new(store: DynCacheStore, batch_size: usize, op_timeout: Duration) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            op_timeout,
        }
    }

    /// Delete every key whose name contains `topic`; returns how many were deleted.
    ///
    /// Each `SCAN` step and each `DEL` is bounded by the operation timeout.
    /// The first failing step aborts the sweep; keys already deleted stay deleted.
    pub async fn invalidate_by_topic(&self, topic: &str) -> Result<u64, CacheError> {
        if topic.is_empty() {
            // `**` would match the whole keyspace.
            tracing::warn!("ignoring sweep for empty topic");
            return Ok(0);
        }

        let pattern = format!("*{}*", escape_glob(topic));
        let mut cursor = 0u64;
        let mut deleted = 0u64;
        loop {
            let (next, keys) = with_timeout(
                self.op_timeout,
                self.store.scan(cursor, &pattern, self.batch_size),
            )
            .await?;
            if !keys.is_empty() {
                deleted += with_timeout(self.op_timeout, self.store.del(&keys)).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        metrics::record_sweep(topic, deleted);
        tracing::debug!(topic, deleted, "topic sweep complete");
        Ok(deleted)
    }

    /// Sweep several topics in order, summing the deletions.
    pub async fn invalidate_topics<S: AsRef<str>>(&self, topics: &[S]) -> Result<u64, CacheError> {
        let mut deleted = 0;
        for topic in topics {
            deleted += self.invalidate_by_topic(topic.as_ref()).await?;
        }
        Ok(deleted)
    }
}
