//! Cache-aside layer for resource reads.
//!
//! ## Architecture
//!
//! - **Store**: `LocalCacheStore` (DashMap, per instance) or `RedisCacheStore`
//!   (shared across instances)
//! - **Keys**: built only by [`CacheKey`], always prefixed with the topic
//! - **Reads**: [`CacheAside::get_or_set`], fail-open on store errors
//! - **Writes**: [`InvalidationSweeper`] deletes every key of a topic with
//!   `SCAN MATCH *topic*` + `DEL`
//!
//! ## Graceful Degradation
//!
//! If Redis is disabled or unreachable at startup, the server runs on the
//! local store. If it becomes unreachable later, reads bypass the cache
//! until it recovers.

pub mod aside;
pub mod backend;
pub mod key;
pub mod pattern;
pub mod sweeper;

pub use aside::{CacheAside, CacheLookup};
pub use backend::{
    CacheError, CacheStore, CachedEntry, DynCacheStore, LocalCacheStore, RedisCacheStore,
    with_timeout,
};
pub use key::CacheKey;
pub use pattern::{escape_glob, glob_matches};
pub use sweeper::InvalidationSweeper;
