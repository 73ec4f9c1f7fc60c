pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod rate_limit;
pub mod server;
pub mod service;

pub use cache::{
    CacheAside, CacheError, CacheKey, CacheLookup, CacheStore, DynCacheStore,
    InvalidationSweeper, LocalCacheStore, RedisCacheStore,
};
pub use config::{AppConfig, CacheConfig, RateLimitConfig, RedisConfig};
pub use error::ApiError;
pub use rate_limit::{RateDecision, RateLimiter};
pub use server::{AppState, ServerBuilder, StorefrontServer, build_app};
pub use service::{ResourceService, ServiceError};

use std::sync::Arc;
use std::time::Duration;

/// Create the cache store based on configuration.
///
/// If Redis is disabled or unreachable, falls back to the local store.
pub async fn create_cache_store(config: &RedisConfig) -> DynCacheStore {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache store");
        return Arc::new(LocalCacheStore::new());
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Duration::from_millis(config.timeout_ms);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| deadpool_redis::PoolConfig::new(config.pool_size));
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache store."
            );
            return Arc::new(LocalCacheStore::new());
        }
    };

    // Test connection
    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            Arc::new(RedisCacheStore::new(pool))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Redis unreachable at startup. Falling back to local cache store."
            );
            Arc::new(LocalCacheStore::new())
        }
    }
}
