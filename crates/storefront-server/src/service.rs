//! Resource reads and writes with cache coupling.
//!
//! Every write goes through [`ResourceService`], which sweeps the resource's
//! invalidation topics after the datastore commits. Handlers never touch the
//! cache directly.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use storefront_core::{Document, document_from_value, validate_id};
use storefront_search::{
    EngineError, ListParams, Page, QueryBuilder, QueryError, ResourceSchema, SchemaRegistry,
    SearchEngine,
};
use storefront_storage::{DynDatastore, StorageError};
use thiserror::Error;

use crate::cache::{CacheAside, CacheError, CacheKey, InvalidationSweeper};
use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] QueryError),
    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ServiceError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(e) => Self::Validation(e),
            EngineError::Storage(e) => Self::Storage(e),
        }
    }
}

pub struct ResourceService {
    store: DynDatastore,
    registry: Arc<SchemaRegistry>,
    builder: QueryBuilder,
    cache: CacheAside,
    sweeper: InvalidationSweeper,
    ttl: Duration,
    invalidation_retries: u32,
}

impl ResourceService {
    pub fn new(
        config: &AppConfig,
        store: DynDatastore,
        registry: Arc<SchemaRegistry>,
        cache: CacheAside,
        sweeper: InvalidationSweeper,
    ) -> Self {
        Self {
            store,
            registry,
            builder: QueryBuilder::new(config.query.clone()),
            cache,
            sweeper,
            ttl: config.cache.ttl(),
            invalidation_retries: config.cache.invalidation_retries,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    fn schema(&self, resource: &str) -> Result<Arc<ResourceSchema>, ServiceError> {
        self.registry
            .get(resource)
            .ok_or_else(|| QueryError::UnknownResource(resource.to_string()).into())
    }

    /// One page of `resource`, served through the cache.
    ///
    /// Parameters are validated before the cache is consulted, so malformed
    /// requests never produce cache traffic.
    pub async fn list(&self, resource: &str, params: &ListParams) -> Result<Page, ServiceError> {
        let schema = self.schema(resource)?;
        let built = self.builder.build(&schema, params)?;
        let key = CacheKey::for_list(&schema.topic, &built.descriptor)?;

        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        self.cache
            .get_or_set(&key, self.ttl, move || async move {
                SearchEngine::execute(store.as_ref(), &registry, &built)
                    .await
                    .map_err(ServiceError::from)
            })
            .await
    }

    /// One document with relations expanded, served through the cache.
    /// Missing documents are not cached.
    pub async fn get(&self, resource: &str, id: &str) -> Result<Document, ServiceError> {
        let schema = self.schema(resource)?;
        check_id(id)?;
        let key = CacheKey::for_document(&schema.topic, id);

        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let name = schema.name.clone();
        let id = id.to_string();
        self.cache
            .get_or_set(&key, self.ttl, move || async move {
                SearchEngine::read(store.as_ref(), &registry, &name, &id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(name.as_str(), id.as_str()))
            })
            .await
    }

    pub async fn create(&self, resource: &str, body: Value) -> Result<Document, ServiceError> {
        let schema = self.schema(resource)?;
        let doc = document_from_value(body).map_err(StorageError::from)?;
        let created = self.store.insert(&schema.name, doc).await?;
        self.sweep_after_write(&schema.name).await;
        Ok(created)
    }

    pub async fn update(
        &self,
        resource: &str,
        id: &str,
        body: Value,
    ) -> Result<Document, ServiceError> {
        let schema = self.schema(resource)?;
        check_id(id)?;
        let patch = document_from_value(body).map_err(StorageError::from)?;
        let updated = self
            .store
            .update(&schema.name, id, patch)
            .await
            .map_err(|e| not_found_or(e, &schema.name, id))?;
        self.sweep_after_write(&schema.name).await;
        Ok(updated)
    }

    pub async fn delete(&self, resource: &str, id: &str) -> Result<Document, ServiceError> {
        let schema = self.schema(resource)?;
        check_id(id)?;
        let deleted = self
            .store
            .delete(&schema.name, id)
            .await
            .map_err(|e| not_found_or(e, &schema.name, id))?;
        self.sweep_after_write(&schema.name).await;
        Ok(deleted)
    }

    /// Manual sweep. Unlike write-triggered sweeps, failures are returned.
    pub async fn invalidate_topic(&self, topic: &str) -> Result<u64, ServiceError> {
        Ok(self.sweeper.invalidate_by_topic(topic).await?)
    }

    /// Clear every topic a write to `resource` can make stale.
    ///
    /// The write has already committed, so a failing sweep is logged and
    /// retried but never surfaced to the caller.
    async fn sweep_after_write(&self, resource: &str) {
        let topics = self.registry.invalidation_topics(resource);
        if topics.is_empty() {
            return;
        }

        let attempts = self.invalidation_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match self.sweeper.invalidate_topics(topics).await {
                Ok(deleted) => {
                    tracing::debug!(resource, ?topics, deleted, attempt, "write invalidation done");
                    return;
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(resource, attempt, error = %e, "write invalidation failed, retrying");
                    tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt))).await;
                }
                Err(e) => {
                    tracing::error!(
                        resource,
                        ?topics,
                        attempts,
                        error = %e,
                        "write invalidation gave up; cached reads may be stale until TTL"
                    );
                }
            }
        }
    }
}

fn check_id(id: &str) -> Result<(), ServiceError> {
    validate_id(id).map_err(|e| {
        QueryError::InvalidParameter {
            param: "id".to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn not_found_or(e: StorageError, resource: &str, id: &str) -> ServiceError {
    if e.is_not_found() {
        ServiceError::not_found(resource, id)
    } else {
        e.into()
    }
}
