use futures_util::future::try_join;
use serde::{Deserialize, Serialize};
use storefront_core::Document;
use storefront_storage::{Datastore, StorageError};
use thiserror::Error;

use crate::builder::{BuiltQuery, QueryBuilder, QueryError};
use crate::params::ListParams;
use crate::registry::SchemaRegistry;
use crate::relations::RelationExpander;

/// One page of a list query, in the shape the HTTP layer returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub docs: Vec<Document>,
    pub current: u32,
    pub pages: u64,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] QueryError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct SearchEngine;

impl SearchEngine {
    /// Run a built query: page + total concurrently, then relation expansion.
    pub async fn execute(
        store: &dyn Datastore,
        registry: &SchemaRegistry,
        built: &BuiltQuery,
    ) -> Result<Page, EngineError> {
        let descriptor = &built.descriptor;
        let find = descriptor.find_query();
        let (docs, total) = try_join(
            store.find(&descriptor.resource, &find),
            store.count(&built.count.resource, &built.count.conditions),
        )
        .await?;

        let docs = RelationExpander::new(registry, store)
            .expand(&descriptor.resource, docs)
            .await?;

        Ok(Page {
            docs,
            current: descriptor.page,
            pages: descriptor.pages_for(total),
            total,
        })
    }

    /// Resolve the schema, build the query and execute it in one go.
    pub async fn list(
        store: &dyn Datastore,
        registry: &SchemaRegistry,
        builder: &QueryBuilder,
        resource: &str,
        params: &ListParams,
    ) -> Result<Page, EngineError> {
        let schema = registry
            .get(resource)
            .ok_or_else(|| QueryError::UnknownResource(resource.to_string()))?;
        let built = builder.build(&schema, params)?;
        Self::execute(store, registry, &built).await
    }

    /// Read one document with its relations expanded.
    pub async fn read(
        store: &dyn Datastore,
        registry: &SchemaRegistry,
        resource: &str,
        id: &str,
    ) -> Result<Option<Document>, EngineError> {
        let Some(doc) = store.get(resource, id).await? else {
            return Ok(None);
        };
        let doc = RelationExpander::new(registry, store)
            .expand_one(resource, doc)
            .await?;
        Ok(Some(doc))
    }
}
