//! Resource schema registry.
//!
//! The registry is assembled once at startup and is read-only afterwards, so
//! it is shared behind an `Arc` without locking. Besides name lookup it
//! precomputes, for every resource, which cache topics a write to that
//! resource must invalidate: its own topic, plus the topics of every resource
//! that embeds it through a relation (a product write also clears cached
//! favorites, because favorites are served with their products expanded).

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::schema::ResourceSchema;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("resource '{0}' registered twice")]
    Duplicate(String),
    #[error("resource '{0}' has an empty topic")]
    EmptyTopic(String),
    #[error("relation {resource}.{field} targets unknown resource '{target}'")]
    UnknownRelationTarget {
        resource: String,
        field: String,
        target: String,
    },
}

/// Immutable lookup table of resource schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Arc<ResourceSchema>>,
    invalidation_topics: HashMap<String, Vec<String>>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResourceSchema>> {
        self.schemas.get(name).cloned()
    }

    /// Topics to sweep after a write to `name`. Empty for unknown resources.
    pub fn invalidation_topics(&self, name: &str) -> &[String] {
        self.invalidation_topics
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<ResourceSchema>,
}

impl SchemaRegistryBuilder {
    pub fn register(mut self, schema: ResourceSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, RegistryError> {
        let mut schemas = IndexMap::with_capacity(self.schemas.len());
        for schema in self.schemas {
            if schema.topic.is_empty() {
                return Err(RegistryError::EmptyTopic(schema.name));
            }
            if schemas.contains_key(&schema.name) {
                return Err(RegistryError::Duplicate(schema.name));
            }
            schemas.insert(schema.name.clone(), Arc::new(schema));
        }

        for schema in schemas.values() {
            for relation in &schema.relations {
                if !schemas.contains_key(&relation.target) {
                    return Err(RegistryError::UnknownRelationTarget {
                        resource: schema.name.clone(),
                        field: relation.field.clone(),
                        target: relation.target.clone(),
                    });
                }
            }
        }

        let mut invalidation_topics = HashMap::with_capacity(schemas.len());
        for (name, schema) in &schemas {
            let mut topics = vec![schema.topic.clone()];
            for embedder in schemas.values() {
                let embeds = embedder.relations.iter().any(|r| &r.target == name);
                if embeds && !topics.contains(&embedder.topic) {
                    topics.push(embedder.topic.clone());
                }
            }
            invalidation_topics.insert(name.clone(), topics);
        }

        tracing::debug!(resources = schemas.len(), "schema registry built");
        Ok(SchemaRegistry {
            schemas,
            invalidation_topics,
        })
    }
}
