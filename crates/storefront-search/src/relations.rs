//! Relation expansion for list and read results.
//!
//! Each relation field holds either a single id or an array of ids. One
//! batched lookup is issued per relation field across the whole page, then
//! ids are swapped for the referenced documents: a missing single reference
//! becomes `null`, missing array members are dropped.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use storefront_core::{Document, document_id};
use storefront_storage::{Datastore, StorageError};

use crate::registry::SchemaRegistry;
use crate::schema::RelationField;

pub struct RelationExpander<'a> {
    registry: &'a SchemaRegistry,
    store: &'a dyn Datastore,
}

impl<'a> RelationExpander<'a> {
    pub fn new(registry: &'a SchemaRegistry, store: &'a dyn Datastore) -> Self {
        Self { registry, store }
    }

    /// Expand the declared relations of `resource` in place.
    ///
    /// Resources that are unknown or declare no relations come back untouched.
    pub async fn expand(
        &self,
        resource: &str,
        mut docs: Vec<Document>,
    ) -> Result<Vec<Document>, StorageError> {
        let Some(schema) = self.registry.get(resource) else {
            return Ok(docs);
        };
        if docs.is_empty() || !schema.has_relations() {
            return Ok(docs);
        }

        for relation in &schema.relations {
            let ids = collect_ids(&docs, &relation.field);
            if ids.is_empty() {
                continue;
            }
            let ids: Vec<String> = ids.into_iter().collect();
            let referenced = self.store.find_by_ids(&relation.target, &ids).await?;
            let by_id: HashMap<String, Document> = referenced
                .into_iter()
                .filter_map(|doc| {
                    let id = document_id(&doc)?.to_string();
                    Some((id, doc))
                })
                .collect();

            tracing::trace!(
                resource,
                field = %relation.field,
                requested = ids.len(),
                found = by_id.len(),
                "expanded relation"
            );
            for doc in &mut docs {
                replace_references(doc, relation, &by_id);
            }
        }
        Ok(docs)
    }

    pub async fn expand_one(
        &self,
        resource: &str,
        doc: Document,
    ) -> Result<Document, StorageError> {
        let mut expanded = self.expand(resource, vec![doc]).await?;
        expanded
            .pop()
            .ok_or_else(|| StorageError::internal("relation expansion lost the document"))
    }
}

fn collect_ids(docs: &[Document], field: &str) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for doc in docs {
        match doc.get(field) {
            Some(Value::String(id)) => {
                ids.insert(id.clone());
            }
            Some(Value::Array(items)) => {
                ids.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
            }
            _ => {}
        }
    }
    ids
}

fn replace_references(
    doc: &mut Document,
    relation: &RelationField,
    by_id: &HashMap<String, Document>,
) {
    let Some(value) = doc.get_mut(&relation.field) else {
        return;
    };
    let replacement = match value {
        Value::String(id) => Some(
            by_id
                .get(id.as_str())
                .map(|d| Value::Object(d.clone()))
                .unwrap_or(Value::Null),
        ),
        Value::Array(items) => Some(Value::Array(
            items
                .drain(..)
                .filter_map(|item| match item {
                    Value::String(id) => by_id.get(&id).map(|d| Value::Object(d.clone())),
                    other => Some(other),
                })
                .collect(),
        )),
        _ => None,
    };
    if let Some(replacement) = replacement {
        *value = replacement;
    }
}
