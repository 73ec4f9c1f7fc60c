//! Static per-resource query configuration.

use std::collections::BTreeSet;

use storefront_core::{CREATED_AT_FIELD, ID_FIELD};

/// A reference field resolved to a full document of `target` on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationField {
    pub field: String,
    pub target: String,
}

/// Query configuration for one resource type.
///
/// Schemas are created once at startup, registered in a
/// [`SchemaRegistry`](crate::SchemaRegistry) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSchema {
    /// Collection name, also the route segment (`products`, `orders`, ...).
    pub name: String,
    /// Substring carried by every cache key of this resource.
    pub topic: String,
    pub searchable_fields: BTreeSet<String>,
    pub sortable_fields: BTreeSet<String>,
    /// Extra fields accepted as exact-match filters under the whitelisted
    /// filter policy, on top of the searchable and sortable fields.
    pub filterable_fields: BTreeSet<String>,
    pub relations: Vec<RelationField>,
    pub default_sort: String,
}

impl ResourceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            topic: name.clone(),
            name,
            searchable_fields: BTreeSet::new(),
            sortable_fields: BTreeSet::new(),
            filterable_fields: BTreeSet::new(),
            relations: Vec::new(),
            default_sort: CREATED_AT_FIELD.to_string(),
        }
    }

    pub fn searchable(mut self, fields: &[&str]) -> Self {
        self.searchable_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn sortable(mut self, fields: &[&str]) -> Self {
        self.sortable_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn filterable(mut self, fields: &[&str]) -> Self {
        self.filterable_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn relation(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.push(RelationField {
            field: field.into(),
            target: target.into(),
        });
        self
    }

    /// Whether `field` may be used as an exact-match filter when filters are
    /// whitelisted.
    pub fn accepts_filter(&self, field: &str) -> bool {
        field == ID_FIELD
            || self.filterable_fields.contains(field)
            || self.searchable_fields.contains(field)
            || self.sortable_fields.contains(field)
            || self.relations.iter().any(|r| r.field == field)
    }

    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }
}
