//! In-memory datastore backend for the storefront backend.
//!
//! This crate provides an in-memory implementation of the `Datastore` trait
//! from `storefront-storage`, using the papaya lock-free HashMap for
//! concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use storefront_db_memory::InMemoryDatastore;
//! use storefront_storage::Datastore;
//!
//! let store = InMemoryDatastore::new();
//! let product = serde_json::json!({ "name": "Desk lamp", "price": 30 });
//! let created = store
//!     .insert("products", storefront_core::document_from_value(product)?)
//!     .await?;
//! ```

pub mod query;
pub mod storage;

pub use storefront_storage::{Datastore, StorageError};

pub use storage::{InMemoryDatastore, StorageKey};

/// Creates a new shareable in-memory datastore.
pub fn create_datastore() -> storefront_storage::DynDatastore {
    std::sync::Arc::new(InMemoryDatastore::new())
}
