//! # storefront-storage
//!
//! Datastore abstraction for the storefront backend.
//!
//! This crate defines the [`Datastore`] trait and the storage-agnostic query
//! types the search layer produces. It does not contain any implementations;
//! those live in separate backend crates.
//!
//! ## Example
//!
//! ```ignore
//! use storefront_storage::{Condition, Datastore, FindQuery, SortSpec};
//!
//! async fn cheapest(store: &dyn Datastore) -> Result<Vec<Document>, StorageError> {
//!     let query = FindQuery::new(vec![Condition::eq("status", "active")])
//!         .with_sort(SortSpec::ascending("price"))
//!         .with_window(0, 10);
//!     store.find("products", &query).await
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::StorageError;
pub use traits::Datastore;
pub use types::{Condition, FindQuery, MatchMode, SortDirection, SortSpec};

/// Type alias for a shareable datastore instance.
pub type DynDatastore = std::sync::Arc<dyn Datastore>;
