//! The datastore trait every backend implements.

use async_trait::async_trait;
use storefront_core::Document;

use crate::error::StorageError;
use crate::types::{Condition, FindQuery};

/// Document storage for all storefront collections.
///
/// Collections are addressed by resource name (`"products"`, `"orders"`, ...).
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use storefront_storage::{Datastore, StorageError};
///
/// async fn get_order(store: &dyn Datastore, id: &str) -> Result<Document, StorageError> {
///     store
///         .get("orders", id)
///         .await?
///         .ok_or_else(|| StorageError::not_found("orders", id))
/// }
/// ```
#[async_trait]
pub trait Datastore: Send + Sync {
    // ==================== CRUD Operations ====================

    /// Inserts a new document and returns it as stored.
    ///
    /// The backend assigns `_id` (unless a valid one is supplied) and the
    /// `createdAt`/`updatedAt` timestamps.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the supplied `_id` is taken.
    async fn insert(&self, collection: &str, document: Document)
    -> Result<Document, StorageError>;

    /// Reads a document by ID. Returns `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError>;

    /// Merges `patch` into an existing document and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Document, StorageError>;

    /// Deletes a document by ID and returns the removed document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<Document, StorageError>;

    // ==================== Queries ====================

    /// Runs a filter/sort/skip/limit query.
    async fn find(&self, collection: &str, query: &FindQuery)
    -> Result<Vec<Document>, StorageError>;

    /// Counts documents matching every condition, ignoring pagination.
    async fn count(&self, collection: &str, conditions: &[Condition]) -> Result<u64, StorageError>;

    /// Fetches the documents with the given IDs. Missing IDs are skipped and
    /// the result order is unspecified.
    async fn find_by_ids(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Document>, StorageError>;
}
