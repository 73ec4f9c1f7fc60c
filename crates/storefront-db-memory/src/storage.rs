use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};
use storefront_core::{Document, stamp_created, stamp_updated};
use storefront_storage::{Condition, Datastore, FindQuery, StorageError};

use crate::query::{compare_by, matches_all};

pub type StorageKey = String; // Format: "collection/id"

pub(crate) fn make_storage_key(collection: &str, id: &str) -> StorageKey {
    format!("{collection}/{id}")
}

/// A document plus its insertion sequence, used as the final sort tiebreak.
#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    doc: Document,
}

/// In-memory datastore using papaya lock-free HashMap.
///
/// All collections share one map keyed by `collection/id`. Queries scan the
/// collection's keys, so this backend is meant for tests, demos and small
/// single-instance deployments.
#[derive(Debug)]
pub struct InMemoryDatastore {
    data: Arc<PapayaHashMap<StorageKey, StoredDocument>>,
    seq: AtomicU64,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            seq: AtomicU64::new(1),
        }
    }

    /// Number of documents across all collections.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collection_docs(&self, collection: &str, conditions: &[Condition]) -> Vec<StoredDocument> {
        let prefix = format!("{collection}/");
        let guard = self.data.pin();
        guard
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter(|(_, stored)| matches_all(conditions, &stored.doc))
            .map(|(_, stored)| stored.clone())
            .collect()
    }
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn insert(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<Document, StorageError> {
        let id = stamp_created(&mut document)?;
        let key = make_storage_key(collection, &id);
        let stored = StoredDocument {
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            doc: document.clone(),
        };
        let guard = self.data.pin();
        if guard.try_insert(key, stored).is_err() {
            return Err(StorageError::already_exists(collection, id));
        }
        tracing::trace!(collection, id = %id, "document inserted");
        Ok(document)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError> {
        let key = make_storage_key(collection, id);
        let guard = self.data.pin();
        Ok(guard.get(&key).map(|stored| stored.doc.clone()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Document, StorageError> {
        let key = make_storage_key(collection, id);
        let guard = self.data.pin();
        // Read-modify-write in one step so concurrent patches and deletes cannot
        // interleave. The closure may run again if the entry changed underneath.
        let outcome = guard.compute(key, |entry| match entry {
            None => Operation::Abort(StorageError::not_found(collection, id)),
            Some((_, stored)) => {
                let mut next = stored.clone();
                match stamp_updated(&mut next.doc, patch.clone()) {
                    Ok(()) => Operation::Insert(next),
                    Err(e) => Operation::Abort(e.into()),
                }
            }
        });
        match outcome {
            Compute::Updated {
                new: (_, stored), ..
            } => Ok(stored.doc.clone()),
            Compute::Aborted(err) => Err(err),
            Compute::Inserted(..) | Compute::Removed(..) => Err(StorageError::internal(
                format!("unexpected map state updating {collection}/{id}"),
            )),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<Document, StorageError> {
        let key = make_storage_key(collection, id);
        let guard = self.data.pin();
        guard
            .remove(&key)
            .map(|stored| stored.doc.clone())
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
    ) -> Result<Vec<Document>, StorageError> {
        let mut docs = self.collection_docs(collection, &query.conditions);
        match &query.sort {
            Some(sort) => {
                docs.sort_by(|a, b| compare_by(sort, &a.doc, &b.doc).then(a.seq.cmp(&b.seq)))
            }
            None => docs.sort_by_key(|d| d.seq),
        }

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| d.doc)
            .collect())
    }

    async fn count(&self, collection: &str, conditions: &[Condition]) -> Result<u64, StorageError> {
        Ok(self.collection_docs(collection, conditions).len() as u64)
    }

    async fn find_by_ids(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<Document>, StorageError> {
        let guard = self.data.pin();
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(&make_storage_key(collection, id)))
            .map(|stored| stored.doc.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use storefront_core::document_from_value;
    use storefront_storage::{MatchMode, SortSpec};

    fn doc(value: Value) -> Document {
        document_from_value(value).unwrap()
    }

    async fn seed_products(store: &InMemoryDatastore, n: usize) {
        for i in 0..n {
            store
                .insert(
                    "products",
                    doc(json!({"name": format!("Product {i:02}"), "price": i})),
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn insert_get_update_delete() {
        let store = InMemoryDatastore::new();
        let created = store
            .insert("orders", doc(json!({"status": "pending"})))
            .await
            .unwrap();
        let id = created["_id"].as_str().unwrap().to_string();

        let fetched = store.get("orders", &id).await.unwrap().unwrap();
        assert_eq!(fetched["status"], "pending");
        assert!(store.get("products", &id).await.unwrap().is_none());

        let updated = store
            .update("orders", &id, doc(json!({"status": "paid"})))
            .await
            .unwrap();
        assert_eq!(updated["status"], "paid");
        assert_eq!(updated["createdAt"], created["createdAt"]);

        store.delete("orders", &id).await.unwrap();
        assert!(store.get("orders", &id).await.unwrap().is_none());
        assert!(store.delete("orders", &id).await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_patches_to_different_fields_all_land() {
        let store = Arc::new(InMemoryDatastore::new());
        for round in 0..50 {
            let created = store
                .insert("orders", doc(json!({"code": format!("R-{round}")})))
                .await
                .unwrap();
            let id = created["_id"].as_str().unwrap().to_string();

            let tasks: Vec<_> = (0..8)
                .map(|n| {
                    let store = Arc::clone(&store);
                    let id = id.clone();
                    tokio::spawn(async move {
                        let mut patch = Document::new();
                        patch.insert(format!("f{n}"), json!(n));
                        store.update("orders", &id, patch).await
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let stored = store.get("orders", &id).await.unwrap().unwrap();
            for n in 0..8 {
                assert_eq!(stored[&format!("f{n}")], n, "round {round} lost f{n}");
            }
        }
    }

    #[tokio::test]
    async fn update_after_delete_does_not_resurrect() {
        let store = InMemoryDatastore::new();
        let created = store
            .insert("orders", doc(json!({"status": "pending"})))
            .await
            .unwrap();
        let id = created["_id"].as_str().unwrap().to_string();

        store.delete("orders", &id).await.unwrap();
        let err = store
            .update("orders", &id, doc(json!({"status": "paid"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get("orders", &id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryDatastore::new();
        store
            .insert("vouchers", doc(json!({"_id": "SPRING"})))
            .await
            .unwrap();
        let err = store
            .insert("vouchers", doc(json!({"_id": "SPRING"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn twelve_products_five_per_page() {
        let store = InMemoryDatastore::new();
        seed_products(&store, 12).await;

        assert_eq!(store.count("products", &[]).await.unwrap(), 12);
        let page3 = FindQuery::default()
            .with_sort(SortSpec::ascending("createdAt"))
            .with_window(10, 5);
        let docs = store.find("products", &page3).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["name"], "Product 10");
        assert_eq!(docs[1]["name"], "Product 11");
    }

    #[tokio::test]
    async fn find_filters_and_sorts() {
        let store = InMemoryDatastore::new();
        seed_products(&store, 6).await;

        let query = FindQuery::new(vec![Condition::text(
            "name",
            MatchMode::EndsWith,
            "3",
        )]);
        let docs = store.find("products", &query).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["price"], 3);

        let query = FindQuery::default().with_sort(SortSpec::descending("price"));
        let docs = store.find("products", &query).await.unwrap();
        assert_eq!(docs.first().unwrap()["price"], 5);
        assert_eq!(docs.last().unwrap()["price"], 0);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = InMemoryDatastore::new();
        seed_products(&store, 3).await;
        store
            .insert("orders", doc(json!({"status": "paid"})))
            .await
            .unwrap();
        assert_eq!(store.count("orders", &[]).await.unwrap(), 1);
        assert_eq!(store.count("products", &[]).await.unwrap(), 3);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn find_by_ids_skips_missing() {
        let store = InMemoryDatastore::new();
        let a = store
            .insert("brands", doc(json!({"name": "Acme"})))
            .await
            .unwrap();
        let id = a["_id"].as_str().unwrap().to_string();
        let docs = store
            .find_by_ids("brands", &[id, "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "Acme");
    }
}
