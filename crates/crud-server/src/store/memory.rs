//! In-process document store
//!
//! Collections live in memory behind an async `RwLock`. `_id` is unique per
//! collection, as in MongoDB; documents inserted without one get a UUID.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{matches_filter, BulkWriteSummary, Document, DocumentStore, StoreError, StoreResult};

const ID_FIELD: &str = "_id";

/// Registry of in-memory collections
#[derive(Clone, Default)]
pub struct MemoryDataSource {
    collections: Arc<Mutex<HashMap<String, Arc<MemoryStore>>>>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collection, creating it on first use. Repeated calls share
    /// the same data.
    pub fn store(&self, collection: &str) -> Arc<MemoryStore> {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new(collection)))
            .clone()
    }
}

/// One in-memory collection
pub struct MemoryStore {
    name: String,
    documents: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn ensure_id(document: &mut Document) -> Value {
    document
        .entry(ID_FIELD)
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()))
        .clone()
}

fn contains_id(documents: &[Document], id: &Value) -> bool {
    documents.iter().any(|d| d.get(ID_FIELD) == Some(id))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &Document) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|d| matches_filter(d, filter))
            .cloned()
            .collect())
    }

    async fn find_one(&self, filter: &Document) -> StoreResult<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|d| matches_filter(d, filter)).cloned())
    }

    async fn insert_one(&self, mut document: Document) -> StoreResult<Document> {
        let mut documents = self.documents.write().await;
        let id = ensure_id(&mut document);
        if contains_id(&documents, &id) {
            return Err(StoreError::DuplicateKey(format!("{}: {}", self.name, id)));
        }
        documents.push(document.clone());
        Ok(document)
    }

    async fn insert_many(
        &self,
        batch: Vec<Document>,
    ) -> StoreResult<Option<BulkWriteSummary>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let mut documents = self.documents.write().await;
        let mut inserted_ids = Vec::with_capacity(batch.len());
        let mut rejected_ids = Vec::new();

        for mut document in batch {
            let id = ensure_id(&mut document);
            if contains_id(&documents, &id) {
                rejected_ids.push(id);
                continue;
            }
            inserted_ids.push(id);
            documents.push(document);
        }

        Ok(Some(BulkWriteSummary {
            inserted_count: inserted_ids.len(),
            inserted_ids,
            rejected_ids,
        }))
    }

    async fn replace_upsert(
        &self,
        filter: &Document,
        mut replacement: Document,
    ) -> StoreResult<Option<Document>> {
        let mut documents = self.documents.write().await;

        if let Some(existing) = documents.iter_mut().find(|d| matches_filter(d, filter)) {
            // `_id` is immutable across a replace.
            if let Some(id) = existing.get(ID_FIELD).cloned() {
                replacement.insert(ID_FIELD.to_string(), id);
            }
            *existing = replacement.clone();
            return Ok(Some(replacement));
        }

        if !replacement.contains_key(ID_FIELD) {
            if let Some(id) = filter.get(ID_FIELD).filter(|v| !v.is_object()) {
                replacement.insert(ID_FIELD.to_string(), id.clone());
            }
        }
        let id = ensure_id(&mut replacement);
        if contains_id(&documents, &id) {
            return Err(StoreError::DuplicateKey(format!("{}: {}", self.name, id)));
        }
        documents.push(replacement.clone());
        Ok(Some(replacement))
    }

    async fn delete_one(&self, filter: &Document) -> StoreResult<Option<Document>> {
        let mut documents = self.documents.write().await;
        let position = documents.iter().position(|d| matches_filter(d, filter));
        Ok(position.map(|index| documents.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::field_filter;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_rejects_duplicates() {
        let store = MemoryStore::new("customers");

        let stored = store.insert_one(doc(json!({ "name": "Ada" }))).await.unwrap();
        assert!(stored.get("_id").and_then(Value::as_str).is_some());

        store.insert_one(doc(json!({ "_id": "c-1" }))).await.unwrap();
        let err = store.insert_one(doc(json!({ "_id": "c-1" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_many_rejects_taken_ids() {
        let store = MemoryStore::new("customers");
        store.insert_one(doc(json!({ "_id": "c-2" }))).await.unwrap();

        let summary = store
            .insert_many(vec![
                doc(json!({ "_id": "c-1" })),
                doc(json!({ "_id": "c-2" })),
                doc(json!({ "_id": "c-1" })),
            ])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.inserted_count, 1);
        assert_eq!(summary.inserted_ids, vec![json!("c-1")]);
        assert_eq!(summary.rejected_ids, vec![json!("c-2"), json!("c-1")]);
        assert_eq!(store.len().await, 2);

        assert!(store.insert_many(Vec::new()).await.unwrap().is_none());

        let summary = store
            .insert_many(vec![doc(json!({ "_id": "c-3" })), doc(json!({ "_id": "c-4" }))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.inserted_count, 2);
        assert_eq!(summary.inserted_ids, vec![json!("c-3"), json!("c-4")]);
        assert!(summary.rejected_ids.is_empty());
    }

    #[tokio::test]
    async fn test_replace_upsert_keeps_id() {
        let store = MemoryStore::new("accounts");
        store
            .insert_one(doc(json!({ "_id": "a-1", "number": "ACC-1", "balance": 10 })))
            .await
            .unwrap();

        let replaced = store
            .replace_upsert(
                &field_filter("number", "ACC-1"),
                doc(json!({ "number": "ACC-1", "balance": 25 })),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced.get("_id"), Some(&json!("a-1")));
        assert_eq!(replaced.get("balance"), Some(&json!(25)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_upsert_inserts_when_missing() {
        let store = MemoryStore::new("accounts");
        let inserted = store
            .replace_upsert(&field_filter("_id", "a-9"), doc(json!({ "balance": 1 })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inserted.get("_id"), Some(&json!("a-9")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_one() {
        let store = MemoryStore::new("banks");
        store.insert_one(doc(json!({ "_id": "b-1" }))).await.unwrap();

        assert!(store.delete_one(&field_filter("_id", "b-1")).await.unwrap().is_some());
        assert!(store.delete_one(&field_filter("_id", "b-1")).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_data_source_shares_collections() {
        let source = MemoryDataSource::new();
        source
            .store("cities")
            .insert_one(doc(json!({ "_id": "lim" })))
            .await
            .unwrap();

        assert_eq!(source.store("cities").len().await, 1);
        assert!(source.store("banks").is_empty().await);
    }
}
