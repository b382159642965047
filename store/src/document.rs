//! Schemaless document storage.
//!
//! Documents are `serde_json::Value` objects keyed by `(collection, id)`.
//! Singletons use a fixed well-known id (`content/about`), collections use
//! generated ids. The application layer imposes shape; the store does not.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// One document write inside an atomic batch.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub collection: String,
    pub id: String,
    pub doc: Value,
}

impl DocumentWrite {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, doc: Value) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            doc,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Shallow merge: top-level fields of `patch` overwrite the stored
    /// document (treated as an empty object when absent). Returns the merged
    /// document as written.
    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<Value, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// All documents of a collection with their ids, in stable id order.
    /// Ordering by a document field (createdAt, order) is the caller's job.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// Writes every document or none of them.
    async fn put_many(&self, writes: Vec<DocumentWrite>) -> Result<(), StoreError>;

    /// Creates the document only when no document with this id exists.
    /// Returns whether the insert happened. The check and the write are one
    /// atomic step on every backend.
    async fn insert_if_absent(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, StoreError>;
}

pub(crate) fn shallow_merge(existing: Option<Value>, patch: Value) -> Value {
    let mut base = match existing {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    if let Value::Object(fields) = patch {
        for (key, value) in fields {
            base.insert(key, value);
        }
    }
    Value::Object(base)
}

/// In-memory document store. Collections are `BTreeMap`s so `list` order is
/// deterministic.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<Value, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let merged = shallow_merge(docs.get(id).cloned(), patch);
        docs.insert(id.to_string(), merged.clone());
        Ok(merged)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_many(&self, writes: Vec<DocumentWrite>) -> Result<(), StoreError> {
        // One write guard covers the whole batch.
        let mut collections = self.collections.write().await;
        for write in writes {
            collections
                .entry(write.collection)
                .or_default()
                .insert(write.id, write.doc);
        }
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Ok(false);
        }
        docs.insert(id.to_string(), doc);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn merge_overwrites_top_level_fields_only() {
        let store = MemoryStore::new();
        store
            .put("content", "about", json!({"name": "Ada", "location": "London"}))
            .await
            .unwrap();

        let merged = store
            .merge("content", "about", json!({"location": "Paris"}))
            .await
            .unwrap();

        assert_eq!(merged["name"], "Ada");
        assert_eq!(merged["location"], "Paris");
        assert_eq!(
            store.get("content", "about").await.unwrap().unwrap(),
            merged
        );
    }

    #[tokio::test]
    async fn merge_materializes_missing_document() {
        let store = MemoryStore::new();
        let merged = store
            .merge("content", "hero", json!({"heading": "Hi"}))
            .await
            .unwrap();
        assert_eq!(merged, json!({"heading": "Hi"}));
    }

    #[tokio::test]
    async fn put_many_writes_every_document() {
        let store = MemoryStore::new();
        store
            .put_many(vec![
                DocumentWrite::new("projects", "p1", json!({"featured": true})),
                DocumentWrite::new("settings", "homepage", json!({"featuredProjects": ["p1"]})),
            ])
            .await
            .unwrap();

        assert_eq!(
            store.get("projects", "p1").await.unwrap().unwrap()["featured"],
            true
        );
        assert_eq!(
            store.get("settings", "homepage").await.unwrap().unwrap()["featuredProjects"],
            json!(["p1"])
        );
    }

    #[tokio::test]
    async fn insert_if_absent_rejects_duplicates() {
        let store = MemoryStore::new();
        let first = store
            .insert_if_absent("subscribers", "a@b.c", json!({"active": true}))
            .await
            .unwrap();
        let second = store
            .insert_if_absent("subscribers", "a@b.c", json!({"active": false}))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(
            store.get("subscribers", "a@b.c").await.unwrap().unwrap()["active"],
            true
        );
    }

    #[tokio::test]
    async fn list_returns_stable_id_order() {
        let store = MemoryStore::new();
        store.put("blog", "b", json!({})).await.unwrap();
        store.put("blog", "a", json!({})).await.unwrap();

        let ids: Vec<String> = store
            .list("blog")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
