//! Resource categories and their embedded ordered items.
//!
//! Categories rank by a contiguous gapless `order`; items keep their
//! position inside the category. Drag-and-drop reordering applies the new
//! order optimistically and persists it in one batch; a failed write
//! discards the optimistic order by returning a fresh fetch.

use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use crate::editor::{delete_blob_best_effort, SavePipeline};
use crate::error::ContentError;
use crate::keys;
use crate::model::{ResourceCategory, ResourceItem};
use store::DocumentWrite;

/// Categories in display order.
pub async fn list_categories(
    store: &dyn store::DocumentStore,
) -> Result<Vec<(String, ResourceCategory)>, ContentError> {
    let mut categories: Vec<(String, ResourceCategory)> = store
        .list(keys::RESOURCE_CATEGORIES)
        .await?
        .into_iter()
        .filter_map(|(id, doc)| serde_json::from_value(doc).ok().map(|c| (id, c)))
        .collect();
    categories.sort_by_key(|(_, c): &(String, ResourceCategory)| c.order);
    Ok(categories)
}

/// Saves a category, creating it when `id` is `None`. New categories rank
/// last; items without an id get one.
pub async fn save_category(
    pipeline: &SavePipeline<'_>,
    id: Option<String>,
    mut category: ResourceCategory,
    progress: Option<watch::Sender<u8>>,
) -> Result<(String, ResourceCategory), ContentError> {
    let is_new = id.is_none();
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if is_new {
        category.order = list_categories(pipeline.store).await?.len() as i64;
    }
    for item in &mut category.items {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
    }

    let saved = pipeline
        .save_collection_doc(
            keys::RESOURCE_CATEGORIES,
            &id,
            serde_json::to_value(&category)?,
            &[keys::RESOURCES_CACHE],
            progress,
        )
        .await?;

    Ok((id, serde_json::from_value(saved)?))
}

/// Pure item move for drag-and-drop inside one category; returns a fresh
/// list, input untouched.
pub fn reorder_items(items: &[ResourceItem], from: usize, to: usize) -> Vec<ResourceItem> {
    let mut next = items.to_vec();
    if from < next.len() && to < next.len() {
        let item = next.remove(from);
        next.insert(to, item);
    }
    next
}

pub struct ReorderOutcome {
    /// The order to display: optimistic on success, a fresh fetch after a
    /// failed write.
    pub categories: Vec<(String, ResourceCategory)>,
    pub persisted: bool,
}

/// Applies `ordered_ids` as the new category ranking. Orders are rewritten
/// contiguously from 0 and persisted in one batch. On a write failure the
/// optimistic order is dropped and the outcome carries a fresh fetch.
pub async fn reorder_categories(
    pipeline: &SavePipeline<'_>,
    ordered_ids: &[String],
) -> Result<ReorderOutcome, ContentError> {
    let current = list_categories(pipeline.store).await?;

    let mut optimistic: Vec<(String, ResourceCategory)> = Vec::with_capacity(current.len());
    for id in ordered_ids {
        if let Some((_, category)) = current.iter().find(|(cid, _)| cid == id) {
            optimistic.push((id.clone(), category.clone()));
        }
    }
    // Ids missing from the request keep their relative order at the end.
    for (id, category) in &current {
        if !ordered_ids.contains(id) {
            optimistic.push((id.clone(), category.clone()));
        }
    }
    for (rank, (_, category)) in optimistic.iter_mut().enumerate() {
        category.order = rank as i64;
    }

    let writes = optimistic
        .iter()
        .map(|(id, category)| {
            Ok(DocumentWrite::new(
                keys::RESOURCE_CATEGORIES,
                id,
                serde_json::to_value(category)?,
            ))
        })
        .collect::<Result<Vec<_>, ContentError>>()?;

    match pipeline.store.put_many(writes).await {
        Ok(()) => {
            pipeline.invalidate(&[keys::RESOURCES_CACHE]).await;
            Ok(ReorderOutcome {
                categories: optimistic,
                persisted: true,
            })
        }
        Err(err) => {
            warn!(error = %err, "reorder write failed, reverting to stored order");
            Ok(ReorderOutcome {
                categories: list_categories(pipeline.store).await?,
                persisted: false,
            })
        }
    }
}

/// Deletes a category: item image blobs best effort, then the document,
/// then a contiguous rewrite of the remaining ranks.
pub async fn delete_category(pipeline: &SavePipeline<'_>, id: &str) -> Result<(), ContentError> {
    if let Some(doc) = pipeline.store.get(keys::RESOURCE_CATEGORIES, id).await? {
        if let Some(Value::Array(items)) = doc.get("items") {
            for item in items {
                if let Some(Value::String(url)) = item.get("image") {
                    if !url.is_empty() {
                        delete_blob_best_effort(pipeline.blobs, url).await;
                    }
                }
            }
        }
    }
    pipeline.store.delete(keys::RESOURCE_CATEGORIES, id).await?;

    let remaining = list_categories(pipeline.store).await?;
    let writes = remaining
        .into_iter()
        .enumerate()
        .map(|(rank, (cid, mut category))| {
            category.order = rank as i64;
            Ok(DocumentWrite::new(
                keys::RESOURCE_CATEGORIES,
                cid,
                serde_json::to_value(&category)?,
            ))
        })
        .collect::<Result<Vec<_>, ContentError>>()?;
    pipeline.store.put_many(writes).await?;

    pipeline.invalidate(&[keys::RESOURCES_CACHE]).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use store::{DocumentStore, MemoryBlobStore, MemoryStore, StoreError};

    /// Delegating store whose `put_many` can be made to fail once.
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_batch: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_next_batch: AtomicBool::new(false),
            }
        }

        fn fail_next_batch(&self) {
            self.fail_next_batch.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get(&self, c: &str, id: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(c, id).await
        }
        async fn put(&self, c: &str, id: &str, doc: Value) -> Result<(), StoreError> {
            self.inner.put(c, id, doc).await
        }
        async fn merge(&self, c: &str, id: &str, patch: Value) -> Result<Value, StoreError> {
            self.inner.merge(c, id, patch).await
        }
        async fn delete(&self, c: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(c, id).await
        }
        async fn list(&self, c: &str) -> Result<Vec<(String, Value)>, StoreError> {
            self.inner.list(c).await
        }
        async fn put_many(&self, writes: Vec<DocumentWrite>) -> Result<(), StoreError> {
            if self.fail_next_batch.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.inner.put_many(writes).await
        }
        async fn insert_if_absent(
            &self,
            c: &str,
            id: &str,
            doc: Value,
        ) -> Result<bool, StoreError> {
            self.inner.insert_if_absent(c, id, doc).await
        }
    }

    async fn seed<'a>(pipeline: &SavePipeline<'a>, names: &[&str]) -> Vec<String> {
        let mut ids = Vec::new();
        for name in names {
            let category = ResourceCategory {
                name: name.to_string(),
                ..Default::default()
            };
            let (id, _) = save_category(pipeline, None, category, None).await.unwrap();
            ids.push(id);
        }
        ids
    }

    fn names(categories: &[(String, ResourceCategory)]) -> Vec<String> {
        categories.iter().map(|(_, c)| c.name.clone()).collect()
    }

    #[tokio::test]
    async fn reorder_persists_contiguous_ranks() {
        let store = MemoryStore::new();
        let (blobs, cache) = (MemoryBlobStore::new(), ContentCache::new());
        let pipeline = SavePipeline {
            store: &store,
            blobs: &blobs,
            cache: &cache,
        };

        let ids = seed(&pipeline, &["a", "b", "c"]).await;
        let new_order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];

        let outcome = reorder_categories(&pipeline, &new_order).await.unwrap();
        assert!(outcome.persisted);
        assert_eq!(names(&outcome.categories), vec!["c", "a", "b"]);

        let stored = list_categories(&store).await.unwrap();
        assert_eq!(names(&stored), vec!["c", "a", "b"]);
        let orders: Vec<i64> = stored.iter().map(|(_, c)| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn failed_reorder_rolls_back_to_the_stored_order() {
        let store = FlakyStore::new();
        let (blobs, cache) = (MemoryBlobStore::new(), ContentCache::new());
        let pipeline = SavePipeline {
            store: &store,
            blobs: &blobs,
            cache: &cache,
        };

        let ids = seed(&pipeline, &["a", "b", "c"]).await;

        store.fail_next_batch();
        let new_order = vec![ids[2].clone(), ids[1].clone(), ids[0].clone()];
        let outcome = reorder_categories(&pipeline, &new_order).await.unwrap();

        assert!(!outcome.persisted);
        // Displayed order equals a fresh fetch, not the optimistic order.
        assert_eq!(names(&outcome.categories), vec!["a", "b", "c"]);
        assert_eq!(
            names(&list_categories(&store).await.unwrap()),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn item_move_returns_a_fresh_list() {
        let items: Vec<ResourceItem> = ["x", "y", "z"]
            .iter()
            .map(|t| ResourceItem {
                id: t.to_string(),
                title: t.to_string(),
                ..Default::default()
            })
            .collect();

        let moved = reorder_items(&items, 2, 0);
        let titles: Vec<&str> = moved.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["z", "x", "y"]);
        assert_eq!(items[0].title, "x");
        // Out-of-range move is a no-op copy.
        assert_eq!(reorder_items(&items, 5, 0).len(), 3);
    }

    #[tokio::test]
    async fn delete_compacts_remaining_ranks() {
        let store = MemoryStore::new();
        let (blobs, cache) = (MemoryBlobStore::new(), ContentCache::new());
        let pipeline = SavePipeline {
            store: &store,
            blobs: &blobs,
            cache: &cache,
        };

        let ids = seed(&pipeline, &["a", "b", "c"]).await;
        delete_category(&pipeline, &ids[1]).await.unwrap();

        let remaining = list_categories(&store).await.unwrap();
        assert_eq!(names(&remaining), vec!["a", "c"]);
        let orders: Vec<i64> = remaining.iter().map(|(_, c)| c.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }
}
