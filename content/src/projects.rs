//! Projects and the featured-project mirror.
//!
//! A project's `featured` flag and its id in `settings/homepage`'s
//! `featuredProjects` list are the same fact stored twice. Every toggle
//! writes both documents in one atomic batch so they cannot diverge on
//! partial failure. The cap of 3 is checked before any write: a rejected
//! toggle never reaches the store.

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::editor::{
    delete_blob_best_effort, load_or_init, resolve_staged_images, SavePipeline,
};
use crate::error::ContentError;
use crate::keys;
use crate::model::{HomepageSettings, Project, FEATURED_CAP, PROJECT_IMAGE_SLOTS};
use store::DocumentWrite;

async fn load_settings(store: &dyn store::DocumentStore) -> Result<HomepageSettings, ContentError> {
    let doc = load_or_init(
        store,
        keys::SETTINGS,
        keys::HOMEPAGE_ID,
        serde_json::to_value(HomepageSettings::default())?,
    )
    .await?;
    Ok(serde_json::from_value(doc)?)
}

/// Applies `featured` for `id` to the settings list, enforcing the cap.
/// Returns `None` when the list is already in the requested state.
fn updated_featured_list(
    settings: &HomepageSettings,
    id: &str,
    featured: bool,
) -> Result<Option<Vec<String>>, ContentError> {
    let listed = settings.featured_projects.iter().any(|p| p == id);
    match (featured, listed) {
        (true, true) | (false, false) => Ok(None),
        (true, false) => {
            if settings.featured_projects.len() >= FEATURED_CAP {
                return Err(ContentError::FeaturedCapReached);
            }
            let mut next = settings.featured_projects.clone();
            next.push(id.to_string());
            Ok(Some(next))
        }
        (false, true) => Ok(Some(
            settings
                .featured_projects
                .iter()
                .filter(|p| p.as_str() != id)
                .cloned()
                .collect(),
        )),
    }
}

/// All projects, newest first.
pub async fn list_projects(
    store: &dyn store::DocumentStore,
) -> Result<Vec<(String, Project)>, ContentError> {
    let mut projects: Vec<(String, Project)> = store
        .list(keys::PROJECTS)
        .await?
        .into_iter()
        .filter_map(|(id, doc)| serde_json::from_value(doc).ok().map(|p| (id, p)))
        .collect();
    projects.sort_by_key(|(_, p): &(String, Project)| std::cmp::Reverse(p.created_at));
    Ok(projects)
}

/// The homepage's featured projects, in settings order. An empty settings
/// list falls back to the three most recent projects.
pub async fn featured_projects(
    store: &dyn store::DocumentStore,
) -> Result<Vec<(String, Project)>, ContentError> {
    let settings = load_settings(store).await?;

    if settings.featured_projects.is_empty() {
        let mut recent = list_projects(store).await?;
        recent.truncate(FEATURED_CAP);
        return Ok(recent);
    }

    let mut projects = Vec::with_capacity(settings.featured_projects.len());
    for id in &settings.featured_projects {
        if let Some(doc) = store.get(keys::PROJECTS, id).await? {
            projects.push((id.clone(), serde_json::from_value(doc)?));
        }
    }
    Ok(projects)
}

/// Saves a project, creating it when `id` is `None`. The settings list is
/// brought in line with the `featured` flag in the same atomic batch.
pub async fn save_project(
    pipeline: &SavePipeline<'_>,
    id: Option<String>,
    mut project: Project,
    progress: Option<watch::Sender<u8>>,
) -> Result<(String, Project), ContentError> {
    let now = Utc::now();
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if project.created_at.is_none() {
        project.created_at = Some(now);
    }
    project.updated_at = Some(now);
    project.images.truncate(PROJECT_IMAGE_SLOTS);

    let settings = load_settings(pipeline.store).await?;
    let featured_update = updated_featured_list(&settings, &id, project.featured)?;

    let resolved = resolve_staged_images(
        serde_json::to_value(&project)?,
        keys::PROJECTS,
        &id,
        pipeline.blobs,
        progress,
    )
    .await?;

    let mut writes = vec![DocumentWrite::new(keys::PROJECTS, &id, resolved.clone())];
    if let Some(featured_projects) = featured_update {
        writes.push(DocumentWrite::new(
            keys::SETTINGS,
            keys::HOMEPAGE_ID,
            serde_json::to_value(HomepageSettings { featured_projects })?,
        ));
    }
    pipeline.store.put_many(writes).await?;
    pipeline
        .invalidate(&[keys::PROJECTS_CACHE, keys::FEATURED_CACHE])
        .await;

    Ok((id, serde_json::from_value(resolved)?))
}

/// Toggles the featured flag. Cap reached plus toggle-on is rejected before
/// any store call; otherwise the flag and the settings list are written in
/// one batch. Returns the resulting featured id list.
pub async fn toggle_featured(
    pipeline: &SavePipeline<'_>,
    id: &str,
    featured: bool,
) -> Result<Vec<String>, ContentError> {
    let settings = load_settings(pipeline.store).await?;
    let featured_update = updated_featured_list(&settings, id, featured)?;

    let doc = pipeline
        .store
        .get(keys::PROJECTS, id)
        .await?
        .ok_or(ContentError::NotFound("project"))?;
    let mut project: Project = serde_json::from_value(doc)?;
    project.featured = featured;
    project.updated_at = Some(Utc::now());

    let featured_projects =
        featured_update.unwrap_or_else(|| settings.featured_projects.clone());
    pipeline
        .store
        .put_many(vec![
            DocumentWrite::new(keys::PROJECTS, id, serde_json::to_value(&project)?),
            DocumentWrite::new(
                keys::SETTINGS,
                keys::HOMEPAGE_ID,
                serde_json::to_value(HomepageSettings {
                    featured_projects: featured_projects.clone(),
                })?,
            ),
        ])
        .await?;
    pipeline
        .invalidate(&[keys::PROJECTS_CACHE, keys::FEATURED_CACHE])
        .await;

    Ok(featured_projects)
}

/// Deletes a project: image blobs best effort, then the document, then the
/// settings list entry when present.
pub async fn delete_project(pipeline: &SavePipeline<'_>, id: &str) -> Result<(), ContentError> {
    if let Some(doc) = pipeline.store.get(keys::PROJECTS, id).await? {
        if let Some(Value::Array(images)) = doc.get("images") {
            for image in images {
                if let Value::String(url) = image {
                    if !url.is_empty() {
                        delete_blob_best_effort(pipeline.blobs, url).await;
                    }
                }
            }
        }
    }
    pipeline.store.delete(keys::PROJECTS, id).await?;

    let settings = load_settings(pipeline.store).await?;
    if settings.featured_projects.iter().any(|p| p == id) {
        let featured_projects = settings
            .featured_projects
            .into_iter()
            .filter(|p| p != id)
            .collect();
        pipeline
            .store
            .put(
                keys::SETTINGS,
                keys::HOMEPAGE_ID,
                serde_json::to_value(HomepageSettings { featured_projects })?,
            )
            .await?;
    }

    pipeline
        .invalidate(&[keys::PROJECTS_CACHE, keys::FEATURED_CACHE])
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use store::{DocumentStore, MemoryBlobStore, MemoryStore, StoreError};

    /// Delegating store that counts mutating calls.
    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                writes: AtomicUsize::new(0),
            }
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn get(&self, c: &str, id: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(c, id).await
        }
        async fn put(&self, c: &str, id: &str, doc: Value) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put(c, id, doc).await
        }
        async fn merge(&self, c: &str, id: &str, patch: Value) -> Result<Value, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.merge(c, id, patch).await
        }
        async fn delete(&self, c: &str, id: &str) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(c, id).await
        }
        async fn list(&self, c: &str) -> Result<Vec<(String, Value)>, StoreError> {
            self.inner.list(c).await
        }
        async fn put_many(&self, writes: Vec<DocumentWrite>) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put_many(writes).await
        }
        async fn insert_if_absent(
            &self,
            c: &str,
            id: &str,
            doc: Value,
        ) -> Result<bool, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_if_absent(c, id, doc).await
        }
    }

    async fn seed_projects(pipeline: &SavePipeline<'_>, n: usize, featured: bool) -> Vec<String> {
        let mut ids = Vec::new();
        for i in 0..n {
            let project = Project {
                title: format!("p{i}"),
                featured,
                ..Default::default()
            };
            let (id, _) = save_project(pipeline, None, project, None).await.unwrap();
            ids.push(id);
        }
        ids
    }

    #[tokio::test]
    async fn fourth_featured_toggle_is_rejected_without_a_store_write() {
        let store = CountingStore::new();
        let (blobs, cache) = (MemoryBlobStore::new(), ContentCache::new());
        let pipeline = SavePipeline {
            store: &store,
            blobs: &blobs,
            cache: &cache,
        };

        seed_projects(&pipeline, 3, true).await;
        let extra = seed_projects(&pipeline, 1, false).await.remove(0);

        let baseline = store.write_count();
        let err = toggle_featured(&pipeline, &extra, true).await.unwrap_err();
        assert!(matches!(err, ContentError::FeaturedCapReached));
        assert_eq!(store.write_count(), baseline);

        let settings = load_settings(&store).await.unwrap();
        assert_eq!(settings.featured_projects.len(), 3);
        assert!(!settings.featured_projects.contains(&extra));
    }

    #[tokio::test]
    async fn toggle_updates_flag_and_list_together() {
        let store = MemoryStore::new();
        let (blobs, cache) = (MemoryBlobStore::new(), ContentCache::new());
        let pipeline = SavePipeline {
            store: &store,
            blobs: &blobs,
            cache: &cache,
        };

        let id = seed_projects(&pipeline, 1, false).await.remove(0);

        let listed = toggle_featured(&pipeline, &id, true).await.unwrap();
        assert_eq!(listed, vec![id.clone()]);
        let doc = store.get(keys::PROJECTS, &id).await.unwrap().unwrap();
        assert_eq!(doc["featured"], true);

        let listed = toggle_featured(&pipeline, &id, false).await.unwrap();
        assert!(listed.is_empty());
        let doc = store.get(keys::PROJECTS, &id).await.unwrap().unwrap();
        assert_eq!(doc["featured"], false);
    }

    #[tokio::test]
    async fn empty_settings_falls_back_to_most_recent() {
        let store = MemoryStore::new();
        let (blobs, cache) = (MemoryBlobStore::new(), ContentCache::new());
        let pipeline = SavePipeline {
            store: &store,
            blobs: &blobs,
            cache: &cache,
        };

        seed_projects(&pipeline, 5, false).await;
        let featured = featured_projects(&store).await.unwrap();
        assert_eq!(featured.len(), 3);
    }

    #[tokio::test]
    async fn delete_clears_blobs_and_settings_entry() {
        let store = MemoryStore::new();
        let (blobs, cache) = (MemoryBlobStore::new(), ContentCache::new());
        let pipeline = SavePipeline {
            store: &store,
            blobs: &blobs,
            cache: &cache,
        };

        let project = Project {
            title: "shots".into(),
            images: vec!["data:image/png;base64,aGVsbG8=".into()],
            featured: true,
            ..Default::default()
        };
        let (id, _) = save_project(&pipeline, None, project, None).await.unwrap();
        assert_eq!(blobs.len().await, 1);

        delete_project(&pipeline, &id).await.unwrap();
        assert!(blobs.is_empty().await);
        assert!(store.get(keys::PROJECTS, &id).await.unwrap().is_none());
        let settings = load_settings(&store).await.unwrap();
        assert!(settings.featured_projects.is_empty());
    }
}
