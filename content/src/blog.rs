//! Blog posts.
//!
//! The excerpt is derived at save time when the operator leaves it empty:
//! tags stripped out of the HTML body, truncated to 150 characters, with a
//! trailing ellipsis. The selected status is persisted as selected; public
//! listings only surface `published` posts.

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::editor::{delete_blob_best_effort, SavePipeline};
use crate::error::ContentError;
use crate::keys;
use crate::model::{BlogPost, BlogStatus};

const EXCERPT_LEN: usize = 150;

/// Strips HTML tags out of `html`, leaving text content only.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// First 150 characters of the tag-stripped content, plus "...".
pub fn derive_excerpt(content: &str) -> String {
    let stripped = strip_tags(content);
    let mut excerpt: String = stripped.chars().take(EXCERPT_LEN).collect();
    excerpt.push_str("...");
    excerpt
}

/// Saves a post, creating it when `id` is `None`. Fills in the derived
/// excerpt, stamps timestamps, resolves the staged cover image, persists,
/// and invalidates the blog cache.
pub async fn save_post(
    pipeline: &SavePipeline<'_>,
    id: Option<String>,
    mut post: BlogPost,
    progress: Option<watch::Sender<u8>>,
) -> Result<(String, BlogPost), ContentError> {
    let now = Utc::now();
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if post.excerpt.trim().is_empty() {
        post.excerpt = derive_excerpt(&post.content);
    }
    if post.publish_date.is_none() && post.status == BlogStatus::Published {
        post.publish_date = Some(now);
    }
    if post.created_at.is_none() {
        post.created_at = Some(now);
    }
    post.updated_at = Some(now);

    let saved = pipeline
        .save_collection_doc(
            keys::BLOG,
            &id,
            serde_json::to_value(&post)?,
            &[keys::BLOG_CACHE],
            progress,
        )
        .await?;

    Ok((id, serde_json::from_value(saved)?))
}

/// Every post regardless of status, newest first; the admin listing.
pub async fn list_all(
    store: &dyn store::DocumentStore,
) -> Result<Vec<(String, BlogPost)>, ContentError> {
    let mut posts: Vec<(String, BlogPost)> = store
        .list(keys::BLOG)
        .await?
        .into_iter()
        .filter_map(|(id, doc)| {
            serde_json::from_value::<BlogPost>(doc)
                .ok()
                .map(|post| (id, post))
        })
        .collect();
    posts.sort_by_key(|(_, post)| {
        std::cmp::Reverse(post.publish_date.or(post.created_at).unwrap_or_default())
    });
    Ok(posts)
}

/// Published posts, newest first by publish date (created date fallback).
pub async fn list_published(
    store: &dyn store::DocumentStore,
) -> Result<Vec<(String, BlogPost)>, ContentError> {
    let mut posts: Vec<(String, BlogPost)> = store
        .list(keys::BLOG)
        .await?
        .into_iter()
        .filter_map(|(id, doc)| {
            serde_json::from_value::<BlogPost>(doc)
                .ok()
                .map(|post| (id, post))
        })
        .filter(|(_, post)| post.status == BlogStatus::Published)
        .collect();
    posts.sort_by_key(|(_, post)| {
        std::cmp::Reverse(post.publish_date.or(post.created_at).unwrap_or_default())
    });
    Ok(posts)
}

pub async fn get_post(
    store: &dyn store::DocumentStore,
    id: &str,
) -> Result<Option<BlogPost>, ContentError> {
    Ok(store
        .get(keys::BLOG, id)
        .await?
        .map(serde_json::from_value)
        .transpose()?)
}

/// Deletes a post. Its cover blob goes first, best effort.
pub async fn delete_post(pipeline: &SavePipeline<'_>, id: &str) -> Result<(), ContentError> {
    if let Some(doc) = pipeline.store.get(keys::BLOG, id).await? {
        if let Some(Value::String(cover)) = doc.get("coverImage") {
            if !cover.is_empty() {
                delete_blob_best_effort(pipeline.blobs, cover).await;
            }
        }
    }
    pipeline.store.delete(keys::BLOG, id).await?;
    pipeline.invalidate(&[keys::BLOG_CACHE]).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ContentCache;
    use store::{DocumentStore, MemoryBlobStore, MemoryStore};

    fn pipeline<'a>(
        store: &'a MemoryStore,
        blobs: &'a MemoryBlobStore,
        cache: &'a ContentCache,
    ) -> SavePipeline<'a> {
        SavePipeline {
            store,
            blobs,
            cache,
        }
    }

    #[test]
    fn excerpt_strips_tags_and_truncates() {
        let long = format!("<p>{}</p>", "x".repeat(400));
        let excerpt = derive_excerpt(&long);
        assert_eq!(excerpt.chars().count(), 153);
        assert!(excerpt.ends_with("..."));
        assert!(!excerpt.contains('<'));

        assert_eq!(derive_excerpt("<p>World</p>"), "World...");
    }

    #[tokio::test]
    async fn missing_excerpt_is_derived_and_draft_status_is_honored() {
        let (store, blobs, cache) = (MemoryStore::new(), MemoryBlobStore::new(), ContentCache::new());
        let pipeline = pipeline(&store, &blobs, &cache);

        let post = BlogPost {
            title: "Hello".into(),
            content: "<p>World</p>".into(),
            status: BlogStatus::Draft,
            ..Default::default()
        };

        let (id, saved) = save_post(&pipeline, None, post, None).await.unwrap();

        assert_eq!(saved.excerpt, "World...");
        assert_eq!(saved.status, BlogStatus::Draft);
        assert!(saved.created_at.is_some());

        let stored = store.get(keys::BLOG, &id).await.unwrap().unwrap();
        assert_eq!(stored["status"], "draft");
        assert_eq!(stored["excerpt"], "World...");
    }

    #[tokio::test]
    async fn supplied_excerpt_is_kept() {
        let (store, blobs, cache) = (MemoryStore::new(), MemoryBlobStore::new(), ContentCache::new());
        let pipeline = pipeline(&store, &blobs, &cache);

        let post = BlogPost {
            title: "Hello".into(),
            content: "<p>World</p>".into(),
            excerpt: "my own summary".into(),
            status: BlogStatus::Published,
            ..Default::default()
        };

        let (_, saved) = save_post(&pipeline, None, post, None).await.unwrap();
        assert_eq!(saved.excerpt, "my own summary");
        assert!(saved.publish_date.is_some());
    }

    #[tokio::test]
    async fn listing_only_returns_published_posts_newest_first() {
        let (store, blobs, cache) = (MemoryStore::new(), MemoryBlobStore::new(), ContentCache::new());
        let pipeline = pipeline(&store, &blobs, &cache);

        for (title, status, day) in [
            ("draft", BlogStatus::Draft, 1),
            ("old", BlogStatus::Published, 2),
            ("new", BlogStatus::Published, 3),
        ] {
            let post = BlogPost {
                title: title.into(),
                content: "<p>body</p>".into(),
                status,
                publish_date: Some(
                    chrono::DateTime::parse_from_rfc3339(&format!("2026-08-0{day}T00:00:00Z"))
                        .unwrap()
                        .with_timezone(&Utc),
                ),
                ..Default::default()
            };
            save_post(&pipeline, None, post, None).await.unwrap();
        }

        let titles: Vec<String> = list_published(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, post)| post.title)
            .collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn delete_removes_the_cover_blob_first() {
        let (store, blobs, cache) = (MemoryStore::new(), MemoryBlobStore::new(), ContentCache::new());
        let pipeline = pipeline(&store, &blobs, &cache);

        let post = BlogPost {
            title: "Hello".into(),
            content: "<p>World</p>".into(),
            cover_image: "data:image/png;base64,aGVsbG8=".into(),
            ..Default::default()
        };
        let (id, saved) = save_post(&pipeline, None, post, None).await.unwrap();
        assert!(saved.cover_image.starts_with("memory://"));
        assert_eq!(blobs.len().await, 1);

        delete_post(&pipeline, &id).await.unwrap();
        assert!(blobs.is_empty().await);
        assert!(store.get(keys::BLOG, &id).await.unwrap().is_none());
    }
}
