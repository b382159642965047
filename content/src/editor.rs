//! Shared admin editor pipeline.
//!
//! The six original editors each hand-rolled load/edit/upload/save with
//! small inconsistencies (serial vs. parallel uploads, rollback vs. none).
//! This module is the single replacement: pure array helpers for ordered
//! sub-record lists, staged-image resolution with one concurrency policy
//! (fan out all uploads, abort the save on any failure), and a save that
//! writes the full document once and invalidates the affected cache keys.
//!
//! A staged image is a `data:{mime};base64,{bytes}` string sitting where a
//! retrieval URL belongs, mirroring the original's File-plus-local-preview
//! pair. Resolution walks the document, uploads every staged slot under
//! `{entityType}/{parent}-{slot}.{ext}`, and substitutes the returned URLs.

use std::sync::atomic::{AtomicUsize, Ordering};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use store::{object_path, BlobStore, DocumentStore};
use tokio::sync::watch;
use tracing::warn;

use crate::cache::ContentCache;
use crate::error::ContentError;
use crate::keys;

// ---- Ordered sub-record editing -----------------------------------------
//
// Each helper returns a fresh Vec and leaves the input untouched, matching
// the copy-on-edit discipline the rendering layer depends on.

pub fn append_default<T: Default + Clone>(items: &[T]) -> Vec<T> {
    let mut next = items.to_vec();
    next.push(T::default());
    next
}

/// New list with `patch` applied at `index`; out-of-range leaves an
/// unchanged copy.
pub fn patch_at<T: Clone>(items: &[T], index: usize, patch: impl FnOnce(&mut T)) -> Vec<T> {
    let mut next = items.to_vec();
    if let Some(item) = next.get_mut(index) {
        patch(item);
    }
    next
}

pub fn remove_at<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    let mut next = items.to_vec();
    if index < next.len() {
        next.remove(index);
    }
    next
}

// ---- Staged images -------------------------------------------------------

pub struct StagedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Parses a staged `data:` URL. Returns `None` for anything else (an
/// existing retrieval URL, an empty slot).
pub fn decode_staged(value: &str) -> Option<Result<StagedImage, ContentError>> {
    let rest = value.strip_prefix("data:")?;
    let (mime, payload) = match rest.split_once(";base64,") {
        Some(parts) => parts,
        None => return Some(Err(ContentError::InvalidImage(truncate_for_log(value)))),
    };
    Some(
        BASE64
            .decode(payload)
            .map(|bytes| StagedImage {
                mime: mime.to_string(),
                bytes,
            })
            .map_err(|_| ContentError::InvalidImage(truncate_for_log(value))),
    )
}

fn truncate_for_log(value: &str) -> String {
    value.chars().take(48).collect()
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

struct StagedSlot {
    pointer: String,
    label: String,
    image: StagedImage,
}

fn collect_staged(
    value: &Value,
    pointer: &str,
    label: &str,
    out: &mut Vec<StagedSlot>,
) -> Result<(), ContentError> {
    match value {
        Value::String(s) => {
            if let Some(staged) = decode_staged(s) {
                out.push(StagedSlot {
                    pointer: pointer.to_string(),
                    label: label.to_string(),
                    image: staged?,
                });
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                let child_label = if label.is_empty() {
                    key.clone()
                } else {
                    format!("{label}-{key}")
                };
                collect_staged(child, &format!("{pointer}/{key}"), &child_label, out)?;
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_staged(
                    child,
                    &format!("{pointer}/{index}"),
                    &format!("{label}-{index}"),
                    out,
                )?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Uploads every staged slot in `doc` concurrently and substitutes the
/// returned URLs. Aggregate progress (completed slots) goes out on
/// `progress` as 0-100. Any upload failure fails the whole resolution.
pub async fn resolve_staged_images(
    mut doc: Value,
    entity: &str,
    parent: &str,
    blobs: &dyn BlobStore,
    progress: Option<watch::Sender<u8>>,
) -> Result<Value, ContentError> {
    let mut slots = Vec::new();
    collect_staged(&doc, "", "", &mut slots)?;

    if slots.is_empty() {
        if let Some(tx) = &progress {
            let _ = tx.send(100);
        }
        return Ok(doc);
    }

    let total = slots.len();
    let completed = AtomicUsize::new(0);

    let uploads = slots.into_iter().map(|slot| {
        let completed = &completed;
        let progress = &progress;
        async move {
            let filename = format!("{}.{}", slot.label, extension_for(&slot.image.mime));
            let path = object_path(entity, parent, &filename);
            let url = blobs.put(&path, &slot.image.bytes, None).await?;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(tx) = progress {
                let _ = tx.send(((done * 100) / total) as u8);
            }
            Ok::<(String, String), ContentError>((slot.pointer, url))
        }
    });

    for (pointer, url) in try_join_all(uploads).await? {
        if let Some(slot) = doc.pointer_mut(&pointer) {
            *slot = Value::String(url);
        }
    }

    Ok(doc)
}

/// Extracts the blob path from a retrieval URL produced by our stores.
pub fn blob_path_from_url(url: &str) -> Option<&str> {
    if let Some(path) = url.strip_prefix("memory://") {
        return Some(path);
    }
    url.split_once("/files/").map(|(_, path)| path)
}

/// Best-effort blob delete: failures are logged and swallowed, the caller
/// proceeds either way.
pub async fn delete_blob_best_effort(blobs: &dyn BlobStore, url: &str) {
    let Some(path) = blob_path_from_url(url) else {
        return;
    };
    if let Err(err) = blobs.delete(path).await {
        warn!(path, error = %err, "blob cleanup failed, continuing");
    }
}

// ---- Load and save -------------------------------------------------------

/// Fetches a singleton document, materializing and persisting `default` on
/// first read so subsequent reads succeed.
pub async fn load_or_init(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    default: Value,
) -> Result<Value, ContentError> {
    if let Some(doc) = store.get(collection, id).await? {
        return Ok(doc);
    }
    store.put(collection, id, default.clone()).await?;
    Ok(default)
}

/// The stage -> upload -> merge -> persist -> invalidate round trip shared
/// by every admin editor.
pub struct SavePipeline<'a> {
    pub store: &'a dyn DocumentStore,
    pub blobs: &'a dyn BlobStore,
    pub cache: &'a ContentCache,
}

impl SavePipeline<'_> {
    /// Saves a singleton content document (hero, about, footer). Blob paths
    /// are namespaced by the document id with a timestamp parent. Returns
    /// the merged payload for reconciliation; no refetch.
    pub async fn save_singleton(
        &self,
        id: &str,
        doc: Value,
        cache_keys: &[&str],
        progress: Option<watch::Sender<u8>>,
    ) -> Result<Value, ContentError> {
        let stamp = Utc::now().timestamp_millis().to_string();
        let resolved = resolve_staged_images(doc, id, &stamp, self.blobs, progress).await?;
        let saved = self.store.merge(keys::CONTENT, id, resolved).await?;
        self.invalidate(cache_keys).await;
        Ok(saved)
    }

    /// Saves one document of a collection. Blob paths are namespaced by the
    /// collection with the document id as parent.
    pub async fn save_collection_doc(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
        cache_keys: &[&str],
        progress: Option<watch::Sender<u8>>,
    ) -> Result<Value, ContentError> {
        let resolved = resolve_staged_images(doc, collection, id, self.blobs, progress).await?;
        self.store.put(collection, id, resolved.clone()).await?;
        self.invalidate(cache_keys).await;
        Ok(resolved)
    }

    pub async fn invalidate(&self, cache_keys: &[&str]) {
        for key in cache_keys {
            self.cache.invalidate(key).await;
        }
    }
}
