//! Blob storage for uploaded assets.
//!
//! Objects live under `{entityType}/{timestamp-or-parentId}-{sanitizedFilename}`
//! and resolve to a durable retrieval URL. Uploads report 0-100 progress
//! through a `watch` channel; deletes are best-effort and callers are
//! expected to log and proceed on failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, RwLock};

use crate::error::StoreError;

const UPLOAD_CHUNK: usize = 64 * 1024;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` at `path` and returns the retrieval URL. When a
    /// progress sender is supplied it advances monotonically and ends at 100.
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        progress: Option<watch::Sender<u8>>,
    ) -> Result<String, StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// Keeps ASCII alphanumerics, `.`, `_` and `-`; everything else becomes `-`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.trim_matches('-').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `{entityType}/{timestamp-or-parentId}-{sanitizedFilename}`
pub fn object_path(entity: &str, parent: &str, filename: &str) -> String {
    format!("{entity}/{parent}-{}", sanitize_filename(filename))
}

fn validate_path(path: &str) -> Result<(), StoreError> {
    let ok = !path.is_empty()
        && !path.starts_with('/')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(path.to_string()))
    }
}

fn send_progress(progress: &Option<watch::Sender<u8>>, percent: u8) {
    if let Some(tx) = progress {
        // Receiver may have been dropped; progress is advisory.
        let _ = tx.send(percent);
    }
}

/// Disk-backed blob store. Files land under `root` and are served by the
/// HTTP layer at `{base_url}/files/{path}`.
pub struct DiskBlobStore {
    root: PathBuf,
    base_url: String,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/files/{path}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        progress: Option<watch::Sender<u8>>,
    ) -> Result<String, StoreError> {
        validate_path(path)?;

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&target).await?;
        let total = bytes.len();
        let mut written = 0usize;
        for chunk in bytes.chunks(UPLOAD_CHUNK.max(1)) {
            file.write_all(chunk).await?;
            written += chunk.len();
            send_progress(&progress, ((written * 100) / total.max(1)) as u8);
        }
        file.flush().await?;
        send_progress(&progress, 100);

        Ok(self.url_for(path))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        validate_path(path)?;
        fs::remove_file(self.root.join(path)).await?;
        Ok(())
    }
}

/// Test backend: records every stored object in memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        progress: Option<watch::Sender<u8>>,
    ) -> Result<String, StoreError> {
        validate_path(path)?;
        send_progress(&progress, 0);
        self.objects
            .write()
            .await
            .insert(path.to_string(), bytes.to_vec());
        send_progress(&progress, 100);
        Ok(format!("memory://{path}"))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.objects.write().await.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my photo (1).png"), "my-photo--1-.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_filename("???"), "file");
    }

    #[test]
    fn object_path_follows_convention() {
        assert_eq!(
            object_path("projects", "1700000000000", "shot 1.png"),
            "projects/1700000000000-shot-1.png"
        );
    }

    #[tokio::test]
    async fn disk_put_writes_file_and_reports_monotonic_progress() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = DiskBlobStore::new(dir.path(), "http://localhost:1111");

        let (tx, mut rx) = watch::channel(0u8);
        let mut seen = vec![*rx.borrow()];
        let bytes = vec![7u8; 200 * 1024];
        let url = blobs
            .put("hero/123-cover.png", &bytes, Some(tx))
            .await
            .unwrap();
        while rx.changed().await.is_ok() {
            seen.push(*rx.borrow());
        }

        assert_eq!(url, "http://localhost:1111/files/hero/123-cover.png");
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
        assert_eq!(
            std::fs::read(dir.path().join("hero/123-cover.png")).unwrap(),
            bytes
        );
    }

    #[tokio::test]
    async fn disk_put_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = DiskBlobStore::new(dir.path(), "http://localhost");
        let err = blobs.put("../escape.png", b"x", None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn memory_delete_is_idempotent() {
        let blobs = MemoryBlobStore::new();
        blobs.put("blog/1-a.png", b"img", None).await.unwrap();
        blobs.delete("blog/1-a.png").await.unwrap();
        blobs.delete("blog/1-a.png").await.unwrap();
        assert!(blobs.is_empty().await);
    }
}
