use std::sync::Arc;

use content::editor::SavePipeline;
use content::ContentCache;
use store::{BlobStore, DiskBlobStore, DocumentStore, MemoryStore, RedisStore};
use tracing::warn;

use super::config::Config;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub cache: ContentCache,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store: Arc<dyn DocumentStore> = match &config.redis_url {
            Some(url) => Arc::new(
                RedisStore::connect(url)
                    .await
                    .expect("Redis misconfigured!"),
            ),
            None => {
                warn!("REDIS_URL not set, running on the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let blobs: Arc<dyn BlobStore> = Arc::new(DiskBlobStore::new(
            &config.blob_root,
            &config.public_base_url,
        ));

        Arc::new(Self {
            config,
            store,
            blobs,
            cache: ContentCache::new(),
        })
    }

    pub fn pipeline(&self) -> SavePipeline<'_> {
        SavePipeline {
            store: self.store.as_ref(),
            blobs: self.blobs.as_ref(),
            cache: &self.cache,
        }
    }
}
