//! Public read-path cache.
//!
//! One explicit object constructed at startup and injected into every
//! reader, replacing the original's hidden module-level map. Entries carry
//! their own TTL; a failed refresh falls back to the stale entry when one
//! exists. Invalidations are broadcast on a typed bus, which replaces the
//! localStorage/storage-event signaling the browser app used.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use crate::error::ContentError;

struct CacheEntry {
    payload: Value,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.ttl
    }
}

pub struct ContentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    invalidations: broadcast::Sender<String>,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(64);
        Self {
            entries: RwLock::new(HashMap::new()),
            invalidations,
        }
    }

    /// Returns the cached payload while fresh; otherwise runs `loader` and
    /// caches the result. A loader failure returns the stale payload when
    /// one exists (stale-on-error) and propagates otherwise.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<Value, ContentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ContentError>>,
    {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.is_fresh(now) {
                    return Ok(entry.payload.clone());
                }
            }
        }

        match loader().await {
            Ok(payload) => {
                let mut entries = self.entries.write().await;
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        payload: payload.clone(),
                        fetched_at: now,
                        ttl,
                    },
                );
                Ok(payload)
            }
            Err(err) => {
                let entries = self.entries.read().await;
                if let Some(stale) = entries.get(key) {
                    warn!(key, error = %err, "refresh failed, serving stale entry");
                    return Ok(stale.payload.clone());
                }
                Err(err)
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
        // No receivers is fine; the bus is advisory.
        let _ = self.invalidations.send(key.to_string());
    }

    pub async fn invalidate_all(&self) {
        let keys: Vec<String> = {
            let mut entries = self.entries.write().await;
            let keys = entries.keys().cloned().collect();
            entries.clear();
            keys
        };
        for key in keys {
            let _ = self.invalidations.send(key);
        }
    }

    /// Receiver of invalidated cache keys.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.invalidations.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_millis(40);

    #[tokio::test]
    async fn second_call_within_ttl_skips_the_loader() {
        let cache = ContentCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let got = cache
                .get_or_fetch("hero-content", TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"heading": "Hi"}))
                })
                .await
                .unwrap();
            assert_eq!(got["heading"], "Hi");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(TTL + Duration::from_millis(10)).await;
        cache
            .get_or_fetch("hero-content", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"heading": "Hi"}))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_entry_survives_a_failed_refresh() {
        let cache = ContentCache::new();
        cache
            .get_or_fetch("footer-content", TTL, || async { Ok(json!({"v": 1})) })
            .await
            .unwrap();

        tokio::time::sleep(TTL + Duration::from_millis(10)).await;

        let got = cache
            .get_or_fetch("footer-content", TTL, || async {
                Err(ContentError::NotFound("footer"))
            })
            .await
            .unwrap();
        assert_eq!(got, json!({"v": 1}));
    }

    #[tokio::test]
    async fn error_with_no_entry_propagates() {
        let cache = ContentCache::new();
        let err = cache
            .get_or_fetch("about-content", TTL, || async {
                Err(ContentError::NotFound("about"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NotFound("about")));
    }

    #[tokio::test]
    async fn invalidate_drops_the_entry_and_notifies() {
        let cache = ContentCache::new();
        let mut rx = cache.subscribe();
        let calls = AtomicUsize::new(0);

        cache
            .get_or_fetch("blog-posts", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!([]))
            })
            .await
            .unwrap();
        cache.invalidate("blog-posts").await;

        assert_eq!(rx.recv().await.unwrap(), "blog-posts");

        cache
            .get_or_fetch("blog-posts", TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!([]))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_entry() {
        let cache = ContentCache::new();
        let calls = AtomicUsize::new(0);

        for key in ["projects", "featured-projects"] {
            cache
                .get_or_fetch(key, TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!([]))
                })
                .await
                .unwrap();
        }
        cache.invalidate_all().await;

        for key in ["projects", "featured-projects"] {
            cache
                .get_or_fetch(key, TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!([]))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
