//! # Redis
//!
//! Production document store.
//!
//! ## Layout
//!
//! - One hash per collection under `doc:{collection}`
//! - Hash field = document id, hash value = the JSON document as a string
//! - Compact pairs and O(1) lookups; collections here are small (tens of
//!   documents), so `HGETALL` per list is fine
//! - `put_many` runs as an atomic `MULTI`/`EXEC` pipeline so the featured
//!   flag and the homepage settings list cannot diverge on partial failure
//! - `insert_if_absent` maps to `HSETNX`, closing the subscriber race the
//!   old pre-insert existence check left open

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use serde_json::Value;

use crate::document::{shallow_merge, DocumentStore, DocumentWrite};
use crate::error::StoreError;

pub struct RedisStore {
    manager: ConnectionManager,
}

fn hash_key(collection: &str) -> String {
    format!("doc:{collection}")
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let client = Client::open(redis_url)?;
        let manager = client.get_connection_manager_with_config(config).await?;

        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.hget(hash_key(collection), id).await?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let raw = serde_json::to_string(&doc)?;
        let _: () = conn.hset(hash_key(collection), id, raw).await?;
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<Value, StoreError> {
        // Read-merge-write, same discipline as every caller of this store.
        let existing = self.get(collection, id).await?;
        let merged = shallow_merge(existing, patch);
        self.put(collection, id, merged.clone()).await?;
        Ok(merged)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.hdel(hash_key(collection), id).await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let mut conn = self.conn();
        let raw: Vec<(String, String)> = conn.hgetall(hash_key(collection)).await?;
        let mut docs = raw
            .into_iter()
            .map(|(id, s)| Ok((id, serde_json::from_str(&s)?)))
            .collect::<Result<Vec<(String, Value)>, StoreError>>()?;
        docs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(docs)
    }

    async fn put_many(&self, writes: Vec<DocumentWrite>) -> Result<(), StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for write in &writes {
            let raw = serde_json::to_string(&write.doc)?;
            pipe.hset(hash_key(&write.collection), &write.id, raw).ignore();
        }
        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        id: &str,
        doc: Value,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let raw = serde_json::to_string(&doc)?;
        let inserted: bool = conn.hset_nx(hash_key(collection), id, raw).await?;
        Ok(inserted)
    }
}
