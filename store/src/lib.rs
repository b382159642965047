//! # Store
//!
//! Storage backends for the portfolio service.
//!
//! Two abstractions live here:
//! - [`DocumentStore`]: schemaless JSON documents grouped into named
//!   collections, with an atomic multi-document batch for writes that must
//!   not diverge (featured flags vs. the homepage settings list).
//! - [`BlobStore`]: uploaded binary assets addressed by
//!   `{entityType}/{timestamp-or-parentId}-{sanitizedFilename}`, returning a
//!   durable retrieval URL per object.
//!
//! Redis backs the document store in production (one hash per collection,
//! id -> JSON string). The in-memory backend serves tests and storeless dev
//! runs with identical semantics.

pub mod blob;
pub mod document;
pub mod error;
pub mod redis_store;

pub use blob::{object_path, sanitize_filename, BlobStore, DiskBlobStore, MemoryBlobStore};
pub use document::{DocumentStore, DocumentWrite, MemoryStore};
pub use error::StoreError;
pub use redis_store::RedisStore;
