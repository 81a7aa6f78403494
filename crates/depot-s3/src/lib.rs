//! Object store adapter for Depot
//!
//! Blobs and per-version snapshots live in an S3-compatible object store.
//! Clients are created per request from a resolved credential set, since an
//! artifact (or its parent) may carry its own storage credentials in
//! secrets. Uploads and downloads never flow through the service; it mints
//! short-lived presigned URLs instead.

pub mod client;
pub mod keys;
pub mod memory;

pub use client::{S3ClientFactory, S3ObjectStore};
pub use memory::{MemoryBackend, MemoryObjectStore, MemoryStoreFactory};

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A fully resolved object-store credential set for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
    /// Key prefix prepended to every object key; may be empty.
    pub prefix: String,
    /// When set, presigned URL hosts are rewritten to this endpoint.
    pub public_endpoint: Option<String>,
}

/// Metadata returned by a HEAD request.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub size: i64,
    pub last_modified: Option<i64>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// One entry of a file listing, named relative to the listed prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub size: i64,
    #[serde(default)]
    pub last_modified: Option<i64>,
}

/// Operations the artifact manager needs from a bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Bytes>;

    /// `Ok(None)` when the object does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// List entries under `prefix` (which must end with `/`), grouping by
    /// `/` into directory entries, up to `max_keys`.
    async fn list(&self, prefix: &str, max_keys: i64) -> Result<Vec<FileEntry>>;

    /// Number of objects under `prefix`, paginating as needed.
    async fn count_prefix(&self, prefix: &str) -> Result<i64>;

    /// Delete every object under `prefix`.
    async fn remove_prefix(&self, prefix: &str) -> Result<()>;

    async fn presign_put(&self, key: &str, expires_secs: u64) -> Result<String>;

    async fn presign_get(&self, key: &str, expires_secs: u64) -> Result<String>;
}

/// Creates per-request object store clients from resolved credentials.
pub trait ObjectStoreFactory: Send + Sync {
    fn open(&self, settings: &S3Settings) -> Result<Arc<dyn ObjectStore>>;
}
