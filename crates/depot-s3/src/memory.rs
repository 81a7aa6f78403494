//! In-memory object store
//!
//! Backs the lifecycle test suites and local development; behaves like a
//! bucket with instant consistency. Presigned URLs use a `memory://` scheme
//! and are only meaningful to code holding the same backend.

use crate::{FileEntry, FileKind, ObjectMeta, ObjectStore, ObjectStoreFactory, S3Settings};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::utils::now_secs;
use depot_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared storage for every bucket, keyed by `bucket/key`.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, (Bytes, i64)>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// View of the shared backend bound to one bucket.
pub struct MemoryObjectStore {
    backend: Arc<MemoryBackend>,
    bucket: String,
}

impl MemoryObjectStore {
    pub fn new(backend: Arc<MemoryBackend>, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        let mut objects = self.backend.objects.write().await;
        objects.insert(self.full_key(key), (body, now_secs()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let objects = self.backend.objects.read().await;
        objects
            .get(&self.full_key(key))
            .map(|(data, _)| data.clone())
            .ok_or_else(|| Error::FileNotFound(key.to_string()))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let objects = self.backend.objects.read().await;
        Ok(objects.get(&self.full_key(key)).map(|(data, modified)| ObjectMeta {
            size: data.len() as i64,
            last_modified: Some(*modified),
            etag: None,
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut objects = self.backend.objects.write().await;
        objects.remove(&self.full_key(key));
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i64) -> Result<Vec<FileEntry>> {
        let full_prefix = self.full_key(prefix);
        let objects = self.backend.objects.read().await;
        let mut entries: Vec<FileEntry> = Vec::new();
        let mut seen_dirs = std::collections::HashSet::new();

        for (key, (data, modified)) in objects.range(full_prefix.clone()..) {
            if !key.starts_with(&full_prefix) {
                break;
            }
            let rest = &key[full_prefix.len()..];
            if rest.is_empty() {
                continue;
            }
            match rest.find('/') {
                Some(idx) => {
                    let dir = rest[..idx].to_string();
                    if seen_dirs.insert(dir.clone()) {
                        entries.push(FileEntry {
                            name: dir,
                            kind: FileKind::Directory,
                            size: 0,
                            last_modified: None,
                        });
                    }
                }
                None => entries.push(FileEntry {
                    name: rest.to_string(),
                    kind: FileKind::File,
                    size: data.len() as i64,
                    last_modified: Some(*modified),
                }),
            }
            if entries.len() as i64 >= max_keys {
                break;
            }
        }
        Ok(entries)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<i64> {
        let full_prefix = self.full_key(prefix);
        let objects = self.backend.objects.read().await;
        Ok(objects
            .range(full_prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&full_prefix))
            .count() as i64)
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<()> {
        let full_prefix = self.full_key(prefix);
        let mut objects = self.backend.objects.write().await;
        let doomed: Vec<String> = objects
            .range(full_prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&full_prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            objects.remove(&key);
        }
        Ok(())
    }

    async fn presign_put(&self, key: &str, expires_secs: u64) -> Result<String> {
        Ok(format!(
            "memory://{}/{}?op=put&expires={}",
            self.bucket, key, expires_secs
        ))
    }

    async fn presign_get(&self, key: &str, expires_secs: u64) -> Result<String> {
        Ok(format!(
            "memory://{}/{}?op=get&expires={}",
            self.bucket, key, expires_secs
        ))
    }
}

/// Factory handing out views into one shared in-memory backend.
pub struct MemoryStoreFactory {
    backend: Arc<MemoryBackend>,
}

impl MemoryStoreFactory {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

impl ObjectStoreFactory for MemoryStoreFactory {
    fn open(&self, settings: &S3Settings) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(MemoryObjectStore::new(
            self.backend.clone(),
            settings.bucket.clone(),
        )))
    }
}
