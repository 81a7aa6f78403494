//! S3 client implementation of the object store

use crate::{FileEntry, FileKind, ObjectMeta, ObjectStore, ObjectStoreFactory, S3Settings};
use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use depot_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

/// Object store backed by an S3-compatible service.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint: String,
    public_endpoint: Option<String>,
}

impl S3ObjectStore {
    /// Build a client from a resolved credential set.
    pub fn new(settings: &S3Settings) -> Result<Self> {
        if settings.access_key_id.is_empty() || settings.secret_access_key.is_empty() {
            return Err(Error::Precondition(
                "Object store credentials are not configured".into(),
            ));
        }
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "depot",
        );
        let config = S3ConfigBuilder::new()
            .behavior_version_latest()
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(settings.endpoint.clone())
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            bucket: settings.bucket.clone(),
            endpoint: settings.endpoint.clone(),
            public_endpoint: settings.public_endpoint.clone(),
        })
    }

    /// Rewrite a presigned URL to the public endpoint when one is configured.
    fn rewrite_public(&self, url: String) -> String {
        match &self.public_endpoint {
            Some(public) => url.replace(&self.endpoint, public),
            None => url,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(storage_err)?;
        debug!("Put object: {}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    Error::FileNotFound(key.to_string())
                } else {
                    storage_err(service)
                }
            })?;
        let data = output.body.collect().await.map_err(storage_err)?;
        Ok(data.into_bytes())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(ObjectMeta {
                size: output.content_length().unwrap_or(0),
                last_modified: output.last_modified().map(|t| t.secs()),
                etag: output.e_tag().map(|s| s.to_string()),
            })),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(None)
                } else {
                    Err(storage_err(service))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(storage_err)?;
        debug!("Deleted object: {}/{}", self.bucket, key);
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i64) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter("/")
                .max_keys(max_keys.min(1000) as i32);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let output = request.send().await.map_err(storage_err)?;

            for common in output.common_prefixes() {
                if let Some(dir) = common.prefix() {
                    let name = dir
                        .strip_prefix(prefix)
                        .unwrap_or(dir)
                        .trim_end_matches('/')
                        .to_string();
                    entries.push(FileEntry {
                        name,
                        kind: FileKind::Directory,
                        size: 0,
                        last_modified: None,
                    });
                }
            }
            for object in output.contents() {
                let key = object.key().unwrap_or_default();
                let name = key.strip_prefix(prefix).unwrap_or(key).to_string();
                if name.is_empty() {
                    continue;
                }
                entries.push(FileEntry {
                    name,
                    kind: FileKind::File,
                    size: object.size().unwrap_or(0),
                    last_modified: object.last_modified().map(|t| t.secs()),
                });
            }

            if entries.len() as i64 >= max_keys {
                entries.truncate(max_keys as usize);
                break;
            }
            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(entries)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<i64> {
        let mut count = 0i64;
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let output = request.send().await.map_err(storage_err)?;
            count += output.key_count().unwrap_or(0) as i64;
            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(count)
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<()> {
        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .send()
                .await
                .map_err(storage_err)?;

            let mut identifiers = Vec::new();
            for object in output.contents() {
                if let Some(key) = object.key() {
                    identifiers.push(
                        ObjectIdentifier::builder()
                            .key(key)
                            .build()
                            .map_err(storage_err)?,
                    );
                }
            }
            if identifiers.is_empty() {
                break;
            }
            let batch = identifiers.len();
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(storage_err)?;
            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(storage_err)?;
            debug!("Deleted {} objects under {}/{}", batch, self.bucket, prefix);

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
        }
        Ok(())
    }

    async fn presign_put(&self, key: &str, expires_secs: u64) -> Result<String> {
        let config = PresigningConfig::expires_in(Duration::from_secs(expires_secs))
            .map_err(storage_err)?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(storage_err)?;
        Ok(self.rewrite_public(presigned.uri().to_string()))
    }

    async fn presign_get(&self, key: &str, expires_secs: u64) -> Result<String> {
        let config = PresigningConfig::expires_in(Duration::from_secs(expires_secs))
            .map_err(storage_err)?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(storage_err)?;
        Ok(self.rewrite_public(presigned.uri().to_string()))
    }
}

/// Factory producing real S3 clients, one per resolved credential set.
#[derive(Default)]
pub struct S3ClientFactory;

impl S3ClientFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectStoreFactory for S3ClientFactory {
    fn open(&self, settings: &S3Settings) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::new(S3ObjectStore::new(settings)?))
    }
}
