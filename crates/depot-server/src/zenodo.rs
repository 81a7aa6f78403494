//! External archive adapter
//!
//! Publishing pushes a committed artifact into a Zenodo (or sandbox Zenodo)
//! deposition: metadata first, then every file imported from its presigned
//! download URL, then the publish action. Credentials come from the
//! artifact's merged secrets; the adapter never sees the metadata store.

use async_trait::async_trait;
use depot_core::{Error, Result};
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, info};

/// Operations the lifecycle controller needs from a publishing archive.
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    async fn create_deposition(&self) -> Result<JsonValue>;

    async fn update_metadata(&self, deposition: &JsonValue, metadata: &JsonValue) -> Result<()>;

    /// Import one file into the deposition from a presigned download URL.
    async fn import_file(&self, deposition: &JsonValue, name: &str, url: &str) -> Result<()>;

    /// Publish and return the resulting record.
    async fn publish(&self, deposition: &JsonValue) -> Result<JsonValue>;
}

/// Creates archive clients for a given access token and target archive.
pub trait ArchiveFactory: Send + Sync {
    fn open(&self, token: &str, sandbox: bool) -> Arc<dyn ArchiveClient>;
}

fn archive_err(e: impl std::fmt::Display) -> Error {
    Error::Archive(e.to_string())
}

fn deposition_id(deposition: &JsonValue) -> Result<i64> {
    deposition
        .get("id")
        .and_then(|id| id.as_i64())
        .ok_or_else(|| Error::Archive("Deposition is missing an id".into()))
}

pub struct ZenodoClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ZenodoClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn expect_success(response: reqwest::Response) -> Result<JsonValue> {
        let status = response.status();
        let body: JsonValue = response.json().await.unwrap_or(JsonValue::Null);
        if !status.is_success() {
            return Err(Error::Archive(format!(
                "Archive returned {}: {}",
                status, body
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl ArchiveClient for ZenodoClient {
    async fn create_deposition(&self) -> Result<JsonValue> {
        let url = format!("{}/api/deposit/depositions", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("access_token", &self.token)])
            .json(&json!({}))
            .send()
            .await
            .map_err(archive_err)?;
        let deposition = Self::expect_success(response).await?;
        debug!("Created deposition: {}", deposition.get("id").unwrap_or(&JsonValue::Null));
        Ok(deposition)
    }

    async fn update_metadata(&self, deposition: &JsonValue, metadata: &JsonValue) -> Result<()> {
        let id = deposition_id(deposition)?;
        let url = format!("{}/api/deposit/depositions/{}", self.base_url, id);
        let response = self
            .http
            .put(&url)
            .query(&[("access_token", &self.token)])
            .json(&json!({"metadata": metadata}))
            .send()
            .await
            .map_err(archive_err)?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn import_file(&self, deposition: &JsonValue, name: &str, url: &str) -> Result<()> {
        let bucket = deposition
            .get("links")
            .and_then(|l| l.get("bucket"))
            .and_then(|b| b.as_str())
            .ok_or_else(|| Error::Archive("Deposition is missing a bucket link".into()))?;

        let source = self.http.get(url).send().await.map_err(archive_err)?;
        if !source.status().is_success() {
            return Err(Error::Archive(format!(
                "Failed to fetch '{}' for import: {}",
                name,
                source.status()
            )));
        }
        let body = source.bytes().await.map_err(archive_err)?;

        let target = format!("{}/{}", bucket, name);
        let response = self
            .http
            .put(&target)
            .query(&[("access_token", &self.token)])
            .body(body)
            .send()
            .await
            .map_err(archive_err)?;
        Self::expect_success(response).await?;
        debug!("Imported file '{}' into deposition", name);
        Ok(())
    }

    async fn publish(&self, deposition: &JsonValue) -> Result<JsonValue> {
        let id = deposition_id(deposition)?;
        let url = format!(
            "{}/api/deposit/depositions/{}/actions/publish",
            self.base_url, id
        );
        let response = self
            .http
            .post(&url)
            .query(&[("access_token", &self.token)])
            .send()
            .await
            .map_err(archive_err)?;
        let record = Self::expect_success(response).await?;
        info!("Published deposition {}", id);
        Ok(record)
    }
}

/// Default factory targeting zenodo.org and sandbox.zenodo.org.
#[derive(Default)]
pub struct ZenodoFactory;

impl ZenodoFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveFactory for ZenodoFactory {
    fn open(&self, token: &str, sandbox: bool) -> Arc<dyn ArchiveClient> {
        let base_url = if sandbox {
            "https://sandbox.zenodo.org"
        } else {
            "https://zenodo.org"
        };
        Arc::new(ZenodoClient::new(base_url, token))
    }
}
