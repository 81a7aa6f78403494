//! Embedding service
//!
//! Turns batches of texts into vectors. Providers are pluggable and picked
//! by the `provider:model` string in a collection's `embedding_model`
//! config, e.g. `openai:text-embedding-3-small`.

use async_trait::async_trait;
use depot_core::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Registry of embedding providers, keyed by provider name.
#[derive(Default)]
pub struct EmbeddingRegistry {
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Embed `texts` with the provider named in `model_spec`
    /// (`provider:model`).
    pub async fn embed(&self, model_spec: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (provider_name, model) = model_spec.split_once(':').ok_or_else(|| {
            Error::Validation(format!(
                "Embedding model must be `provider:model`, e.g. 'openai:text-embedding-3-small', got: '{}'",
                model_spec
            ))
        })?;
        let provider = self.providers.get(provider_name).ok_or_else(|| {
            let mut supported: Vec<&str> =
                self.providers.keys().map(|k| k.as_str()).collect();
            supported.sort_unstable();
            Error::Embedding(format!(
                "Unsupported embedding provider: '{}', supported providers: {}",
                provider_name,
                supported.join(", ")
            ))
        })?;
        provider.embed(model, texts).await
    }
}

/// OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbeddings {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiEmbeddings {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({"input": texts, "model": model}))
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Embedding request failed with {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        debug!("Embedded {} texts with {}", texts.len(), model);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
