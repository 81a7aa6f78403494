//! Vector collection adapter for Depot
//!
//! Artifacts of type `vector-collection` are backed by a named collection in
//! a vector database. The adapter covers collection lifecycle, point
//! upsert/retrieve/scroll, vector search with optional payload filters, and
//! point counting. Filters are passed through to the backend untouched.

pub mod embedding;
pub mod memory;
pub mod qdrant;

pub use embedding::{EmbeddingProvider, EmbeddingRegistry, OpenAiEmbeddings};
pub use memory::MemoryVectorStore;
pub use qdrant::QdrantVectorStore;

use async_trait::async_trait;
use depot_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Distance function of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

impl Distance {
    pub fn parse(name: &str) -> Result<Distance> {
        match name {
            "Cosine" => Ok(Distance::Cosine),
            "Euclid" => Ok(Distance::Euclid),
            "Dot" => Ok(Distance::Dot),
            _ => Err(Error::Validation(format!(
                "Unsupported distance function: {}",
                name
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorParams {
    pub size: u64,
    pub distance: Distance,
}

/// A stored point. Ids are passed through as JSON values since the backend
/// accepts both integers and UUID strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: JsonValue,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<JsonValue>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub vector: Vec<f32>,
    pub filter: Option<JsonValue>,
    pub offset: u64,
    pub limit: u64,
    pub with_payload: bool,
    pub with_vectors: bool,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str, params: &VectorParams) -> Result<()>;

    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<()>;

    async fn retrieve(
        &self,
        name: &str,
        ids: &[JsonValue],
        with_payload: bool,
        with_vectors: bool,
    ) -> Result<Vec<VectorPoint>>;

    /// Page through points. `offset` is a backend point-id cursor.
    async fn scroll(
        &self,
        name: &str,
        filter: Option<JsonValue>,
        offset: Option<JsonValue>,
        limit: u64,
        with_payload: bool,
        with_vectors: bool,
    ) -> Result<Vec<VectorPoint>>;

    async fn search(&self, name: &str, query: SearchQuery) -> Result<Vec<ScoredPoint>>;

    async fn count(&self, name: &str) -> Result<u64>;

    async fn delete_points(&self, name: &str, ids: &[JsonValue]) -> Result<()>;
}
