//! Qdrant REST implementation of the vector store

use crate::{Distance, ScoredPoint, SearchQuery, VectorParams, VectorPoint, VectorStore};
use async_trait::async_trait;
use depot_core::{Error, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

fn vector_err(e: impl std::fmt::Display) -> Error {
    Error::Vector(e.to_string())
}

fn distance_name(distance: Distance) -> &'static str {
    match distance {
        Distance::Cosine => "Cosine",
        Distance::Euclid => "Euclid",
        Distance::Dot => "Dot",
    }
}

pub struct QdrantVectorStore {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantVectorStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    fn collection_path(name: &str, suffix: &str) -> String {
        format!("/collections/{}{}", urlencoding::encode(name), suffix)
    }

    /// Send a request and unwrap Qdrant's `{status, result}` envelope.
    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(vector_err)?;
        let status = response.status();
        let body: JsonValue = response.json().await.map_err(vector_err)?;
        if !status.is_success() {
            let detail = body
                .get("status")
                .and_then(|s| s.get("error"))
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            return Err(Error::Vector(format!(
                "Vector backend returned {}: {}",
                status, detail
            )));
        }
        let result = body.get("result").cloned().unwrap_or(JsonValue::Null);
        serde_json::from_value(result).map_err(vector_err)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn create_collection(&self, name: &str, params: &VectorParams) -> Result<()> {
        let body = json!({
            "vectors": {
                "size": params.size,
                "distance": distance_name(params.distance),
            }
        });
        let _: JsonValue = self
            .call(
                self.request(Method::PUT, &Self::collection_path(name, ""))
                    .json(&body),
            )
            .await?;
        debug!("Created vector collection: {}", name);
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let _: JsonValue = self
            .call(self.request(Method::DELETE, &Self::collection_path(name, "")))
            .await?;
        debug!("Deleted vector collection: {}", name);
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<()> {
        let body = json!({ "points": points });
        let _: JsonValue = self
            .call(
                self.request(
                    Method::PUT,
                    &Self::collection_path(name, "/points?wait=true"),
                )
                .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn retrieve(
        &self,
        name: &str,
        ids: &[JsonValue],
        with_payload: bool,
        with_vectors: bool,
    ) -> Result<Vec<VectorPoint>> {
        let body = json!({
            "ids": ids,
            "with_payload": with_payload,
            "with_vector": with_vectors,
        });
        self.call(
            self.request(Method::POST, &Self::collection_path(name, "/points"))
                .json(&body),
        )
        .await
    }

    async fn scroll(
        &self,
        name: &str,
        filter: Option<JsonValue>,
        offset: Option<JsonValue>,
        limit: u64,
        with_payload: bool,
        with_vectors: bool,
    ) -> Result<Vec<VectorPoint>> {
        let mut body = json!({
            "limit": limit,
            "with_payload": with_payload,
            "with_vector": with_vectors,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }
        if let Some(offset) = offset {
            body["offset"] = offset;
        }

        #[derive(serde::Deserialize)]
        struct ScrollResult {
            points: Vec<VectorPoint>,
        }

        let result: ScrollResult = self
            .call(
                self.request(Method::POST, &Self::collection_path(name, "/points/scroll"))
                    .json(&body),
            )
            .await?;
        Ok(result.points)
    }

    async fn search(&self, name: &str, query: SearchQuery) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "vector": query.vector,
            "limit": query.limit,
            "offset": query.offset,
            "with_payload": query.with_payload,
            "with_vector": query.with_vectors,
        });
        if let Some(filter) = query.filter {
            body["filter"] = filter;
        }
        self.call(
            self.request(Method::POST, &Self::collection_path(name, "/points/search"))
                .json(&body),
        )
        .await
    }

    async fn count(&self, name: &str) -> Result<u64> {
        #[derive(serde::Deserialize)]
        struct CountResult {
            count: u64,
        }

        let result: CountResult = self
            .call(
                self.request(Method::POST, &Self::collection_path(name, "/points/count"))
                    .json(&json!({"exact": true})),
            )
            .await?;
        Ok(result.count)
    }

    async fn delete_points(&self, name: &str, ids: &[JsonValue]) -> Result<()> {
        let body = json!({ "points": ids });
        let _: JsonValue = self
            .call(
                self.request(
                    Method::POST,
                    &Self::collection_path(name, "/points/delete?wait=true"),
                )
                .json(&body),
            )
            .await?;
        Ok(())
    }
}
