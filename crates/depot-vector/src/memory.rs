//! In-memory vector store
//!
//! Used by the lifecycle test suites. Scoring follows the collection's
//! distance function; filters support the `must`/`match` shape, which is
//! all the tests exercise.

use crate::{
    Distance, ScoredPoint, SearchQuery, VectorParams, VectorPoint, VectorStore,
};
use async_trait::async_trait;
use depot_core::{Error, Result};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct Collection {
    params: VectorParams,
    points: HashMap<String, VectorPoint>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn id_key(id: &JsonValue) -> String {
        id.to_string()
    }

    fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        match distance {
            Distance::Dot => dot,
            Distance::Cosine => {
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    dot / (norm_a * norm_b)
                }
            }
            Distance::Euclid => {
                let dist: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                -dist
            }
        }
    }

    fn matches(filter: Option<&JsonValue>, payload: Option<&JsonValue>) -> bool {
        let clauses = match filter
            .and_then(|f| f.get("must"))
            .and_then(|m| m.as_array())
        {
            Some(clauses) => clauses,
            None => return true,
        };
        let payload = match payload {
            Some(p) => p,
            None => return clauses.is_empty(),
        };
        clauses.iter().all(|clause| {
            let key = clause.get("key").and_then(|k| k.as_str());
            let expected = clause.get("match").and_then(|m| m.get("value"));
            match (key, expected) {
                (Some(key), Some(expected)) => payload.get(key) == Some(expected),
                _ => false,
            }
        })
    }

    fn strip(point: &VectorPoint, with_payload: bool, with_vectors: bool) -> VectorPoint {
        VectorPoint {
            id: point.id.clone(),
            vector: if with_vectors { point.vector.clone() } else { None },
            payload: if with_payload { point.payload.clone() } else { None },
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, name: &str, params: &VectorParams) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.insert(
            name.to_string(),
            Collection {
                params: *params,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<VectorPoint>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| Error::Vector(format!("Collection does not exist: {}", name)))?;
        for point in points {
            collection.points.insert(Self::id_key(&point.id), point);
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        name: &str,
        ids: &[JsonValue],
        with_payload: bool,
        with_vectors: bool,
    ) -> Result<Vec<VectorPoint>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::Vector(format!("Collection does not exist: {}", name)))?;
        Ok(ids
            .iter()
            .filter_map(|id| collection.points.get(&Self::id_key(id)))
            .map(|p| Self::strip(p, with_payload, with_vectors))
            .collect())
    }

    async fn scroll(
        &self,
        name: &str,
        filter: Option<JsonValue>,
        _offset: Option<JsonValue>,
        limit: u64,
        with_payload: bool,
        with_vectors: bool,
    ) -> Result<Vec<VectorPoint>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::Vector(format!("Collection does not exist: {}", name)))?;
        let mut points: Vec<&VectorPoint> = collection
            .points
            .values()
            .filter(|p| Self::matches(filter.as_ref(), p.payload.as_ref()))
            .collect();
        points.sort_by(|a, b| Self::id_key(&a.id).cmp(&Self::id_key(&b.id)));
        Ok(points
            .into_iter()
            .take(limit as usize)
            .map(|p| Self::strip(p, with_payload, with_vectors))
            .collect())
    }

    async fn search(&self, name: &str, query: SearchQuery) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::Vector(format!("Collection does not exist: {}", name)))?;
        let mut scored: Vec<ScoredPoint> = collection
            .points
            .values()
            .filter(|p| Self::matches(query.filter.as_ref(), p.payload.as_ref()))
            .filter_map(|p| {
                let vector = p.vector.as_ref()?;
                let score = Self::score(collection.params.distance, &query.vector, vector);
                Some(ScoredPoint {
                    id: p.id.clone(),
                    score,
                    payload: if query.with_payload {
                        p.payload.clone()
                    } else {
                        None
                    },
                    vector: if query.with_vectors {
                        p.vector.clone()
                    } else {
                        None
                    },
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn count(&self, name: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| Error::Vector(format!("Collection does not exist: {}", name)))?;
        Ok(collection.points.len() as u64)
    }

    async fn delete_points(&self, name: &str, ids: &[JsonValue]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| Error::Vector(format!("Collection does not exist: {}", name)))?;
        for id in ids {
            collection.points.remove(&Self::id_key(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> VectorParams {
        VectorParams {
            size: 3,
            distance: Distance::Cosine,
        }
    }

    fn point(id: u64, vector: Vec<f32>, payload: JsonValue) -> VectorPoint {
        VectorPoint {
            id: json!(id),
            vector: Some(vector),
            payload: Some(payload),
        }
    }

    #[tokio::test]
    async fn test_upsert_retrieve_count() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", &params()).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0, 0.0], json!({"kind": "a"})),
                    point(2, vec![0.0, 1.0, 0.0], json!({"kind": "b"})),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.count("c").await.unwrap(), 2);

        let points = store.retrieve("c", &[json!(1)], true, true).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].payload, Some(json!({"kind": "a"})));
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", &params()).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0, 0.0], json!({})),
                    point(2, vec![0.0, 1.0, 0.0], json!({})),
                ],
            )
            .await
            .unwrap();
        let hits = store
            .search(
                "c",
                SearchQuery {
                    vector: vec![1.0, 0.1, 0.0],
                    filter: None,
                    offset: 0,
                    limit: 10,
                    with_payload: false,
                    with_vectors: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(hits[0].id, json!(1));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_filtered_search_and_delete() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", &params()).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0, 0.0], json!({"kind": "a"})),
                    point(2, vec![1.0, 0.0, 0.0], json!({"kind": "b"})),
                ],
            )
            .await
            .unwrap();
        let filter = json!({"must": [{"key": "kind", "match": {"value": "b"}}]});
        let hits = store
            .search(
                "c",
                SearchQuery {
                    vector: vec![1.0, 0.0, 0.0],
                    filter: Some(filter),
                    offset: 0,
                    limit: 10,
                    with_payload: true,
                    with_vectors: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, json!(2));

        store.delete_points("c", &[json!(2)]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_collection_lifecycle() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", &params()).await.unwrap();
        store.delete_collection("c").await.unwrap();
        assert!(store.count("c").await.is_err());
    }
}
