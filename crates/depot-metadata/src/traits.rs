//! Artifact repository trait
//!
//! Defines the interface for metadata storage operations.
//! Implementations exist for SQLite and PostgreSQL.

use crate::predicate::ListPlan;
use async_trait::async_trait;
use depot_core::types::{ArtifactRecord, ArtifactSelector};
use depot_core::Result;
use std::collections::HashSet;

/// Statistic counters maintained per artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    ViewCount,
    DownloadCount,
}

impl StatField {
    pub fn column(&self) -> &'static str {
        match self {
            StatField::ViewCount => "view_count",
            StatField::DownloadCount => "download_count",
        }
    }
}

/// Artifact repository trait
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Create tables and indexes if they do not exist.
    async fn init(&self) -> Result<()>;

    /// Insert a new row; a `(workspace, alias)` collision maps to
    /// `Error::AlreadyExists`.
    async fn insert(&self, record: &ArtifactRecord) -> Result<()>;

    /// Insert or fully replace the row with the same id.
    async fn upsert(&self, record: &ArtifactRecord) -> Result<()>;

    /// Persist every mutable column of an existing row.
    async fn update(&self, record: &ArtifactRecord) -> Result<()>;

    async fn get(&self, selector: &ArtifactSelector) -> Result<Option<ArtifactRecord>>;

    /// Fetch an artifact together with its parent row, if any.
    async fn get_with_parent(
        &self,
        selector: &ArtifactSelector,
    ) -> Result<Option<(ArtifactRecord, Option<ArtifactRecord>)>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Null out `parent_id`, detaching the row from the tree.
    async fn detach_parent(&self, id: &str) -> Result<()>;

    /// Which of `candidates` are already taken in `workspace`. The unique
    /// constraint remains the source of truth; this probe is an optimization
    /// for the alias allocator.
    async fn existing_aliases(
        &self,
        workspace: &str,
        candidates: &[String],
    ) -> Result<HashSet<String>>;

    /// Atomic relative update (`SET field = field + delta`) so concurrent
    /// readers do not lose increments.
    async fn increment_stat(&self, id: &str, field: StatField, delta: f64) -> Result<()>;

    /// Zero both counters and bump `last_modified`.
    async fn reset_stats(&self, id: &str, now: i64) -> Result<()>;

    async fn count_children(&self, parent_id: &str) -> Result<i64>;

    async fn list(&self, plan: &ListPlan) -> Result<Vec<ArtifactRecord>>;

    async fn count(&self, plan: &ListPlan) -> Result<i64>;
}

/// A read-only lens over a repository. Listing and read paths go through
/// this wrapper so they cannot reach row mutation; the atomic stat
/// increment is the single statement-level write those paths may issue.
pub struct ReadOnlyRepository<'a> {
    inner: &'a dyn ArtifactRepository,
}

impl<'a> ReadOnlyRepository<'a> {
    pub fn new(inner: &'a dyn ArtifactRepository) -> Self {
        Self { inner }
    }

    pub async fn get(&self, selector: &ArtifactSelector) -> Result<Option<ArtifactRecord>> {
        self.inner.get(selector).await
    }

    pub async fn get_with_parent(
        &self,
        selector: &ArtifactSelector,
    ) -> Result<Option<(ArtifactRecord, Option<ArtifactRecord>)>> {
        self.inner.get_with_parent(selector).await
    }

    pub async fn count_children(&self, parent_id: &str) -> Result<i64> {
        self.inner.count_children(parent_id).await
    }

    pub async fn list(&self, plan: &ListPlan) -> Result<Vec<ArtifactRecord>> {
        self.inner.list(plan).await
    }

    pub async fn count(&self, plan: &ListPlan) -> Result<i64> {
        self.inner.count(plan).await
    }

    pub async fn increment_stat(&self, id: &str, field: StatField, delta: f64) -> Result<()> {
        self.inner.increment_stat(id, field, delta).await
    }
}
