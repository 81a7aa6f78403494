//! PostgreSQL artifact store

use crate::predicate::{Dialect, ListPlan, SqlArg};
use crate::traits::{ArtifactRepository, StatField};
use async_trait::async_trait;
use depot_core::types::{ArtifactRecord, ArtifactSelector, StagingEntry, VersionEntry};
use depot_core::{Error, Result};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::QueryAs;
use sqlx::Postgres;
use std::collections::HashSet;
use tracing::{debug, info};

const COLUMNS: &str = "id, type, workspace, parent_id, alias, manifest, staging, \
     download_count, view_count, file_count, created_at, created_by, last_modified, \
     versions, config, secrets";

type Row = (
    String,            // id
    Option<String>,    // type
    String,            // workspace
    Option<String>,    // parent_id
    Option<String>,    // alias
    Option<JsonValue>, // manifest
    Option<JsonValue>, // staging
    f64,               // download_count
    f64,               // view_count
    i64,               // file_count
    i64,               // created_at
    Option<String>,    // created_by
    i64,               // last_modified
    Option<JsonValue>, // versions
    Option<JsonValue>, // config
    Option<JsonValue>, // secrets
);

pub struct PostgresArtifactStore {
    pool: PgPool,
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

fn insert_err(e: sqlx::Error) -> Error {
    let message = e.to_string();
    if message.contains("duplicate key") {
        Error::AlreadyExists(message)
    } else {
        Error::Database(message)
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<JsonValue> {
    serde_json::to_value(value).map_err(|e| Error::Internal(e.to_string()))
}

fn opt_to_value<T: serde::Serialize>(value: &Option<T>) -> Result<Option<JsonValue>> {
    value.as_ref().map(to_value).transpose()
}

fn non_null(value: Option<JsonValue>) -> Option<JsonValue> {
    match value {
        Some(JsonValue::Null) | None => None,
        other => other,
    }
}

fn from_value<T: serde::de::DeserializeOwned>(value: JsonValue) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Internal(e.to_string()))
}

fn row_to_record(row: Row) -> Result<ArtifactRecord> {
    let staging: Option<Vec<StagingEntry>> = match non_null(row.6) {
        Some(value) => Some(from_value(value)?),
        None => None,
    };
    let versions: Vec<VersionEntry> = match non_null(row.13) {
        Some(value) => from_value(value)?,
        None => Vec::new(),
    };
    Ok(ArtifactRecord {
        id: row.0,
        kind: row.1,
        workspace: row.2,
        parent_id: row.3,
        alias: row.4,
        manifest: non_null(row.5),
        staging,
        download_count: row.7,
        view_count: row.8,
        file_count: row.9,
        created_at: row.10,
        created_by: row.11,
        last_modified: row.12,
        versions,
        config: non_null(row.14),
        secrets: non_null(row.15),
    })
}

fn push_args<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    args: &'q [SqlArg],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for arg in args {
        query = match arg {
            SqlArg::Text(s) => query.bind(s),
            SqlArg::Real(f) => query.bind(*f),
            SqlArg::Int(i) => query.bind(*i),
        };
    }
    query
}

impl PostgresArtifactStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn fetch_one(&self, selector: &ArtifactSelector) -> Result<Option<ArtifactRecord>> {
        let row: Option<Row> = match selector {
            ArtifactSelector::Id(id) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM artifacts WHERE id = $1",
                    COLUMNS
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
            }
            ArtifactSelector::Alias { workspace, alias } => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM artifacts WHERE workspace = $1 AND alias = $2",
                    COLUMNS
                ))
                .bind(workspace)
                .bind(alias)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
            }
        };
        row.map(row_to_record).transpose()
    }
}

#[async_trait]
impl ArtifactRepository for PostgresArtifactStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                type TEXT,
                workspace TEXT NOT NULL,
                parent_id TEXT,
                alias TEXT,
                manifest JSONB,
                staging JSONB,
                download_count DOUBLE PRECISION NOT NULL DEFAULT 0,
                view_count DOUBLE PRECISION NOT NULL DEFAULT 0,
                file_count BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL,
                created_by TEXT,
                last_modified BIGINT NOT NULL,
                versions JSONB,
                config JSONB,
                secrets JSONB,
                UNIQUE (workspace, alias)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_artifacts_workspace ON artifacts(workspace)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_artifacts_parent ON artifacts(parent_id)"#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        info!("PostgreSQL artifact store initialized");
        Ok(())
    }

    async fn insert(&self, record: &ArtifactRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artifacts
            (id, type, workspace, parent_id, alias, manifest, staging,
             download_count, view_count, file_count, created_at, created_by,
             last_modified, versions, config, secrets)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(&record.id)
        .bind(&record.kind)
        .bind(&record.workspace)
        .bind(&record.parent_id)
        .bind(&record.alias)
        .bind(&record.manifest)
        .bind(opt_to_value(&record.staging)?)
        .bind(record.download_count)
        .bind(record.view_count)
        .bind(record.file_count)
        .bind(record.created_at)
        .bind(&record.created_by)
        .bind(record.last_modified)
        .bind(to_value(&record.versions)?)
        .bind(&record.config)
        .bind(&record.secrets)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        debug!("Inserted artifact: {} ({})", record.id, record.workspace);
        Ok(())
    }

    async fn upsert(&self, record: &ArtifactRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artifacts
            (id, type, workspace, parent_id, alias, manifest, staging,
             download_count, view_count, file_count, created_at, created_by,
             last_modified, versions, config, secrets)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                type = excluded.type,
                workspace = excluded.workspace,
                parent_id = excluded.parent_id,
                alias = excluded.alias,
                manifest = excluded.manifest,
                staging = excluded.staging,
                download_count = excluded.download_count,
                view_count = excluded.view_count,
                file_count = excluded.file_count,
                created_by = excluded.created_by,
                last_modified = excluded.last_modified,
                versions = excluded.versions,
                config = excluded.config,
                secrets = excluded.secrets
            "#,
        )
        .bind(&record.id)
        .bind(&record.kind)
        .bind(&record.workspace)
        .bind(&record.parent_id)
        .bind(&record.alias)
        .bind(&record.manifest)
        .bind(opt_to_value(&record.staging)?)
        .bind(record.download_count)
        .bind(record.view_count)
        .bind(record.file_count)
        .bind(record.created_at)
        .bind(&record.created_by)
        .bind(record.last_modified)
        .bind(to_value(&record.versions)?)
        .bind(&record.config)
        .bind(&record.secrets)
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        debug!("Upserted artifact: {}", record.id);
        Ok(())
    }

    async fn update(&self, record: &ArtifactRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE artifacts SET
                type = $1, workspace = $2, parent_id = $3, alias = $4, manifest = $5,
                staging = $6, download_count = $7, view_count = $8, file_count = $9,
                created_by = $10, last_modified = $11, versions = $12, config = $13,
                secrets = $14
            WHERE id = $15
            "#,
        )
        .bind(&record.kind)
        .bind(&record.workspace)
        .bind(&record.parent_id)
        .bind(&record.alias)
        .bind(&record.manifest)
        .bind(opt_to_value(&record.staging)?)
        .bind(record.download_count)
        .bind(record.view_count)
        .bind(record.file_count)
        .bind(&record.created_by)
        .bind(record.last_modified)
        .bind(to_value(&record.versions)?)
        .bind(&record.config)
        .bind(&record.secrets)
        .bind(&record.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::ArtifactNotFound(record.id.clone()));
        }
        Ok(())
    }

    async fn get(&self, selector: &ArtifactSelector) -> Result<Option<ArtifactRecord>> {
        self.fetch_one(selector).await
    }

    async fn get_with_parent(
        &self,
        selector: &ArtifactSelector,
    ) -> Result<Option<(ArtifactRecord, Option<ArtifactRecord>)>> {
        let artifact = match self.fetch_one(selector).await? {
            Some(artifact) => artifact,
            None => return Ok(None),
        };
        let parent = match &artifact.parent_id {
            Some(parent_id) => {
                self.fetch_one(&ArtifactSelector::Id(parent_id.clone()))
                    .await?
            }
            None => None,
        };
        Ok(Some((artifact, parent)))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM artifacts WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        debug!("Deleted artifact: {}", id);
        Ok(())
    }

    async fn detach_parent(&self, id: &str) -> Result<()> {
        sqlx::query(r#"UPDATE artifacts SET parent_id = NULL WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn existing_aliases(
        &self,
        workspace: &str,
        candidates: &[String],
    ) -> Result<HashSet<String>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT alias FROM artifacts WHERE workspace = $1 AND alias = ANY($2)"#,
        )
        .bind(workspace)
        .bind(candidates)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn increment_stat(&self, id: &str, field: StatField, delta: f64) -> Result<()> {
        let sql = format!(
            "UPDATE artifacts SET {col} = {col} + $1 WHERE id = $2",
            col = field.column()
        );
        sqlx::query(&sql)
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn reset_stats(&self, id: &str, now: i64) -> Result<()> {
        sqlx::query(
            r#"UPDATE artifacts SET download_count = 0, view_count = 0, last_modified = $1 WHERE id = $2"#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn count_children(&self, parent_id: &str) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM artifacts WHERE parent_id = $1"#)
                .bind(parent_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.0)
    }

    async fn list(&self, plan: &ListPlan) -> Result<Vec<ArtifactRecord>> {
        let (clause, args) = plan.render_select(Dialect::Postgres);
        let sql = format!("SELECT {} FROM artifacts WHERE {}", COLUMNS, clause);
        let query = push_args(sqlx::query_as::<_, Row>(&sql), &args);
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn count(&self, plan: &ListPlan) -> Result<i64> {
        let (clause, args) = plan.render_where(Dialect::Postgres);
        let sql = format!("SELECT COUNT(*) FROM artifacts WHERE {}", clause);
        let query = push_args(sqlx::query_as::<_, (i64,)>(&sql), &args);
        let row = query.fetch_one(&self.pool).await.map_err(db_err)?;
        Ok(row.0)
    }
}
