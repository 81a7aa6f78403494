//! HTTP surface
//!
//! Three read-oriented endpoints are exposed over the lifecycle controller:
//! artifact metadata, child listing, and file access. Errors map to status
//! codes by kind; backend failures surface as opaque 500s and are logged
//! with their origin.

use crate::manager::{ArtifactManager, ListChildrenOptions};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use depot_core::types::{Context, UserInfo};
use depot_core::{Error, Result};
use depot_metadata::FilterMode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Parses a client token into a resolved identity. Token formats and
/// validation live outside this service.
pub trait UserTokenParser: Send + Sync {
    fn parse(&self, token: &str) -> Result<UserInfo>;
}

/// Development stand-in: the token is the JSON encoding of a `UserInfo`.
#[derive(Default)]
pub struct JsonTokenParser;

impl UserTokenParser for JsonTokenParser {
    fn parse(&self, token: &str) -> Result<UserInfo> {
        serde_json::from_str(token)
            .map_err(|e| Error::PermissionDenied(format!("Invalid token: {}", e)))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ArtifactManager>,
    pub tokens: Arc<dyn UserTokenParser>,
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let detail = if self.0.is_backend() {
            error!("Backend error: {}", self.0);
            "Internal server error.".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({"detail": detail}))).into_response()
    }
}

fn resolve_context(state: &AppState, workspace: &str, token: Option<&str>) -> Result<Context> {
    let user = match token {
        Some(token) => state.tokens.parse(token)?,
        None => UserInfo::anonymous(),
    };
    Ok(Context::new(user, workspace))
}

#[derive(Deserialize)]
struct ReadQuery {
    #[serde(default)]
    silent: bool,
    version: Option<String>,
    token: Option<String>,
}

async fn get_artifact(
    State(state): State<AppState>,
    Path((workspace, alias)): Path<(String, String)>,
    Query(query): Query<ReadQuery>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let context = resolve_context(&state, &workspace, query.token.as_deref())?;
    let data = state
        .manager
        .read(
            &format!("{}/{}", workspace, alias),
            query.version.as_deref(),
            query.silent,
            &context,
        )
        .await?;
    Ok(Json(data))
}

#[derive(Deserialize)]
struct ChildrenQuery {
    keywords: Option<String>,
    filters: Option<String>,
    #[serde(default)]
    offset: i64,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default = "default_limit")]
    limit: i64,
    order_by: Option<String>,
    #[serde(default)]
    pagination: bool,
    #[serde(default)]
    silent: bool,
    token: Option<String>,
}

fn default_mode() -> String {
    "AND".to_string()
}

fn default_limit() -> i64 {
    depot_core::DEFAULT_LIST_LIMIT
}

async fn list_children(
    State(state): State<AppState>,
    Path((workspace, alias)): Path<(String, String)>,
    Query(query): Query<ChildrenQuery>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let context = resolve_context(&state, &workspace, query.token.as_deref())?;
    let keywords = query
        .keywords
        .as_deref()
        .map(|k| k.split(',').map(|s| s.trim().to_string()).collect());
    let filters = query
        .filters
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| Error::Validation(format!("Filters must be valid JSON: {}", e)))?;
    let mode = FilterMode::parse(&query.mode)
        .ok_or_else(|| Error::Validation(format!("Invalid mode: {}", query.mode)))?;

    let data = state
        .manager
        .list_children(
            Some(&format!("{}/{}", workspace, alias)),
            ListChildrenOptions {
                keywords,
                filters,
                mode,
                offset: query.offset,
                limit: query.limit,
                order_by: query.order_by.clone(),
                pagination: query.pagination,
                silent: query.silent,
            },
            &context,
        )
        .await?;
    Ok(Json(data))
}

#[derive(Deserialize)]
struct FileQuery {
    #[serde(default)]
    silent: bool,
    version: Option<String>,
    token: Option<String>,
}

async fn get_file(
    State(state): State<AppState>,
    Path((workspace, alias, path)): Path<(String, String, String)>,
    Query(query): Query<FileQuery>,
) -> std::result::Result<Response, ApiError> {
    serve_file(state, workspace, alias, path, query).await
}

async fn get_root_files(
    State(state): State<AppState>,
    Path((workspace, alias)): Path<(String, String)>,
    Query(query): Query<FileQuery>,
) -> std::result::Result<Response, ApiError> {
    serve_file(state, workspace, alias, String::new(), query).await
}

async fn serve_file(
    state: AppState,
    workspace: String,
    alias: String,
    path: String,
    query: FileQuery,
) -> std::result::Result<Response, ApiError> {
    let context = resolve_context(&state, &workspace, query.token.as_deref())?;
    let artifact_id = format!("{}/{}", workspace, alias);

    // A trailing slash (or no path at all) lists the directory.
    if path.is_empty() || path.ends_with('/') {
        let dir = path.trim_end_matches('/');
        let entries = state
            .manager
            .list_files(
                &artifact_id,
                if dir.is_empty() { None } else { Some(dir) },
                None,
                query.version.as_deref(),
                &context,
            )
            .await?;
        if entries.is_empty() {
            return Err(Error::FileNotFound(path).into());
        }
        return Ok(Json(serde_json::to_value(entries).map_err(|e| Error::Internal(e.to_string()))?).into_response());
    }

    let body = state
        .manager
        .fetch_file(
            &artifact_id,
            &path,
            query.version.as_deref(),
            query.silent,
            &context,
        )
        .await?;
    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .map_err(|e| Error::Internal(e.to_string()))?)
}

/// Build the HTTP router over an application state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{workspace}/artifacts/{alias}", get(get_artifact))
        .route("/{workspace}/artifacts/{alias}/children", get(list_children))
        .route("/{workspace}/artifacts/{alias}/files", get(get_root_files))
        .route("/{workspace}/artifacts/{alias}/files/{*path}", get(get_file))
        .with_state(state)
}
