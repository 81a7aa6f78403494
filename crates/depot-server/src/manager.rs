//! Artifact lifecycle controller
//!
//! The public API of the service. Every operation takes a `Context`
//! (resolved user plus target workspace), authorizes against artifact-local
//! grants and workspace tiers, then coordinates the metadata store, the
//! object store, and the vector database. Metadata writes always precede
//! snapshot writes; `commit` is the fence after which readers observe a
//! consistent version.

use crate::alias::generate_unique_alias;
use crate::zenodo::{ArchiveClient, ArchiveFactory};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::config::ObjectStoreConfig;
use depot_core::schema;
use depot_core::types::{
    artifact_grants, ArtifactRecord, ArtifactSelector, Context, Operation, PermissionLevel,
    StagingEntry, UserInfo, VersionEntry, VersionSelector, TYPE_COLLECTION, TYPE_GENERIC,
    TYPE_VECTOR_COLLECTION,
};
use depot_core::utils::{is_uuid_shaped, now_secs};
use depot_core::{
    Error, Result, DEFAULT_FILE_LIST_LIMIT, DEFAULT_LIST_LIMIT, DEFAULT_VECTOR_SIZE,
    PRESIGNED_URL_TTL_SECS,
};
use depot_metadata::{
    plan_children, ArtifactRepository, FilterMode, ListPlan, OrderField, ReadOnlyRepository, Scope,
    StatField,
};
use depot_s3::{keys, FileEntry, FileKind, ObjectStore, ObjectStoreFactory, S3Settings};
use depot_vector::{
    Distance, EmbeddingRegistry, SearchQuery, VectorParams, VectorPoint, VectorStore,
};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Supplies the persistence flag for workspaces; workspace lifecycle itself
/// lives outside this service.
#[async_trait]
pub trait WorkspaceDirectory: Send + Sync {
    async fn is_persistent(&self, workspace: &str) -> Result<bool>;
}

/// Workspace persistence resolved from static configuration.
pub struct StaticWorkspaces {
    all_persistent: bool,
    persistent: HashSet<String>,
}

impl StaticWorkspaces {
    pub fn new(all_persistent: bool, persistent: impl IntoIterator<Item = String>) -> Self {
        Self {
            all_persistent,
            persistent: persistent.into_iter().collect(),
        }
    }
}

#[async_trait]
impl WorkspaceDirectory for StaticWorkspaces {
    async fn is_persistent(&self, workspace: &str) -> Result<bool> {
        Ok(self.all_persistent || self.persistent.contains(workspace))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub alias: Option<String>,
    pub workspace: Option<String>,
    pub parent_id: Option<String>,
    /// Artifact type; defaults to `generic`.
    pub kind: Option<String>,
    pub manifest: Option<JsonValue>,
    pub config: Option<JsonValue>,
    pub secrets: Option<JsonValue>,
    pub version: Option<String>,
    pub comment: Option<String>,
    pub overwrite: bool,
    pub publish_to: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub manifest: Option<JsonValue>,
    pub kind: Option<String>,
    pub config: Option<JsonValue>,
    pub secrets: Option<JsonValue>,
    pub version: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub delete_files: bool,
    pub recursive: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListChildrenOptions {
    pub keywords: Option<Vec<String>>,
    pub filters: Option<JsonValue>,
    pub mode: FilterMode,
    pub offset: i64,
    pub limit: i64,
    pub order_by: Option<String>,
    pub pagination: bool,
    pub silent: bool,
}

impl Default for ListChildrenOptions {
    fn default() -> Self {
        Self {
            keywords: None,
            filters: None,
            mode: FilterMode::And,
            offset: 0,
            limit: DEFAULT_LIST_LIMIT,
            order_by: None,
            pagination: false,
            silent: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub filter: Option<JsonValue>,
    pub offset: u64,
    pub limit: u64,
    pub with_payload: bool,
    pub with_vectors: bool,
    pub pagination: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            filter: None,
            offset: 0,
            limit: 10,
            with_payload: true,
            with_vectors: false,
            pagination: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListVectorsOptions {
    pub filter: Option<JsonValue>,
    pub offset: Option<JsonValue>,
    pub limit: u64,
    pub with_payload: bool,
    pub with_vectors: bool,
}

impl Default for ListVectorsOptions {
    fn default() -> Self {
        Self {
            filter: None,
            offset: None,
            limit: 10,
            with_payload: true,
            with_vectors: false,
        }
    }
}

pub struct ArtifactManager {
    repo: Arc<dyn ArtifactRepository>,
    object_stores: Arc<dyn ObjectStoreFactory>,
    vectors: Option<Arc<dyn VectorStore>>,
    embeddings: Arc<EmbeddingRegistry>,
    archives: Arc<dyn ArchiveFactory>,
    workspaces: Arc<dyn WorkspaceDirectory>,
    object_store: ObjectStoreConfig,
}

impl ArtifactManager {
    pub fn new(
        repo: Arc<dyn ArtifactRepository>,
        object_stores: Arc<dyn ObjectStoreFactory>,
        vectors: Option<Arc<dyn VectorStore>>,
        embeddings: Arc<EmbeddingRegistry>,
        archives: Arc<dyn ArchiveFactory>,
        workspaces: Arc<dyn WorkspaceDirectory>,
        object_store: ObjectStoreConfig,
    ) -> Self {
        Self {
            repo,
            object_stores,
            vectors,
            embeddings,
            archives,
            workspaces,
            object_store,
        }
    }

    // ============= Context & permissions =============

    fn require_workspace(context: &Context) -> Result<()> {
        if context.ws.is_empty() {
            return Err(Error::Precondition(
                "Context must include 'ws' (workspace)".into(),
            ));
        }
        Ok(())
    }

    fn check_record(&self, artifact: &ArtifactRecord, user: &UserInfo, op: Operation) -> Result<()> {
        if artifact_grants(artifact.config.as_ref(), user, op) {
            return Ok(());
        }
        if user.check_permission(&artifact.workspace, op.required_level()) {
            return Ok(());
        }
        Err(Error::PermissionDenied(format!(
            "User does not have permission to perform the operation '{}' on the artifact",
            op.as_str()
        )))
    }

    /// Fetch an artifact and its parent, enforcing permission for `op`.
    async fn get_with_permission(
        &self,
        context: &Context,
        artifact_id: &str,
        op: Operation,
    ) -> Result<(ArtifactRecord, Option<ArtifactRecord>)> {
        let selector = ArtifactSelector::qualify(artifact_id, &context.ws)?;
        let (artifact, parent) = self
            .repo
            .get_with_parent(&selector)
            .await?
            .ok_or_else(|| Error::ArtifactNotFound(artifact_id.to_string()))?;
        self.check_record(&artifact, &context.user, op)?;
        Ok((artifact, parent))
    }

    // ============= Credential resolution & snapshots =============

    fn merged_secrets(
        artifact: &ArtifactRecord,
        parent: Option<&ArtifactRecord>,
    ) -> Map<String, JsonValue> {
        let mut secrets = parent
            .and_then(|p| p.secrets.as_ref())
            .and_then(|s| s.as_object())
            .cloned()
            .unwrap_or_default();
        if let Some(own) = artifact.secrets.as_ref().and_then(|s| s.as_object()) {
            for (key, value) in own {
                secrets.insert(key.clone(), value.clone());
            }
        }
        secrets
    }

    /// Resolve the credential set for an artifact: artifact-owned when both
    /// S3 keys are present in the merged secrets, the server-wide store
    /// otherwise.
    fn resolve_s3_settings(
        &self,
        artifact: &ArtifactRecord,
        parent: Option<&ArtifactRecord>,
    ) -> S3Settings {
        let secrets = Self::merged_secrets(artifact, parent);
        let get = |key: &str| {
            secrets
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };

        match (get("S3_ACCESS_KEY_ID"), get("S3_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => S3Settings {
                endpoint: get("S3_ENDPOINT_URL").unwrap_or_else(|| self.object_store.endpoint.clone()),
                access_key_id,
                secret_access_key,
                region: get("S3_REGION_NAME").unwrap_or_else(|| self.object_store.region.clone()),
                bucket: get("S3_BUCKET").unwrap_or_else(|| self.object_store.workspace_bucket.clone()),
                prefix: get("S3_PREFIX").unwrap_or_default(),
                public_endpoint: get("S3_PUBLIC_ENDPOINT_URL"),
            },
            _ => S3Settings {
                endpoint: self.object_store.endpoint.clone(),
                access_key_id: self.object_store.access_key.clone(),
                secret_access_key: self.object_store.secret_key.clone(),
                region: self.object_store.region.clone(),
                bucket: self.object_store.workspace_bucket.clone(),
                prefix: String::new(),
                public_endpoint: self.object_store.public_endpoint.clone(),
            },
        }
    }

    fn open_store(
        &self,
        artifact: &ArtifactRecord,
        parent: Option<&ArtifactRecord>,
    ) -> Result<(Arc<dyn ObjectStore>, S3Settings)> {
        let settings = self.resolve_s3_settings(artifact, parent);
        let store = self.object_stores.open(&settings)?;
        Ok((store, settings))
    }

    async fn save_snapshot(
        &self,
        store: &Arc<dyn ObjectStore>,
        settings: &S3Settings,
        record: &ArtifactRecord,
        version_index: usize,
    ) -> Result<()> {
        let key = keys::snapshot_key(&settings.prefix, &record.workspace, &record.id, version_index)?;
        let body = serde_json::to_vec(record).map_err(|e| Error::Internal(e.to_string()))?;
        store.put(&key, Bytes::from(body)).await
    }

    async fn load_snapshot(
        &self,
        store: &Arc<dyn ObjectStore>,
        settings: &S3Settings,
        record: &ArtifactRecord,
        version_index: usize,
    ) -> Result<ArtifactRecord> {
        let key = keys::snapshot_key(&settings.prefix, &record.workspace, &record.id, version_index)?;
        let body = store.get(&key).await?;
        serde_json::from_slice(&body).map_err(|e| Error::Internal(e.to_string()))
    }

    /// The staged snapshot is the source of truth for the pending version;
    /// fall back to the live row when it has not been materialized yet.
    async fn load_stage_snapshot(
        &self,
        store: &Arc<dyn ObjectStore>,
        settings: &S3Settings,
        artifact: &ArtifactRecord,
        stage_index: usize,
    ) -> Result<ArtifactRecord> {
        match self.load_snapshot(store, settings, artifact, stage_index).await {
            Ok(snapshot) => Ok(snapshot),
            Err(Error::FileNotFound(_)) => {
                let mut snapshot = artifact.clone();
                snapshot.staging = Some(artifact.staging.clone().unwrap_or_default());
                Ok(snapshot)
            }
            Err(e) => Err(e),
        }
    }

    // ============= Permission merging =============

    /// `{creator: "*"}` joins the caller-supplied permissions, then the
    /// parent's permissions are merged in on top.
    fn merge_permissions(
        config: &mut JsonValue,
        creator: &str,
        parent: Option<&ArtifactRecord>,
    ) -> Result<()> {
        let object = config
            .as_object_mut()
            .ok_or_else(|| Error::Validation("Config must be an object".into()))?;
        let mut permissions = object
            .get("permissions")
            .and_then(|p| p.as_object())
            .cloned()
            .unwrap_or_default();
        permissions.insert(creator.to_string(), json!("*"));
        if let Some(parent_permissions) = parent
            .and_then(|p| p.config_value("permissions"))
            .and_then(|p| p.as_object())
        {
            for (user, grant) in parent_permissions {
                permissions.insert(user.clone(), grant.clone());
            }
        }
        object.insert("permissions".to_string(), JsonValue::Object(permissions));
        Ok(())
    }

    fn archive_from_secrets(
        &self,
        secrets: &Map<String, JsonValue>,
        publish_to: &str,
    ) -> Result<Arc<dyn ArchiveClient>> {
        let (token_key, sandbox) = match publish_to {
            "zenodo" => ("ZENODO_ACCESS_TOKEN", false),
            "sandbox_zenodo" => ("SANDBOX_ZENODO_ACCESS_TOKEN", true),
            other => {
                return Err(Error::Validation(format!(
                    "Publishing to '{}' is not supported",
                    other
                )))
            }
        };
        let token = secrets
            .get(token_key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::Precondition(format!(
                    "{} is not configured in secrets",
                    token_key
                ))
            })?;
        Ok(self.archives.open(token, sandbox))
    }

    // ============= create =============

    pub async fn create(&self, opts: CreateOptions, context: &Context) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let user = &context.user;
        let kind = opts.kind.unwrap_or_else(|| TYPE_GENERIC.to_string());

        let manifest = opts
            .manifest
            .ok_or_else(|| Error::Validation("Manifest must be provided".into()))?;
        schema::validate_manifest(&kind, &manifest)?;

        let mut alias = opts.alias.map(|a| a.trim().to_string());
        let mut workspace = opts.workspace;
        if let Some(alias_value) = &mut alias {
            if alias_value.contains('^') {
                return Err(Error::Validation(
                    "Alias cannot contain the '^' character".into(),
                ));
            }
            if alias_value.contains('/') {
                let parts: Vec<&str> = alias_value.split('/').collect();
                if parts.len() != 2 {
                    return Err(Error::Validation(
                        "Invalid alias format, it should be `workspace/alias`".into(),
                    ));
                }
                let (ws, bare) = (parts[0].to_string(), parts[1].to_string());
                if let Some(requested) = &workspace {
                    if *requested != ws {
                        return Err(Error::Validation(
                            "Workspace must match the alias workspace, if provided".into(),
                        ));
                    }
                }
                workspace = Some(ws);
                *alias_value = bare;
            }
        }

        // Resolve the parent and the effective workspace.
        let parent = match &opts.parent_id {
            Some(parent_id) => {
                let (parent, _) = self
                    .get_with_permission(context, parent_id, Operation::Create)
                    .await?;
                if let Some(requested) = &workspace {
                    if *requested != parent.workspace {
                        return Err(Error::Validation(
                            "Workspace must match parent artifact's workspace".into(),
                        ));
                    }
                }
                if !parent.is_committed() {
                    return Err(Error::Precondition(format!(
                        "Parent artifact '{}' must be committed before creating a child artifact",
                        parent.qualified_name()
                    )));
                }
                workspace = Some(parent.workspace.clone());
                Some(parent)
            }
            None => {
                let ws = workspace.clone().unwrap_or_else(|| context.ws.clone());
                if !user.check_permission(&ws, PermissionLevel::ReadWrite) {
                    return Err(Error::PermissionDenied(format!(
                        "User does not have permission to create an orphan artifact in the workspace '{}'",
                        ws
                    )));
                }
                workspace = Some(ws);
                None
            }
        };
        let workspace = workspace.unwrap_or_else(|| context.ws.clone());

        if !self.workspaces.is_persistent(&workspace).await? {
            return Err(Error::Precondition(format!(
                "Cannot create artifact in a non-persistent workspace '{}'",
                workspace
            )));
        }

        let mut config = opts.config.unwrap_or_else(|| json!({}));
        let mut id = ArtifactRecord::new_id();
        let mut overwrite = opts.overwrite;

        // Allocate the alias: pattern, auto, or explicit.
        let alias = match alias {
            Some(pattern) if pattern.contains('{') && pattern.contains('}') => {
                let mut parts = parent
                    .as_ref()
                    .and_then(|p| p.config_value("id_parts"))
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                parts.insert("uuid".to_string(), json!(ArtifactRecord::new_id()));
                parts.insert("timestamp".to_string(), json!(now_secs().to_string()));
                parts.insert("user_id".to_string(), json!(user.id.clone()));
                if let Some(publish_to) = &opts.publish_to {
                    let secrets = parent
                        .as_ref()
                        .map(|p| Self::merged_secrets(p, None))
                        .unwrap_or_default();
                    let archive = self.archive_from_secrets(&secrets, publish_to)?;
                    let deposition = archive.create_deposition().await?;
                    if let Some(deposition_id) = deposition.get("id") {
                        parts.insert("zenodo_id".to_string(), json!(deposition_id.to_string()));
                    }
                    if let Some(concept) = deposition.get("conceptrecid") {
                        parts.insert(
                            "zenodo_conceptrecid".to_string(),
                            json!(concept.as_str().map(|s| s.to_string()).unwrap_or_else(|| concept.to_string())),
                        );
                    }
                    if let Some(object) = config.as_object_mut() {
                        object.insert("zenodo".to_string(), deposition);
                    }
                }
                generate_unique_alias(self.repo.as_ref(), &workspace, Some(&pattern), &parts)
                    .await?
            }
            None => {
                generate_unique_alias(self.repo.as_ref(), &workspace, None, &Map::new()).await?
            }
            Some(explicit) => {
                if is_uuid_shaped(&explicit) {
                    return Err(Error::Validation(
                        "Alias should be a human readable string, it cannot be a UUID".into(),
                    ));
                }
                let selector = ArtifactSelector::Alias {
                    workspace: workspace.clone(),
                    alias: explicit.clone(),
                };
                match self.repo.get(&selector).await? {
                    Some(existing) => {
                        let parent_id = parent.as_ref().map(|p| p.id.clone());
                        if existing.parent_id != parent_id && !overwrite {
                            return Err(Error::AlreadyExists(format!(
                                "Artifact with alias '{}' already exists under a different parent artifact (ID: {})",
                                explicit,
                                existing.qualified_name()
                            )));
                        }
                        if !overwrite {
                            return Err(Error::AlreadyExists(format!(
                                "Artifact with alias '{}' already exists (ID: {})",
                                explicit,
                                existing.qualified_name()
                            )));
                        }
                        id = existing.id;
                    }
                    None => overwrite = false,
                }
                explicit
            }
        };

        Self::merge_permissions(&mut config, &user.id, parent.as_ref())?;

        let staged = opts.version.as_deref() == Some("stage");
        let mut versions = Vec::new();
        if !staged {
            let label = match opts.version.as_deref() {
                None | Some("new") => "v0".to_string(),
                Some(label) => label.to_string(),
            };
            versions.push(VersionEntry {
                version: label,
                comment: Some(
                    opts.comment
                        .clone()
                        .unwrap_or_else(|| "Initial version".to_string()),
                ),
                created_at: now_secs(),
            });
        }

        let record = ArtifactRecord {
            id: id.clone(),
            kind: Some(kind.clone()),
            workspace: workspace.clone(),
            parent_id: parent.as_ref().map(|p| p.id.clone()),
            alias: Some(alias.clone()),
            manifest: Some(manifest),
            staging: if staged { Some(Vec::new()) } else { None },
            download_count: 0.0,
            view_count: 0.0,
            file_count: 0,
            created_at: now_secs(),
            created_by: Some(user.id.clone()),
            last_modified: now_secs(),
            versions,
            config: Some(config),
            secrets: opts.secrets,
        };

        // The staged manifest lives in the stage snapshot only; committed
        // state is exactly "row manifest is non-null".
        let mut row = record.clone();
        if staged {
            row.manifest = None;
        }
        if overwrite {
            self.repo.upsert(&row).await?;
        } else {
            self.repo.insert(&row).await?;
        }

        if kind == TYPE_VECTOR_COLLECTION {
            let vectors = self.vectors.as_ref().ok_or_else(|| {
                Error::Precondition("The server is not configured to use a vector database".into())
            })?;
            let vectors_config = record
                .config_value("vectors_config")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let params = VectorParams {
                size: vectors_config
                    .get("size")
                    .and_then(|s| s.as_u64())
                    .unwrap_or(DEFAULT_VECTOR_SIZE),
                distance: Distance::parse(
                    vectors_config
                        .get("distance")
                        .and_then(|d| d.as_str())
                        .unwrap_or("Cosine"),
                )?,
            };
            vectors
                .create_collection(&record.vector_collection_name(), &params)
                .await?;
        }

        let (store, settings) = self.open_store(&record, parent.as_ref())?;
        self.save_snapshot(&store, &settings, &record, 0).await?;

        info!(
            "Created artifact with ID: {} ({}), alias: {}",
            id,
            if staged { "staged" } else { "committed" },
            alias
        );
        Ok(row.to_view(parent.as_ref()))
    }

    // ============= edit =============

    pub async fn edit(
        &self,
        artifact_id: &str,
        opts: EditOptions,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let (mut artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::Edit)
            .await?;

        if let Some(kind) = opts.kind {
            artifact.kind = Some(kind);
        }
        if let Some(manifest) = &opts.manifest {
            schema::validate_manifest(artifact.kind.as_deref().unwrap_or(TYPE_GENERIC), manifest)?;
        }
        if let Some(mut config) = opts.config {
            Self::merge_permissions(&mut config, &context.user.id, parent.as_ref())?;
            artifact.config = Some(config);
        }
        if let Some(secrets) = opts.secrets {
            artifact.secrets = Some(secrets);
        }
        artifact.last_modified = now_secs();

        let staged = opts.version.as_deref() == Some("stage");
        let (store, settings) = self.open_store(&artifact, parent.as_ref())?;

        if staged {
            if artifact.staging.is_none() {
                artifact.staging = Some(Vec::new());
            }
            let stage_index = artifact.versions.len();
            self.repo.update(&artifact).await?;

            // Preserve a previously staged manifest unless a new one is
            // supplied.
            let staged_manifest = match &opts.manifest {
                Some(manifest) => Some(manifest.clone()),
                None => self
                    .load_stage_snapshot(&store, &settings, &artifact, stage_index)
                    .await?
                    .manifest,
            };
            let mut snapshot = artifact.clone();
            snapshot.manifest = staged_manifest.or_else(|| artifact.manifest.clone());
            self.save_snapshot(&store, &settings, &snapshot, stage_index)
                .await?;
            info!("Edited artifact with ID: {} (staged)", artifact.id);
        } else {
            if let Some(manifest) = opts.manifest {
                artifact.manifest = Some(manifest);
            }
            if let Some(version) = &opts.version {
                let label = if version == "new" {
                    format!("v{}", artifact.versions.len())
                } else {
                    version.clone()
                };
                artifact.versions.push(VersionEntry {
                    version: label,
                    comment: opts.comment.clone(),
                    created_at: now_secs(),
                });
            }
            artifact.staging = None;
            self.repo.update(&artifact).await?;
            let version_index = VersionSelector::None.resolve(&artifact.versions, false)?;
            self.save_snapshot(&store, &settings, &artifact, version_index)
                .await?;
            info!(
                "Edited artifact with ID: {} (committed), version: {:?}",
                artifact.id, opts.version
            );
        }

        Ok(artifact.to_view(parent.as_ref()))
    }

    // ============= read =============

    pub async fn read(
        &self,
        artifact_id: &str,
        version: Option<&str>,
        silent: bool,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let (artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::Read)
            .await?;
        let reader = ReadOnlyRepository::new(self.repo.as_ref());

        if !silent {
            reader
                .increment_stat(&artifact.id, StatField::ViewCount, 1.0)
                .await?;
        }

        let selector = VersionSelector::parse(version);
        let version_index = selector.resolve(&artifact.versions, artifact.is_staged())?;
        let current_index = VersionSelector::None.resolve(&artifact.versions, artifact.is_staged())?;

        let mut data = if artifact.is_staged() && version_index == artifact.versions.len() {
            let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
            let snapshot = self
                .load_stage_snapshot(&store, &settings, &artifact, version_index)
                .await?;
            snapshot.to_view(parent.as_ref())
        } else if version_index == current_index {
            artifact.to_view(parent.as_ref())
        } else {
            let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
            let snapshot = self
                .load_snapshot(&store, &settings, &artifact, version_index)
                .await?;
            snapshot.to_view(parent.as_ref())
        };

        // Attach live counts for container types.
        if artifact.kind_is(TYPE_COLLECTION) {
            let child_count = reader.count_children(&artifact.id).await?;
            Self::attach_config_value(&mut data, "child_count", json!(child_count));
        } else if artifact.kind_is(TYPE_VECTOR_COLLECTION) {
            if let Some(vectors) = &self.vectors {
                let vector_count = vectors.count(&artifact.vector_collection_name()).await?;
                Self::attach_config_value(&mut data, "vector_count", json!(vector_count));
            }
        }

        Ok(data)
    }

    fn attach_config_value(data: &mut JsonValue, key: &str, value: JsonValue) {
        if let Some(object) = data.as_object_mut() {
            let config = object
                .entry("config".to_string())
                .or_insert_with(|| json!({}));
            if config.is_null() {
                *config = json!({});
            }
            if let Some(config) = config.as_object_mut() {
                config.insert(key.to_string(), value);
            }
        }
    }

    // ============= commit =============

    pub async fn commit(
        &self,
        artifact_id: &str,
        version: Option<&str>,
        comment: Option<&str>,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        if version == Some("stage") {
            return Err(Error::Validation(
                "Version cannot be 'stage' when committing".into(),
            ));
        }
        let (artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::Commit)
            .await?;
        let stage_index = VersionSelector::Stage.resolve(&artifact.versions, artifact.is_staged())?;

        let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
        let mut committed = self
            .load_stage_snapshot(&store, &settings, &artifact, stage_index)
            .await?;
        // The snapshot was cut when staging began; counters moved since.
        committed.view_count = artifact.view_count;
        committed.download_count = artifact.download_count;
        if committed.secrets.is_none() {
            committed.secrets = artifact.secrets.clone();
        }

        let staging = committed.staging.clone().unwrap_or_default();
        let mut download_weights = Map::new();
        for entry in &staging {
            let key = keys::file_key(
                &settings.prefix,
                &committed.workspace,
                &committed.id,
                stage_index,
                &entry.path,
            )?;
            if store.head(&key).await?.is_none() {
                return Err(Error::FileNotFound(entry.path.clone()));
            }
            if entry.download_weight > 0.0 {
                download_weights.insert(entry.path.clone(), json!(entry.download_weight));
            }
        }
        if !download_weights.is_empty() {
            let config = committed.config.get_or_insert_with(|| json!({}));
            if let Some(object) = config.as_object_mut() {
                object.insert(
                    "download_weights".to_string(),
                    JsonValue::Object(download_weights),
                );
            }
        }

        let stage_prefix = keys::version_prefix(
            &settings.prefix,
            &committed.workspace,
            &committed.id,
            stage_index,
        )?;
        committed.file_count = store.count_prefix(&format!("{}/", stage_prefix)).await?;

        let manifest = committed.manifest.clone().ok_or_else(|| {
            Error::Precondition("Artifact has no staged manifest to commit".into())
        })?;
        if let Some(collection_schema) = parent
            .as_ref()
            .and_then(|p| p.config_value("collection_schema"))
        {
            schema::validate_against_schema(&manifest, collection_schema)?;
        }

        let label = match version {
            None | Some("new") => format!("v{}", committed.versions.len()),
            Some(label) => label.to_string(),
        };
        committed.versions.push(VersionEntry {
            version: label.clone(),
            comment: comment.map(|c| c.to_string()),
            created_at: now_secs(),
        });
        committed.staging = None;
        committed.last_modified = now_secs();

        self.repo.update(&committed).await?;
        let new_index = VersionSelector::None.resolve(&committed.versions, false)?;
        self.save_snapshot(&store, &settings, &committed, new_index)
            .await?;

        info!(
            "Committed artifact with ID: {}, version: {}",
            committed.id, label
        );
        Ok(committed.to_view(parent.as_ref()))
    }

    // ============= files =============

    pub async fn put_file(
        &self,
        artifact_id: &str,
        file_path: &str,
        download_weight: f64,
        context: &Context,
    ) -> Result<String> {
        Self::require_workspace(context)?;
        if download_weight < 0.0 {
            return Err(Error::Validation(
                "Download weight must be a non-negative number".into(),
            ));
        }
        let (mut artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::PutFile)
            .await?;
        if !artifact.is_staged() {
            return Err(Error::Precondition("Artifact must be in staging mode".into()));
        }
        let stage_index = VersionSelector::Stage.resolve(&artifact.versions, true)?;

        let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
        let key = keys::file_key(
            &settings.prefix,
            &artifact.workspace,
            &artifact.id,
            stage_index,
            file_path,
        )?;
        let url = store.presign_put(&key, PRESIGNED_URL_TTL_SECS).await?;

        let mut snapshot = self
            .load_stage_snapshot(&store, &settings, &artifact, stage_index)
            .await?;
        let entry = StagingEntry {
            path: file_path.to_string(),
            download_weight,
        };
        for staging in [&mut artifact.staging, &mut snapshot.staging] {
            let list = staging.get_or_insert_with(Vec::new);
            if !list.iter().any(|f| f.path == file_path) {
                list.push(entry.clone());
            }
        }
        self.repo.update(&artifact).await?;
        self.save_snapshot(&store, &settings, &snapshot, stage_index)
            .await?;

        info!("Put file '{}' to artifact with ID: {}", file_path, artifact.id);
        Ok(url)
    }

    pub async fn remove_file(
        &self,
        artifact_id: &str,
        file_path: &str,
        context: &Context,
    ) -> Result<()> {
        Self::require_workspace(context)?;
        let (mut artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::RemoveFile)
            .await?;
        if !artifact.is_staged() {
            return Err(Error::Precondition("Artifact must be in staging mode".into()));
        }
        let stage_index = VersionSelector::Stage.resolve(&artifact.versions, true)?;

        let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
        let mut snapshot = self
            .load_stage_snapshot(&store, &settings, &artifact, stage_index)
            .await?;
        for staging in [&mut artifact.staging, &mut snapshot.staging] {
            if let Some(list) = staging {
                list.retain(|f| f.path != file_path);
            }
        }
        self.repo.update(&artifact).await?;
        self.save_snapshot(&store, &settings, &snapshot, stage_index)
            .await?;

        let key = keys::file_key(
            &settings.prefix,
            &artifact.workspace,
            &artifact.id,
            stage_index,
            file_path,
        )?;
        store.delete(&key).await?;

        info!(
            "Removed file '{}' from artifact with ID: {}",
            file_path, artifact.id
        );
        Ok(())
    }

    pub async fn get_file(
        &self,
        artifact_id: &str,
        file_path: &str,
        version: Option<&str>,
        silent: bool,
        context: &Context,
    ) -> Result<String> {
        Self::require_workspace(context)?;
        let (artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::GetFile)
            .await?;
        let selector = VersionSelector::parse(version);
        let version_index = selector.resolve(&artifact.versions, artifact.is_staged())?;

        let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
        let key = keys::file_key(
            &settings.prefix,
            &artifact.workspace,
            &artifact.id,
            version_index,
            file_path,
        )?;
        if store.head(&key).await?.is_none() {
            return Err(Error::FileNotFound(file_path.to_string()));
        }
        let url = store.presign_get(&key, PRESIGNED_URL_TTL_SECS).await?;

        if !silent {
            let weight = self.download_weight(&artifact, file_path);
            if weight > 0.0 {
                ReadOnlyRepository::new(self.repo.as_ref())
                    .increment_stat(&artifact.id, StatField::DownloadCount, weight)
                    .await?;
            }
        }
        Ok(url)
    }

    fn download_weight(&self, artifact: &ArtifactRecord, file_path: &str) -> f64 {
        artifact
            .config_value("download_weights")
            .and_then(|w| w.get(file_path))
            .and_then(|w| w.as_f64())
            .unwrap_or(0.0)
    }

    /// Fetch blob bytes for streaming through the HTTP surface, applying the
    /// same download accounting as `get_file`.
    pub async fn fetch_file(
        &self,
        artifact_id: &str,
        file_path: &str,
        version: Option<&str>,
        silent: bool,
        context: &Context,
    ) -> Result<Bytes> {
        Self::require_workspace(context)?;
        let (artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::GetFile)
            .await?;
        let selector = VersionSelector::parse(version);
        let version_index = selector.resolve(&artifact.versions, artifact.is_staged())?;

        let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
        let key = keys::file_key(
            &settings.prefix,
            &artifact.workspace,
            &artifact.id,
            version_index,
            file_path,
        )?;
        let body = store.get(&key).await?;

        if !silent {
            let weight = self.download_weight(&artifact, file_path);
            if weight > 0.0 {
                ReadOnlyRepository::new(self.repo.as_ref())
                    .increment_stat(&artifact.id, StatField::DownloadCount, weight)
                    .await?;
            }
        }
        Ok(body)
    }

    pub async fn list_files(
        &self,
        artifact_id: &str,
        dir_path: Option<&str>,
        limit: Option<i64>,
        version: Option<&str>,
        context: &Context,
    ) -> Result<Vec<FileEntry>> {
        Self::require_workspace(context)?;
        let (artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::ListFiles)
            .await?;
        let selector = VersionSelector::parse(version);
        let version_index = selector.resolve(&artifact.versions, artifact.is_staged())?;

        let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
        let mut prefix = keys::version_prefix(
            &settings.prefix,
            &artifact.workspace,
            &artifact.id,
            version_index,
        )?;
        if let Some(dir) = dir_path {
            prefix = keys::file_key(
                &settings.prefix,
                &artifact.workspace,
                &artifact.id,
                version_index,
                dir,
            )?;
        }
        store
            .list(
                &format!("{}/", prefix.trim_end_matches('/')),
                limit.unwrap_or(DEFAULT_FILE_LIST_LIMIT),
            )
            .await
    }

    // ============= delete =============

    pub async fn delete(
        &self,
        artifact_id: &str,
        opts: DeleteOptions,
        context: &Context,
    ) -> Result<()> {
        Self::require_workspace(context)?;
        let (mut artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::Delete)
            .await?;

        if let Some(version) = &opts.version {
            let selector = VersionSelector::parse(Some(version));
            let version_index = selector.resolve(&artifact.versions, artifact.is_staged())?;
            if version_index >= artifact.versions.len() {
                return Err(Error::VersionNotFound(version.clone()));
            }
            artifact.versions.remove(version_index);
            artifact.last_modified = now_secs();
            self.repo.update(&artifact).await?;

            let (store, settings) = self.open_store(&artifact, parent.as_ref())?;
            let snapshot = keys::snapshot_key(
                &settings.prefix,
                &artifact.workspace,
                &artifact.id,
                version_index,
            )?;
            if let Err(e) = store.delete(&snapshot).await {
                warn!("Failed to delete version snapshot {}: {}", snapshot, e);
            }
            if opts.delete_files {
                let prefix = keys::version_prefix(
                    &settings.prefix,
                    &artifact.workspace,
                    &artifact.id,
                    version_index,
                )?;
                if let Err(e) = store.remove_prefix(&format!("{}/", prefix)).await {
                    warn!("Failed to delete version files under {}: {}", prefix, e);
                }
            }
            info!(
                "Deleted version {} of artifact with ID: {}",
                version, artifact.id
            );
            return Ok(());
        }

        // Gather descendants depth-first so leaves are deleted before their
        // parents.
        let mut doomed: Vec<(ArtifactRecord, Option<ArtifactRecord>)> = Vec::new();
        if opts.recursive {
            let mut stack = vec![artifact.clone()];
            while let Some(current) = stack.pop() {
                for stage in [false, true] {
                    let plan = ListPlan {
                        scope: Scope::Children(current.id.clone()),
                        stage,
                        conditions: Vec::new(),
                        mode: FilterMode::And,
                        order: (OrderField::Id, true),
                        offset: 0,
                        limit: i64::MAX,
                    };
                    for child in self.repo.list(&plan).await? {
                        self.check_record(&child, &context.user, Operation::Delete)?;
                        stack.push(child.clone());
                        doomed.push((child, Some(current.clone())));
                    }
                }
            }
        }
        for (child, child_parent) in doomed.iter().rev() {
            self.delete_single(child, child_parent.as_ref(), opts.delete_files)
                .await?;
        }
        self.delete_single(&artifact, parent.as_ref(), opts.delete_files)
            .await?;
        info!("Deleted artifact with ID: {}", artifact.id);
        Ok(())
    }

    async fn delete_single(
        &self,
        record: &ArtifactRecord,
        parent: Option<&ArtifactRecord>,
        delete_files: bool,
    ) -> Result<()> {
        if record.kind_is(TYPE_VECTOR_COLLECTION) {
            let vectors = self.vectors.as_ref().ok_or_else(|| {
                Error::Precondition("The server is not configured to use a vector database".into())
            })?;
            vectors
                .delete_collection(&record.vector_collection_name())
                .await?;
        }
        let (store, settings) = self.open_store(record, parent)?;
        if delete_files {
            let prefix =
                keys::artifact_prefix(&settings.prefix, &record.workspace, &record.id)?;
            store.remove_prefix(&format!("{}/", prefix)).await?;
        }
        self.repo.detach_parent(&record.id).await?;
        self.repo.delete(&record.id).await?;
        Ok(())
    }

    // ============= listing =============

    pub async fn list_children(
        &self,
        parent_id: Option<&str>,
        opts: ListChildrenOptions,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let parent = match parent_id {
            Some(parent_id) => Some(
                self.get_with_permission(context, parent_id, Operation::List)
                    .await?
                    .0,
            ),
            None => None,
        };

        let list_fields = match parent.as_ref().and_then(|p| p.config_value("list_fields")) {
            None => None,
            Some(JsonValue::Array(fields)) => {
                let fields: Vec<String> = fields
                    .iter()
                    .filter_map(|f| f.as_str())
                    .map(|f| f.to_string())
                    .collect();
                if fields.iter().any(|f| f == "secrets") {
                    return Err(Error::Validation(
                        "Secrets cannot be included in list_fields".into(),
                    ));
                }
                Some(fields)
            }
            Some(_) => {
                return Err(Error::Validation(
                    "Invalid list_fields, it should be a list".into(),
                ))
            }
        };

        let plan = plan_children(
            parent.as_ref(),
            &context.ws,
            opts.keywords.as_deref(),
            opts.filters.as_ref(),
            opts.mode,
            opts.order_by.as_deref(),
            opts.offset,
            opts.limit,
        )?;

        let reader = ReadOnlyRepository::new(self.repo.as_ref());
        let total = if opts.pagination {
            Some(reader.count(&plan).await?)
        } else {
            None
        };
        let rows = reader.list(&plan).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let mut view = row.to_view(parent.as_ref());
            if let Some(fields) = &list_fields {
                if let Some(object) = view.as_object_mut() {
                    object.retain(|key, _| fields.iter().any(|f| f == key));
                }
            }
            items.push(view);
        }

        if !opts.silent {
            if let Some(parent) = &parent {
                reader
                    .increment_stat(&parent.id, StatField::ViewCount, 1.0)
                    .await?;
            }
        }

        if opts.pagination {
            Ok(json!({
                "items": items,
                "total": total,
                "offset": opts.offset,
                "limit": opts.limit,
            }))
        } else {
            Ok(JsonValue::Array(items))
        }
    }

    // ============= stats =============

    pub async fn reset_stats(&self, artifact_id: &str, context: &Context) -> Result<()> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::ResetStats)
            .await?;
        self.repo.reset_stats(&artifact.id, now_secs()).await?;
        info!("Reset stats for artifact with ID: {}", artifact.id);
        Ok(())
    }

    // ============= vectors =============

    fn require_vectors(
        &self,
        artifact: &ArtifactRecord,
    ) -> Result<(&Arc<dyn VectorStore>, String)> {
        if !artifact.kind_is(TYPE_VECTOR_COLLECTION) {
            return Err(Error::Validation(
                "Artifact must be a vector collection".into(),
            ));
        }
        let vectors = self.vectors.as_ref().ok_or_else(|| {
            Error::Precondition("The server is not configured to use a vector database".into())
        })?;
        Ok((vectors, artifact.vector_collection_name()))
    }

    pub async fn add_vectors(
        &self,
        artifact_id: &str,
        vectors: Vec<JsonValue>,
        context: &Context,
    ) -> Result<()> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::AddVectors)
            .await?;
        let (store, collection) = self.require_vectors(&artifact)?;
        if !artifact.is_committed() {
            return Err(Error::Precondition(
                "Artifact must be committed before upserting vectors".into(),
            ));
        }

        let mut points = Vec::with_capacity(vectors.len());
        for mut value in vectors {
            let object = value.as_object_mut().ok_or_else(|| {
                Error::Validation("Vectors must be a list of objects".into())
            })?;
            if !object.contains_key("id") {
                object.insert("id".to_string(), json!(uuid::Uuid::new_v4().to_string()));
            }
            if !object.contains_key("vector") {
                return Err(Error::Validation("Each point must carry a 'vector'".into()));
            }
            let point: VectorPoint = serde_json::from_value(value)
                .map_err(|e| Error::Validation(format!("Invalid point: {}", e)))?;
            points.push(point);
        }
        store.upsert(&collection, points).await?;
        info!("Upserted vectors to artifact with ID: {}", artifact.id);
        Ok(())
    }

    pub async fn add_documents(
        &self,
        artifact_id: &str,
        documents: Vec<JsonValue>,
        context: &Context,
    ) -> Result<()> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::AddDocuments)
            .await?;
        let (store, collection) = self.require_vectors(&artifact)?;
        let model = self.embedding_model(&artifact)?;

        let mut texts = Vec::with_capacity(documents.len());
        for document in &documents {
            let text = document
                .get("text")
                .and_then(|t| t.as_str())
                .ok_or_else(|| {
                    Error::Validation("Each document must carry a 'text' field".into())
                })?;
            texts.push(text.to_string());
        }
        let embeddings = self.embeddings.embed(&model, &texts).await?;

        let points = embeddings
            .into_iter()
            .zip(documents)
            .map(|(embedding, document)| VectorPoint {
                id: document
                    .get("id")
                    .cloned()
                    .unwrap_or_else(|| json!(uuid::Uuid::new_v4().to_string())),
                vector: Some(embedding),
                payload: Some(document),
            })
            .collect();
        store.upsert(&collection, points).await?;
        info!("Upserted documents to artifact with ID: {}", artifact.id);
        Ok(())
    }

    fn embedding_model(&self, artifact: &ArtifactRecord) -> Result<String> {
        artifact
            .config_value("embedding_model")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .ok_or_else(|| {
                Error::Validation(
                    "Embedding model must be configured, e.g. 'openai:text-embedding-3-small'"
                        .into(),
                )
            })
    }

    pub async fn search_by_vector(
        &self,
        artifact_id: &str,
        query_vector: Vec<f32>,
        opts: SearchOptions,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::SearchByVector)
            .await?;
        let (store, collection) = self.require_vectors(&artifact)?;
        self.run_search(store, &collection, query_vector, opts).await
    }

    pub async fn search_by_text(
        &self,
        artifact_id: &str,
        query: &str,
        opts: SearchOptions,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::SearchByText)
            .await?;
        let (store, collection) = self.require_vectors(&artifact)?;
        let model = self.embedding_model(&artifact)?;
        let mut embeddings = self
            .embeddings
            .embed(&model, &[query.to_string()])
            .await?;
        let query_vector = embeddings
            .pop()
            .ok_or_else(|| Error::Embedding("Embedding provider returned no vector".into()))?;
        self.run_search(store, &collection, query_vector, opts).await
    }

    async fn run_search(
        &self,
        store: &Arc<dyn VectorStore>,
        collection: &str,
        query_vector: Vec<f32>,
        opts: SearchOptions,
    ) -> Result<JsonValue> {
        let hits = store
            .search(
                collection,
                SearchQuery {
                    vector: query_vector,
                    filter: opts.filter.clone(),
                    offset: opts.offset,
                    limit: opts.limit,
                    with_payload: opts.with_payload,
                    with_vectors: opts.with_vectors,
                },
            )
            .await?;
        let items = serde_json::to_value(hits).map_err(|e| Error::Internal(e.to_string()))?;
        if opts.pagination {
            let total = store.count(collection).await?;
            Ok(json!({
                "total": total,
                "items": items,
                "offset": opts.offset,
                "limit": opts.limit,
            }))
        } else {
            Ok(items)
        }
    }

    pub async fn remove_vectors(
        &self,
        artifact_id: &str,
        ids: Vec<JsonValue>,
        context: &Context,
    ) -> Result<()> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::RemoveVectors)
            .await?;
        let (store, collection) = self.require_vectors(&artifact)?;
        store.delete_points(&collection, &ids).await?;
        info!("Removed vectors from artifact with ID: {}", artifact.id);
        Ok(())
    }

    pub async fn get_vector(
        &self,
        artifact_id: &str,
        id: JsonValue,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::GetVector)
            .await?;
        let (store, collection) = self.require_vectors(&artifact)?;
        let mut points = store
            .retrieve(&collection, &[id.clone()], true, true)
            .await?;
        if points.is_empty() {
            return Err(Error::Vector(format!("Point does not exist: {}", id)));
        }
        serde_json::to_value(points.remove(0)).map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn list_vectors(
        &self,
        artifact_id: &str,
        opts: ListVectorsOptions,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let (artifact, _) = self
            .get_with_permission(context, artifact_id, Operation::ListVectors)
            .await?;
        let (store, collection) = self.require_vectors(&artifact)?;
        let points = store
            .scroll(
                &collection,
                opts.filter,
                opts.offset,
                opts.limit,
                opts.with_payload,
                opts.with_vectors,
            )
            .await?;
        serde_json::to_value(points).map_err(|e| Error::Internal(e.to_string()))
    }

    // ============= publish =============

    pub async fn publish(
        &self,
        artifact_id: &str,
        to: Option<&str>,
        metadata: Option<JsonValue>,
        context: &Context,
    ) -> Result<JsonValue> {
        Self::require_workspace(context)?;
        let (mut artifact, parent) = self
            .get_with_permission(context, artifact_id, Operation::Publish)
            .await?;
        let manifest = artifact
            .manifest
            .clone()
            .ok_or_else(|| Error::Precondition("Manifest is empty or not committed".into()))?;
        if manifest.get("name").and_then(|n| n.as_str()).is_none() {
            return Err(Error::Validation("Manifest must have a name".into()));
        }
        if manifest
            .get("description")
            .and_then(|d| d.as_str())
            .is_none()
        {
            return Err(Error::Validation("Manifest must have a description".into()));
        }

        let publish_to = to.ok_or_else(|| {
            Error::Validation("Publishing target must be provided, e.g. 'zenodo'".into())
        })?;
        let secrets = Self::merged_secrets(&artifact, parent.as_ref());
        let archive = self.archive_from_secrets(&secrets, publish_to)?;

        let deposition = match artifact.config_value("zenodo") {
            Some(existing) if !existing.is_null() => existing.clone(),
            _ => archive.create_deposition().await?,
        };

        let creators: Vec<JsonValue> = manifest
            .get("authors")
            .and_then(|a| a.as_array())
            .map(|authors| {
                authors
                    .iter()
                    .map(|author| json!({"name": author.get("name").cloned().unwrap_or(JsonValue::Null)}))
                    .collect()
            })
            .unwrap_or_else(|| vec![json!({"name": context.user.id})]);

        let mut archive_metadata = json!({
            "title": manifest.get("name").cloned().unwrap_or_else(|| json!("Untitled")),
            "upload_type": if artifact.kind_is("dataset") { "dataset" } else { "other" },
            "description": manifest.get("description").cloned().unwrap_or_else(|| json!("No description provided.")),
            "creators": creators,
            "access_right": "open",
            "license": manifest.get("license").cloned().unwrap_or_else(|| json!("cc-by")),
            "keywords": manifest.get("tags").cloned().unwrap_or_else(|| json!([])),
            "notes": "Published automatically from Depot.",
        });
        if let Some(extra) = metadata {
            if let (Some(target), Some(source)) =
                (archive_metadata.as_object_mut(), extra.as_object())
            {
                for (key, value) in source {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        archive.update_metadata(&deposition, &archive_metadata).await?;

        // Walk the committed file tree and import every blob from its
        // presigned download URL.
        let mut directories = vec![String::new()];
        while let Some(directory) = directories.pop() {
            let entries = self
                .list_files(
                    artifact_id,
                    if directory.is_empty() {
                        None
                    } else {
                        Some(&directory)
                    },
                    None,
                    None,
                    context,
                )
                .await?;
            for entry in entries {
                let path = if directory.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{}/{}", directory, entry.name)
                };
                match entry.kind {
                    FileKind::Directory => directories.push(path),
                    FileKind::File => {
                        let url = self
                            .get_file(artifact_id, &path, None, true, context)
                            .await?;
                        archive.import_file(&deposition, &path, &url).await?;
                    }
                }
            }
        }

        let record = archive.publish(&deposition).await?;
        let config = artifact.config.get_or_insert_with(|| json!({}));
        if let Some(object) = config.as_object_mut() {
            object.insert("zenodo".to_string(), record.clone());
        }
        artifact.last_modified = now_secs();
        self.repo.update(&artifact).await?;

        info!("Published artifact with ID: {} to {}", artifact.id, publish_to);
        Ok(record)
    }
}
