//! End-to-end lifecycle tests over in-memory backends
//!
//! The metadata store runs on an in-memory SQLite pool; blobs live in the
//! in-memory object store; vectors in the in-memory vector store. Client
//! uploads are simulated by writing directly to the object key named by the
//! presigned URL.

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::config::ObjectStoreConfig;
use depot_core::types::{Context, PermissionLevel, UserInfo};
use depot_core::Error;
use depot_metadata::SqliteArtifactStore;
use depot_s3::{MemoryBackend, MemoryObjectStore, MemoryStoreFactory, ObjectStore};
use depot_server::manager::{
    ArtifactManager, CreateOptions, DeleteOptions, EditOptions, ListChildrenOptions,
    ListVectorsOptions, SearchOptions, StaticWorkspaces,
};
use depot_server::zenodo::{ArchiveClient, ArchiveFactory};
use depot_vector::{EmbeddingProvider, EmbeddingRegistry, MemoryVectorStore};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const BUCKET: &str = "depot-workspaces";

struct MockEmbeddings;

#[async_trait]
impl EmbeddingProvider for MockEmbeddings {
    async fn embed(
        &self,
        _model: &str,
        texts: &[String],
    ) -> depot_core::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                vec![
                    t.len() as f32,
                    t.bytes().map(|b| b as u32).sum::<u32>() as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

#[derive(Default)]
struct FakeArchive {
    imported: Mutex<Vec<String>>,
}

#[async_trait]
impl ArchiveClient for FakeArchive {
    async fn create_deposition(&self) -> depot_core::Result<JsonValue> {
        Ok(json!({
            "id": 41,
            "conceptrecid": "40",
            "links": {"bucket": "memory://archive-bucket"}
        }))
    }

    async fn update_metadata(
        &self,
        _deposition: &JsonValue,
        _metadata: &JsonValue,
    ) -> depot_core::Result<()> {
        Ok(())
    }

    async fn import_file(
        &self,
        _deposition: &JsonValue,
        name: &str,
        _url: &str,
    ) -> depot_core::Result<()> {
        self.imported.lock().await.push(name.to_string());
        Ok(())
    }

    async fn publish(&self, deposition: &JsonValue) -> depot_core::Result<JsonValue> {
        Ok(json!({
            "id": deposition["id"],
            "conceptrecid": deposition["conceptrecid"],
            "state": "done",
        }))
    }
}

struct FakeArchiveFactory {
    archive: Arc<FakeArchive>,
}

impl ArchiveFactory for FakeArchiveFactory {
    fn open(&self, _token: &str, _sandbox: bool) -> Arc<dyn ArchiveClient> {
        self.archive.clone()
    }
}

struct TestEnv {
    manager: ArtifactManager,
    backend: Arc<MemoryBackend>,
    archive: Arc<FakeArchive>,
}

impl TestEnv {
    async fn new() -> Self {
        let repo = Arc::new(SqliteArtifactStore::in_memory().await.unwrap());
        let backend = MemoryBackend::new();
        let archive = Arc::new(FakeArchive::default());
        let mut embeddings = EmbeddingRegistry::new();
        embeddings.register("mock", Arc::new(MockEmbeddings));

        let manager = ArtifactManager::new(
            repo,
            Arc::new(MemoryStoreFactory::new(backend.clone())),
            Some(Arc::new(MemoryVectorStore::new())),
            Arc::new(embeddings),
            Arc::new(FakeArchiveFactory {
                archive: archive.clone(),
            }),
            Arc::new(StaticWorkspaces::new(true, Vec::new())),
            ObjectStoreConfig::default(),
        );
        Self {
            manager,
            backend,
            archive,
        }
    }

    fn bucket(&self) -> MemoryObjectStore {
        MemoryObjectStore::new(self.backend.clone(), BUCKET)
    }

    /// Simulate a client uploading through a presigned URL.
    async fn upload(&self, url: &str, body: &str) {
        let prefix = format!("memory://{}/", BUCKET);
        let key = url
            .strip_prefix(&prefix)
            .and_then(|rest| rest.split('?').next())
            .expect("presigned URL should name the bucket and key");
        self.bucket()
            .put(key, Bytes::from(body.to_string()))
            .await
            .unwrap();
    }
}

fn ctx(user: &str, ws: &str, level: PermissionLevel) -> Context {
    Context::new(
        UserInfo {
            id: user.to_string(),
            is_anonymous: false,
            workspaces: HashMap::from([(ws.to_string(), level)]),
        },
        ws,
    )
}

fn manifest(name: &str) -> JsonValue {
    json!({"name": name, "description": "test artifact"})
}

fn create_opts(alias: &str, name: &str) -> CreateOptions {
    CreateOptions {
        alias: Some(alias.to_string()),
        manifest: Some(manifest(name)),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_stage_put_commit() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    let created = env
        .manager
        .create(
            CreateOptions {
                alias: Some("ds".to_string()),
                manifest: Some(manifest("n")),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    assert_eq!(created["id"], json!("W/ds"));
    // Staged create leaves the committed manifest empty.
    assert_eq!(created["manifest"], JsonValue::Null);

    let url_a = env
        .manager
        .put_file("ds", "a.csv", 2.0, &context)
        .await
        .unwrap();
    env.upload(&url_a, "col1,col2").await;
    let url_b = env
        .manager
        .put_file("ds", "b.csv", 0.0, &context)
        .await
        .unwrap();
    env.upload(&url_b, "col3").await;

    let committed = env
        .manager
        .commit("ds", Some("new"), None, &context)
        .await
        .unwrap();
    assert_eq!(committed["versions"][0]["version"], json!("v0"));
    assert_eq!(committed["versions"].as_array().unwrap().len(), 1);
    assert_eq!(
        committed["config"]["download_weights"],
        json!({"a.csv": 2.0})
    );
    assert_eq!(committed["file_count"], json!(2));

    let read = env.manager.read("ds", None, true, &context).await.unwrap();
    assert_eq!(read["manifest"]["name"], json!("n"));
    assert_eq!(read["staging"], JsonValue::Null);
}

#[tokio::test]
async fn test_permission_inheritance() {
    let env = TestEnv::new().await;
    let carol = ctx("carol", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("parent".to_string()),
                manifest: Some(manifest("p")),
                config: Some(json!({"permissions": {"alice": "r"}})),
                ..Default::default()
            },
            &carol,
        )
        .await
        .unwrap();

    let child = env
        .manager
        .create(
            CreateOptions {
                alias: Some("child".to_string()),
                parent_id: Some("parent".to_string()),
                manifest: Some(manifest("c")),
                config: Some(json!({"permissions": {"bob": "rw"}})),
                ..Default::default()
            },
            &carol,
        )
        .await
        .unwrap();

    assert_eq!(
        child["config"]["permissions"],
        json!({"carol": "*", "bob": "rw", "alice": "r"})
    );
    assert_eq!(child["parent_id"], json!("W/parent"));
}

#[tokio::test]
async fn test_artifact_local_grants_authorize_operations() {
    let env = TestEnv::new().await;
    let owner = ctx("owner", "W", PermissionLevel::Admin);
    env.manager
        .create(
            CreateOptions {
                alias: Some("shared".to_string()),
                manifest: Some(manifest("s")),
                config: Some(json!({"permissions": {"guest": "r", "*": "l"}})),
                ..Default::default()
            },
            &owner,
        )
        .await
        .unwrap();

    // guest holds an artifact-local "r" grant and no workspace role.
    let guest = ctx("guest", "W", PermissionLevel::Read);
    let mut no_role = guest.clone();
    no_role.user.workspaces.clear();
    assert!(env
        .manager
        .read("shared", None, true, &no_role)
        .await
        .is_ok());
    let err = env
        .manager
        .edit("shared", EditOptions::default(), &no_role)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));

    // An anonymous stranger only gets what "*" expands to.
    let anonymous = Context::new(UserInfo::anonymous(), "W");
    let err = env
        .manager
        .read("shared", None, true, &anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

#[tokio::test]
async fn test_version_pinning() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(create_opts("doc", "first"), &context)
        .await
        .unwrap();
    env.manager
        .edit(
            "doc",
            EditOptions {
                manifest: Some(manifest("second")),
                version: Some("new".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    // Mutate the live manifest in place (no new version).
    env.manager
        .edit(
            "doc",
            EditOptions {
                manifest: Some(manifest("third")),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    let pinned = env
        .manager
        .read("doc", Some("v0"), true, &context)
        .await
        .unwrap();
    assert_eq!(pinned["manifest"]["name"], json!("first"));

    let live = env.manager.read("doc", None, true, &context).await.unwrap();
    assert_eq!(live["manifest"]["name"], json!("third"));

    let err = env
        .manager
        .read("doc", Some("v9"), true, &context)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VersionNotFound(_)));
}

#[tokio::test]
async fn test_alias_pattern_generation() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("pets".to_string()),
                manifest: Some(manifest("pets")),
                config: Some(json!({"id_parts": {"kind": ["fish", "bird"]}})),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    let shape = regex::Regex::new(r"^pet-(fish|bird)-[0-9a-f-]{36}$").unwrap();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..20 {
        let child = env
            .manager
            .create(
                CreateOptions {
                    alias: Some("pet-{kind}-{uuid}".to_string()),
                    parent_id: Some("pets".to_string()),
                    manifest: Some(manifest("pet")),
                    ..Default::default()
                },
                &context,
            )
            .await
            .unwrap();
        let alias = child["id"]
            .as_str()
            .unwrap()
            .strip_prefix("W/")
            .unwrap()
            .to_string();
        assert!(shape.is_match(&alias), "unexpected alias: {}", alias);
        assert!(seen.insert(alias), "alias allocated twice");
    }
}

#[tokio::test]
async fn test_list_children_with_filters() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(create_opts("coll", "coll"), &context)
        .await
        .unwrap();
    for (alias, tag) in [("a", "red"), ("b", "redux"), ("c", "blue")] {
        env.manager
            .create(
                CreateOptions {
                    alias: Some(alias.to_string()),
                    parent_id: Some("coll".to_string()),
                    manifest: Some(json!({
                        "name": alias,
                        "description": "d",
                        "tag": tag,
                    })),
                    ..Default::default()
                },
                &context,
            )
            .await
            .unwrap();
    }

    let result = env
        .manager
        .list_children(
            Some("coll"),
            ListChildrenOptions {
                filters: Some(json!({"manifest": {"tag": "red*"}})),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    let items = result.as_array().unwrap();
    assert_eq!(items.len(), 2);
    let mut names: Vec<&str> = items
        .iter()
        .map(|i| i["manifest"]["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);

    // Pagination wraps the items and reports the unpaged total.
    let page = env
        .manager
        .list_children(
            Some("coll"),
            ListChildrenOptions {
                limit: 2,
                pagination: true,
                silent: true,
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    assert_eq!(page["total"], json!(3));
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stage_filter_partitions_children() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(create_opts("coll", "coll"), &context)
        .await
        .unwrap();
    env.manager
        .create(
            CreateOptions {
                alias: Some("done".to_string()),
                parent_id: Some("coll".to_string()),
                manifest: Some(manifest("done")),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    env.manager
        .create(
            CreateOptions {
                alias: Some("wip".to_string()),
                parent_id: Some("coll".to_string()),
                manifest: Some(manifest("wip")),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    let committed = env
        .manager
        .list_children(
            Some("coll"),
            ListChildrenOptions {
                filters: Some(json!({"stage": false})),
                silent: true,
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    let staged = env
        .manager
        .list_children(
            Some("coll"),
            ListChildrenOptions {
                filters: Some(json!({"stage": true})),
                silent: true,
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    let committed_ids: Vec<&str> = committed
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    let staged_ids: Vec<&str> = staged
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap())
        .collect();
    assert_eq!(committed_ids, vec!["W/done"]);
    assert_eq!(staged_ids, vec!["W/wip"]);
}

#[tokio::test]
async fn test_delete_recursive_with_files() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    let parent = env
        .manager
        .create(create_opts("tree", "tree"), &context)
        .await
        .unwrap();
    let parent_internal_id = parent["_id"].as_str().unwrap().to_string();
    for alias in ["left", "right"] {
        env.manager
            .create(
                CreateOptions {
                    alias: Some(alias.to_string()),
                    parent_id: Some("tree".to_string()),
                    manifest: Some(manifest(alias)),
                    ..Default::default()
                },
                &context,
            )
            .await
            .unwrap();
    }

    env.manager
        .delete(
            "tree",
            DeleteOptions {
                recursive: true,
                delete_files: true,
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    for alias in ["tree", "left", "right"] {
        let err = env
            .manager
            .read(alias, None, true, &context)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ArtifactNotFound(_)), "{}", alias);
    }
    let remaining = env
        .bucket()
        .count_prefix(&format!("W/artifacts/{}/", parent_internal_id))
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_delete_single_version() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(create_opts("doc", "first"), &context)
        .await
        .unwrap();
    env.manager
        .edit(
            "doc",
            EditOptions {
                manifest: Some(manifest("second")),
                version: Some("new".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    env.manager
        .delete(
            "doc",
            DeleteOptions {
                version: Some("v0".to_string()),
                delete_files: true,
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    let read = env.manager.read("doc", None, true, &context).await.unwrap();
    let versions = read["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0]["version"], json!("v1"));
}

#[tokio::test]
async fn test_round_trip_create_read() {
    let env = TestEnv::new().await;
    let context = ctx("alice", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("data".to_string()),
                manifest: Some(manifest("data")),
                config: Some(json!({"list_fields": ["id", "manifest"]})),
                secrets: Some(json!({"TOKEN": "secret-value"})),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    let read = env
        .manager
        .read("data", None, true, &context)
        .await
        .unwrap();
    assert_eq!(read["manifest"], manifest("data"));
    assert_eq!(read["config"]["list_fields"], json!(["id", "manifest"]));
    assert_eq!(read["config"]["permissions"]["alice"], json!("*"));
    // Secrets never leave the controller.
    assert!(read.get("secrets").is_none());
}

#[tokio::test]
async fn test_put_then_get_share_the_object_key() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("ds".to_string()),
                manifest: Some(manifest("ds")),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    let put_url = env
        .manager
        .put_file("ds", "data/a.csv", 0.0, &context)
        .await
        .unwrap();
    env.upload(&put_url, "x").await;
    let get_url = env
        .manager
        .get_file("ds", "data/a.csv", Some("stage"), true, &context)
        .await
        .unwrap();

    let key = |url: &str| url.split('?').next().unwrap().to_string();
    assert_eq!(key(&put_url), key(&get_url));
}

#[tokio::test]
async fn test_edit_stage_commit_read_latest() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(create_opts("doc", "old"), &context)
        .await
        .unwrap();
    env.manager
        .edit(
            "doc",
            EditOptions {
                manifest: Some(manifest("staged-name")),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    // Live manifest is untouched while the edit is staged.
    let live = env.manager.read("doc", Some("latest"), true, &context).await.unwrap();
    assert_eq!(live["manifest"]["name"], json!("old"));

    env.manager
        .commit("doc", Some("new"), Some("second rev"), &context)
        .await
        .unwrap();
    let latest = env
        .manager
        .read("doc", Some("latest"), true, &context)
        .await
        .unwrap();
    assert_eq!(latest["manifest"]["name"], json!("staged-name"));
    assert_eq!(latest["versions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stats_accounting() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("ds".to_string()),
                manifest: Some(manifest("ds")),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    let url = env
        .manager
        .put_file("ds", "a.csv", 2.5, &context)
        .await
        .unwrap();
    env.upload(&url, "x").await;
    env.manager.commit("ds", Some("new"), None, &context).await.unwrap();

    env.manager.read("ds", None, false, &context).await.unwrap();
    env.manager.read("ds", None, false, &context).await.unwrap();
    env.manager
        .get_file("ds", "a.csv", None, false, &context)
        .await
        .unwrap();

    let read = env.manager.read("ds", None, true, &context).await.unwrap();
    assert_eq!(read["view_count"], json!(2.0));
    assert_eq!(read["download_count"], json!(2.5));

    env.manager.reset_stats("ds", &context).await.unwrap();
    let read = env.manager.read("ds", None, true, &context).await.unwrap();
    assert_eq!(read["view_count"], json!(0.0));
    assert_eq!(read["download_count"], json!(0.0));
}

#[tokio::test]
async fn test_boundary_rejections() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    // Alias containing '^'.
    let err = env
        .manager
        .create(create_opts("bad^alias", "x"), &context)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // UUID-shaped alias.
    let err = env
        .manager
        .create(
            create_opts("0192f4be-11f7-7610-9da2-ffc39feeb009", "x"),
            &context,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    env.manager
        .create(
            CreateOptions {
                alias: Some("ds".to_string()),
                manifest: Some(manifest("ds")),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    // Committing "stage" as a version label.
    let err = env
        .manager
        .commit("ds", Some("stage"), None, &context)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Negative download weight.
    let err = env
        .manager
        .put_file("ds", "a.csv", -1.0, &context)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Duplicate alias without overwrite.
    let err = env
        .manager
        .create(
            CreateOptions {
                alias: Some("ds".to_string()),
                manifest: Some(manifest("other")),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));

    // put_file requires staging.
    env.manager
        .create(create_opts("plain", "plain"), &context)
        .await
        .unwrap();
    let err = env
        .manager
        .put_file("plain", "a.csv", 0.0, &context)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
}

#[tokio::test]
async fn test_list_fields_projection_rejects_secrets() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("coll".to_string()),
                manifest: Some(manifest("coll")),
                config: Some(json!({"list_fields": ["id", "secrets"]})),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    let err = env
        .manager
        .list_children(Some("coll"), ListChildrenOptions::default(), &context)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_list_fields_projection_applies() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("coll".to_string()),
                manifest: Some(manifest("coll")),
                config: Some(json!({"list_fields": ["id", "manifest"]})),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    env.manager
        .create(
            CreateOptions {
                alias: Some("child".to_string()),
                parent_id: Some("coll".to_string()),
                manifest: Some(manifest("child")),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    let items = env
        .manager
        .list_children(Some("coll"), ListChildrenOptions::default(), &context)
        .await
        .unwrap();
    let item = &items.as_array().unwrap()[0];
    let keys: Vec<&String> = item.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 2);
    assert!(item.get("id").is_some());
    assert!(item.get("manifest").is_some());
    assert!(item.get("config").is_none());
}

#[tokio::test]
async fn test_collection_child_count_and_schema() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("coll".to_string()),
                kind: Some("collection".to_string()),
                manifest: Some(manifest("coll")),
                config: Some(json!({
                    "collection_schema": {
                        "type": "object",
                        "properties": {"tag": {"type": "string"}},
                        "required": ["tag"],
                    }
                })),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    // A staged child missing the required tag fails at commit.
    env.manager
        .create(
            CreateOptions {
                alias: Some("bad".to_string()),
                parent_id: Some("coll".to_string()),
                kind: Some("dataset".to_string()),
                manifest: Some(json!({"name": "bad", "description": "d"})),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    let err = env
        .manager
        .commit("bad", Some("new"), None, &context)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // One with the tag commits fine.
    env.manager
        .create(
            CreateOptions {
                alias: Some("good".to_string()),
                parent_id: Some("coll".to_string()),
                kind: Some("dataset".to_string()),
                manifest: Some(json!({"name": "good", "description": "d", "tag": "t"})),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    env.manager
        .commit("good", Some("new"), None, &context)
        .await
        .unwrap();

    let read = env
        .manager
        .read("coll", None, true, &context)
        .await
        .unwrap();
    assert_eq!(read["config"]["child_count"], json!(2));
}

#[tokio::test]
async fn test_vector_collection_lifecycle() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("vectors".to_string()),
                kind: Some("vector-collection".to_string()),
                manifest: Some(manifest("vectors")),
                config: Some(json!({
                    "vectors_config": {"size": 3, "distance": "Cosine"},
                    "embedding_model": "mock:any",
                })),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();

    env.manager
        .add_vectors(
            "vectors",
            vec![
                json!({"id": 1, "vector": [1.0, 0.0, 0.0], "payload": {"kind": "a"}}),
                json!({"id": 2, "vector": [0.0, 1.0, 0.0], "payload": {"kind": "b"}}),
            ],
            &context,
        )
        .await
        .unwrap();

    let read = env
        .manager
        .read("vectors", None, true, &context)
        .await
        .unwrap();
    assert_eq!(read["config"]["vector_count"], json!(2));

    let hits = env
        .manager
        .search_by_vector(
            "vectors",
            vec![1.0, 0.1, 0.0],
            SearchOptions::default(),
            &context,
        )
        .await
        .unwrap();
    assert_eq!(hits[0]["id"], json!(1));

    env.manager
        .add_documents(
            "vectors",
            vec![json!({"id": 3, "text": "hello world"})],
            &context,
        )
        .await
        .unwrap();
    let found = env
        .manager
        .search_by_text(
            "vectors",
            "hello world",
            SearchOptions {
                pagination: true,
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    assert_eq!(found["total"], json!(3));
    assert_eq!(found["items"][0]["id"], json!(3));

    let point = env
        .manager
        .get_vector("vectors", json!(3), &context)
        .await
        .unwrap();
    assert_eq!(point["payload"]["text"], json!("hello world"));

    let listed = env
        .manager
        .list_vectors("vectors", ListVectorsOptions::default(), &context)
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 3);

    env.manager
        .remove_vectors("vectors", vec![json!(1), json!(2)], &context)
        .await
        .unwrap();
    let read = env
        .manager
        .read("vectors", None, true, &context)
        .await
        .unwrap();
    assert_eq!(read["config"]["vector_count"], json!(1));
}

#[tokio::test]
async fn test_publish_to_archive() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    env.manager
        .create(
            CreateOptions {
                alias: Some("ds".to_string()),
                kind: Some("dataset".to_string()),
                manifest: Some(manifest("ds")),
                secrets: Some(json!({"ZENODO_ACCESS_TOKEN": "token"})),
                version: Some("stage".to_string()),
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    let url = env
        .manager
        .put_file("ds", "data/a.csv", 0.0, &context)
        .await
        .unwrap();
    env.upload(&url, "x").await;
    env.manager.commit("ds", Some("new"), None, &context).await.unwrap();

    let record = env
        .manager
        .publish("ds", Some("zenodo"), None, &context)
        .await
        .unwrap();
    assert_eq!(record["state"], json!("done"));

    let imported = env.archive.imported.lock().await.clone();
    assert_eq!(imported, vec!["data/a.csv"]);

    let read = env.manager.read("ds", None, true, &context).await.unwrap();
    assert_eq!(read["config"]["zenodo"]["state"], json!("done"));
}

#[tokio::test]
async fn test_overwrite_reuses_existing_id() {
    let env = TestEnv::new().await;
    let context = ctx("u", "W", PermissionLevel::Admin);

    let first = env
        .manager
        .create(create_opts("ds", "one"), &context)
        .await
        .unwrap();
    let second = env
        .manager
        .create(
            CreateOptions {
                alias: Some("ds".to_string()),
                manifest: Some(manifest("two")),
                overwrite: true,
                ..Default::default()
            },
            &context,
        )
        .await
        .unwrap();
    assert_eq!(first["_id"], second["_id"]);

    let read = env.manager.read("ds", None, true, &context).await.unwrap();
    assert_eq!(read["manifest"]["name"], json!("two"));
}
