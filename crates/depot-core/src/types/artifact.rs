//! The artifact record and its identifiers

use crate::utils::is_uuid_shaped;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const TYPE_GENERIC: &str = "generic";
pub const TYPE_COLLECTION: &str = "collection";
pub const TYPE_VECTOR_COLLECTION: &str = "vector-collection";

/// One committed version of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: i64,
}

/// A file registered for the in-progress version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingEntry {
    pub path: String,
    #[serde(default)]
    pub download_weight: f64,
}

/// One row of the artifacts table. This is also the shape persisted as a
/// per-version snapshot in the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub workspace: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub manifest: Option<JsonValue>,
    /// `None` means no pending version. A list (possibly empty) means a
    /// staged version is in progress.
    #[serde(default)]
    pub staging: Option<Vec<StagingEntry>>,
    #[serde(default)]
    pub download_count: f64,
    #[serde(default)]
    pub view_count: f64,
    #[serde(default)]
    pub file_count: i64,
    pub created_at: i64,
    #[serde(default)]
    pub created_by: Option<String>,
    pub last_modified: i64,
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    #[serde(default)]
    pub config: Option<JsonValue>,
    #[serde(default)]
    pub secrets: Option<JsonValue>,
}

impl ArtifactRecord {
    /// Fresh time-ordered artifact id.
    pub fn new_id() -> String {
        uuid::Uuid::now_v7().to_string()
    }

    /// An artifact is committed once its manifest is non-null.
    pub fn is_committed(&self) -> bool {
        self.manifest.is_some()
    }

    /// Whether a staged version is in progress.
    pub fn is_staged(&self) -> bool {
        self.staging.is_some()
    }

    pub fn kind_is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    /// `workspace/alias`, falling back to the raw id for rows without alias.
    pub fn qualified_name(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}/{}", self.workspace, alias),
            None => format!("{}/{}", self.workspace, self.id),
        }
    }

    /// Name of the backing vector collection for `vector-collection` artifacts.
    pub fn vector_collection_name(&self) -> String {
        format!(
            "{}^{}",
            self.workspace,
            self.alias.as_deref().unwrap_or(&self.id)
        )
    }

    /// Config value for a dotted sub-key, e.g. `download_weights`.
    pub fn config_value(&self, key: &str) -> Option<&JsonValue> {
        self.config.as_ref().and_then(|c| c.get(key))
    }

    /// The sanitized response shape: every column except `secrets`, with
    /// `id` rendered as `workspace/alias`, `_id` carrying the internal id,
    /// and `parent_id` rendered the same way when the parent row is known.
    pub fn to_view(&self, parent: Option<&ArtifactRecord>) -> JsonValue {
        let mut data = match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => map,
            _ => return JsonValue::Null,
        };
        data.remove("secrets");
        data.insert("_id".to_string(), JsonValue::String(self.id.clone()));
        data.insert("id".to_string(), JsonValue::String(self.qualified_name()));
        if let Some(parent) = parent {
            data.insert(
                "parent_id".to_string(),
                JsonValue::String(parent.qualified_name()),
            );
        }
        JsonValue::Object(data)
    }
}

/// How a client-supplied artifact id resolves against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSelector {
    /// A raw UUID row id.
    Id(String),
    /// A `workspace/alias` pair.
    Alias { workspace: String, alias: String },
}

impl ArtifactSelector {
    /// Interpret a client-supplied artifact id: a UUID is used directly, a
    /// `workspace/alias` pair is split, and a bare alias is qualified with
    /// the context workspace.
    pub fn qualify(artifact_id: &str, context_ws: &str) -> Result<ArtifactSelector> {
        if is_uuid_shaped(artifact_id) {
            return Ok(ArtifactSelector::Id(artifact_id.to_string()));
        }
        if artifact_id.contains('/') {
            let parts: Vec<&str> = artifact_id.split('/').collect();
            if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
                return Err(Error::Validation(format!(
                    "Invalid artifact ID format, it should be `workspace/alias`: '{}'",
                    artifact_id
                )));
            }
            return Ok(ArtifactSelector::Alias {
                workspace: parts[0].to_string(),
                alias: parts[1].to_string(),
            });
        }
        Ok(ArtifactSelector::Alias {
            workspace: context_ws.to_string(),
            alias: artifact_id.to_string(),
        })
    }
}
