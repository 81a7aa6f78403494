//! Canonical object key layout
//!
//! Every artifact owns one directory:
//! `<prefix>/<workspace>/artifacts/<artifact-id>/`. Version `i` stores its
//! blobs under `v<i>/` and a JSON snapshot of the metadata row as
//! `v<i>.json`. All joins reject traversal outside the artifact directory.

use depot_core::utils::safe_join;
use depot_core::{Result, ARTIFACTS_DIR};

/// `<prefix>/<workspace>/artifacts/<artifact-id>`
pub fn artifact_prefix(prefix: &str, workspace: &str, artifact_id: &str) -> Result<String> {
    safe_join(&[prefix, workspace, ARTIFACTS_DIR, artifact_id])
}

/// `<prefix>/<workspace>/artifacts/<artifact-id>/v<i>.json`
pub fn snapshot_key(
    prefix: &str,
    workspace: &str,
    artifact_id: &str,
    version_index: usize,
) -> Result<String> {
    let base = artifact_prefix(prefix, workspace, artifact_id)?;
    Ok(format!("{}/v{}.json", base, version_index))
}

/// `<prefix>/<workspace>/artifacts/<artifact-id>/v<i>`
pub fn version_prefix(
    prefix: &str,
    workspace: &str,
    artifact_id: &str,
    version_index: usize,
) -> Result<String> {
    let base = artifact_prefix(prefix, workspace, artifact_id)?;
    Ok(format!("{}/v{}", base, version_index))
}

/// `<prefix>/<workspace>/artifacts/<artifact-id>/v<i>/<path>`
pub fn file_key(
    prefix: &str,
    workspace: &str,
    artifact_id: &str,
    version_index: usize,
    path: &str,
) -> Result<String> {
    let base = version_prefix(prefix, workspace, artifact_id, version_index)?;
    safe_join(&[&base, path])
}
