//! Permission algebra
//!
//! Operations form a closed set, each requiring a workspace tier. Artifact
//! configs may additionally grant operations to individual users (or to the
//! `"@"` authenticated / `"*"` public wildcards) through short permission
//! codes, expanded here as compile-time constant tables.

use crate::types::user::{PermissionLevel, UserInfo};
use serde_json::Value as JsonValue;

/// Every operation the artifact manager exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Read,
    GetVector,
    GetFile,
    ListFiles,
    ListVectors,
    SearchByText,
    SearchByVector,
    Create,
    Edit,
    Commit,
    AddVectors,
    AddDocuments,
    PutFile,
    RemoveVectors,
    RemoveFile,
    Delete,
    ResetStats,
    Publish,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Read => "read",
            Operation::GetVector => "get_vector",
            Operation::GetFile => "get_file",
            Operation::ListFiles => "list_files",
            Operation::ListVectors => "list_vectors",
            Operation::SearchByText => "search_by_text",
            Operation::SearchByVector => "search_by_vector",
            Operation::Create => "create",
            Operation::Edit => "edit",
            Operation::Commit => "commit",
            Operation::AddVectors => "add_vectors",
            Operation::AddDocuments => "add_documents",
            Operation::PutFile => "put_file",
            Operation::RemoveVectors => "remove_vectors",
            Operation::RemoveFile => "remove_file",
            Operation::Delete => "delete",
            Operation::ResetStats => "reset_stats",
            Operation::Publish => "publish",
        }
    }

    pub fn parse(name: &str) -> Option<Operation> {
        match name {
            "list" => Some(Operation::List),
            "read" => Some(Operation::Read),
            "get_vector" => Some(Operation::GetVector),
            "get_file" => Some(Operation::GetFile),
            "list_files" => Some(Operation::ListFiles),
            "list_vectors" => Some(Operation::ListVectors),
            "search_by_text" => Some(Operation::SearchByText),
            "search_by_vector" => Some(Operation::SearchByVector),
            "create" => Some(Operation::Create),
            "edit" => Some(Operation::Edit),
            "commit" => Some(Operation::Commit),
            "add_vectors" => Some(Operation::AddVectors),
            "add_documents" => Some(Operation::AddDocuments),
            "put_file" => Some(Operation::PutFile),
            "remove_vectors" => Some(Operation::RemoveVectors),
            "remove_file" => Some(Operation::RemoveFile),
            "delete" => Some(Operation::Delete),
            "reset_stats" => Some(Operation::ResetStats),
            "publish" => Some(Operation::Publish),
            _ => None,
        }
    }

    /// Workspace tier required when no artifact-local grant applies.
    pub fn required_level(&self) -> PermissionLevel {
        match self {
            Operation::List
            | Operation::Read
            | Operation::GetVector
            | Operation::GetFile
            | Operation::ListFiles
            | Operation::ListVectors
            | Operation::SearchByText
            | Operation::SearchByVector => PermissionLevel::Read,

            Operation::Create
            | Operation::Edit
            | Operation::Commit
            | Operation::AddVectors
            | Operation::AddDocuments
            | Operation::PutFile
            | Operation::RemoveVectors
            | Operation::RemoveFile => PermissionLevel::ReadWrite,

            Operation::Delete | Operation::ResetStats | Operation::Publish => {
                PermissionLevel::Admin
            }
        }
    }
}

/// Short permission codes attachable to `config.permissions` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCode {
    None,
    List,
    ListPlus,
    ListVectors,
    ListVectorsPlus,
    ListFiles,
    ListFilesPlus,
    Read,
    ReadPlus,
    ReadWrite,
    ReadWritePlus,
    Star,
}

const CODE_L: &[Operation] = &[Operation::List];

const CODE_L_PLUS: &[Operation] = &[Operation::List, Operation::Create, Operation::Commit];

const CODE_LV: &[Operation] = &[Operation::List, Operation::ListVectors];

const CODE_LV_PLUS: &[Operation] = &[
    Operation::List,
    Operation::ListVectors,
    Operation::Create,
    Operation::Commit,
    Operation::AddVectors,
    Operation::AddDocuments,
];

const CODE_LF: &[Operation] = &[Operation::List, Operation::ListFiles];

const CODE_LF_PLUS: &[Operation] = &[
    Operation::List,
    Operation::ListFiles,
    Operation::Create,
    Operation::Commit,
    Operation::PutFile,
];

const CODE_R: &[Operation] = &[
    Operation::Read,
    Operation::GetFile,
    Operation::ListFiles,
    Operation::List,
    Operation::SearchByVector,
    Operation::SearchByText,
    Operation::GetVector,
];

const CODE_R_PLUS: &[Operation] = &[
    Operation::Read,
    Operation::GetFile,
    Operation::PutFile,
    Operation::ListFiles,
    Operation::List,
    Operation::SearchByVector,
    Operation::SearchByText,
    Operation::GetVector,
    Operation::Create,
    Operation::Commit,
    Operation::AddVectors,
    Operation::AddDocuments,
];

const CODE_RW: &[Operation] = &[
    Operation::Read,
    Operation::GetFile,
    Operation::GetVector,
    Operation::SearchByVector,
    Operation::SearchByText,
    Operation::ListFiles,
    Operation::ListVectors,
    Operation::List,
    Operation::Edit,
    Operation::Commit,
    Operation::PutFile,
    Operation::AddVectors,
    Operation::AddDocuments,
    Operation::RemoveFile,
    Operation::RemoveVectors,
];

const CODE_RW_PLUS: &[Operation] = &[
    Operation::Read,
    Operation::GetFile,
    Operation::GetVector,
    Operation::SearchByVector,
    Operation::SearchByText,
    Operation::ListFiles,
    Operation::ListVectors,
    Operation::List,
    Operation::Edit,
    Operation::Commit,
    Operation::PutFile,
    Operation::AddVectors,
    Operation::AddDocuments,
    Operation::RemoveFile,
    Operation::RemoveVectors,
    Operation::Create,
];

const CODE_STAR: &[Operation] = &[
    Operation::Read,
    Operation::GetFile,
    Operation::GetVector,
    Operation::SearchByVector,
    Operation::SearchByText,
    Operation::ListFiles,
    Operation::ListVectors,
    Operation::List,
    Operation::Edit,
    Operation::Commit,
    Operation::PutFile,
    Operation::AddVectors,
    Operation::AddDocuments,
    Operation::RemoveFile,
    Operation::RemoveVectors,
    Operation::Create,
    Operation::ResetStats,
    Operation::Publish,
];

impl PermissionCode {
    pub fn parse(code: &str) -> Option<PermissionCode> {
        match code {
            "n" => Some(PermissionCode::None),
            "l" => Some(PermissionCode::List),
            "l+" => Some(PermissionCode::ListPlus),
            "lv" => Some(PermissionCode::ListVectors),
            "lv+" => Some(PermissionCode::ListVectorsPlus),
            "lf" => Some(PermissionCode::ListFiles),
            "lf+" => Some(PermissionCode::ListFilesPlus),
            "r" => Some(PermissionCode::Read),
            "r+" => Some(PermissionCode::ReadPlus),
            "rw" => Some(PermissionCode::ReadWrite),
            "rw+" => Some(PermissionCode::ReadWritePlus),
            "*" => Some(PermissionCode::Star),
            _ => None,
        }
    }

    /// The operations this code allows.
    pub fn expand(&self) -> &'static [Operation] {
        match self {
            PermissionCode::None => &[],
            PermissionCode::List => CODE_L,
            PermissionCode::ListPlus => CODE_L_PLUS,
            PermissionCode::ListVectors => CODE_LV,
            PermissionCode::ListVectorsPlus => CODE_LV_PLUS,
            PermissionCode::ListFiles => CODE_LF,
            PermissionCode::ListFilesPlus => CODE_LF_PLUS,
            PermissionCode::Read => CODE_R,
            PermissionCode::ReadPlus => CODE_R_PLUS,
            PermissionCode::ReadWrite => CODE_RW,
            PermissionCode::ReadWritePlus => CODE_RW_PLUS,
            PermissionCode::Star => CODE_STAR,
        }
    }
}

/// Whether a `config.permissions` value (a code string, or an explicit list
/// of operation names used verbatim) grants `op`. Unknown codes grant
/// nothing.
fn value_grants(value: &JsonValue, op: Operation) -> bool {
    match value {
        JsonValue::String(code) => PermissionCode::parse(code)
            .map(|c| c.expand().contains(&op))
            .unwrap_or(false),
        JsonValue::Array(ops) => ops
            .iter()
            .filter_map(|v| v.as_str())
            .any(|name| name == op.as_str()),
        _ => false,
    }
}

/// Evaluate artifact-local grants in order: the user's own entry, the `"@"`
/// authenticated wildcard, then the `"*"` public wildcard.
pub fn artifact_grants(config: Option<&JsonValue>, user: &UserInfo, op: Operation) -> bool {
    let permissions = match config
        .and_then(|c| c.get("permissions"))
        .and_then(|p| p.as_object())
    {
        Some(p) => p,
        None => return false,
    };

    if let Some(value) = permissions.get(&user.id) {
        if value_grants(value, op) {
            return true;
        }
    }

    if !user.is_anonymous {
        if let Some(value) = permissions.get("@") {
            if value_grants(value, op) {
                return true;
            }
        }
    }

    if let Some(value) = permissions.get("*") {
        if value_grants(value, op) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn user(id: &str, anonymous: bool) -> UserInfo {
        UserInfo {
            id: id.to_string(),
            is_anonymous: anonymous,
            workspaces: HashMap::new(),
        }
    }

    #[test]
    fn test_operation_round_trip() {
        for name in [
            "list",
            "read",
            "get_vector",
            "get_file",
            "list_files",
            "list_vectors",
            "search_by_text",
            "search_by_vector",
            "create",
            "edit",
            "commit",
            "add_vectors",
            "add_documents",
            "put_file",
            "remove_vectors",
            "remove_file",
            "delete",
            "reset_stats",
            "publish",
        ] {
            let op = Operation::parse(name).unwrap();
            assert_eq!(op.as_str(), name);
        }
        assert!(Operation::parse("drop_table").is_none());
    }

    #[test]
    fn test_required_levels() {
        assert_eq!(Operation::Read.required_level(), PermissionLevel::Read);
        assert_eq!(Operation::List.required_level(), PermissionLevel::Read);
        assert_eq!(Operation::Commit.required_level(), PermissionLevel::ReadWrite);
        assert_eq!(Operation::PutFile.required_level(), PermissionLevel::ReadWrite);
        assert_eq!(Operation::Delete.required_level(), PermissionLevel::Admin);
        assert_eq!(Operation::Publish.required_level(), PermissionLevel::Admin);
    }

    #[test]
    fn test_code_expansion() {
        assert!(PermissionCode::parse("n").unwrap().expand().is_empty());
        assert_eq!(
            PermissionCode::parse("l").unwrap().expand(),
            &[Operation::List]
        );
        let r = PermissionCode::parse("r").unwrap().expand();
        assert!(r.contains(&Operation::Read));
        assert!(r.contains(&Operation::GetFile));
        assert!(!r.contains(&Operation::Edit));
        let rw = PermissionCode::parse("rw").unwrap().expand();
        assert!(rw.contains(&Operation::Edit));
        assert!(rw.contains(&Operation::RemoveVectors));
        assert!(!rw.contains(&Operation::Create));
        let rw_plus = PermissionCode::parse("rw+").unwrap().expand();
        assert!(rw_plus.contains(&Operation::Create));
        assert!(!rw_plus.contains(&Operation::ResetStats));
        let star = PermissionCode::parse("*").unwrap().expand();
        assert!(star.contains(&Operation::ResetStats));
        assert!(star.contains(&Operation::Publish));
    }

    #[test]
    fn test_unknown_code_grants_nothing() {
        let config = json!({"permissions": {"alice": "zz"}});
        assert!(!artifact_grants(Some(&config), &user("alice", false), Operation::Read));
    }

    #[test]
    fn test_explicit_operation_list() {
        let config = json!({"permissions": {"alice": ["read", "commit"]}});
        let alice = user("alice", false);
        assert!(artifact_grants(Some(&config), &alice, Operation::Read));
        assert!(artifact_grants(Some(&config), &alice, Operation::Commit));
        assert!(!artifact_grants(Some(&config), &alice, Operation::Edit));
    }

    #[test]
    fn test_authenticated_wildcard_skips_anonymous() {
        let config = json!({"permissions": {"@": "r"}});
        assert!(artifact_grants(Some(&config), &user("bob", false), Operation::Read));
        assert!(!artifact_grants(Some(&config), &user("anonymous", true), Operation::Read));
    }

    #[test]
    fn test_public_wildcard_applies_to_anonymous() {
        let config = json!({"permissions": {"*": "l"}});
        assert!(artifact_grants(Some(&config), &user("anonymous", true), Operation::List));
        assert!(!artifact_grants(Some(&config), &user("anonymous", true), Operation::Read));
    }

    #[test]
    fn test_specific_user_checked_first() {
        let config = json!({"permissions": {"carol": "n", "*": "r"}});
        // "n" for carol does not grant read, but the public wildcard does.
        assert!(artifact_grants(Some(&config), &user("carol", false), Operation::Read));
    }
}
