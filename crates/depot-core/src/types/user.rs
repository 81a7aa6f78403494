//! Requesting user identity and workspace roles

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Workspace permission tier. Ordering matters: `Admin > ReadWrite > Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read,
    ReadWrite,
    Admin,
}

/// The identity a request runs as. Token parsing happens outside this
/// service; by the time a request reaches the artifact manager it carries a
/// resolved `UserInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub is_anonymous: bool,
    /// Workspace-level roles granted to this user. The `"*"` key grants the
    /// level on every workspace.
    #[serde(default)]
    pub workspaces: HashMap<String, PermissionLevel>,
}

impl UserInfo {
    pub fn anonymous() -> Self {
        Self {
            id: "anonymous".to_string(),
            is_anonymous: true,
            workspaces: HashMap::new(),
        }
    }

    /// Whether this user holds at least `required` on `workspace`.
    pub fn check_permission(&self, workspace: &str, required: PermissionLevel) -> bool {
        if let Some(level) = self.workspaces.get(workspace) {
            if *level >= required {
                return true;
            }
        }
        if let Some(level) = self.workspaces.get("*") {
            if *level >= required {
                return true;
            }
        }
        false
    }
}

/// Per-request context: the resolved user and the workspace the call was
/// addressed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub user: UserInfo,
    pub ws: String,
}

impl Context {
    pub fn new(user: UserInfo, ws: impl Into<String>) -> Self {
        Self {
            user,
            ws: ws.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(ws: &str, level: PermissionLevel) -> UserInfo {
        UserInfo {
            id: "alice".to_string(),
            is_anonymous: false,
            workspaces: HashMap::from([(ws.to_string(), level)]),
        }
    }

    #[test]
    fn test_level_ordering() {
        assert!(PermissionLevel::Admin > PermissionLevel::ReadWrite);
        assert!(PermissionLevel::ReadWrite > PermissionLevel::Read);
    }

    #[test]
    fn test_check_permission() {
        let user = user_with("ws-a", PermissionLevel::ReadWrite);
        assert!(user.check_permission("ws-a", PermissionLevel::Read));
        assert!(user.check_permission("ws-a", PermissionLevel::ReadWrite));
        assert!(!user.check_permission("ws-a", PermissionLevel::Admin));
        assert!(!user.check_permission("ws-b", PermissionLevel::Read));
    }

    #[test]
    fn test_wildcard_workspace() {
        let user = user_with("*", PermissionLevel::Admin);
        assert!(user.check_permission("anything", PermissionLevel::Admin));
    }

    #[test]
    fn test_anonymous() {
        let user = UserInfo::anonymous();
        assert!(user.is_anonymous);
        assert!(!user.check_permission("ws-a", PermissionLevel::Read));
    }
}
