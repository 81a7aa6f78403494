//! Core domain types

pub mod artifact;
pub mod permission;
pub mod user;
pub mod version;

pub use artifact::{
    ArtifactRecord, ArtifactSelector, StagingEntry, VersionEntry, TYPE_COLLECTION, TYPE_GENERIC,
    TYPE_VECTOR_COLLECTION,
};
pub use permission::{artifact_grants, Operation, PermissionCode};
pub use user::{Context, PermissionLevel, UserInfo};
pub use version::VersionSelector;
