//! Depot server library
//!
//! The artifact lifecycle controller, alias allocator, archive adapter, and
//! the HTTP surface over them.

pub mod alias;
pub mod manager;
pub mod routes;
pub mod zenodo;

pub use manager::{
    ArtifactManager, CreateOptions, DeleteOptions, EditOptions, ListChildrenOptions,
    ListVectorsOptions, SearchOptions, StaticWorkspaces, WorkspaceDirectory,
};
pub use routes::{router, AppState, JsonTokenParser, UserTokenParser};
pub use zenodo::{ArchiveClient, ArchiveFactory, ZenodoClient, ZenodoFactory};
