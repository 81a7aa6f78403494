//! Depot Core Library
//!
//! Core types, permission algebra, and configuration for the Depot
//! artifact manager.

pub mod config;
pub mod error;
pub mod schema;
pub mod types;
pub mod utils;

pub use config::DepotConfig;
pub use error::{Error, Result};

/// Depot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory under each workspace prefix that holds artifact data
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Default bucket for workspace artifact storage
pub const DEFAULT_WORKSPACE_BUCKET: &str = "depot-workspaces";

/// Lifetime of presigned upload/download URLs
pub const PRESIGNED_URL_TTL_SECS: u64 = 3600;

/// Default vector size for new vector collections
pub const DEFAULT_VECTOR_SIZE: u64 = 128;

/// Candidates generated per alias allocation round
pub const MAX_ALIAS_CANDIDATES: usize = 10;

/// Alias allocation rounds before giving up
pub const MAX_ALIAS_ATTEMPTS: usize = 10;

/// Default page size for child listing
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Default maximum number of entries returned by file listing
pub const DEFAULT_FILE_LIST_LIMIT: i64 = 1000;
