//! Error types for Depot

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Not found
    #[error("Artifact does not exist: {0}")]
    ArtifactNotFound(String),

    #[error("Artifact version does not exist: {0}")]
    VersionNotFound(String),

    #[error("File does not exist in the artifact: {0}")]
    FileNotFound(String),

    // Conflicts
    #[error("Artifact already exists: {0}")]
    AlreadyExists(String),

    // Access
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // Validation
    #[error("Validation error: {0}")]
    Validation(String),

    // Preconditions
    #[error("Precondition failed: {0}")]
    Precondition(String),

    // Backends
    #[error("Database error: {0}")]
    Database(String),

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("Vector store error: {0}")]
    Vector(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Archive error: {0}")]
    Archive(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// HTTP status code surfaced for this error at the API boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::ArtifactNotFound(_) | Error::VersionNotFound(_) | Error::FileNotFound(_) => 404,

            Error::AlreadyExists(_) => 409,

            Error::PermissionDenied(_) => 403,

            Error::Validation(_) | Error::Precondition(_) => 400,

            Error::Database(_)
            | Error::Storage(_)
            | Error::Vector(_)
            | Error::Embedding(_)
            | Error::Archive(_)
            | Error::Internal(_)
            | Error::Io(_)
            | Error::Other(_) => 500,
        }
    }

    /// True for errors originating in a backing service rather than the request.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::Storage(_)
                | Error::Vector(_)
                | Error::Embedding(_)
                | Error::Archive(_)
        )
    }
}
