use std::path::PathBuf;

use treehub_types::{ErrorKind, Namespace, ObjectId};

/// Errors from blob plane operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob at the object's path.
    #[error("object not found: namespace={namespace} id={id}")]
    NotFound { namespace: Namespace, id: ObjectId },

    /// The namespace cannot be used as a directory name.
    #[error("namespace is not usable as a storage path: {0}")]
    InvalidNamespace(String),

    /// The storage root could not be created or is not a directory.
    #[error("storage root {path:?} unavailable: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend state is unusable (e.g. a poisoned lock).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidNamespace(_) => ErrorKind::Validation,
            Self::RootUnavailable { .. } => ErrorKind::Connection,
            Self::Io(_) | Self::Backend(_) => ErrorKind::StorageOperation,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
