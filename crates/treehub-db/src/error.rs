//! Error types for metadata plane operations.

use thiserror::Error;
use treehub_types::{ErrorKind, TypeError};

/// Errors that can occur in document stores and repositories.
#[derive(Debug, Error)]
pub enum DbError {
    /// No document matched.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A unique index rejected the write.
    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// The store could not be opened or reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// A stored record no longer satisfies its type invariants.
    #[error("invalid stored record: {0}")]
    Validation(#[from] TypeError),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error outside the storage engine.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend state is unusable (e.g. a poisoned lock).
    #[error("database backend error: {0}")]
    Backend(String),
}

impl DbError {
    /// Faults inside the store count as storage failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Serialization(_) | Self::Io(_) | Self::Backend(_) => ErrorKind::StorageOperation,
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<fjall::Error> for DbError {
    fn from(e: fjall::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Convenience type alias for metadata plane operations.
pub type DbResult<T> = std::result::Result<T, DbError>;
