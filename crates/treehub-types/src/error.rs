use std::fmt;

use thiserror::Error;

/// Closed classification of every failure TreeHub can report.
///
/// Each crate keeps its own error enum, but all of them map onto one of these
/// kinds so that callers (the HTTP adapter in particular) branch on the kind
/// rather than on message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed ObjectId, Commit, DeltaId, ref name or ref record.
    Validation,
    /// Metadata record or blob is absent.
    NotFound,
    /// Duplicate create without force.
    AlreadyExists,
    /// Adapter-level I/O or database failure.
    StorageOperation,
    /// Initial connectivity failure to a backing store.
    Connection,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::StorageOperation => "storage_operation",
            Self::Connection => "connection",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures produced by the identity types.
///
/// Every variant carries the offending input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{0} must be in format <sha256>.<object type>")]
    InvalidObjectId(String),

    #[error("{0} is not a sha-256 commit hash")]
    InvalidCommit(String),

    #[error("{0} is not a valid delta id (mbase64(from)-mbase64(to))")]
    InvalidDeltaId(String),

    #[error("invalid ref name {name:?}: {reason}")]
    InvalidRefName { name: String, reason: String },

    #[error("invalid ref {name}: {reason}")]
    InvalidRef { name: String, reason: String },
}

impl TypeError {
    /// All identity failures are validation failures.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
