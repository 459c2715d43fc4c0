use thiserror::Error;
use treehub_db::DbError;
use treehub_store::StoreError;
use treehub_types::{ErrorKind, Namespace, RefName, TypeError};

/// Errors surfaced by [`ObjectService`](crate::ObjectService) and
/// [`RefService`](crate::RefService).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(#[from] TypeError),

    #[error("blob store error: {0}")]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// The ref is taken and the caller did not ask to overwrite it.
    #[error("ref {name} already exists in namespace {namespace} and force is not set")]
    RefExists { namespace: Namespace, name: RefName },
}

impl ServiceError {
    /// Wrapped errors keep the kind of their source.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Db(e) => e.kind(),
            Self::RefExists { .. } => ErrorKind::AlreadyExists,
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
