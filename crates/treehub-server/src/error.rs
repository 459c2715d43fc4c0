use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use treehub_db::DbError;
use treehub_services::ServiceError;
use treehub_store::StoreError;
use treehub_types::{ErrorKind, TypeError};
use uuid::Uuid;

/// Errors raised while configuring, wiring, or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("blob store error: {0}")]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Bad configuration is a validation failure; everything local is storage.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Validation,
            Self::Store(e) => e.kind(),
            Self::Db(e) => e.kind(),
            Self::Io(_) | Self::Internal(_) => ErrorKind::StorageOperation,
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::StorageOperation => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Connection => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// JSON error body returned by every failing endpoint.
///
/// The response also carries a copy as an extension so middleware can
/// fill in `request_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub status_code: u16,
    pub description: String,
    pub error_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    description: String,
}

impl ApiError {
    pub fn from_kind(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            code: kind.as_str(),
            description: description.into(),
        }
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Validation, description)
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::NotFound, description)
    }

    pub fn timeout() -> Self {
        Self {
            status: StatusCode::GATEWAY_TIMEOUT,
            code: "timeout",
            description: "request did not complete in time".to_string(),
        }
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            description: description.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl From<TypeError> for ApiError {
    fn from(e: TypeError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl From<ServerError> for ApiError {
    fn from(e: ServerError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        if self.status.is_server_error() {
            error!(%error_id, code = self.code, description = %self.description, "request failed");
        } else {
            warn!(%error_id, code = self.code, description = %self.description, "request rejected");
        }
        let body = ErrorBody {
            error_code: self.code.to_string(),
            status_code: self.status.as_u16(),
            description: self.description,
            error_id,
            request_id: None,
        };
        let mut response = (self.status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
