//! Request handlers.
//!
//! Handlers only translate HTTP to service calls. The services are
//! synchronous, so every call runs on the blocking pool under the configured
//! request timeout. Download transfers are the exception: they stream for as
//! long as the client reads.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::{debug, warn};
use treehub_types::{Namespace, ObjectId, RefName};

use crate::body::{pump, ChannelReader, ChannelWriter};
use crate::error::{ApiError, ApiResult};
use crate::registry::{ServiceRegistry, Services};

pub const HEADER_NAMESPACE: &str = "x-ats-namespace";
pub const HEADER_FORCE_PUSH: &str = "x-ats-ostree-force";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Repository config served to OSTree clients.
pub const OSTREE_CONFIG: &str = "[core]\nrepo_version=1\nmode=archive-z2\n";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Namespace from `x-ats-namespace`; missing or empty means the default.
pub fn namespace(headers: &HeaderMap) -> Namespace {
    headers
        .get(HEADER_NAMESPACE)
        .and_then(|v| v.to_str().ok())
        .map(Namespace::new)
        .unwrap_or_default()
}

/// Whether `x-ats-ostree-force` holds a true value. Anything unparsable is
/// false.
pub fn is_force_push(headers: &HeaderMap) -> bool {
    headers
        .get(HEADER_FORCE_PUSH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| matches!(v.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True"))
}

fn require_octet_stream(headers: &HeaderMap) -> ApiResult<()> {
    let mime = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    if mime.eq_ignore_ascii_case(OCTET_STREAM) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "header Content-Type must be '{OCTET_STREAM}'"
        )))
    }
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn object_id(prefix: &str, suffix: &str) -> ApiResult<ObjectId> {
    Ok(ObjectId::new(format!("{prefix}{suffix}"))?)
}

fn ref_name(raw: &str) -> ApiResult<RefName> {
    Ok(RefName::new(raw.trim_start_matches('/'))?)
}

async fn finish<T>(
    limit: Duration,
    work: impl Future<Output = Result<ApiResult<T>, JoinError>>,
) -> ApiResult<T> {
    match tokio::time::timeout(limit, work).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ApiError::internal(format!("worker failed: {e}"))),
        Err(_) => Err(ApiError::timeout()),
    }
}

/// Run `f` against the current services on the blocking pool.
async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(Arc<Services>) -> ApiResult<T> + Send + 'static,
{
    let services = state.registry.current()?;
    finish(state.timeout, tokio::task::spawn_blocking(move || f(services))).await
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// 200 when both the record and the blob exist, else 404.
pub async fn object_exists(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((prefix, suffix)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let ns = namespace(&headers);
    let id = object_id(&prefix, &suffix)?;
    let exists = blocking(&state, move |svc| Ok(svc.objects.exists(&ns, &id)?)).await?;
    Ok(if exists {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    })
}

/// Stream the blob back. Existence is checked under the request timeout;
/// the transfer itself runs as long as the client keeps reading.
pub async fn object_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((prefix, suffix)): Path<(String, String)>,
) -> ApiResult<Response> {
    let ns = namespace(&headers);
    let id = object_id(&prefix, &suffix)?;
    let services = state.registry.current()?;

    let check = Arc::clone(&services);
    let (check_ns, check_id) = (ns.clone(), id.clone());
    let found = finish(
        state.timeout,
        tokio::task::spawn_blocking(move || -> ApiResult<bool> {
            Ok(check.objects.exists(&check_ns, &check_id)?)
        }),
    )
    .await?;
    if !found {
        return Err(ApiError::not_found(format!(
            "object {id} does not exist in namespace {ns}"
        )));
    }

    let (writer, body) = ChannelWriter::channel();
    tokio::task::spawn_blocking(move || {
        let mut writer = writer;
        match services.objects.read_full(&ns, &id, &mut writer) {
            Ok(_) => {
                if let Err(e) = writer.finish() {
                    debug!(namespace = %ns, object_id = %id, error = %e, "download abandoned by client");
                }
            }
            Err(e) => {
                warn!(namespace = %ns, object_id = %id, error = %e, "download failed mid-stream");
                writer.abort(io::Error::other(e.to_string()));
            }
        }
    });
    Ok(([(CONTENT_TYPE, OCTET_STREAM)], body).into_response())
}

/// Stream the body into the object store. `Content-Length` is the declared
/// size and must be present.
pub async fn object_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((prefix, suffix)): Path<(String, String)>,
    body: Body,
) -> ApiResult<StatusCode> {
    let ns = namespace(&headers);
    let id = object_id(&prefix, &suffix)?;
    require_octet_stream(&headers)?;
    let size = content_length(&headers);
    if size == 0 {
        return Err(ApiError::bad_request(
            "Content-Length header is required to upload a file",
        ));
    }

    let services = state.registry.current()?;
    let (tx, mut reader) = ChannelReader::channel();
    let task = tokio::task::spawn_blocking(move || -> ApiResult<u64> {
        Ok(services.objects.store_stream(&ns, &id, size, &mut reader)?)
    });
    let work = async move {
        let (result, ()) = tokio::join!(task, pump(body, tx));
        result
    };
    finish(state.timeout, work).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark an already-registered object as uploaded.
pub async fn object_upload_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((prefix, suffix)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let ns = namespace(&headers);
    let id = object_id(&prefix, &suffix)?;
    blocking(&state, move |svc| Ok(svc.objects.set_completed(&ns, &id)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Refs
// ---------------------------------------------------------------------------

/// Body is the commit as text; surrounding whitespace is ignored.
pub async fn ref_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let ns = namespace(&headers);
    let name = ref_name(&name)?;
    let force = is_force_push(&headers);
    require_octet_stream(&headers)?;
    let commit = std::str::from_utf8(&body)
        .map_err(|_| ApiError::bad_request("commit must be UTF-8 text"))?
        .trim()
        .to_string();
    blocking(&state, move |svc| {
        svc.refs.store_ref(&ns, &name, &commit, force)?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::OK)
}

/// The commit the ref points at, as text.
pub async fn ref_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let ns = namespace(&headers);
    let name = ref_name(&name)?;
    let value = blocking(&state, move |svc| {
        if !svc.refs.exists(&ns, &name)? {
            return Err(ApiError::not_found(format!(
                "ref {name} does not exist in namespace {ns}"
            )));
        }
        Ok(svc.refs.get_ref(&ns, &name)?.value)
    })
    .await?;
    Ok(([(CONTENT_TYPE, OCTET_STREAM)], String::from(value)).into_response())
}

// ---------------------------------------------------------------------------
// Config / health
// ---------------------------------------------------------------------------

/// Static OSTree repository config.
pub async fn ostree_config() -> impl IntoResponse {
    ([(CONTENT_TYPE, OCTET_STREAM)], OSTREE_CONFIG)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    StatusHealthy,
    StatusUnhealthy,
}

/// State of one external dependency.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthEntry {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub resource: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<HealthEntry>,
}

/// Liveness: the process is serving requests.
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::StatusHealthy,
        entries: Vec::new(),
    })
}

/// Readiness: the document store answers a ping.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let failure = match blocking(&state, |svc| Ok(svc.documents.ping())).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(e.description().to_string()),
    };
    let entry_status = if failure.is_none() {
        HealthStatus::StatusHealthy
    } else {
        HealthStatus::StatusUnhealthy
    };
    let entry = HealthEntry {
        status: entry_status,
        data: failure,
        resource: "repository".to_string(),
    };
    let code = match entry_status {
        HealthStatus::StatusHealthy => StatusCode::OK,
        HealthStatus::StatusUnhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        code,
        Json(HealthResponse {
            status: entry_status,
            entries: vec![entry],
        }),
    )
}
