use axum::extract::Request;
use axum::http::header::SERVER;
use axum::http::HeaderValue;
use axum::middleware::{from_fn, map_response, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tower::Layer;
use tower_http::compression::CompressionLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};

use crate::error::ErrorBody;
use crate::handler::{self, AppState};

pub const SERVER_NAME: &str = concat!("TreeHub/", env!("CARGO_PKG_VERSION"));
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// The router behind trailing-slash normalization. Path rewriting has to
/// happen before routing, so it wraps the router instead of being a layer
/// on it.
pub type App = NormalizePath<Router>;

async fn server_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

/// Run the request inside a span carrying its id, and stamp the id into
/// JSON error bodies.
async fn request_context(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let span = info_span!("request", request_id = %request_id);
    let response = next.run(request).instrument(span).await;

    let Some(mut body) = response.extensions().get::<ErrorBody>().cloned() else {
        return response;
    };
    body.request_id = Some(request_id);
    (response.status(), Json(body)).into_response()
}

/// Object, ref, and config routes; mounted once per API version.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/objects/:prefix/:suffix",
            get(handler::object_download)
                .head(handler::object_exists)
                .post(handler::object_upload)
                .put(handler::object_upload_completed),
        )
        .route(
            "/refs/*name",
            get(handler::ref_download).post(handler::ref_upload),
        )
        .route("/config", get(handler::ostree_config))
}

/// Build the axum router with all TreeHub endpoints.
///
/// Every request gets an `x-request-id` (a UUID unless the client sent
/// one), echoed on the response. Responses are compressed when the client
/// accepts it.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handler::healthz))
        .route("/readyz", get(handler::readyz))
        .nest("/api/v2", api_routes())
        .nest("/api/v3", api_routes())
        .layer(from_fn(request_context))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(map_response(server_header))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// [`build_router`] with trailing slashes trimmed before routing.
pub fn build_app(state: AppState) -> App {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}
