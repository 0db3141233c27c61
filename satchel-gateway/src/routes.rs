use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{download, upload, upload_not_allowed};
use crate::GatewayState;

/// Mount point for multipart uploads (POST only).
pub const UPLOAD_PATH: &str = "/v0/file/u";
/// Mount point for blob downloads; the wildcard tail names the blob.
pub const SERVE_PATH: &str = "/v0/file/s/{*name}";

/// Build the media router over the given state.
pub fn media_router(state: GatewayState) -> Router {
    Router::new()
        .route(UPLOAD_PATH, post(upload).fallback(upload_not_allowed))
        .route(SERVE_PATH, get(download))
        // The upload handler enforces the configured ceiling itself so it
        // can answer 413 instead of a generic rejection.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
