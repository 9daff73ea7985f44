use axum::{http::header::CONTENT_TYPE, response::IntoResponse};
use tracing::debug;

/// Liveness only, no dependency checks.
pub async fn health() -> impl IntoResponse {
    debug!("health endpoint called");
    ([(CONTENT_TYPE, "text/plain")], "OK")
}
