use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use tracing::{debug, error};

use crate::endpoints::error::{ErrorResponse, PROVIDER_UNAVAILABLE_MESSAGE, TOKEN_FAILURE_MESSAGE};
use crate::pipeline::context::RequestContext;
use crate::server::server::AppState;
use crate::sources::error::VendorError;

/// Serves the token through `Authorization: Bearer <token>`; the body is only `OK`.
pub async fn token(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Response {
    debug!("token endpoint called");

    let token = match state.tokens.handle(&ctx).await {
        Ok(token) => token,
        Err(err) => {
            error!(error = %err, "unable to provide token");
            return failure(&err).into_response();
        }
    };

    match HeaderValue::from_str(&format!("Bearer {}", token.access_token)) {
        Ok(bearer) => (StatusCode::OK, [(AUTHORIZATION, bearer)], "OK").into_response(),
        Err(_) => failure(&VendorError::Malformed("token is not a valid header value".into())).into_response(),
    }
}

/// Upstream details stay in the logs.
fn failure(err: &VendorError) -> ErrorResponse {
    let status = err.status_code();
    let message = if status == StatusCode::SERVICE_UNAVAILABLE {
        PROVIDER_UNAVAILABLE_MESSAGE
    } else {
        TOKEN_FAILURE_MESSAGE
    };
    ErrorResponse::new(status, message)
}
