use std::net::SocketAddr;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::header::{CONTENT_LENGTH, USER_AGENT},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::helpers::time::{elapsed_ms, get_instant};
use crate::server::server::AppState;

/// One structured line per request once the response is ready. Quiet routes are skipped
/// entirely.
pub async fn access_log(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if state.settings.logging.is_quiet(&path) {
        return next.run(req).await;
    }

    let start = get_instant();
    let method = req.method().to_string();
    let proto = format!("{:?}", req.version());
    let user_agent = header_str(&req, USER_AGENT.as_str());
    let bytes_in = header_str(&req, CONTENT_LENGTH.as_str());
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let response = next.run(req).await;

    let bytes_out = response.body().size_hint().exact().unwrap_or(0);
    info!(
        kind = "access",
        remote_ip = %remote_ip,
        url = %path,
        proto = %proto,
        method = %method,
        user_agent = %user_agent,
        status = response.status().as_u16(),
        latency_ms = elapsed_ms(start),
        bytes_in = %bytes_in,
        bytes_out = bytes_out,
        "incoming_request"
    );
    response
}

fn header_str(req: &Request, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}
