use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::helpers::time::get_instant;
use crate::observability::metrics::{UNMATCHED_ROUTE, UNTAGGED_ROUTE};
use crate::server::server::AppState;

/// Per-route hit count and latency. Untagged routes are still counted, under one shared label.
pub async fn record_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = match req.extensions().get::<MatchedPath>() {
        Some(matched) if state.settings.metrics.is_untagged(matched.as_str()) => UNTAGGED_ROUTE.to_owned(),
        Some(matched) => matched.as_str().to_owned(),
        None => UNMATCHED_ROUTE.to_owned(),
    };

    let start = get_instant();
    let response = next.run(req).await;
    let status = response.status().as_u16().to_string();

    state
        .metrics
        .http_requests
        .with_label_values(&[method.as_str(), route.as_str(), status.as_str()])
        .inc();
    state
        .metrics
        .http_duration
        .with_label_values(&[method.as_str(), route.as_str()])
        .observe(start.elapsed().as_secs_f64());
    response
}
