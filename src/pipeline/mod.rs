//! Middleware chain applied to every request.
//!
//! Outermost first:
//! 1. `correlation`: resolves the correlation id and opens the request span
//! 2. `access_log`: one line per request, quiet routes skipped
//! 3. `metrics`: hit count and latency per route
//! 4. request timeout
//! 5. `recover`: handler panics become a 500
//! 6. `context`: typed `RequestContext` with configuration and cache
//! 7. `content_type`: JSON unless the handler says otherwise
//!
//! Access log and metrics sit outside recovery so they observe the 500 of a panic.

pub mod access_log;
pub mod content_type;
pub mod context;
pub mod correlation;
pub mod metrics;
pub mod recover;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::server::server::AppState;

pub use context::RequestContext;
pub use correlation::{CorrelationId, CORRELATION_HEADER, TRACE_HEADER};

/// Wraps every route of `router`, fallback included.
pub fn apply(router: Router<AppState>, state: AppState) -> Router {
    let request_timeout = state.settings.server.request_timeout();

    router
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(correlation::correlation_id))
                .layer(middleware::from_fn_with_state(state.clone(), access_log::access_log))
                .layer(middleware::from_fn_with_state(state.clone(), metrics::record_metrics))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(recover::recover_layer())
                .layer(middleware::from_fn_with_state(state.clone(), context::inject_context))
                .layer(middleware::from_fn(content_type::default_content_type)),
        )
        .with_state(state)
}
