use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::cache::token_cache::TokenCache;
use crate::config::settings::Settings;
use crate::pipeline::correlation::CorrelationId;
use crate::server::server::AppState;

/// Request-scoped view of the shared state. Lives in the request extensions only.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub config: Arc<Settings>,
    pub cache: TokenCache,
    pub correlation_id: CorrelationId,
}

impl RequestContext {
    pub fn new(config: Arc<Settings>, cache: TokenCache, correlation_id: CorrelationId) -> Self {
        Self {
            config,
            cache,
            correlation_id,
        }
    }
}

/// Attaches the process configuration and the shared cache to the request.
pub async fn inject_context(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_else(CorrelationId::generate);

    let ctx = RequestContext::new(state.settings.clone(), state.cache.clone(), correlation_id);
    req.extensions_mut().insert(ctx);
    next.run(req).await
}
