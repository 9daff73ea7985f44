use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{http::StatusCode, http::Uri, response::IntoResponse, routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::token_cache::TokenCache;
use crate::config::settings::Settings;
use crate::endpoints::error::ErrorResponse;
use crate::endpoints::{health::health, token::token, version::version};
use crate::observability::metrics::Metrics;
use crate::observability::routes::metrics_router;
use crate::pipeline;
use crate::sources::executor::TokenService;
use crate::sources::oauth2::TokenVendor;

/// Process-wide state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: TokenCache,
    pub tokens: TokenService,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Must be called inside a tokio runtime: the cache starts its sweep task.
    pub fn new(settings: Arc<Settings>) -> Result<Self> {
        let metrics = Metrics::new().context("failed to register metrics")?;
        let vendor = TokenVendor::new(&settings.upstream, metrics.clone())
            .context("failed to build upstream client")?;

        Ok(Self {
            settings,
            cache: TokenCache::new(),
            tokens: TokenService::new(vendor, metrics.clone()),
            metrics,
        })
    }
}

/// Route table without the pipeline.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/version", get(version))
        .route("/health", get(health))
        .route("/token", get(token))
        .merge(metrics_router(&state.settings.metrics))
        .fallback(not_found)
}

/// Route table wrapped in the request pipeline.
pub fn app(state: AppState) -> Router {
    pipeline::apply(routes(&state), state)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    ErrorResponse::new(StatusCode::NOT_FOUND, "not found").with_url(uri.path())
}

/// Bound listener plus the application it serves.
pub struct ApiServer {
    listener: TcpListener,
    app: Router,
    state: AppState,
}

impl ApiServer {
    pub async fn bind(state: AppState) -> Result<Self> {
        let host = state.settings.server.host.clone();
        let listener = TcpListener::bind(&host)
            .await
            .with_context(|| format!("failed to bind {}", host))?;
        Ok(Self::from_listener(listener, state))
    }

    pub fn from_listener(listener: TcpListener, state: AppState) -> Self {
        Self {
            listener,
            app: app(state.clone()),
            state,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` resolves, then stops accepting and waits for open
    /// connections to finish.
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("starting API: {}", self.listener.local_addr()?);
        self.state.metrics.up.set(1);

        let result = axum::serve(
            self.listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        self.state.metrics.up.set(0);
        result
    }
}
