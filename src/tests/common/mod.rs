// tests/common/mod.rs
pub use axum::{body::Body, Router};
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::post};
use clap::Parser;
use reqwest::Client;

use crate::config::settings::Settings;
use crate::server::graceful::{ShutdownCoordinator, ShutdownError, ShutdownOutcome};
use crate::server::server::{ApiServer, AppState};

pub const TOKEN_ROUTE: &str = "/oidc/oauth2/v2.0/token";
pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("reqwest client")
}

/// Identity provider stand-in that counts token requests.
pub struct MockProvider {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockProvider {
    /// `respond` gets the zero-based call number and returns the reply for it.
    pub async fn spawn<F>(respond: F, delay: Duration) -> Self
    where
        F: Fn(usize) -> (StatusCode, String) + Clone + Send + Sync + 'static,
    {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            TOKEN_ROUTE,
            post(move || {
                let counter = counter.clone();
                let respond = respond.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    respond(n)
                }
            }),
        );
        let (handle, addr) = spawn_axum(router).await;
        Self { addr, calls, handle }
    }

    /// Always answers 200 with `token_body(access_token, expires_in)`.
    pub async fn issuing(access_token: &'static str, expires_in: u64) -> Self {
        Self::spawn(move |_| (StatusCode::OK, token_body(access_token, expires_in)), Duration::ZERO).await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn token_body(access_token: &str, expires_in: u64) -> String {
    json!({
        "access_token": access_token,
        "scope": "all-apis",
        "token_type": "Bearer",
        "expires_in": expires_in,
    })
    .to_string()
}

/// Address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Settings pointed at `upstream` with short retry delays. `extra` is appended as flags.
pub fn test_settings(upstream: &str, extra: &[&str]) -> Arc<Settings> {
    let mut args = vec![
        "token-vendor",
        "--server-host",
        "127.0.0.1:0",
        "--upstream-uri",
        upstream,
        "--client-id",
        CLIENT_ID,
        "--client-secret",
        CLIENT_SECRET,
        "--upstream-read-timeout",
        "5",
        "--retry-base-delay-ms",
        "10",
        "--retry-max-delay-ms",
        "20",
    ];
    args.extend_from_slice(extra);
    Arc::new(Settings::try_parse_from(args).expect("test settings"))
}

/// Vendor served on an ephemeral port until `coordinator` is cancelled.
pub struct RunningVendor {
    pub addr: SocketAddr,
    pub state: AppState,
    pub coordinator: ShutdownCoordinator,
    pub handle: JoinHandle<Result<ShutdownOutcome, ShutdownError>>,
}

impl RunningVendor {
    pub async fn start(settings: Arc<Settings>) -> Self {
        let state = AppState::new(settings.clone()).expect("app state");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
        let addr = listener.local_addr().unwrap();
        let server = ApiServer::from_listener(listener, state.clone());

        let coordinator = ShutdownCoordinator::new(settings.server.shutdown_timeout());
        let drain = coordinator.clone();
        let handle = tokio::spawn(async move { drain.drain(server).await });

        Self {
            addr,
            state,
            coordinator,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) -> Result<ShutdownOutcome, ShutdownError> {
        self.coordinator.cancel();
        self.handle.await.expect("server task")
    }
}
