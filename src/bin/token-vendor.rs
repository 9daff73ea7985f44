use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;
use token_vendor::endpoints::version::VersionResponse;
use token_vendor::server::{exit_status, ApiServer, AppState, ShutdownCoordinator};
use token_vendor::utils::logging;
use token_vendor::Settings;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // -------------------------------
    // 1. Read flags and environment, start logging
    // -------------------------------

    let settings = match Settings::load() {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };
    logging::init_logging(&settings.logging);

    let build = VersionResponse::current();
    info!(
        version = %build.version,
        buildhash = %build.buildhash,
        builddate = %build.builddate,
        upstream = %settings.upstream.hostname,
        "token vendor starting"
    );

    // -------------------------------
    // 2. Build shared state and bind the listener
    // -------------------------------

    let server = match build_server(settings.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %format!("{:#}", e), "failed to start");
            return ExitCode::FAILURE;
        }
    };

    // -------------------------------
    // 3. Serve until a signal, then drain
    // -------------------------------

    let coordinator = ShutdownCoordinator::new(settings.server.shutdown_timeout());
    let result = coordinator.run(server).await;
    match &result {
        Ok(outcome) => info!(outcome = ?outcome, "shutdown complete"),
        Err(e) => error!(error = %e, "server stopped with error"),
    }

    ExitCode::from(exit_status(&result))
}

async fn build_server(settings: Arc<Settings>) -> anyhow::Result<ApiServer> {
    let state = AppState::new(settings)?;
    ApiServer::bind(state).await
}
