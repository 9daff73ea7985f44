use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::server::server::ApiServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// every open connection finished inside the shutdown timeout
    Graceful,
    /// the timeout elapsed and the remaining connections were dropped
    TimedOut,
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("failed to register signal handler: {0}")]
    Signal(#[source] io::Error),
    #[error("server error: {0}")]
    Server(#[source] io::Error),
    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}

/// Owns the shutdown trigger of the process.
///
/// SIGINT, SIGQUIT, SIGHUP and SIGTERM (or [`ShutdownCoordinator::cancel`]) stop the
/// listener; in-flight requests then get `timeout` to complete.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            timeout,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Installs the signal handlers. The returned task cancels the token on the first signal.
    pub fn listen_for_signals(&self) -> Result<JoinHandle<()>, ShutdownError> {
        let signals = Signals::register().map_err(ShutdownError::Signal)?;
        let token = self.token.clone();

        Ok(tokio::spawn(async move {
            tokio::select! {
                name = signals.recv() => {
                    info!(signal = name, "received signal, initiating graceful shutdown");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        }))
    }

    /// Serves until a signal arrives, then drains.
    pub async fn run(&self, server: ApiServer) -> Result<ShutdownOutcome, ShutdownError> {
        let listener = self.listen_for_signals()?;
        let outcome = self.drain(server).await;
        listener.abort();
        outcome
    }

    /// Serves until the token is cancelled, then waits at most `timeout` for open
    /// requests before dropping them.
    pub async fn drain(&self, server: ApiServer) -> Result<ShutdownOutcome, ShutdownError> {
        let mut serving = tokio::spawn(server.serve(self.token.clone().cancelled_owned()));

        tokio::select! {
            result = &mut serving => {
                // the server stopped before anyone asked it to
                self.token.cancel();
                result?.map_err(ShutdownError::Server)?;
                return Ok(ShutdownOutcome::Graceful);
            }
            _ = self.token.cancelled() => {}
        }

        info!(timeout_secs = self.timeout.as_secs_f64(), "listener closed, waiting for in-flight requests");

        match tokio::time::timeout(self.timeout, &mut serving).await {
            Ok(result) => {
                result?.map_err(ShutdownError::Server)?;
                info!("server stopped");
                Ok(ShutdownOutcome::Graceful)
            }
            Err(_) => {
                serving.abort();
                warn!("shutdown timeout elapsed, dropping remaining connections");
                Ok(ShutdownOutcome::TimedOut)
            }
        }
    }
}

/// Process exit status for a finished shutdown: 0 unless the server failed.
pub fn exit_status(result: &Result<ShutdownOutcome, ShutdownError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.quit.recv() => "SIGQUIT",
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "CTRL-C",
            Err(_) => std::future::pending().await,
        }
    }
}
