use std::fmt;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, ValueEnum};

/// ================================
/// Process-wide settings
/// ================================
/// Loaded once at start from env vars (or the matching flags) and shared read-only.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    #[command(flatten)]
    pub server: ServerConfig,
    #[command(flatten)]
    pub upstream: UpstreamConfig,
    #[command(flatten)]
    pub retry: RetryConfig,
    #[command(flatten)]
    pub cache: CacheConfig,
    #[command(flatten)]
    pub logging: LoggingConfig,
    #[command(flatten)]
    pub metrics: MetricsConfig,
}

impl Settings {
    /// Parse from the process environment and arguments.
    pub fn load() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// bind address, `host:port`
    #[arg(long = "server-host", env = "SERVER_HOST", default_value = "localhost:7080")]
    pub host: String,
    #[arg(long = "shutdown-timeout", env = "SERVER_SHUTTIME", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
    #[arg(id = "server_read_timeout_secs", long = "server-read-timeout", env = "SERVER_READTIME", default_value_t = 5)]
    pub read_timeout_secs: u64,
    #[arg(id = "server_write_timeout_secs", long = "server-write-timeout", env = "SERVER_WRITETIME", default_value_t = 5)]
    pub write_timeout_secs: u64,
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// read and write budgets bound a request jointly
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.saturating_add(self.write_timeout_secs))
    }
}

/// ================================
/// Identity provider
/// ================================
#[derive(Clone, Args)]
pub struct UpstreamConfig {
    /// workspace base URL, the token path is appended
    #[arg(long = "upstream-uri", env = "DATABRICKS_WORKSPACE_URI", default_value = "http://localhost:7200")]
    pub hostname: String,
    #[arg(long = "client-id", env = "DATABRICKS_CLIENT_ID", default_value = "unset")]
    pub client_id: String,
    #[arg(long = "client-secret", env = "DATABRICKS_CLIENT_SECRET", default_value = "unset", hide_env_values = true)]
    pub client_secret: String,
    #[arg(id = "upstream_read_timeout_secs", long = "upstream-read-timeout", env = "DATABRICKS_READTIME", default_value_t = 30)]
    pub read_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("hostname", &self.hostname)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Args)]
pub struct RetryConfig {
    #[arg(long = "retry-attempts", env = "UPSTREAM_RETRY_ATTEMPTS", default_value_t = 3)]
    pub attempts: u32,
    /// will be mutiply by 2 on every attempt until max_delay_ms
    #[arg(long = "retry-base-delay-ms", env = "UPSTREAM_RETRY_BASE_DELAY_MS", default_value_t = 200)]
    pub base_delay_ms: u64,
    /// invariant: >= base_delay_ms
    #[arg(long = "retry-max-delay-ms", env = "UPSTREAM_RETRY_MAX_DELAY_MS", default_value_t = 1000)]
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct CacheConfig {
    /// seconds before expiry at which a cached token is refreshed in the background
    #[arg(long = "refresh-window", env = "TOKEN_REFRESH_WINDOW_SECS", default_value_t = 120)]
    pub refresh_window_secs: u64,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// sets log level to debug
    #[arg(long = "debug", default_value_t = false)]
    pub debug: bool,
    #[arg(long = "log-level", env = "LOG_LEVEL", value_enum, ignore_case = true, default_value_t = LogLevel::INFO)]
    pub level: LogLevel,
    #[arg(long = "log-format", env = "LOG_FORMAT", value_enum, ignore_case = true, default_value_t = LogFormat::Json)]
    pub format: LogFormat,
    /// routes fully skipped by the access log
    #[arg(long = "quiet-routes", env = "QUIET_ROUTES", value_delimiter = ',', default_value = "/health,/metrics")]
    pub quiet_routes: Vec<String>,
}

impl LoggingConfig {
    pub fn effective_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::DEBUG
        } else {
            self.level
        }
    }

    pub fn is_quiet(&self, path: &str) -> bool {
        self.quiet_routes.iter().any(|route| route == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match *self {
            LogLevel::TRACE => "TRACE",
            LogLevel::DEBUG => "DEBUG",
            LogLevel::INFO => "INFO",
            LogLevel::WARN => "WARN",
            LogLevel::ERROR => "ERROR",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Compact,
}

/// ================================
/// Metrics
/// ================================
#[derive(Debug, Clone, Args)]
pub struct MetricsConfig {
    #[arg(long = "metrics-enabled", env = "METRICS_ENABLED", action = ArgAction::Set, default_value_t = true)]
    pub is_enabled: bool,
    #[arg(long = "metrics-path", env = "METRICS_PATH", default_value = "/metrics")]
    pub path: String,
    /// high-frequency routes counted without their own route label
    #[arg(long = "untagged-routes", env = "METRICS_UNTAGGED_ROUTES", value_delimiter = ',', default_value = "/health,/metrics")]
    pub untagged_routes: Vec<String>,
}

impl MetricsConfig {
    pub fn is_untagged(&self, route: &str) -> bool {
        self.untagged_routes.iter().any(|r| r == route)
    }
}
