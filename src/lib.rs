//! # Token Vendor
//!
//! Sidecar that obtains an OAuth2 client-credentials token from a Databricks
//! workspace, keeps it in memory for its lifetime and hands it to local callers
//! as an `Authorization: Bearer` header.
//!
//! Modules:
//! - `config`: command line and environment settings
//! - `cache`: expiring in-memory token store
//! - `sources`: upstream token endpoint client and the single-flight token service
//! - `resilience`: bounded retry with backoff
//! - `pipeline`: middleware chain every request passes through
//! - `endpoints`: `/token`, `/health`, `/version`
//! - `server`: listener, routes and graceful shutdown

pub mod cache;
pub mod config;
pub mod endpoints;
pub mod helpers;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::Settings;
pub use crate::server::{ApiServer, AppState, ShutdownCoordinator};
