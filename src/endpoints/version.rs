use axum::Json;
use serde::Serialize;
use tracing::info;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const BUILD_HASH: &str = match option_env!("BUILD_HASH") {
    Some(hash) => hash,
    None => "AAAAAAAA",
};

pub const BUILD_DATE: &str = match option_env!("BUILD_DATE") {
    Some(date) => date,
    None => "19760101",
};

#[derive(Debug, Clone, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub buildhash: &'static str,
    pub builddate: &'static str,
}

impl VersionResponse {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            buildhash: BUILD_HASH,
            builddate: BUILD_DATE,
        }
    }
}

pub async fn version() -> Json<VersionResponse> {
    info!("version endpoint called");
    Json(VersionResponse::current())
}
