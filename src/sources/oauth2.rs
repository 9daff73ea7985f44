use std::sync::Arc;

use http::{header::CONTENT_TYPE, HeaderValue};
use reqwest::Client;
use tracing::{debug, error, info};

use crate::cache::token::Token;
use crate::config::settings::UpstreamConfig;
use crate::helpers::time::get_instant;
use crate::observability::metrics::Metrics;
use crate::sources::error::VendorError;

pub const TOKEN_PATH: &str = "/oidc/oauth2/v2.0/token";
pub const CLIENT_CREDENTIALS_BODY: &str = "grant_type=client_credentials&scope=all-apis";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Issues client-credentials requests against the identity provider.
#[derive(Clone)]
pub struct TokenVendor {
    client: Client,
    metrics: Arc<Metrics>,
}

impl TokenVendor {
    /// The client enforces the upstream read timeout on every call.
    pub fn new(config: &UpstreamConfig, metrics: Arc<Metrics>) -> Result<Self, VendorError> {
        let client = Client::builder().timeout(config.read_timeout()).build()?;
        Ok(Self { client, metrics })
    }

    pub fn token_url(config: &UpstreamConfig) -> String {
        format!("{}{}", config.hostname.trim_end_matches('/'), TOKEN_PATH)
    }

    /// One attempt, no retries.
    pub async fn fetch(&self, config: &UpstreamConfig) -> Result<Token, VendorError> {
        self.metrics.upstream_requests.inc();
        let start = get_instant();
        let result = self.request_token(config).await;
        self.metrics.upstream_duration.observe(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            self.metrics.upstream_failures.with_label_values(&[e.reason()]).inc();
        }
        result
    }

    async fn request_token(&self, config: &UpstreamConfig) -> Result<Token, VendorError> {
        info!(url = %config.hostname, "requesting auth token");
        let response = self
            .client
            .post(Self::token_url(config))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .body(CLIENT_CREDENTIALS_BODY)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(status = status.as_u16(), response = %body, "request failed");
            return Err(VendorError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(bytes = body.len(), "token response received");
        parse_token(&body)
    }
}

/// The body must carry a non-empty token that can travel in an `Authorization` header.
pub fn parse_token(body: &str) -> Result<Token, VendorError> {
    let token: Token = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "unable to unmarshal token response");
        VendorError::Malformed(e.to_string())
    })?;

    if token.access_token.trim().is_empty() {
        return Err(VendorError::Malformed("empty access_token".into()));
    }
    if HeaderValue::from_str(&token.access_token).is_err() {
        return Err(VendorError::Malformed("access_token is not a valid header value".into()));
    }
    Ok(token)
}
