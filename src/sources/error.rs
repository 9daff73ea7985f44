use http::StatusCode;
use thiserror::Error;

use crate::resilience::retry::Retryable;

/// Failure of one token fetch. `Clone` so a single failed fetch can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum VendorError {
    /// transport failure or timeout reaching the identity provider
    #[error("identity provider unreachable: {0}")]
    Unavailable(String),

    /// non-success status from the identity provider
    #[error("identity provider rejected token request with status {status}")]
    Rejected { status: u16, body: String },

    /// success status but the body is not a usable token
    #[error("malformed token response: {0}")]
    Malformed(String),

    /// the fetch task ended without producing a result
    #[error("token fetch aborted: {0}")]
    Aborted(String),
}

impl VendorError {
    /// Status the caller of `/token` receives.
    pub fn status_code(&self) -> StatusCode {
        match self {
            VendorError::Unavailable(_) | VendorError::Aborted(_) => StatusCode::SERVICE_UNAVAILABLE,
            VendorError::Rejected { .. } | VendorError::Malformed(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            VendorError::Unavailable(_) => "unavailable",
            VendorError::Rejected { .. } => "rejected",
            VendorError::Malformed(_) => "malformed",
            VendorError::Aborted(_) => "aborted",
        }
    }
}

impl Retryable for VendorError {
    fn is_retryable(&self) -> bool {
        match self {
            VendorError::Unavailable(_) => true,
            VendorError::Rejected { status, .. } => *status >= 500,
            VendorError::Malformed(_) | VendorError::Aborted(_) => false,
        }
    }
}

impl From<reqwest::Error> for VendorError {
    fn from(err: reqwest::Error) -> Self {
        VendorError::Unavailable(err.to_string())
    }
}
