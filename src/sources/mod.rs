//! Token sources: the upstream client-credentials call and the orchestration around it.

pub mod error;
pub mod executor;
pub mod oauth2;

pub use error::VendorError;
pub use oauth2::TokenVendor;
