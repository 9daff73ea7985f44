pub mod inflight;
pub mod token_service;

pub use inflight::InFlight;
pub use token_service::TokenService;
