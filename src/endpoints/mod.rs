pub mod error;
pub mod health;
pub mod token;
pub mod version;
