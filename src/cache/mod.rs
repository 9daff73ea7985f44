pub mod store;
pub mod token;
pub mod token_cache;

pub use store::ExpiringStore;
pub use token::Token;
pub use token_cache::{CacheEntry, TokenCache, CACHE_KEY};
