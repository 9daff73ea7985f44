use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::cache::store::ExpiringStore;
use crate::cache::token::Token;

/// The one logical name the vended token lives under.
pub const CACHE_KEY: &str = "access-token";

/// TTL applied when a write does not name one.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(2 * 60);
/// How often expired entries are physically reclaimed.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Upper bound on a cached lifetime, whatever `expires_in` claims.
pub const MAX_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

/// Cached token with its absolute expiry and the point at which a background refresh starts.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub token: Token,
    pub expires_at: DateTime<Utc>,
    pub refresh_at: DateTime<Utc>,
}

impl CacheEntry {
    /// `refresh_window_secs` is capped at half the token lifetime so a short-lived token is
    /// not refreshed on every lookup.
    pub fn new(token: Token, fetched_at: DateTime<Utc>, refresh_window_secs: u64) -> Self {
        let lifetime = token.expires_in.min(MAX_LIFETIME_SECS);
        let window = refresh_window_secs.min(lifetime / 2) as i64;
        let lifetime = lifetime as i64;
        let expires_at = fetched_at + TimeDelta::seconds(lifetime);
        let refresh_at = expires_at - TimeDelta::seconds(window);
        Self {
            token,
            expires_at,
            refresh_at,
        }
    }

    /// Store TTL matching `expires_at`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.token.expires_in.min(MAX_LIFETIME_SECS))
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn should_refresh_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_at
    }
}

/// Single shared token cache, cloned cheaply into every request.
#[derive(Debug, Clone)]
pub struct TokenCache {
    store: ExpiringStore<String, CacheEntry>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_intervals(DEFAULT_EXPIRATION, PURGE_INTERVAL)
    }

    pub fn with_intervals(default_ttl: Duration, purge_interval: Duration) -> Self {
        Self {
            store: ExpiringStore::new(default_ttl, purge_interval),
        }
    }

    /// Entry under `key`, unless its store TTL has elapsed.
    pub async fn read(&self, key: &str) -> Option<CacheEntry> {
        self.store.get(&key.to_owned()).await
    }

    /// Always overwrites.
    pub async fn write(&self, key: &str, entry: CacheEntry, ttl: Duration) {
        self.store.set(key.to_owned(), entry, Some(ttl)).await;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
