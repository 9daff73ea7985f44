use std::sync::Arc;

use tracing::{debug, info, Instrument};

use crate::cache::token::Token;
use crate::cache::token_cache::{CacheEntry, CACHE_KEY};
use crate::helpers::time::now;
use crate::observability::metrics::{Metrics, CACHE_HIT, CACHE_MISS};
use crate::pipeline::context::RequestContext;
use crate::resilience::retry::RetrySettings;
use crate::sources::error::VendorError;
use crate::sources::executor::inflight::{InFlight, SharedFetch};
use crate::sources::oauth2::TokenVendor;

/// Cache lookup, single-flight upstream fetch on miss, cache population.
#[derive(Clone)]
pub struct TokenService {
    vendor: TokenVendor,
    inflight: InFlight,
    metrics: Arc<Metrics>,
}

impl TokenService {
    pub fn new(vendor: TokenVendor, metrics: Arc<Metrics>) -> Self {
        Self {
            vendor,
            inflight: InFlight::new(),
            metrics,
        }
    }

    /// Token for the caller: the cached one while it is valid, otherwise a fresh one.
    ///
    /// Inside the refresh window the cached token is still returned and a background
    /// refresh is started. Concurrent misses share a single upstream fetch.
    pub async fn handle(&self, ctx: &RequestContext) -> Result<Token, VendorError> {
        let now = now();

        if let Some(entry) = ctx.cache.read(CACHE_KEY).await.filter(|entry| entry.is_valid_at(now)) {
            self.metrics.cache_lookups.with_label_values(&[CACHE_HIT]).inc();
            if entry.should_refresh_at(now) {
                let (_, started) = self.refresh(ctx);
                if started {
                    debug!(expires_at = %entry.expires_at, "token inside refresh window, refreshing in background");
                    self.metrics.refresh_ahead.inc();
                }
            }
            return Ok(entry.token);
        }

        self.metrics.cache_lookups.with_label_values(&[CACHE_MISS]).inc();
        info!("cache miss - generating token");

        let (fetch, _) = self.refresh(ctx);
        fetch.await
    }

    /// Joins the running fetch or starts one that writes the cache on success.
    fn refresh(&self, ctx: &RequestContext) -> (SharedFetch, bool) {
        let vendor = self.vendor.clone();
        let cache = ctx.cache.clone();
        let config = ctx.config.clone();
        let retry = RetrySettings::from(&config.retry);

        let (fetch, started) = self.inflight.join_or_start(CACHE_KEY, move || {
            async move {
                // a fetch that finished between this caller's miss and registration already
                // wrote a fresh entry
                if let Some(entry) = cache.read(CACHE_KEY).await {
                    let now = now();
                    if entry.is_valid_at(now) && !entry.should_refresh_at(now) {
                        debug!("token already refreshed, skipping upstream call");
                        return Ok(entry.token);
                    }
                }

                let token = retry
                    .run_with_retry(|| {
                        let vendor = vendor.clone();
                        let upstream = config.upstream.clone();
                        async move { vendor.fetch(&upstream).await }
                    })
                    .await?;

                if token.expires_in == 0 {
                    debug!("token has no lifetime, not caching");
                    return Ok(token);
                }

                let entry = CacheEntry::new(token.clone(), now(), config.cache.refresh_window_secs);
                let ttl = entry.ttl();
                cache.write(CACHE_KEY, entry, ttl).await;
                info!(expires_in = token.expires_in, "token cached");
                Ok(token)
            }
            .in_current_span()
        });

        if !started {
            self.metrics.inflight_joins.inc();
        }
        (fetch, started)
    }
}
