use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

pub const CACHE_HIT: &str = "hit";
pub const CACHE_MISS: &str = "miss";
/// route label for routes counted without their own tag
pub const UNTAGGED_ROUTE: &str = "untagged";
pub const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Cache metrics
    pub cache_lookups: IntCounterVec,
    pub refresh_ahead: IntCounter,
    pub inflight_joins: IntCounter,

    // Upstream metrics
    pub upstream_requests: IntCounter,
    pub upstream_failures: IntCounterVec,
    pub upstream_duration: Histogram,

    // HTTP metrics
    pub http_requests: IntCounterVec,
    pub http_duration: HistogramVec,

    // runtime
    pub up: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Arc<Self>> {
        let registry = Registry::new_custom(Some("tokenvendor".into()), None)?;

        let metrics = Arc::new(Self {
            // Cache
            cache_lookups: IntCounterVec::new(Opts::new("token_cache_lookups_total", "Token cache lookups by result"), &["result"])?,
            refresh_ahead: IntCounter::new("token_refresh_ahead_total", "Background refreshes started inside the refresh window")?,
            inflight_joins: IntCounter::new("token_inflight_joins_total", "Callers that joined an already running token fetch")?,

            // Upstream
            upstream_requests: IntCounter::new("upstream_fetch_requests_total", "Token requests sent to the identity provider")?,
            upstream_failures: IntCounterVec::new(Opts::new("upstream_fetch_failures_total", "Failed token requests by reason"), &["reason"])?,
            upstream_duration: Histogram::with_opts(HistogramOpts::new("upstream_fetch_duration_seconds", "Identity provider round trip seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]))?,

            // HTTP
            http_requests: IntCounterVec::new(Opts::new("http_requests_total", "Served requests"), &["method", "route", "status"])?,
            http_duration: HistogramVec::new(HistogramOpts::new("http_request_duration_seconds", "Request latency seconds").buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]), &["method", "route"])?,

            up: IntGauge::new("up", "1 if service is serving")?,

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.cache_lookups.clone()))?;
        reg.register(Box::new(metrics.refresh_ahead.clone()))?;
        reg.register(Box::new(metrics.inflight_joins.clone()))?;
        reg.register(Box::new(metrics.upstream_requests.clone()))?;
        reg.register(Box::new(metrics.upstream_failures.clone()))?;
        reg.register(Box::new(metrics.upstream_duration.clone()))?;
        reg.register(Box::new(metrics.http_requests.clone()))?;
        reg.register(Box::new(metrics.http_duration.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_lookups.with_label_values(&[CACHE_HIT]).get()
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_lookups.with_label_values(&[CACHE_MISS]).get()
    }
}
