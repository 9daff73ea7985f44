use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone)]
struct Item<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Item<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory key/value store with per-item TTL.
///
/// Expired items are treated as absent on read even while still resident. A background
/// sweep, running on its own fixed interval, reclaims them. The sweep holds a weak
/// reference only and stops once the last clone of the store is dropped.
#[derive(Debug, Clone)]
pub struct ExpiringStore<K, V> {
    inner: Arc<RwLock<HashMap<K, Item<V>>>>,
    default_ttl: Duration,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Must be called inside a tokio runtime: spawns the sweep task.
    pub fn new(default_ttl: Duration, purge_interval: Duration) -> Self {
        let inner = Arc::new(RwLock::new(HashMap::new()));
        spawn_sweeper(Arc::downgrade(&inner), purge_interval);
        Self { inner, default_ttl }
    }

    /// Get value if it exists and is not expired
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let map = self.inner.read().await;
        map.get(key)
            .filter(|item| !item.is_expired(now))
            .map(|item| item.value.clone())
    }

    /// Insert or overwrite; `None` uses the store's default TTL.
    pub async fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        let mut map = self.inner.write().await;
        map.insert(key, Item { value, expires_at });
    }

    /// Drop every expired item, returning how many were reclaimed.
    #[cfg(test)]
    pub(crate) async fn purge_expired(&self) -> usize {
        purge(&self.inner).await
    }

    /// Number of physically resident items, expired ones included.
    #[cfg(test)]
    pub(crate) async fn resident(&self) -> usize {
        self.inner.read().await.len()
    }
}

async fn purge<K, V>(inner: &RwLock<HashMap<K, Item<V>>>) -> usize
where
    K: Eq + Hash,
{
    let now = Instant::now();
    let mut map = inner.write().await;
    let before = map.len();
    map.retain(|_, item| !item.is_expired(now));
    before - map.len()
}

fn spawn_sweeper<K, V>(weak: Weak<RwLock<HashMap<K, Item<V>>>>, every: Duration)
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let removed = purge(&inner).await;
            if removed > 0 {
                debug!("cache sweep reclaimed {} expired entries", removed);
            }
        }
    });
}
