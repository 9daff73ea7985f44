use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::cache::token::Token;
use crate::sources::error::VendorError;

pub type FetchResult = Result<Token, VendorError>;
pub type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Single-flight registry: at most one fetch per key runs at a time, every concurrent
/// caller awaits the same result.
///
/// The fetch runs as its own task, so it completes even if every waiter goes away. The
/// entry is removed by that task once the fetch future has finished, which includes any
/// cache write the future performs.
#[derive(Clone, Default)]
pub struct InFlight {
    pending: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the fetch running under `key`, or starts `start()` as the new one.
    /// The flag is `true` for the caller that started it.
    pub fn join_or_start<F, Fut>(&self, key: &str, start: F) -> (SharedFetch, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(fetch) = pending.get(key) {
            return (fetch.clone(), false);
        }

        let fetch = start();
        let registry = self.clone();
        let owned_key = key.to_owned();
        // removal blocks on the lock held here, so it always follows the insert below
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            registry.remove(&owned_key);
            result
        });

        let shared = handle
            .map(|joined| joined.unwrap_or_else(|e| Err(VendorError::Aborted(e.to_string()))))
            .boxed()
            .shared();
        pending.insert(key.to_owned(), shared.clone());
        (shared, true)
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, key: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn remove(&self, key: &str) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
