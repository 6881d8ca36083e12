use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;

struct Cached {
    loaded_at: Instant,
    orders: Arc<Vec<Value>>,
}

/// Caller-owned cache of the order list.
///
/// Holds at most one snapshot for `ttl`. Concurrent callers share a single
/// load: the lock is held while the loader runs.
pub struct OrderCache {
    ttl: Duration,
    slot: Mutex<Option<Cached>>,
}

impl OrderCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached list, calling `loader` if it is missing or stale.
    ///
    /// A failed load leaves the cache empty and returns the error.
    pub async fn get_or_load<F, Fut>(&self, loader: F) -> Result<Arc<Vec<Value>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.orders.clone());
            }
        }

        *slot = None;
        let orders = Arc::new(loader().await?);
        debug!(count = orders.len(), "order cache refreshed");
        *slot = Some(Cached {
            loaded_at: Instant::now(),
            orders: orders.clone(),
        });
        Ok(orders)
    }

    /// Drop the cached list; the next read reloads.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrderError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn load(counter: &AtomicU32) -> Result<Vec<Value>> {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![json!({"id": format!("ord-{n}")})])
    }

    #[tokio::test(start_paused = true)]
    async fn serves_from_cache_until_ttl() {
        let cache = OrderCache::new(Duration::from_secs(60));
        let loads = AtomicU32::new(0);

        let first = cache.get_or_load(|| load(&loads)).await.unwrap();
        let second = cache.get_or_load(|| load(&loads)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let third = cache.get_or_load(|| load(&loads)).await.unwrap();
        assert_eq!(third[0]["id"], json!("ord-1"));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = OrderCache::new(Duration::from_secs(60));
        let loads = AtomicU32::new(0);
        cache.get_or_load(|| load(&loads)).await.unwrap();
        cache.invalidate().await;
        cache.get_or_load(|| load(&loads)).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache = OrderCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_load(|| async { Err::<Vec<Value>, _>(OrderError::Load("disk gone".into())) })
            .await;
        assert!(err.is_err());

        let loads = AtomicU32::new(0);
        cache.get_or_load(|| load(&loads)).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
