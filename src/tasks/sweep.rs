//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::WeakScopeCache;

/// Spawns the task that sweeps expired entries every `interval`.
///
/// The task holds only a weak handle, so it never keeps the cache alive,
/// and exits when `shutdown` is cancelled or the cache is gone. A sweep
/// that panics is logged and retried on the next tick.
///
/// # Returns
/// A JoinHandle the owner aborts on teardown.
pub fn spawn_sweep_task<V>(
    cache: WeakScopeCache<V>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiry sweep task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(cache) = cache.upgrade() else {
                break;
            };

            match AssertUnwindSafe(cache.sweep_expired()).catch_unwind().await {
                Ok(0) => debug!("Expiry sweep: no expired entries found"),
                Ok(removed) => info!("Expiry sweep: removed {} expired entries", removed),
                Err(_) => error!("Expiry sweep panicked; retrying on next interval"),
            }
        }

        debug!("Expiry sweep task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ScopeCache, SetOptions};
    use crate::config::CacheConfig;

    fn cache_with_interval(secs: u64) -> ScopeCache<String> {
        ScopeCache::new(
            CacheConfig::default().with_sweep_interval(Duration::from_secs(secs)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_removes_expired_entries() {
        let cache = cache_with_interval(3600);
        cache
            .set(
                "expire_soon",
                "value".to_string(),
                SetOptions::new().ttl(Duration::from_secs(1)),
            )
            .await;

        let handle = spawn_sweep_task(
            cache.downgrade(),
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(cache.stats().await.expirations, 1);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_preserves_valid_entries() {
        let cache = cache_with_interval(3600);
        cache
            .set(
                "long_lived",
                "value".to_string(),
                SetOptions::new().ttl(Duration::from_secs(3600)),
            )
            .await;

        let handle = spawn_sweep_task(
            cache.downgrade(),
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.get("long_lived").await, Some("value".to_string()));
        assert_eq!(cache.stats().await.expirations, 0);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_stops_on_cancel() {
        let cache = cache_with_interval(3600);
        let shutdown = CancellationToken::new();
        let handle = spawn_sweep_task(
            cache.downgrade(),
            Duration::from_secs(1),
            shutdown.clone(),
        );

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(handle.is_finished(), "Task should stop once cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_exits_when_cache_dropped() {
        let cache = cache_with_interval(3600);
        let handle = spawn_sweep_task(
            cache.downgrade(),
            Duration::from_secs(1),
            CancellationToken::new(),
        );

        drop(cache);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(handle.is_finished(), "Task should stop once the cache is gone");
    }
}
