//! Scope Cache Engine
//!
//! Async front of the cache. A single guard serializes access to the entry
//! store and the pending-computation registry; factories run outside it.
//! The engine also owns the lifecycle of the background sweep and the
//! mutation bridge.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheStats, EntryStore, PendingComputations, SetOptions, TabId};
use crate::config::CacheConfig;
use crate::error::ComputeError;
use crate::mutations::MutationNotifier;
use crate::tasks::{spawn_sweep_task, BridgeConnection};

/// Everything the guard protects.
struct CacheState<V> {
    store: EntryStore<V>,
    pending: PendingComputations<V>,
}

#[derive(Default)]
struct Lifecycle {
    sweep: Option<JoinHandle<()>>,
    bridge: Option<BridgeConnection>,
    destroyed: bool,
}

struct Inner<V> {
    state: Mutex<CacheState<V>>,
    lifecycle: StdMutex<Lifecycle>,
    shutdown: CancellationToken,
    config: CacheConfig,
}

impl<V> Inner<V> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops the sweep and detaches the bridge. Returns false if already torn down.
    fn teardown(&self) -> bool {
        let mut lifecycle = self.lifecycle();
        if lifecycle.destroyed {
            return false;
        }
        lifecycle.destroyed = true;
        self.shutdown.cancel();

        match lifecycle.sweep.take() {
            Some(sweep) => sweep.abort(),
            None => warn!("Teardown: no sweep task was running"),
        }
        if let Some(bridge) = lifecycle.bridge.take() {
            bridge.detach();
        }
        true
    }
}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// == Scope Cache ==
/// Concurrent TTL cache with tag/tab invalidation and stampede protection.
///
/// Cloning is cheap and every clone drives the same cache. The background
/// sweep and the mutation bridge stop when [`destroy`](Self::destroy) is
/// called or when the last clone is dropped.
pub struct ScopeCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for ScopeCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle used by background tasks.
pub struct WeakScopeCache<V> {
    inner: Weak<Inner<V>>,
}

impl<V> Clone for WeakScopeCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V> WeakScopeCache<V> {
    pub fn upgrade(&self) -> Option<ScopeCache<V>> {
        self.inner.upgrade().map(|inner| ScopeCache { inner })
    }
}

impl<V> ScopeCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates the cache and arms the background sweep.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        let state = CacheState {
            store: EntryStore::new(config.max_entries, config.default_ttl),
            pending: PendingComputations::new(),
        };
        let cache = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                lifecycle: StdMutex::new(Lifecycle::default()),
                shutdown: CancellationToken::new(),
                config,
            }),
        };

        let config = cache.config();
        let sweep = spawn_sweep_task(
            cache.downgrade(),
            config.sweep_interval,
            cache.inner.shutdown.child_token(),
        );
        cache.inner.lifecycle().sweep = Some(sweep);

        info!(
            "Cache initialized: max_entries={}, default_ttl={:?}, sweep_interval={:?}",
            config.max_entries, config.default_ttl, config.sweep_interval
        );
        cache
    }

    /// Creates the cache and subscribes it to `notifier`.
    pub fn with_notifier(config: CacheConfig, notifier: Arc<dyn MutationNotifier>) -> Self {
        let cache = Self::new(config);
        cache.connect_notifier(notifier);
        cache
    }

    pub fn downgrade(&self) -> WeakScopeCache<V> {
        WeakScopeCache {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // == Get ==
    /// Returns the live value for `key`; expired entries are dropped on read.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut state = self.inner.state.lock().await;
        state.store.get(key, Instant::now())
    }

    // == Set ==
    pub async fn set(&self, key: impl Into<String>, value: V, opts: SetOptions) {
        let mut state = self.inner.state.lock().await;
        state.store.set(key.into(), value, opts, Instant::now());
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or produces it with `factory`.
    ///
    /// Concurrent callers missing on the same key share one invocation of
    /// `factory` and all observe its outcome. A successful value is stored
    /// with `opts`; a failure is returned to every joined caller and nothing
    /// is stored.
    ///
    /// `factory` is invoked on its own task once the guard is released, so
    /// neither its synchronous prelude nor the future it returns blocks other
    /// cache operations. Dropping every caller does not cancel it, and it
    /// still populates the cache when done. Wrap the factory in a timeout if
    /// bounded latency is required.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: impl Into<String>,
        factory: F,
        opts: SetOptions,
    ) -> Result<V, ComputeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let key = key.into();
        let (computation, start) = {
            let mut state = self.inner.state.lock().await;
            if let Some(value) = state.store.get(&key, Instant::now()) {
                return Ok(value);
            }

            match state.pending.join(&key) {
                Some(in_flight) => {
                    debug!("Joining in-flight computation for {}", key);
                    (in_flight, None)
                }
                None => {
                    let generation = state.pending.next_generation();
                    let (start, started) = oneshot::channel();
                    let producer = tokio::spawn(produce(
                        self.downgrade(),
                        key.clone(),
                        generation,
                        started,
                        factory,
                        opts,
                    ));
                    let shared = producer
                        .map(|joined| joined.unwrap_or_else(|err| Err(ComputeError::new(err))))
                        .boxed()
                        .shared();
                    state.pending.register(key.clone(), generation, shared.clone());
                    debug!("Started computation for {}", key);
                    (shared, Some(start))
                }
            }
        };

        // Guard released; let the producer run the factory.
        if let Some(start) = start {
            let _ = start.send(());
        }
        computation.await
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        state.store.delete(key)
    }

    // == Bulk Invalidation ==
    pub async fn clear_by_prefix(&self, prefix: &str) -> usize {
        let mut state = self.inner.state.lock().await;
        state.store.clear_by_prefix(prefix)
    }

    pub async fn clear_by_tag(&self, tag: &str) -> usize {
        let mut state = self.inner.state.lock().await;
        state.store.clear_by_tag(tag)
    }

    /// Removes every entry scoped to `tab` or named after it.
    pub async fn invalidate_scope(&self, tab: &TabId) -> usize {
        let mut state = self.inner.state.lock().await;
        state.store.invalidate_scope(tab)
    }

    // == Clear ==
    /// Empties the cache and forgets in-flight registrations.
    ///
    /// Running factories are not cancelled: their joined callers still
    /// receive the outcome, but the value is not written back.
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        state.store.clear();
        state.pending.clear();
        info!("Cache cleared");
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        state.store.stats(Instant::now(), state.pending.len())
    }

    // == Sweep ==
    /// Removes every entry already expired, in batches of
    /// `sweep_batch_size`, releasing the guard between batches.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let records = self.inner.state.lock().await.store.expired_records(now);
        if records.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for batch in records.chunks(self.config().sweep_batch_size.max(1)) {
            removed += self
                .inner
                .state
                .lock()
                .await
                .store
                .purge_expired(batch, now);
            tokio::task::yield_now().await;
        }
        removed
    }

    // == Invalidation Bridge ==
    /// Subscribes to `notifier` so each mutation invalidates its tab.
    ///
    /// Reconnecting to the notifier already attached is a no-op; connecting
    /// to a different one detaches the previous subscription first. Returns
    /// whether a new subscription was made.
    pub fn connect_notifier(&self, notifier: Arc<dyn MutationNotifier>) -> bool {
        let mut lifecycle = self.inner.lifecycle();
        if lifecycle.destroyed {
            warn!("Ignoring notifier: cache already destroyed");
            return false;
        }
        if lifecycle
            .bridge
            .as_ref()
            .is_some_and(|bridge| bridge.is_connected_to(&notifier))
        {
            debug!("Notifier already connected");
            return false;
        }
        if let Some(previous) = lifecycle.bridge.take() {
            previous.detach();
        }

        lifecycle.bridge = Some(BridgeConnection::attach(
            self.downgrade(),
            notifier,
            self.inner.shutdown.child_token(),
        ));
        true
    }

    /// Detaches the current notifier, if any, leaving the cache active.
    pub fn disconnect_notifier(&self) -> bool {
        match self.inner.lifecycle().bridge.take() {
            Some(bridge) => {
                bridge.detach();
                true
            }
            None => false,
        }
    }

    // == Lifecycle ==
    /// Stops the background sweep and detaches the mutation subscription.
    ///
    /// Idempotent. The cached data stays readable afterwards.
    pub fn destroy(&self) {
        if self.inner.teardown() {
            info!("Cache destroyed");
        } else {
            debug!("Cache already destroyed");
        }
    }

    pub fn is_active(&self) -> bool {
        !self.inner.lifecycle().destroyed
    }
}

/// Runs one factory to completion and publishes its outcome.
///
/// Waits for `started` so the factory never runs while the registering
/// caller still holds the guard. A dropped sender counts as a start signal.
/// The value is written only if this computation is still the registered
/// producer for `key`; the registration is removed in the same critical
/// section, so later callers see either the fresh entry or start anew.
async fn produce<V, F, Fut, E>(
    cache: WeakScopeCache<V>,
    key: String,
    generation: u64,
    started: oneshot::Receiver<()>,
    factory: F,
    opts: SetOptions,
) -> Result<V, ComputeError>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    let _ = started.await;

    // The factory is called inside the unwind scope so a panic before it
    // returns a future is caught like one raised while polling.
    let work = async move { factory().await };
    let outcome = match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result.map_err(ComputeError::new),
        Err(_) => {
            error!("Computation for {} panicked", key);
            Err(ComputeError::panicked(&key))
        }
    };

    let Some(cache) = cache.upgrade() else {
        return outcome;
    };
    let mut state = cache.inner.state.lock().await;
    let registered = state.pending.complete(&key, generation);
    match &outcome {
        Ok(value) if registered => {
            state
                .store
                .set(key.clone(), value.clone(), opts, Instant::now());
        }
        Ok(_) => debug!("Discarding result for {}: cache was cleared", key),
        Err(err) => warn!("Computation for {} failed: {}", key, err),
    }
    drop(state);
    outcome
}
