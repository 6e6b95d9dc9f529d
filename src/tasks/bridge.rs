//! Invalidation Bridge
//!
//! Subscribes a cache to a mutation notifier. The observer only forwards
//! events into a channel; a task drains it and invalidates each event's tab.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::WeakScopeCache;
use crate::mutations::{MutationEvent, MutationNotifier, MutationObserver, SubscriptionId};

struct ForwardingObserver {
    events: UnboundedSender<MutationEvent>,
}

impl MutationObserver for ForwardingObserver {
    fn on_mutation(&self, event: &MutationEvent) {
        if self.events.send(event.clone()).is_err() {
            debug!("Bridge closed; dropping mutation for tab {}", event.tab_id);
        }
    }
}

// == Bridge Connection ==
/// A live subscription plus the task serving it.
pub struct BridgeConnection {
    notifier: Arc<dyn MutationNotifier>,
    subscription: SubscriptionId,
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl BridgeConnection {
    /// Subscribes to `notifier` and starts invalidating `cache` on each event.
    pub fn attach<V>(
        cache: WeakScopeCache<V>,
        notifier: Arc<dyn MutationNotifier>,
        cancel: CancellationToken,
    ) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = notifier.subscribe(Arc::new(ForwardingObserver { events: tx }));
        let task = spawn_bridge_task(cache, rx, cancel.clone());
        info!("Invalidation bridge attached");

        Self {
            notifier,
            subscription,
            task,
            cancel,
        }
    }

    /// Returns true if this connection is subscribed to `notifier` itself.
    pub fn is_connected_to(&self, notifier: &Arc<dyn MutationNotifier>) -> bool {
        Arc::as_ptr(&self.notifier) as *const () == Arc::as_ptr(notifier) as *const ()
    }

    /// Unsubscribes and stops the task. Events still queued are dropped.
    pub fn detach(self) {
        self.cancel.cancel();
        self.task.abort();
        if self.notifier.unsubscribe(self.subscription) {
            info!("Invalidation bridge detached");
        } else {
            warn!("Mutation subscription was already detached");
        }
    }
}

fn spawn_bridge_task<V>(
    cache: WeakScopeCache<V>,
    mut events: UnboundedReceiver<MutationEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let Some(cache) = cache.upgrade() else {
                break;
            };
            let removed = cache.invalidate_scope(&event.tab_id).await;
            debug!(
                "{:?} mutation on tab {} at {} invalidated {} entries",
                event.kind, event.tab_id, event.timestamp, removed
            );
        }

        debug!("Invalidation bridge task stopped");
    })
}
