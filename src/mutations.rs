//! Mutation Notifications
//!
//! Observer interface for DOM-mutation events, plus an in-process
//! notifier used by the server binary and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::TabId;

// == Mutation Event ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
    #[default]
    Other,
}

/// A mutation observed on a tab. Only `tab_id` drives invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub tab_id: TabId,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub kind: MutationKind,
}

impl MutationEvent {
    pub fn new(tab_id: impl Into<TabId>, kind: MutationKind) -> Self {
        Self {
            tab_id: tab_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

// == Observer Interface ==
/// Receives mutation events. Called synchronously by the notifier, so
/// implementations must not block.
pub trait MutationObserver: Send + Sync {
    fn on_mutation(&self, event: &MutationEvent);
}

/// Handle returned by [`MutationNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A source of mutation events.
pub trait MutationNotifier: Send + Sync {
    fn subscribe(&self, observer: Arc<dyn MutationObserver>) -> SubscriptionId;

    /// Detaches a subscription. Returns false if it was not attached.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

// == Broadcast Notifier ==
/// Fans each published event out to every current subscriber.
#[derive(Default)]
pub struct BroadcastNotifier {
    observers: Mutex<HashMap<SubscriptionId, Arc<dyn MutationObserver>>>,
    next_id: AtomicU64,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to all subscribers. Returns how many received it.
    pub fn publish(&self, event: &MutationEvent) -> usize {
        // Snapshot so observers run without the registry lock held.
        let observers: Vec<Arc<dyn MutationObserver>> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        debug!(
            "Publishing {:?} mutation for tab {} to {} observers",
            event.kind,
            event.tab_id,
            observers.len()
        );
        for observer in &observers {
            observer.on_mutation(event);
        }
        observers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl MutationNotifier for BroadcastNotifier {
    fn subscribe(&self, observer: Arc<dyn MutationObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, observer);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}
