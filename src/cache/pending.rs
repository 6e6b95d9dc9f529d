//! Pending Computation Registry
//!
//! Tracks the single in-flight producer for each key so concurrent misses
//! join one shared future instead of invoking the factory again.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};

use crate::error::ComputeError;

/// Future shared by every caller waiting on the same key.
pub type SharedComputation<V> = Shared<BoxFuture<'static, Result<V, ComputeError>>>;

struct Pending<V> {
    generation: u64,
    future: SharedComputation<V>,
}

// == Pending Computations ==
/// `key -> in-flight computation`, at most one per key.
///
/// Each registration carries a generation so a finishing producer can tell
/// whether its own registration is still the current one.
pub struct PendingComputations<V> {
    in_flight: HashMap<String, Pending<V>>,
    next_generation: u64,
}

impl<V> Default for PendingComputations<V> {
    fn default() -> Self {
        Self {
            in_flight: HashMap::new(),
            next_generation: 0,
        }
    }
}

impl<V: Clone> PendingComputations<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the in-flight computation for `key`, if any.
    pub fn join(&self, key: &str) -> Option<SharedComputation<V>> {
        self.in_flight.get(key).map(|pending| pending.future.clone())
    }

    /// Reserves the generation the next registration will use.
    pub fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// Registers `future` as the producer for `key`.
    pub fn register(&mut self, key: String, generation: u64, future: SharedComputation<V>) {
        self.in_flight.insert(key, Pending { generation, future });
    }

    /// Removes the registration for `key` if it still belongs to
    /// `generation`. Returns false when it was cleared or superseded.
    pub fn complete(&mut self, key: &str, generation: u64) -> bool {
        match self.in_flight.get(key) {
            Some(pending) if pending.generation == generation => {
                self.in_flight.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Forgets every registration. Producers already running keep running
    /// and still resolve their joined callers.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}
