//! Expiration Index Module
//!
//! Orders live keys by absolute expiry instant. Eviction and the background
//! sweep both consult this index; access recency plays no part.

use std::collections::{BTreeMap, BTreeSet};

use tokio::time::Instant;

// == Expiration Index ==
/// Sorted view of `(expires_at, key)` records, one per live entry.
///
/// Records sharing an instant are kept in key order, which makes the
/// soonest-to-expire choice deterministic.
#[derive(Debug, Default)]
pub struct ExpirationIndex {
    by_instant: BTreeMap<Instant, BTreeSet<String>>,
    len: usize,
}

impl ExpirationIndex {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Records `key` as expiring at `at`. Returns false if the record already existed.
    pub fn insert(&mut self, key: &str, at: Instant) -> bool {
        let inserted = self.by_instant.entry(at).or_default().insert(key.to_string());
        if inserted {
            self.len += 1;
        }
        inserted
    }

    // == Remove ==
    /// Removes the record for `key` at `at`, pruning the empty bucket.
    pub fn remove(&mut self, key: &str, at: Instant) -> bool {
        let Some(keys) = self.by_instant.get_mut(&at) else {
            return false;
        };
        let removed = keys.remove(key);
        if keys.is_empty() {
            self.by_instant.remove(&at);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    // == Peek Soonest ==
    /// Returns the record expiring first without removing it.
    pub fn peek_soonest(&self) -> Option<(&str, Instant)> {
        self.by_instant
            .iter()
            .next()
            .and_then(|(at, keys)| keys.iter().next().map(|k| (k.as_str(), *at)))
    }

    // == Pop Soonest ==
    /// Removes and returns the record expiring first.
    pub fn pop_soonest(&mut self) -> Option<(String, Instant)> {
        let (key, at) = self.peek_soonest().map(|(k, at)| (k.to_string(), at))?;
        self.remove(&key, at);
        Some((key, at))
    }

    // == Expired ==
    /// Snapshot of every record whose expiry is at or before `now`, soonest first.
    ///
    /// The split between expired and live records is the first bucket after `now`.
    pub fn expired(&self, now: Instant) -> Vec<(String, Instant)> {
        self.by_instant
            .range(..=now)
            .flat_map(|(at, keys)| keys.iter().map(move |k| (k.clone(), *at)))
            .collect()
    }

    /// Number of records at or before `now`.
    pub fn expired_count(&self, now: Instant) -> usize {
        self.by_instant.range(..=now).map(|(_, keys)| keys.len()).sum()
    }

    /// Returns true if the record `(key, at)` is present.
    pub fn contains(&self, key: &str, at: Instant) -> bool {
        self.by_instant
            .get(&at)
            .is_some_and(|keys| keys.contains(key))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.by_instant.clear();
        self.len = 0;
    }
}
