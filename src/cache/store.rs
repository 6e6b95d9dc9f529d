//! Entry Store Module
//!
//! Authoritative key to entry mapping together with its derived indexes.
//! Every method here is a synchronous critical-section body: the async
//! engine calls it while holding the cache guard, passing the current instant.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::cache::{CacheEntry, CacheStats, ExpirationIndex, ScopeIndex, SetOptions, TabId};

// == Entry Store ==
/// Owns every entry plus the expiration, tag and tab indexes derived from them.
#[derive(Debug)]
pub struct EntryStore<V> {
    /// Key-entry storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Entries ordered by expiry
    expiry: ExpirationIndex,
    /// tag -> keys
    tags: ScopeIndex<String>,
    /// tab -> keys
    tabs: ScopeIndex<TabId>,
    /// Hit/miss and removal counters
    stats: CacheStats,
    /// Hard upper bound on entry count
    max_entries: usize,
    /// TTL applied when a set carries none
    default_ttl: Duration,
}

impl<V: Clone> EntryStore<V> {
    // == Constructor ==
    /// Creates an empty store. A capacity of zero is raised to one.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            expiry: ExpirationIndex::new(),
            tags: ScopeIndex::new(),
            tabs: ScopeIndex::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    // == Get ==
    /// Returns the live value for `key`.
    ///
    /// An entry found past its expiry is removed on the spot, together with
    /// all of its index memberships, and reported as a miss.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.stats.record_hit();
                debug!("Cache hit: {}", key);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            debug!("Cache entry expired on read: {}", key);
        }
        self.stats.record_miss();
        None
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// The previous entry is unindexed first. If the store is still at
    /// capacity afterwards, the entry with the smallest expiry is evicted.
    pub fn set(&mut self, key: String, value: V, opts: SetOptions, now: Instant) {
        let replaced = self.remove_entry(&key).is_some();

        if !replaced && self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.evict_soonest() {
                debug!("Evicted {} to make room for {}", evicted, key);
            }
        }

        let ttl = opts.ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(value, now, ttl, opts.scope, opts.tags);

        self.expiry.insert(&key, entry.expires_at);
        if let Some(tab) = &entry.scope {
            self.tabs.add(tab, &key);
        }
        for tag in &entry.tags {
            self.tags.add(tag, &key);
        }
        debug!("Cache set: {} (ttl {:?})", key, ttl);
        self.entries.insert(key, entry);
    }

    // == Delete ==
    /// Removes `key` and all of its index memberships. Returns whether an
    /// entry was present; a second delete returns false.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear By Tag ==
    /// Deletes every entry carrying `tag`. Returns the number removed.
    pub fn clear_by_tag(&mut self, tag: &str) -> usize {
        let keys = self.tags.take(&tag.to_string());
        let mut removed = 0;
        for key in keys {
            if self.delete(&key) {
                removed += 1;
            } else {
                error!("Tag index listed {} under {} without an entry; dropped", key, tag);
            }
        }

        self.stats.record_invalidations(removed);
        if removed > 0 {
            info!("Cleared {} entries tagged {}", removed, tag);
        }
        removed
    }

    // == Clear By Prefix ==
    /// Deletes every entry whose key starts with `prefix` (linear scan).
    pub fn clear_by_prefix(&mut self, prefix: &str) -> usize {
        let removed = self.drop_prefix(prefix);
        self.stats.record_invalidations(removed);
        if removed > 0 {
            info!("Cleared {} entries with prefix {}", removed, prefix);
        }
        removed
    }

    // == Invalidate Scope ==
    /// Deletes everything belonging to `tab`: first the keys indexed under
    /// the tab, then any key following the tab naming convention.
    ///
    /// An entry matched by both passes is counted once.
    pub fn invalidate_scope(&mut self, tab: &TabId) -> usize {
        let mut removed = 0;
        for key in self.tabs.take(tab) {
            if self.delete(&key) {
                removed += 1;
            } else {
                error!("Tab index listed {} under {} without an entry; dropped", key, tab);
            }
        }
        for prefix in tab.key_prefixes() {
            removed += self.drop_prefix(&prefix);
        }

        self.stats.record_invalidations(removed);
        if removed > 0 {
            info!("Invalidated {} entries for tab {}", removed, tab);
        }
        removed
    }

    // == Clear ==
    /// Empties the store and every index. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.expiry.clear();
        self.tags.clear();
        self.tabs.clear();
    }

    // == Expired Records ==
    /// Snapshot of the `(key, expires_at)` records due at `now`, soonest first.
    pub fn expired_records(&self, now: Instant) -> Vec<(String, Instant)> {
        self.expiry.expired(now)
    }

    // == Purge Expired ==
    /// Removes the given expired records. Records whose entry was replaced
    /// or deleted since the snapshot are skipped. Returns the number of
    /// entries removed.
    pub fn purge_expired(&mut self, records: &[(String, Instant)], now: Instant) -> usize {
        let mut removed = 0;
        for (key, at) in records {
            match self.entries.get(key) {
                Some(entry) if entry.expires_at == *at && entry.is_expired_at(now) => {
                    self.remove_entry(key);
                    removed += 1;
                }
                Some(_) => {}
                None => {
                    if self.expiry.remove(key, *at) {
                        error!("Expiration record for {} had no entry; dropped", key);
                    }
                }
            }
        }
        self.stats.record_expirations(removed);
        removed
    }

    // == Length ==
    /// Number of stored entries, including ones not yet noticed as expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries still live at `now`.
    pub fn live_len(&self, now: Instant) -> usize {
        self.entries
            .len()
            .saturating_sub(self.expiry.expired_count(now))
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns true if `key` has an entry, live or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Expiry of the stored entry for `key`, without the lazy-expiry check.
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    // == Stats ==
    /// Returns a statistics snapshot at `now`.
    pub fn stats(&self, now: Instant, pending_count: usize) -> CacheStats {
        CacheStats {
            size: self.live_len(now),
            max_size: self.max_entries,
            ttl_default_ms: self.default_ttl.as_millis() as u64,
            pending_count,
            ..self.stats.clone()
        }
    }

    // == Index Verification ==
    /// Lists every disagreement between the entries and their indexes.
    /// An empty list means the store is consistent.
    pub fn index_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.expiry.len() != self.entries.len() {
            violations.push(format!(
                "expiration index holds {} records for {} entries",
                self.expiry.len(),
                self.entries.len()
            ));
        }
        for (key, entry) in &self.entries {
            if !self.expiry.contains(key, entry.expires_at) {
                violations.push(format!("{} missing from expiration index", key));
            }
            if let Some(tab) = &entry.scope {
                if !self.tabs.contains(tab, key) {
                    violations.push(format!("{} missing from tab {}", key, tab));
                }
            }
            for tag in &entry.tags {
                if !self.tags.contains(tag, key) {
                    violations.push(format!("{} missing from tag {}", key, tag));
                }
            }
        }
        let scoped = self.entries.values().filter(|e| e.scope.is_some()).count();
        if self.tabs.membership_count() != scoped {
            violations.push(format!(
                "tab index holds {} memberships for {} scoped entries",
                self.tabs.membership_count(),
                scoped
            ));
        }
        let tagged: usize = self.entries.values().map(|e| e.tags.len()).sum();
        if self.tags.membership_count() != tagged {
            violations.push(format!(
                "tag index holds {} memberships for {} entry tags",
                self.tags.membership_count(),
                tagged
            ));
        }
        for (tab, keys) in self.tabs.iter() {
            if keys.is_empty() {
                violations.push(format!("empty tab group {}", tab));
            }
            for key in keys {
                let carries = self
                    .entries
                    .get(key)
                    .is_some_and(|e| e.scope.as_ref() == Some(tab));
                if !carries {
                    violations.push(format!("tab {} lists stale key {}", tab, key));
                }
            }
        }
        for (tag, keys) in self.tags.iter() {
            if keys.is_empty() {
                violations.push(format!("empty tag group {}", tag));
            }
            for key in keys {
                if !self.entries.get(key).is_some_and(|e| e.tags.contains(tag)) {
                    violations.push(format!("tag {} lists stale key {}", tag, key));
                }
            }
        }
        violations
    }

    // == Internal Helpers ==
    /// Removes the entry and every index record pointing at it.
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        if !self.expiry.remove(key, entry.expires_at) {
            error!("Entry {} had no expiration record", key);
        }
        self.unindex(key, &entry);
        Some(entry)
    }

    fn unindex(&mut self, key: &str, entry: &CacheEntry<V>) {
        if let Some(tab) = &entry.scope {
            self.tabs.remove(tab, key);
        }
        for tag in &entry.tags {
            self.tags.remove(tag, key);
        }
    }

    /// Evicts the entry with the smallest expiry, skipping orphaned records.
    fn evict_soonest(&mut self) -> Option<String> {
        while let Some((key, _)) = self.expiry.pop_soonest() {
            match self.entries.remove(&key) {
                Some(entry) => {
                    self.unindex(&key, &entry);
                    self.stats.record_eviction();
                    return Some(key);
                }
                None => error!("Expiration record for {} had no entry; dropped", key),
            }
        }
        None
    }

    fn drop_prefix(&mut self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        keys.iter().filter(|key| self.delete(key)).count()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn store(max: usize) -> EntryStore<String> {
        EntryStore::new(max, TTL)
    }

    fn set(store: &mut EntryStore<String>, key: &str, opts: SetOptions, now: Instant) {
        store.set(key.to_string(), format!("value-{}", key), opts, now);
    }

    fn assert_consistent(store: &EntryStore<String>) {
        let violations = store.index_violations();
        assert!(violations.is_empty(), "index violations: {:?}", violations);
    }

    #[test]
    fn test_store_new() {
        let store = store(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.max_entries(), 100);
    }

    #[test]
    fn test_zero_capacity_raised_to_one() {
        assert_eq!(store(0).max_entries(), 1);
    }

    #[test]
    fn test_store_set_and_get() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "key1", SetOptions::new(), now);

        assert_eq!(store.get("key1", now), Some("value-key1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = store(100);
        assert_eq!(store.get("nonexistent", Instant::now()), None);
    }

    #[test]
    fn test_default_ttl_applies() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "key1", SetOptions::new(), now);

        assert!(store.get("key1", now + TTL - ms(1)).is_some());
        assert!(store.get("key1", now + TTL).is_none());
    }

    #[test]
    fn test_lazy_expiry_removes_entry_and_indexes() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "x", SetOptions::new().ttl(ms(1000)).scope("t1").tag("html"), now);

        assert!(store.get("x", now + ms(500)).is_some());
        assert!(store.get("x", now + ms(1500)).is_none());
        assert!(store.is_empty());
        assert_eq!(store.stats(now + ms(1500), 0).size, 0);
        assert_eq!(store.stats(now, 0).expirations, 1);
        assert_eq!(store.clear_by_tag("html"), 0);
        assert_consistent(&store);
    }

    #[test]
    fn test_stats_size_excludes_logically_expired() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "short", SetOptions::new().ttl(ms(100)), now);
        set(&mut store, "long", SetOptions::new().ttl(ms(5000)), now);

        assert_eq!(store.stats(now, 0).size, 2);
        assert_eq!(store.stats(now + ms(100), 0).size, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_delete_is_idempotent() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "key1", SetOptions::new().tag("a").scope("t"), now);

        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));
        assert!(store.is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn test_overwrite_replaces_index_memberships() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "k", SetOptions::new().tag("old").scope("t1"), now);
        set(&mut store, "k", SetOptions::new().tag("new").scope("t2"), now);

        assert_eq!(store.len(), 1);
        assert_consistent(&store);
        assert_eq!(store.clear_by_tag("old"), 0);
        assert_eq!(store.invalidate_scope(&TabId::from("t1")), 0);
        assert_eq!(store.clear_by_tag("new"), 1);
    }

    #[test]
    fn test_eviction_picks_soonest_expiry() {
        let now = Instant::now();
        let mut store = store(2);

        set(&mut store, "a", SetOptions::new().ttl(ms(100)), now);
        set(&mut store, "b", SetOptions::new().ttl(ms(5000)), now);
        set(&mut store, "c", SetOptions::new().ttl(ms(5000)), now);

        assert_eq!(store.len(), 2);
        assert!(!store.contains_key("a"));
        assert!(store.contains_key("b"));
        assert!(store.contains_key("c"));
        assert_eq!(store.stats(now, 0).evictions, 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_eviction_ignores_read_recency() {
        let now = Instant::now();
        let mut store = store(2);

        set(&mut store, "short", SetOptions::new().ttl(ms(200)), now);
        set(&mut store, "long", SetOptions::new().ttl(ms(9000)), now);
        assert!(store.get("short", now + ms(10)).is_some());

        set(&mut store, "new", SetOptions::new().ttl(ms(9000)), now + ms(20));

        assert!(!store.contains_key("short"));
        assert!(store.contains_key("long"));
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let now = Instant::now();
        let mut store = store(2);

        set(&mut store, "a", SetOptions::new().ttl(ms(100)), now);
        set(&mut store, "b", SetOptions::new().ttl(ms(5000)), now);
        set(&mut store, "b", SetOptions::new().ttl(ms(6000)), now);

        assert_eq!(store.len(), 2);
        assert!(store.contains_key("a"));
        assert_eq!(store.stats(now, 0).evictions, 0);
    }

    #[test]
    fn test_clear_by_tag_removes_only_tagged() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "a", SetOptions::new().tag("t"), now);
        set(&mut store, "b", SetOptions::new().tags(["t", "u"]), now);
        set(&mut store, "c", SetOptions::new().tag("u"), now);
        set(&mut store, "d", SetOptions::new(), now);

        let before = store.stats(now, 0).size;
        let removed = store.clear_by_tag("t");

        assert_eq!(removed, 2);
        assert_eq!(store.stats(now, 0).size, before - removed);
        assert!(store.contains_key("c"));
        assert!(store.contains_key("d"));
        assert_eq!(store.stats(now, 0).invalidations, 2);
        assert_consistent(&store);
    }

    #[test]
    fn test_clear_by_prefix() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "content:1:main", SetOptions::new(), now);
        set(&mut store, "content:1:links", SetOptions::new().tag("x"), now);
        set(&mut store, "content:12:main", SetOptions::new(), now);
        set(&mut store, "dom:1:tree", SetOptions::new(), now);

        assert_eq!(store.clear_by_prefix("content:1:"), 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.clear_by_prefix("content:1:"), 0);
        assert_consistent(&store);
    }

    #[test]
    fn test_invalidate_scope_uses_index_and_prefixes() {
        let now = Instant::now();
        let mut store = store(100);
        let tab = TabId::from("7");

        set(&mut store, "page:html:abc", SetOptions::new().scope("7"), now);
        set(&mut store, "semantic:7:tree", SetOptions::new(), now);
        set(&mut store, "dom:7:snapshot", SetOptions::new().scope("7"), now);
        set(&mut store, "tab:8:info", SetOptions::new(), now);
        set(&mut store, "page:html:def", SetOptions::new().scope("8"), now);

        assert_eq!(store.invalidate_scope(&tab), 3);
        assert_eq!(store.invalidate_scope(&tab), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.stats(now, 0).invalidations, 3);
        assert_consistent(&store);
    }

    #[test]
    fn test_invalidate_unknown_tab() {
        let mut store = store(100);
        assert_eq!(store.invalidate_scope(&TabId::from("gone")), 0);
    }

    #[test]
    fn test_purge_expired_skips_replaced_entries() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "a", SetOptions::new().ttl(ms(100)), now);
        set(&mut store, "b", SetOptions::new().ttl(ms(100)), now);
        set(&mut store, "c", SetOptions::new().ttl(ms(5000)), now);

        let later = now + ms(200);
        let records = store.expired_records(later);
        assert_eq!(records.len(), 2);

        // "b" is refreshed between the snapshot and the purge
        set(&mut store, "b", SetOptions::new().ttl(ms(5000)), later);

        assert_eq!(store.purge_expired(&records, later), 1);
        assert!(store.contains_key("b"));
        assert!(store.contains_key("c"));
        assert_consistent(&store);
    }

    #[test]
    fn test_purge_expired_after_delete_is_noop() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "a", SetOptions::new().ttl(ms(100)), now);
        let records = store.expired_records(now + ms(100));
        store.delete("a");

        assert_eq!(store.purge_expired(&records, now + ms(100)), 0);
        assert_consistent(&store);
    }

    #[test]
    fn test_clear_empties_everything() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "a", SetOptions::new().tag("t").scope("1"), now);
        set(&mut store, "b", SetOptions::new(), now);
        store.clear();

        assert!(store.is_empty());
        assert!(store.expired_records(now + TTL).is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn test_store_stats() {
        let now = Instant::now();
        let mut store = store(100);

        set(&mut store, "key1", SetOptions::new(), now);
        store.get("key1", now);
        store.get("nonexistent", now);

        let stats = store.stats(now, 3);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 100);
        assert_eq!(stats.ttl_default_ms, 300_000);
        assert_eq!(stats.pending_count, 3);
    }
}
