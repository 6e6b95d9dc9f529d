//! Cache Entry Module
//!
//! Defines individual cache entries and the options used to create them.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::TabId;

// == Set Options ==
/// Per-entry options accepted by `set` and `get_or_compute`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL override; the cache default applies when `None`
    pub ttl: Option<Duration>,
    /// Tab the entry belongs to, if any
    pub scope: Option<TabId>,
    /// Free-form grouping labels
    pub tags: BTreeSet<String>,
}

impl SetOptions {
    /// Creates empty options (default TTL, no scope, no tags).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn scope(mut self, tab: impl Into<TabId>) -> Self {
        self.scope = Some(tab.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

// == Cache Entry ==
/// A single cached computation result.
///
/// Entries are never mutated after insertion; replacing a key builds a new
/// entry after the old one has been fully unindexed.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Absolute expiry instant
    pub expires_at: Instant,
    /// Owning tab, if any
    pub scope: Option<TabId>,
    /// Grouping labels
    pub tags: BTreeSet<String>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry expiring `ttl` after `now`.
    pub fn new(
        value: V,
        now: Instant,
        ttl: Duration,
        scope: Option<TabId>,
        tags: BTreeSet<String>,
    ) -> Self {
        Self {
            value,
            expires_at: now + ttl,
            scope,
            tags,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry is logically dead at `now`.
    ///
    /// Boundary condition: the entry is expired once `now >= expires_at`, so a
    /// zero TTL produces an entry that is never served.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_ttl(now: Instant, ttl_ms: u64) -> CacheEntry<&'static str> {
        CacheEntry::new("html", now, Duration::from_millis(ttl_ms), None, BTreeSet::new())
    }

    #[test]
    fn test_entry_live_before_ttl() {
        let now = Instant::now();
        let entry = entry_with_ttl(now, 1000);

        assert!(!entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now + Duration::from_millis(999)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = entry_with_ttl(now, 1000);

        assert!(entry.is_expired_at(now + Duration::from_millis(1000)));
        assert!(entry.is_expired_at(now + Duration::from_millis(1500)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let now = Instant::now();
        let entry = entry_with_ttl(now, 0);

        assert!(entry.is_expired_at(now));
    }

    #[test]
    fn test_set_options_builder() {
        let opts = SetOptions::new()
            .ttl(Duration::from_secs(5))
            .scope("tab-1")
            .tag("html")
            .tags(["semantic", "html"]);

        assert_eq!(opts.ttl, Some(Duration::from_secs(5)));
        assert_eq!(opts.scope, Some(TabId::from("tab-1")));
        assert_eq!(opts.tags.len(), 2);
        assert!(opts.tags.contains("semantic"));
    }
}
