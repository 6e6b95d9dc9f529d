//! Scope Index Module
//!
//! Secondary mapping from a grouping (tag or tab) to the keys carrying it.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

// == Scope Index ==
/// Maps each grouping to the set of cache keys that carry it.
///
/// A key is listed under a grouping exactly while its live entry carries
/// that grouping. Groupings with no keys are removed immediately.
#[derive(Debug)]
pub struct ScopeIndex<G> {
    groups: HashMap<G, HashSet<String>>,
}

impl<G> Default for ScopeIndex<G> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

impl<G> ScopeIndex<G>
where
    G: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Add ==
    pub fn add(&mut self, group: &G, key: &str) {
        self.groups
            .entry(group.clone())
            .or_default()
            .insert(key.to_string());
    }

    // == Remove ==
    /// Drops `key` from `group`. Returns whether the membership existed.
    pub fn remove(&mut self, group: &G, key: &str) -> bool {
        let Some(keys) = self.groups.get_mut(group) else {
            return false;
        };
        let removed = keys.remove(key);
        if keys.is_empty() {
            self.groups.remove(group);
        }
        removed
    }

    // == Take ==
    /// Removes `group` entirely and returns the keys it held.
    pub fn take(&mut self, group: &G) -> HashSet<String> {
        self.groups.remove(group).unwrap_or_default()
    }

    pub fn contains(&self, group: &G, key: &str) -> bool {
        self.groups.get(group).is_some_and(|keys| keys.contains(key))
    }

    /// Total memberships across all groupings.
    pub fn membership_count(&self) -> usize {
        self.groups.values().map(HashSet::len).sum()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&G, &HashSet<String>)> {
        self.groups.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_set_like() {
        let mut index: ScopeIndex<String> = ScopeIndex::new();
        let tag = "html".to_string();

        index.add(&tag, "page:1");
        index.add(&tag, "page:2");
        index.add(&tag, "page:1");

        assert!(index.contains(&tag, "page:1"));
        assert!(index.contains(&tag, "page:2"));
        assert_eq!(index.membership_count(), 2);
    }

    #[test]
    fn test_remove_prunes_empty_group() {
        let mut index: ScopeIndex<String> = ScopeIndex::new();
        let tag = "html".to_string();

        index.add(&tag, "page:1");
        assert!(index.remove(&tag, "page:1"));

        assert_eq!(index.iter().count(), 0);
        assert!(!index.contains(&tag, "page:1"));
    }

    #[test]
    fn test_take_removes_group() {
        let mut index: ScopeIndex<String> = ScopeIndex::new();
        let tag = "html".to_string();

        index.add(&tag, "page:1");
        index.add(&tag, "page:2");

        assert_eq!(index.take(&tag).len(), 2);
        assert_eq!(index.iter().count(), 0);
        assert!(index.take(&tag).is_empty());
    }

    #[test]
    fn test_remove_unknown_is_false() {
        let mut index: ScopeIndex<String> = ScopeIndex::new();
        let tag = "html".to_string();

        assert!(!index.remove(&tag, "page:1"));
        index.add(&tag, "page:1");
        assert!(!index.remove(&tag, "page:2"));
        assert!(index.contains(&tag, "page:1"));
    }
}
