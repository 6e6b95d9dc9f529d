//! Key Naming Module
//!
//! Tab identifiers and the `<namespace>:<tabId>:...` key convention that
//! prefix-based invalidation relies on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespaces whose keys are conventionally scoped to a single tab.
pub const TAB_NAMESPACES: [&str; 4] = ["tab", "content", "semantic", "dom"];

// == Tab Id ==
/// Identifier of a browser tab. The cache only indexes by it and never
/// checks that the tab still exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key prefixes owned by this tab, one per entry of [`TAB_NAMESPACES`].
    pub fn key_prefixes(&self) -> impl Iterator<Item = String> + '_ {
        TAB_NAMESPACES
            .iter()
            .map(move |namespace| tab_key(namespace, self, ""))
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TabId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Builds a key following the tab convention, e.g. `content:<tab>:main`.
pub fn tab_key(namespace: &str, tab: &TabId, suffix: &str) -> String {
    format!("{}:{}:{}", namespace, tab, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefixes_cover_all_namespaces() {
        let tab = TabId::from("42");
        let prefixes: Vec<String> = tab.key_prefixes().collect();

        assert_eq!(prefixes, vec!["tab:42:", "content:42:", "semantic:42:", "dom:42:"]);
    }

    #[test]
    fn test_tab_key_matches_prefix() {
        let tab = TabId::from("42");
        let key = tab_key("semantic", &tab, "tree");

        assert_eq!(key, "semantic:42:tree");
        assert!(tab.key_prefixes().any(|p| key.starts_with(&p)));
    }

    #[test]
    fn test_prefix_does_not_match_longer_tab_id() {
        let tab = TabId::from("4");
        let other = tab_key("dom", &TabId::from("42"), "snapshot");

        assert!(!tab.key_prefixes().any(|p| other.starts_with(&p)));
    }

    #[test]
    fn test_tab_id_serializes_transparently() {
        let json = serde_json::to_string(&TabId::from("abc")).unwrap();
        assert_eq!(json, r#""abc""#);
    }
}
