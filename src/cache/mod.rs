//! Cache Module
//!
//! Scope-aware TTL caching with soonest-expiry eviction, tag and tab
//! indexes for bulk invalidation, and single-producer computation.

mod engine;
mod entry;
mod expiry;
mod keys;
mod pending;
mod scope;
mod stats;
mod store;


// Re-export public types
pub use engine::{ScopeCache, WeakScopeCache};
pub use entry::{CacheEntry, SetOptions};
pub use expiry::ExpirationIndex;
pub use keys::{tab_key, TabId, TAB_NAMESPACES};
pub use pending::{PendingComputations, SharedComputation};
pub use scope::ScopeIndex;
pub use stats::CacheStats;
pub use store::EntryStore;
