//! Scope Cache - concurrent cache for browser page inspection results
//!
//! Caches raw HTML, extracted content and semantic models per tab, with TTL
//! expiry, soonest-expiry eviction, stampede protection and automatic
//! invalidation driven by DOM-mutation events.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod mutations;
pub mod tasks;

pub use api::AppState;
pub use cache::{ScopeCache, SetOptions, TabId};
pub use config::{CacheConfig, Config};
pub use error::ComputeError;
pub use mutations::{BroadcastNotifier, MutationEvent, MutationKind, MutationNotifier};
