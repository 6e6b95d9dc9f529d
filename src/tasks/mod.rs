//! Background Tasks Module
//!
//! Tasks that run for the lifetime of a cache.
//!
//! # Tasks
//! - Expiry Sweep: removes expired entries at the configured interval
//! - Invalidation Bridge: turns tab mutation events into scope invalidations

mod bridge;
mod sweep;

pub use bridge::BridgeConnection;
pub use sweep::spawn_sweep_task;
