//! Configuration Module
//!
//! Loads cache and server settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Engine settings for a [`ScopeCache`](crate::cache::ScopeCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// TTL for entries stored without an explicit one
    pub default_ttl: Duration,
    /// Pause between background sweeps
    pub sweep_interval: Duration,
    /// Expired keys removed per guard acquisition during a sweep
    pub sweep_batch_size: usize,
}

impl CacheConfig {
    /// Loads the engine settings from the environment.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 30000)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep frequency in milliseconds (default: 60000)
    /// - `CACHE_SWEEP_BATCH_SIZE` - Keys per sweep batch (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            default_ttl: Duration::from_millis(env_or(
                "CACHE_DEFAULT_TTL_MS",
                defaults.default_ttl.as_millis() as u64,
            )),
            sweep_interval: Duration::from_millis(env_or(
                "CACHE_SWEEP_INTERVAL_MS",
                defaults.sweep_interval.as_millis() as u64,
            )),
            sweep_batch_size: env_or("CACHE_SWEEP_BATCH_SIZE", defaults.sweep_batch_size),
        }
        .normalized()
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self.normalized()
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self.normalized()
    }

    pub fn with_sweep_batch_size(mut self, batch_size: usize) -> Self {
        self.sweep_batch_size = batch_size;
        self.normalized()
    }

    /// Raises zero capacity, batch size and interval to their minimums.
    fn normalized(mut self) -> Self {
        self.max_entries = self.max_entries.max(1);
        self.sweep_batch_size = self.sweep_batch_size.max(1);
        self.sweep_interval = self.sweep_interval.max(Duration::from_millis(1));
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            sweep_batch_size: 100,
        }
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    /// Admin HTTP port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// `SERVER_PORT` selects the admin HTTP port (default: 3000); see
    /// [`CacheConfig::from_env`] for the cache settings.
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
