//! # Cache Configuration
//!
//! Settings for the cache layer, loaded from an optional `calendar-cache`
//! file (TOML, YAML or JSON) and overridden by `CALENDAR_CACHE__*`
//! environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use calendar_cache::config;
//!
//! # fn main() -> calendar_cache::Result<()> {
//! let settings = config::load()?;
//! let ttl = settings.ttl()?;
//! println!("entries live for {}s", ttl.as_secs());
//! # Ok(())
//! # }
//! ```
//!
//! ```toml
//! enabled = true
//! backend = "redis"
//! ttl_seconds = 300
//! scan_batch_size = 100
//!
//! [redis]
//! url = "redis://localhost:6379"
//! ```

pub mod loader;

pub use loader::{load, load_from, load_from_sources};

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::time::Duration;

const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_TTL: NonZeroU64 = match NonZeroU64::new(DEFAULT_TTL_SECONDS) {
    Some(ttl) => ttl,
    None => unreachable!(),
};

/// Longest accepted entry lifetime, about 68 years. Fits both the Redis
/// expire range and the in-process clock.
pub const MAX_TTL_SECONDS: u64 = i32::MAX as u64;
const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Store backends accepted in `backend`, aliases included
pub const KNOWN_BACKENDS: &[&str] = &["redis", "dragonfly", "memory", "in-memory", "noop", "none"];

/// Cache layer settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When false every read misses and every write is dropped
    pub enabled: bool,
    pub backend: String,
    /// Lifetime of every cache entry
    pub ttl_seconds: u64,
    /// Keys requested per SCAN page during invalidation
    pub scan_batch_size: usize,
    pub redis: Option<RedisSettings>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "memory".to_string(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            redis: None,
        }
    }
}

impl CacheSettings {
    /// In-memory settings with a custom TTL (for testing)
    pub fn for_test(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl_seconds == 0 {
            return Err(CacheError::Configuration(
                "ttl_seconds must be at least 1; cache entries cannot live forever".to_string(),
            ));
        }
        if self.ttl_seconds > MAX_TTL_SECONDS {
            return Err(CacheError::Configuration(format!(
                "ttl_seconds must be at most {MAX_TTL_SECONDS}, got {}",
                self.ttl_seconds
            )));
        }
        if self.scan_batch_size == 0 {
            return Err(CacheError::Configuration(
                "scan_batch_size must be at least 1".to_string(),
            ));
        }
        let backend = self.backend.to_lowercase();
        if !KNOWN_BACKENDS.contains(&backend.as_str()) {
            return Err(CacheError::Configuration(format!(
                "unknown cache backend '{}', expected one of {:?}",
                self.backend, KNOWN_BACKENDS
            )));
        }
        if self.enabled && matches!(backend.as_str(), "redis" | "dragonfly") {
            match &self.redis {
                Some(redis) if !redis.url.trim().is_empty() => {}
                _ => {
                    return Err(CacheError::Configuration(
                        "redis backend requires [redis] url".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    pub fn ttl(&self) -> Result<Ttl> {
        Ttl::from_secs(self.ttl_seconds).ok_or_else(|| {
            CacheError::Configuration(format!(
                "ttl_seconds must be between 1 and {MAX_TTL_SECONDS}, got {}",
                self.ttl_seconds
            ))
        })
    }
}

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RedisSettings {
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

/// Entry lifetime. Never zero, so no write is unbounded, and never above
/// [`MAX_TTL_SECONDS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(NonZeroU64);

impl Ttl {
    pub fn from_secs(secs: u64) -> Option<Self> {
        if secs > MAX_TTL_SECONDS {
            return None;
        }
        NonZeroU64::new(secs).map(Self)
    }

    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self(DEFAULT_TTL)
    }
}
