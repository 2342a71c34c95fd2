//! Store provider
//!
//! Uses enum dispatch for a zero-cost abstraction over the store backends.
//! Construction degrades gracefully: a backend that cannot be set up is
//! replaced by the no-op store with a warning, so the service never fails to
//! start because of the cache.

use super::{MemoryStore, NoOpStore, ScanPage, StoreClient};
use crate::config::CacheSettings;
use crate::error::StoreResult;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "store-redis")]
use super::RedisStore;

/// Internal backend enum for dispatch
///
/// This is an implementation detail. Consumers should use `StoreProvider`.
#[derive(Debug, Clone)]
enum StoreBackend {
    /// Redis store (boxed to reduce enum size)
    #[cfg(feature = "store-redis")]
    Redis(Box<RedisStore>),

    Memory(MemoryStore),

    /// No-op store (always miss, always succeed)
    NoOp(NoOpStore),
}

/// Store used by the cache manager
#[derive(Debug, Clone)]
pub struct StoreProvider {
    backend: StoreBackend,
}

impl StoreProvider {
    /// Create a provider from settings with graceful degradation
    ///
    /// If Redis is configured but fails to connect, logs a warning and
    /// returns a NoOp provider instead.
    pub async fn from_settings_graceful(settings: &CacheSettings) -> Self {
        Self {
            backend: Self::create_backend(settings).await,
        }
    }

    async fn create_backend(settings: &CacheSettings) -> StoreBackend {
        if !settings.enabled {
            info!("Response cache disabled by configuration");
            return StoreBackend::NoOp(NoOpStore::new());
        }

        match settings.backend.to_lowercase().as_str() {
            // "dragonfly" speaks the Redis protocol
            "redis" | "dragonfly" => Self::create_redis_backend(settings).await,
            "memory" | "in-memory" => {
                info!(backend = "memory", "In-process cache store initialized");
                StoreBackend::Memory(MemoryStore::new())
            }
            "noop" | "none" => StoreBackend::NoOp(NoOpStore::new()),
            other => {
                warn!(backend = other, "Unknown cache backend, falling back to NoOp");
                StoreBackend::NoOp(NoOpStore::new())
            }
        }
    }

    #[cfg(feature = "store-redis")]
    async fn create_redis_backend(settings: &CacheSettings) -> StoreBackend {
        let Some(redis_settings) = &settings.redis else {
            warn!("Redis cache enabled but no [redis] settings found, falling back to NoOp");
            return StoreBackend::NoOp(NoOpStore::new());
        };

        match RedisStore::from_settings(redis_settings).await {
            Ok(store) => {
                info!(backend = "redis", "Redis cache store initialized successfully");
                StoreBackend::Redis(Box::new(store))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to NoOp cache (graceful degradation)"
                );
                StoreBackend::NoOp(NoOpStore::new())
            }
        }
    }

    /// Fallback when the store-redis feature is not enabled
    #[cfg(not(feature = "store-redis"))]
    async fn create_redis_backend(_settings: &CacheSettings) -> StoreBackend {
        warn!("Redis cache backend requested but 'store-redis' feature not enabled, using NoOp");
        StoreBackend::NoOp(NoOpStore::new())
    }

    /// In-process provider
    pub fn memory() -> Self {
        Self::from(MemoryStore::new())
    }

    /// NoOp provider (for explicit opt-out or testing)
    pub fn noop() -> Self {
        Self::from(NoOpStore::new())
    }

    /// Whether caching is actually enabled (not NoOp)
    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, StoreBackend::NoOp(_))
    }
}

impl From<MemoryStore> for StoreProvider {
    fn from(store: MemoryStore) -> Self {
        Self {
            backend: StoreBackend::Memory(store),
        }
    }
}

impl From<NoOpStore> for StoreProvider {
    fn from(store: NoOpStore) -> Self {
        Self {
            backend: StoreBackend::NoOp(store),
        }
    }
}

#[cfg(feature = "store-redis")]
impl From<RedisStore> for StoreProvider {
    fn from(store: RedisStore) -> Self {
        Self {
            backend: StoreBackend::Redis(Box::new(store)),
        }
    }
}

impl StoreClient for StoreProvider {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.get(key).await,
            StoreBackend::Memory(s) => s.get(key).await,
            StoreBackend::NoOp(s) => s.get(key).await,
        }
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: &[u8]) -> StoreResult<()> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.set_ex(key, ttl, value).await,
            StoreBackend::Memory(s) => s.set_ex(key, ttl, value).await,
            StoreBackend::NoOp(s) => s.set_ex(key, ttl, value).await,
        }
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.scan(pattern, cursor, count).await,
            StoreBackend::Memory(s) => s.scan(pattern, cursor, count).await,
            StoreBackend::NoOp(s) => s.scan(pattern, cursor, count).await,
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.delete(key).await,
            StoreBackend::Memory(s) => s.delete(key).await,
            StoreBackend::NoOp(s) => s.delete(key).await,
        }
    }

    async fn health_check(&self) -> StoreResult<bool> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.health_check().await,
            StoreBackend::Memory(s) => s.health_check().await,
            StoreBackend::NoOp(s) => s.health_check().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.provider_name(),
            StoreBackend::Memory(s) => s.provider_name(),
            StoreBackend::NoOp(s) => s.provider_name(),
        }
    }
}
