//! # Cache Manager
//!
//! Read-through response cache for the calendar handlers.
//!
//! ## Flow
//!
//! ```text
//! read handler   ──fetch(key)──▶ hit?  ── yes ──▶ cached response
//!                                  │
//!                                  no ──▶ compute ──store(key, value)──▶ response
//!
//! write handler  ──mutate──▶ invalidate(key) / invalidate_namespace()
//! ```
//!
//! Every entry is written with the manager's TTL. Invalidation walks the
//! store with an incremental scan and deletes matches one at a time, so it
//! never blocks the store and a cancelled or failed sweep leaves a partial
//! but safe result.

mod report;

pub use report::{InvalidationReport, NamespaceReport};

use crate::codec::{BinaryCoder, Coder};
use crate::config::{CacheSettings, Ttl};
use crate::error::Result;
use crate::key::{CacheKey, Namespace};
use crate::logging::log_invalidation;
use crate::store::{scan_keys, StoreClient, StoreProvider};
use crate::value::CacheValue;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::pin;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Response cache over a store client and a coder
pub struct CacheManager<S = StoreProvider, C = BinaryCoder> {
    store: Arc<S>,
    coder: C,
    ttl: Ttl,
    scan_batch_size: usize,
    namespace: Namespace,
}

impl<S: StoreClient> CacheManager<S, BinaryCoder> {
    /// Manager with the structural coder and the calendar namespace
    pub fn new(store: S, ttl: Ttl) -> Self {
        Self::with_shared_store(Arc::new(store), ttl)
    }

    /// Same as `new` for a store handle shared with other components
    pub fn with_shared_store(store: Arc<S>, ttl: Ttl) -> Self {
        Self {
            store,
            coder: BinaryCoder::new(),
            ttl,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            namespace: Namespace::calendar(),
        }
    }

    /// Manager configured from settings. Fails on invalid settings.
    pub fn from_settings(store: S, settings: &CacheSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::new(store, settings.ttl()?).with_scan_batch_size(settings.scan_batch_size))
    }
}

impl<S: StoreClient, C: Coder> CacheManager<S, C> {
    /// Swap the coder, e.g. for `JsonCoder` with a custom tag registry
    pub fn with_coder<D: Coder>(self, coder: D) -> CacheManager<S, D> {
        CacheManager {
            store: self.store,
            coder,
            ttl: self.ttl,
            scan_batch_size: self.scan_batch_size,
            namespace: self.namespace,
        }
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_scan_batch_size(mut self, scan_batch_size: usize) -> Self {
        self.scan_batch_size = scan_batch_size.max(1);
        self
    }

    pub fn store_client(&self) -> &Arc<S> {
        &self.store
    }

    pub fn coder(&self) -> &C {
        &self.coder
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Handle carrying one key
    pub fn bind(&self, key: CacheKey) -> KeyedCache<'_, S, C> {
        KeyedCache { manager: self, key }
    }

    /// Encode `value` and write it under the composed key with the manager's
    /// TTL, replacing any previous entry.
    pub async fn store(&self, key: &CacheKey, value: &CacheValue) -> Result<()> {
        let composed = key.compose();
        let bytes = self.coder.encode(value)?;
        self.store
            .set_ex(&composed, self.ttl.as_duration(), &bytes)
            .await?;

        debug!(
            key = %composed,
            coder = self.coder.name(),
            bytes = bytes.len(),
            ttl_seconds = self.ttl.as_secs(),
            "Cache STORE"
        );
        Ok(())
    }

    /// Store any serializable response through its structural projection
    pub async fn store_serialized<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
    ) -> Result<()> {
        let value = CacheValue::from_serialize(value)?;
        self.store(key, &value).await
    }

    /// `Ok(None)` on miss or expiry. A stored null, `false` or empty value is
    /// returned as a hit.
    pub async fn fetch(&self, key: &CacheKey) -> Result<Option<CacheValue>> {
        let composed = key.compose();
        let Some(bytes) = self.store.get(&composed).await? else {
            debug!(key = %composed, "Cache MISS");
            return Ok(None);
        };

        let value = self.coder.decode(&bytes)?;
        debug!(key = %composed, coder = self.coder.name(), "Cache HIT");
        Ok(Some(value))
    }

    /// Fetch and decode into a concrete type
    pub async fn fetch_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let composed = key.compose();
        let Some(bytes) = self.store.get(&composed).await? else {
            debug!(key = %composed, "Cache MISS");
            return Ok(None);
        };

        let value = self.coder.decode_as::<T>(&bytes)?;
        debug!(key = %composed, coder = self.coder.name(), "Cache HIT");
        Ok(Some(value))
    }

    /// Fetch for handlers that guard on truthiness: a falsy hit (null,
    /// `false`, zero, empty) is reported as a miss and recomputed.
    pub async fn fetch_truthy(&self, key: &CacheKey) -> Result<Option<CacheValue>> {
        Ok(self.fetch(key).await?.filter(CacheValue::is_truthy))
    }

    /// Delete every key matching the key's wildcard pattern.
    ///
    /// Store errors stop the sweep and are logged and recorded in the report;
    /// keys deleted before the failure stay deleted.
    pub async fn invalidate(&self, key: &CacheKey) -> InvalidationReport {
        let pattern = key.pattern();
        let mut report = InvalidationReport::new(pattern.clone());

        let mut keys = pin!(scan_keys(
            self.store.as_ref(),
            &pattern,
            self.scan_batch_size
        ));
        while let Some(next) = keys.next().await {
            let deleted = match next {
                Ok(matched) => self.store.delete(&matched).await,
                Err(e) => Err(e),
            };
            match deleted {
                Ok(true) => report.deleted += 1,
                // Expired or removed concurrently
                Ok(false) => {}
                Err(e) => {
                    report.failure = Some(e);
                    break;
                }
            }
        }

        let failure = report.failure.as_ref().map(ToString::to_string);
        log_invalidation(&pattern, report.deleted, failure.as_deref());
        report
    }

    /// Invalidate every category of the namespace, whatever the prefix.
    /// Categories are swept in order; a failure in one does not stop the rest.
    pub async fn invalidate_namespace(&self) -> NamespaceReport {
        let mut report = NamespaceReport::default();
        for postfix in self.namespace.iter() {
            let category = self.invalidate(&CacheKey::new("", postfix)).await;
            report.categories.push(category);
        }

        debug!(
            provider = self.store.provider_name(),
            categories = report.categories.len(),
            deleted = report.total_deleted(),
            complete = report.is_complete(),
            "Cache namespace sweep finished"
        );
        report
    }

    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.store.health_check().await?)
    }
}

impl<S, C: Clone> Clone for CacheManager<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            coder: self.coder.clone(),
            ttl: self.ttl,
            scan_batch_size: self.scan_batch_size,
            namespace: self.namespace.clone(),
        }
    }
}

impl<S: StoreClient, C: Coder> std::fmt::Debug for CacheManager<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("provider", &self.store.provider_name())
            .field("coder", &self.coder.name())
            .field("ttl_seconds", &self.ttl.as_secs())
            .field("scan_batch_size", &self.scan_batch_size)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Cache operations bound to one key
pub struct KeyedCache<'a, S, C> {
    manager: &'a CacheManager<S, C>,
    key: CacheKey,
}

impl<S, C> std::fmt::Debug for KeyedCache<'_, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedCache").field("key", &self.key).finish()
    }
}

impl<S: StoreClient, C: Coder> KeyedCache<'_, S, C> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub async fn store(&self, value: &CacheValue) -> Result<()> {
        self.manager.store(&self.key, value).await
    }

    pub async fn fetch(&self) -> Result<Option<CacheValue>> {
        self.manager.fetch(&self.key).await
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.manager.fetch_as(&self.key).await
    }

    pub async fn fetch_truthy(&self) -> Result<Option<CacheValue>> {
        self.manager.fetch_truthy(&self.key).await
    }

    pub async fn invalidate(&self) -> InvalidationReport {
        self.manager.invalidate(&self.key).await
    }
}
