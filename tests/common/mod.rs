//! Shared helpers for integration tests

#![allow(dead_code)]

use calendar_cache::error::{StoreError, StoreResult};
use calendar_cache::store::{MemoryStore, ScanPage, StoreClient};
use calendar_cache::{CacheManager, Ttl};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const TEST_TTL_SECONDS: u64 = 60;

pub fn test_ttl() -> Ttl {
    Ttl::from_secs(TEST_TTL_SECONDS).expect("non-zero ttl")
}

/// Manager over a fresh in-memory store; the store handle shares state with
/// the manager so tests can inspect it directly.
pub fn memory_manager() -> (CacheManager<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    (CacheManager::new(store.clone(), test_ttl()), store)
}

/// Memory store whose DEL fails for one key, and optionally SCAN after a
/// number of pages
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_delete_on: Option<String>,
    pub fail_scan_after_pages: Option<usize>,
    scans: std::sync::Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn failing_delete(inner: MemoryStore, key: &str) -> Self {
        Self {
            inner,
            fail_delete_on: Some(key.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_scan_after(inner: MemoryStore, pages: usize) -> Self {
        Self {
            inner,
            fail_scan_after_pages: Some(pages),
            ..Self::default()
        }
    }
}

impl StoreClient for FailingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: &[u8]) -> StoreResult<()> {
        self.inner.set_ex(key, ttl, value).await
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let served = self.scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_scan_after_pages.is_some_and(|limit| served >= limit) {
            return Err(StoreError::ConnectionError("connection reset".to_string()));
        }
        self.inner.scan(pattern, cursor, count).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        if self.fail_delete_on.as_deref() == Some(key) {
            return Err(StoreError::BackendError(format!("DEL {key} refused")));
        }
        self.inner.delete(key).await
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(false)
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }
}
