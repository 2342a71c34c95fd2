//! No-op store
//!
//! Always misses, always succeeds. Used when caching is disabled or when
//! Redis is unavailable (graceful degradation).

use super::{ScanPage, StoreClient};
use crate::error::StoreResult;
use std::time::Duration;

/// Store that never keeps anything
#[derive(Debug, Clone, Default)]
pub struct NoOpStore;

impl NoOpStore {
    pub fn new() -> Self {
        Self
    }
}

impl StoreClient for NoOpStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set_ex(&self, _key: &str, _ttl: Duration, _value: &[u8]) -> StoreResult<()> {
        Ok(())
    }

    async fn scan(&self, _pattern: &str, _cursor: u64, _count: usize) -> StoreResult<ScanPage> {
        Ok(ScanPage::default())
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}
