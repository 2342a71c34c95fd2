//! # Store Clients
//!
//! Async key-value store abstraction behind the cache manager.
//!
//! ## Architecture
//!
//! ```text
//! StoreProvider (enum dispatch)
//!   ├── RedisStore   <- Redis/Dragonfly over ConnectionManager (feature: store-redis)
//!   ├── MemoryStore  <- in-process map with per-entry expiry
//!   └── NoOpStore    <- always miss, always succeed (caching disabled)
//! ```
//!
//! Pattern scans are paged like Redis `SCAN`: each call returns a batch and a
//! cursor, and a cursor of `0` ends the walk. [`scan_keys`] turns the pages
//! into a stream of keys.

pub mod glob;
pub mod memory;
pub mod noop;
pub mod provider;
#[cfg(feature = "store-redis")]
pub mod redis;

pub use memory::MemoryStore;
pub use noop::NoOpStore;
pub use provider::StoreProvider;
#[cfg(feature = "store-redis")]
pub use self::redis::RedisStore;

use crate::error::StoreResult;
use futures::Stream;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

/// One page of a pattern scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` when the scan is complete
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Operations the cache manager needs from a key-value store
pub trait StoreClient: Send + Sync {
    /// `Ok(Some(bytes))` on hit, `Ok(None)` on miss or expiry
    fn get(&self, key: &str) -> impl Future<Output = StoreResult<Option<Vec<u8>>>> + Send;

    /// Write `value` under `key`, replacing any previous value and its TTL
    fn set_ex(
        &self,
        key: &str,
        ttl: Duration,
        value: &[u8],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// One page of keys matching the glob `pattern`, starting at `cursor`
    /// (`0` starts a new scan). `count` is a hint for the page size.
    fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> impl Future<Output = StoreResult<ScanPage>> + Send;

    /// Delete one key. Returns whether it existed.
    fn delete(&self, key: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn health_check(&self) -> impl Future<Output = StoreResult<bool>> + Send;

    fn provider_name(&self) -> &'static str;
}

struct ScanState<'a, S: ?Sized> {
    store: &'a S,
    pattern: &'a str,
    count: usize,
    cursor: u64,
    started: bool,
    buffered: VecDeque<String>,
}

/// Stream every key matching `pattern`, fetching one page at a time.
///
/// A key may be yielded more than once if the store rehashes mid-scan, as
/// with Redis. The stream ends after the first error.
pub fn scan_keys<'a, S>(
    store: &'a S,
    pattern: &'a str,
    count: usize,
) -> impl Stream<Item = StoreResult<String>> + Send + 'a
where
    S: StoreClient + ?Sized,
{
    let state = ScanState {
        store,
        pattern,
        count: count.max(1),
        cursor: 0,
        started: false,
        buffered: VecDeque::new(),
    };

    futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(key) = state.buffered.pop_front() {
                return Ok(Some((key, state)));
            }
            if state.started && state.cursor == 0 {
                return Ok(None);
            }
            let page = match state
                .store
                .scan(state.pattern, state.cursor, state.count)
                .await
            {
                Ok(page) => page,
                Err(e) => return Err(e),
            };
            state.started = true;
            state.cursor = page.cursor;
            state.buffered.extend(page.keys);
        }
    })
}
