//! In-process store
//!
//! Keeps entries in a map guarded by a `parking_lot` mutex, with per-entry
//! expiry on the tokio clock so tests can pause and advance time. Expired
//! entries are dropped lazily when touched.
//!
//! **Important**: this store is NOT distributed. Each process has its own
//! entries, so an invalidation in one process does not reach another.
//!
//! ```rust
//! use calendar_cache::{MemoryStore, StoreClient};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! store.set_ex("u1_free_rooms", Duration::from_secs(60), b"[]").await.unwrap();
//! assert_eq!(store.get("u1_free_rooms").await.unwrap(), Some(b"[]".to_vec()));
//! assert!(store.delete("u1_free_rooms").await.unwrap());
//! # });
//! ```

use super::glob::glob_match;
use super::{ScanPage, StoreClient};
use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
    /// Insertion sequence; the scan cursor walks keys in this order
    seq: u64,
}

#[derive(Debug)]
struct State {
    entries: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl State {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    /// Live entry for `key`, dropping it first if it has expired
    fn live(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        let expired = self.entries.get(key)?.expires_at <= now;
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key)
    }
}

impl Default for State {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            // Cursor 0 is reserved for "start" and "done"
            next_seq: 1,
        }
    }
}

/// In-process store with TTL support
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.state.lock().entries.len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().live(key, Instant::now()).is_some()
    }

    /// Remaining lifetime of a live entry
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.state
            .lock()
            .live(key, now)
            .map(|entry| entry.expires_at - now)
    }
}

impl StoreClient for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let result = self
            .state
            .lock()
            .live(key, Instant::now())
            .map(|entry| entry.value.clone());

        if result.is_some() {
            debug!(key = key, "Store HIT (memory)");
        } else {
            debug!(key = key, "Store MISS (memory)");
        }

        Ok(result)
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: &[u8]) -> StoreResult<()> {
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| {
            StoreError::BackendError(format!(
                "TTL of {}s is out of range for key '{key}'",
                ttl.as_secs()
            ))
        })?;
        {
            let mut state = self.state.lock();
            let state = &mut *state;
            match state.entries.get_mut(key) {
                // Overwrites keep their scan position
                Some(entry) => {
                    entry.value = value.to_vec();
                    entry.expires_at = expires_at;
                }
                None => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.order.insert(seq, key.to_string());
                    state.entries.insert(
                        key.to_string(),
                        Entry {
                            value: value.to_vec(),
                            expires_at,
                            seq,
                        },
                    );
                }
            }
        }

        debug!(key = key, ttl_seconds = ttl.as_secs(), "Store SET (memory)");
        Ok(())
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let mut keys = Vec::new();
        let mut expired = Vec::new();
        let mut next_cursor = 0;
        for (examined, (&seq, key)) in state.order.range(cursor..).enumerate() {
            if examined == count.max(1) {
                next_cursor = seq;
                break;
            }
            let Some(entry) = state.entries.get(key) else {
                continue;
            };
            if entry.expires_at <= now {
                expired.push(key.clone());
            } else if glob_match(pattern, key) {
                keys.push(key.clone());
            }
        }

        for key in &expired {
            state.remove(key);
        }

        Ok(ScanPage {
            cursor: next_cursor,
            keys,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        let existed = self
            .state
            .lock()
            .remove(key)
            .is_some_and(|entry| entry.expires_at > now);

        debug!(key = key, existed = existed, "Store DEL (memory)");
        Ok(existed)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
