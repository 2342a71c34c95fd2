#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Calendar Cache
//!
//! Response cache placed in front of expensive calendar and room-booking reads.
//!
//! ## Overview
//!
//! Read handlers fetch by a key derived from the request, compute on a miss
//! and store the result with a bounded lifetime. Write handlers invalidate
//! after a successful mutation, either one key pattern or the whole calendar
//! namespace.
//!
//! ## Key Features
//!
//! - **Two coders**: type-tagged JSON (`{"val", "_spec_type"}` envelopes) and an
//!   opaque structural binary format that keeps shared sub-values shared
//! - **Extensible vocabulary**: extended scalar kinds are registered per coder
//! - **Non-blocking invalidation**: incremental `SCAN` + `DEL`, with a report of
//!   what was deleted and what stopped the sweep
//! - **Pluggable stores**: Redis/Dragonfly, in-process, or no-op
//!
//! ## Module Organization
//!
//! - [`value`] - Dynamic value model stored in the cache
//! - [`codec`] - JSON and binary coders, tag vocabulary
//! - [`key`] - Key composition, invalidation patterns, namespace
//! - [`store`] - Store clients and provider dispatch
//! - [`manager`] - Store, fetch and invalidation operations
//! - [`config`] - Settings loading and validation
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use calendar_cache::{CacheKey, CacheManager, CacheValue, Category, KeyPrefix, StoreProvider};
//!
//! # async fn example() -> calendar_cache::Result<()> {
//! let settings = calendar_cache::config::load()?;
//! let store = StoreProvider::from_settings_graceful(&settings).await;
//! let cache = CacheManager::from_settings(store, &settings)?;
//!
//! let key = KeyPrefix::new()
//!     .part("2024-10-07")
//!     .part("2024-10-13")
//!     .key(Category::AllEvents);
//!
//! if cache.fetch(&key).await?.is_none() {
//!     let events = CacheValue::list(["Standup", "Retro"]);
//!     cache.store(&key, &events).await?;
//! }
//!
//! // After a booking changes
//! let report = cache.invalidate_namespace().await;
//! println!("removed {} entries", report.total_deleted());
//! # let _ = CacheKey::new("", "all_events");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod manager;
pub mod store;
pub mod value;

pub use codec::{BinaryCoder, Coder, JsonCoder, TagCodec, TagRegistry};
pub use config::{CacheSettings, RedisSettings, Ttl};
pub use error::{CacheError, CodecError, Result, StoreError};
pub use key::{CacheKey, Category, KeyPrefix, Namespace};
pub use manager::{CacheManager, InvalidationReport, KeyedCache, NamespaceReport};
pub use store::{MemoryStore, NoOpStore, StoreClient, StoreProvider};
pub use value::{CacheValue, RawBody};

#[cfg(feature = "store-redis")]
pub use store::RedisStore;
