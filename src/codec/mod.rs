//! # Value Coders
//!
//! Turn [`CacheValue`] graphs into bytes for the store and back.
//!
//! ```text
//! Coder (trait)
//!   ├── JsonCoder    <- text, tagged envelopes for extended scalars
//!   └── BinaryCoder  <- opaque node table, keeps shared sub-values shared
//! ```
//!
//! `CacheManager` uses `BinaryCoder` by default. `JsonCoder` is for entries
//! that other readers need to understand, or for storing a response body as-is.

pub mod binary;
pub mod json;
pub mod tags;

pub use binary::BinaryCoder;
pub use json::JsonCoder;
pub use tags::{
    BodyTagCodec, BytesTagCodec, DateTagCodec, DateTimeTagCodec, DecimalTagCodec, TagCodec,
    TagRegistry,
};

use crate::error::{CodecError, CodecResult};
use crate::value::CacheValue;
use serde::de::DeserializeOwned;

/// Deepest nesting of lists, maps and shared wrappers either coder accepts.
/// Stays under serde_json's parser limit of 128 even with an envelope at the
/// innermost level.
pub const MAX_NESTING_DEPTH: usize = 100;

pub(crate) fn nesting_too_deep(coder: &'static str) -> CodecError {
    CodecError::Unsupported {
        coder,
        reason: format!("value nests deeper than {MAX_NESTING_DEPTH} levels"),
    }
}

/// Encoding contract shared by all coders
pub trait Coder: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Encode a value. Never fails for value kinds the coder supports.
    fn encode(&self, value: &CacheValue) -> CodecResult<Vec<u8>>;

    /// Decode bytes previously produced by `encode`
    fn decode(&self, bytes: &[u8]) -> CodecResult<CacheValue>;

    /// Decode and apply a static target shape. Decoding itself is
    /// shape-agnostic; the target type is applied afterwards through serde.
    fn decode_as<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>
    where
        Self: Sized,
    {
        self.decode(bytes)?.deserialize_into()
    }
}
