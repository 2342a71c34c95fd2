//! Extended scalar vocabulary for the tagged JSON coder.
//!
//! Every extended scalar travels as `{"val": <canonical string>, "_spec_type": <tag>}`.
//! The set of tags a coder understands is a [`TagRegistry`] handed to its
//! constructor: adding a kind means registering a [`TagCodec`], and a tag
//! missing from the registry is a hard decode failure.

use crate::error::{CodecError, CodecResult};
use crate::value::{CacheValue, TAG_BODY, TAG_BYTES, TAG_DATE, TAG_DATETIME, TAG_DECIMAL};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";
const SPACED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Format/parse pair for one extended scalar kind
pub trait TagCodec: Send + Sync {
    /// Tag written into the envelope
    fn tag(&self) -> &str;

    /// Canonical string for `value`, or `None` when `value` is another kind
    fn format(&self, value: &CacheValue) -> Option<String>;

    /// Rebuild the value from its canonical string
    fn parse(&self, repr: &str) -> CodecResult<CacheValue>;
}

/// Tag → codec table owned by a coder instance
#[derive(Clone, Default)]
pub struct TagRegistry {
    codecs: HashMap<String, Arc<dyn TagCodec>>,
}

impl TagRegistry {
    /// Registry with no tags at all; every envelope fails to decode
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reference vocabulary: `date`, `datetime`, `decimal`, `bytes` and `body`
    pub fn standard() -> Self {
        Self::empty()
            .with(DateTagCodec)
            .with(DateTimeTagCodec)
            .with(DecimalTagCodec)
            .with(BytesTagCodec)
            .with(BodyTagCodec)
    }

    /// Builder-style registration
    pub fn with(mut self, codec: impl TagCodec + 'static) -> Self {
        self.register(codec);
        self
    }

    /// Register a codec, replacing any previous codec for the same tag
    pub fn register(&mut self, codec: impl TagCodec + 'static) {
        self.codecs.insert(codec.tag().to_string(), Arc::new(codec));
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn TagCodec>> {
        self.codecs.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.codecs.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Canonical string for an extended scalar, through the codec for its tag
    pub(crate) fn format(&self, tag: &str, value: &CacheValue) -> CodecResult<String> {
        let codec = self
            .get(tag)
            .ok_or_else(|| CodecError::UnregisteredTag(tag.to_string()))?;
        codec.format(value).ok_or_else(|| CodecError::Unsupported {
            coder: "json",
            reason: format!("codec for tag '{tag}' rejected the value"),
        })
    }

    /// Parse an envelope payload; unknown tags fail
    pub(crate) fn parse(&self, tag: &str, repr: &str) -> CodecResult<CacheValue> {
        let codec = self
            .get(tag)
            .ok_or_else(|| CodecError::UnknownTag(tag.to_string()))?;
        codec.parse(repr)
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_datetime(datetime: &DateTime<FixedOffset>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// `date` → `NaiveDate`, canonical `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTagCodec;

impl TagCodec for DateTagCodec {
    fn tag(&self) -> &str {
        TAG_DATE
    }

    fn format(&self, value: &CacheValue) -> Option<String> {
        match value.resolved() {
            CacheValue::Date(d) => Some(format_date(d)),
            _ => None,
        }
    }

    fn parse(&self, repr: &str) -> CodecResult<CacheValue> {
        NaiveDate::parse_from_str(repr, DATE_FORMAT)
            .map(CacheValue::Date)
            .map_err(|e| CodecError::invalid_scalar(TAG_DATE, repr, e))
    }
}

/// `datetime` → `DateTime<FixedOffset>`, canonical RFC 3339.
/// The space-separated form (`2024-10-07 10:00:00+03:00`) is accepted too.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeTagCodec;

impl TagCodec for DateTimeTagCodec {
    fn tag(&self) -> &str {
        TAG_DATETIME
    }

    fn format(&self, value: &CacheValue) -> Option<String> {
        match value.resolved() {
            CacheValue::DateTime(dt) => Some(format_datetime(dt)),
            _ => None,
        }
    }

    fn parse(&self, repr: &str) -> CodecResult<CacheValue> {
        DateTime::parse_from_rfc3339(repr)
            .or_else(|_| DateTime::parse_from_str(repr, SPACED_DATETIME_FORMAT))
            .map(CacheValue::DateTime)
            .map_err(|e| CodecError::invalid_scalar(TAG_DATETIME, repr, e))
    }
}

/// `decimal` → `BigDecimal`, canonical decimal string
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalTagCodec;

impl TagCodec for DecimalTagCodec {
    fn tag(&self) -> &str {
        TAG_DECIMAL
    }

    fn format(&self, value: &CacheValue) -> Option<String> {
        match value.resolved() {
            CacheValue::Decimal(d) => Some(d.to_string()),
            _ => None,
        }
    }

    fn parse(&self, repr: &str) -> CodecResult<CacheValue> {
        BigDecimal::from_str(repr)
            .map(CacheValue::Decimal)
            .map_err(|e| CodecError::invalid_scalar(TAG_DECIMAL, repr, e))
    }
}

/// `bytes` → raw bytes, canonical standard base64
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesTagCodec;

impl TagCodec for BytesTagCodec {
    fn tag(&self) -> &str {
        TAG_BYTES
    }

    fn format(&self, value: &CacheValue) -> Option<String> {
        match value.resolved() {
            CacheValue::Bytes(b) => Some(STANDARD.encode(b)),
            _ => None,
        }
    }

    fn parse(&self, repr: &str) -> CodecResult<CacheValue> {
        STANDARD
            .decode(repr)
            .map(CacheValue::Bytes)
            .map_err(|e| CodecError::invalid_scalar(TAG_BYTES, repr, e))
    }
}

/// `body` → a nested response body, canonical standard base64
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyTagCodec;

impl TagCodec for BodyTagCodec {
    fn tag(&self) -> &str {
        TAG_BODY
    }

    fn format(&self, value: &CacheValue) -> Option<String> {
        match value.resolved() {
            CacheValue::Body(b) => Some(STANDARD.encode(b)),
            _ => None,
        }
    }

    fn parse(&self, repr: &str) -> CodecResult<CacheValue> {
        STANDARD
            .decode(repr)
            .map(CacheValue::Body)
            .map_err(|e| CodecError::invalid_scalar(TAG_BODY, repr, e))
    }
}
