//! # Cache Values
//!
//! `CacheValue` is the dynamic value model every coder works on. Each variant
//! carries its kind explicitly, so coders dispatch on the variant (and, for
//! extended scalars, on the kind tag) instead of sniffing shapes at runtime.
//!
//! - Plain values: null, booleans, integers, floats, strings, lists, maps
//! - Extended scalars: dates, timestamps, decimals, raw bytes and custom
//!   registered kinds ([`CacheValue::Tagged`])
//! - [`CacheValue::Body`]: a response already reduced to its raw body
//! - [`CacheValue::Shared`]: a sub-value referenced from several places in one graph
//!
//! Equality is observational: `Shared` wrappers are transparent, so a graph
//! with shared sub-values equals its unshared copy.

mod body;
pub(crate) mod projection;

pub use body::RawBody;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Kind tag for calendar dates
pub const TAG_DATE: &str = "date";
/// Kind tag for timestamps with offset
pub const TAG_DATETIME: &str = "datetime";
/// Kind tag for fixed-point decimals
pub const TAG_DECIMAL: &str = "decimal";
/// Kind tag for raw byte strings
pub const TAG_BYTES: &str = "bytes";
/// Kind tag for a response body nested inside a larger value
pub const TAG_BODY: &str = "body";

/// Dynamic value stored in the cache
#[derive(Debug, Clone)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<CacheValue>),
    Map(BTreeMap<String, CacheValue>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Decimal(BigDecimal),
    /// Extended scalar of a custom registered kind, kept in canonical form
    Tagged {
        tag: String,
        repr: String,
    },
    /// Raw body of a finalized or rendered response
    Body(Vec<u8>),
    /// Sub-value shared between several parents of the same graph
    Shared(Arc<CacheValue>),
}

impl CacheValue {
    /// Wrap a value so it can be referenced from several places
    pub fn shared(value: CacheValue) -> Self {
        Self::Shared(Arc::new(value))
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CacheValue>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CacheValue>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Custom extended scalar; its tag must be registered with the coder
    pub fn tagged(tag: impl Into<String>, repr: impl Into<String>) -> Self {
        Self::Tagged {
            tag: tag.into(),
            repr: repr.into(),
        }
    }

    /// Reduce a response-like value to its raw body
    pub fn from_body<R: RawBody + ?Sized>(response: &R) -> Self {
        Self::Body(response.raw_body())
    }

    /// Follow `Shared` wrappers down to the underlying value
    pub fn resolved(&self) -> &CacheValue {
        let mut current = self;
        while let CacheValue::Shared(inner) = current {
            current = inner.as_ref();
        }
        current
    }

    /// Kind tag for extended scalars, `None` for plain and composite values
    pub fn kind_tag(&self) -> Option<&str> {
        match self.resolved() {
            CacheValue::Date(_) => Some(TAG_DATE),
            CacheValue::DateTime(_) => Some(TAG_DATETIME),
            CacheValue::Decimal(_) => Some(TAG_DECIMAL),
            CacheValue::Bytes(_) => Some(TAG_BYTES),
            CacheValue::Body(_) => Some(TAG_BODY),
            CacheValue::Tagged { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Truthiness as request handlers test it: null, false, zero and empty
    /// containers are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self.resolved() {
            CacheValue::Null => false,
            CacheValue::Bool(b) => *b,
            CacheValue::Int(i) => *i != 0,
            CacheValue::Float(f) => *f != 0.0,
            CacheValue::Str(s) => !s.is_empty(),
            CacheValue::Bytes(b) | CacheValue::Body(b) => !b.is_empty(),
            CacheValue::List(items) => !items.is_empty(),
            CacheValue::Map(entries) => !entries.is_empty(),
            CacheValue::Decimal(d) => !d.is_zero(),
            CacheValue::Date(_) | CacheValue::DateTime(_) | CacheValue::Tagged { .. } => true,
            CacheValue::Shared(inner) => inner.is_truthy(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.resolved(), CacheValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.resolved() {
            CacheValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.resolved() {
            CacheValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[CacheValue]> {
        match self.resolved() {
            CacheValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, CacheValue>> {
        match self.resolved() {
            CacheValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a field of a map value
    pub fn get(&self, field: &str) -> Option<&CacheValue> {
        self.as_map().and_then(|entries| entries.get(field))
    }
}

impl PartialEq for CacheValue {
    fn eq(&self, other: &Self) -> bool {
        use CacheValue::*;
        match (self.resolved(), other.resolved()) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Body(a), Body(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            // Same instant is not enough: the offset is part of what was cached
            (DateTime(a), DateTime(b)) => a == b && a.offset() == b.offset(),
            (Decimal(a), Decimal(b)) => a == b,
            (Tagged { tag: ta, repr: ra }, Tagged { tag: tb, repr: rb }) => ta == tb && ra == rb,
            _ => false,
        }
    }
}

impl Default for CacheValue {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<CacheValue>> for CacheValue {
    fn from(value: Vec<CacheValue>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, CacheValue>> for CacheValue {
    fn from(value: BTreeMap<String, CacheValue>) -> Self {
        Self::Map(value)
    }
}

impl From<NaiveDate> for CacheValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for CacheValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<Utc>> for CacheValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value.fixed_offset())
    }
}

impl From<BigDecimal> for CacheValue {
    fn from(value: BigDecimal) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<CacheValue>> From<Option<T>> for CacheValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
