//! Plain structural projection between `CacheValue` and serde types.
//!
//! Handlers usually hold typed results (`Vec<Event>`, `FreeRoom`, ...). They
//! enter the cache through `serde_json::Value`, which flattens any shape into
//! plain lists, maps and scalars. The reverse direction renders extended
//! scalars as their canonical strings, which is what chrono and bigdecimal
//! deserialize from.

use super::CacheValue;
use crate::codec::tags::{format_date, format_datetime};
use crate::error::{CodecError, CodecResult};
use bigdecimal::BigDecimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

impl CacheValue {
    /// Project any serializable value into a plain `CacheValue`
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> CodecResult<Self> {
        Ok(Self::from_plain_json(serde_json::to_value(value)?))
    }

    /// Convert a plain JSON tree; no envelope detection happens here
    pub fn from_plain_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => number_to_value(&n),
            JsonValue::String(s) => Self::Str(s),
            JsonValue::Array(items) => {
                Self::List(items.into_iter().map(Self::from_plain_json).collect())
            }
            JsonValue::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_plain_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as plain JSON with extended scalars in canonical string form
    pub fn to_plain_json(&self) -> CodecResult<JsonValue> {
        let json = match self.resolved() {
            CacheValue::Null => JsonValue::Null,
            CacheValue::Bool(b) => JsonValue::Bool(*b),
            CacheValue::Int(i) => JsonValue::Number((*i).into()),
            CacheValue::Float(f) => JsonValue::Number(finite_number(*f, "plain")?),
            CacheValue::Str(s) => JsonValue::String(s.clone()),
            CacheValue::Bytes(b) | CacheValue::Body(b) => {
                JsonValue::Array(b.iter().map(|byte| JsonValue::from(*byte)).collect())
            }
            CacheValue::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(CacheValue::to_plain_json)
                    .collect::<CodecResult<_>>()?,
            ),
            CacheValue::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_plain_json()?);
                }
                JsonValue::Object(map)
            }
            CacheValue::Date(d) => JsonValue::String(format_date(d)),
            CacheValue::DateTime(dt) => JsonValue::String(format_datetime(dt)),
            CacheValue::Decimal(d) => JsonValue::String(d.to_string()),
            CacheValue::Tagged { repr, .. } => JsonValue::String(repr.clone()),
            CacheValue::Shared(inner) => inner.to_plain_json()?,
        };
        Ok(json)
    }

    /// Apply a static shape to a decoded value
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> CodecResult<T> {
        serde_json::from_value(self.to_plain_json()?).map_err(|e| CodecError::Shape(e.to_string()))
    }
}

fn number_to_value(n: &Number) -> CacheValue {
    if let Some(i) = n.as_i64() {
        CacheValue::Int(i)
    } else if let Some(u) = n.as_u64() {
        // Above i64::MAX: keep it exact rather than rounding through f64
        CacheValue::Decimal(BigDecimal::from(u))
    } else {
        CacheValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

pub(crate) fn finite_number(f: f64, coder: &'static str) -> CodecResult<Number> {
    Number::from_f64(f).ok_or_else(|| CodecError::Unsupported {
        coder,
        reason: format!("non-finite float {f}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, NaiveDate};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct EventEntity {
        uid: i64,
        title: String,
        room: String,
        start: DateTime<FixedOffset>,
        attendees: Vec<String>,
    }

    fn sample_event() -> EventEntity {
        EventEntity {
            uid: 7,
            title: "Planning".to_string(),
            room: "RoomA".to_string(),
            start: DateTime::parse_from_rfc3339("2024-10-07T10:00:00+03:00").unwrap(),
            attendees: vec!["ivanov".to_string(), "petrov".to_string()],
        }
    }

    #[test]
    fn test_from_serialize_flattens_structs_into_maps() {
        let value = CacheValue::from_serialize(&sample_event()).unwrap();
        assert_eq!(value.get("uid").and_then(CacheValue::as_i64), Some(7));
        assert_eq!(value.get("room").and_then(CacheValue::as_str), Some("RoomA"));
        assert_eq!(value.get("attendees").and_then(CacheValue::as_list).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_deserialize_into_restores_typed_struct() {
        let event = sample_event();
        let value = CacheValue::from_serialize(&vec![event.clone()]).unwrap();
        let restored: Vec<EventEntity> = value.deserialize_into().unwrap();
        assert_eq!(restored, vec![event]);
    }

    #[test]
    fn test_extended_scalars_deserialize_from_canonical_strings() {
        let value = CacheValue::map([
            ("day", CacheValue::Date(NaiveDate::from_ymd_opt(2024, 10, 7).unwrap())),
            ("price", CacheValue::Decimal("12.50".parse().unwrap())),
        ]);

        #[derive(Deserialize)]
        struct Booking {
            day: NaiveDate,
            price: BigDecimal,
        }

        let booking: Booking = value.deserialize_into().unwrap();
        assert_eq!(booking.day, NaiveDate::from_ymd_opt(2024, 10, 7).unwrap());
        assert_eq!(booking.price, "12.5".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let value = CacheValue::list(["not", "a", "number"]);
        let result: CodecResult<Vec<i64>> = value.deserialize_into();
        assert!(matches!(result, Err(CodecError::Shape(_))));
    }

    #[test]
    fn test_non_finite_float_has_no_plain_form() {
        assert!(matches!(
            CacheValue::Float(f64::INFINITY).to_plain_json(),
            Err(CodecError::Unsupported { .. })
        ));
    }
}
