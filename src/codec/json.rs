//! Type-tagged JSON coder.
//!
//! Plain values map onto JSON directly. Extended scalars are wrapped in a
//! `{"val", "_spec_type"}` envelope so they come back as the same kind; the
//! envelope tag is taken from the value's kind and resolved through the
//! coder's [`TagRegistry`]. A top-level response body is written out as the
//! body bytes themselves.

use super::tags::TagRegistry;
use super::{nesting_too_deep, Coder, MAX_NESTING_DEPTH};
use crate::error::{CodecError, CodecResult};
use crate::value::projection::finite_number;
use crate::value::CacheValue;
use serde_json::{Map, Value as JsonValue};

/// Envelope field holding the canonical string
pub const ENVELOPE_VALUE: &str = "val";
/// Envelope field holding the kind tag
pub const ENVELOPE_TAG: &str = "_spec_type";

const CODER_NAME: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonCoder {
    registry: TagRegistry,
}

impl JsonCoder {
    pub fn new(registry: TagRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    fn to_tagged_json(&self, value: &CacheValue, depth: usize) -> CodecResult<JsonValue> {
        if let CacheValue::Shared(inner) = value {
            return self.nested(inner, depth);
        }
        if let Some(tag) = value.kind_tag() {
            let repr = self.registry.format(tag, value)?;
            let mut envelope = Map::with_capacity(2);
            envelope.insert(ENVELOPE_VALUE.to_string(), JsonValue::String(repr));
            envelope.insert(ENVELOPE_TAG.to_string(), JsonValue::String(tag.to_string()));
            return Ok(JsonValue::Object(envelope));
        }

        let json = match value {
            CacheValue::Null => JsonValue::Null,
            CacheValue::Bool(b) => JsonValue::Bool(*b),
            CacheValue::Int(i) => JsonValue::Number((*i).into()),
            CacheValue::Float(f) => JsonValue::Number(finite_number(*f, CODER_NAME)?),
            CacheValue::Str(s) => JsonValue::String(s.clone()),
            CacheValue::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.nested(item, depth))
                    .collect::<CodecResult<_>>()?,
            ),
            CacheValue::Map(entries) => {
                // A user map carrying the tag field would decode as an envelope
                if entries.contains_key(ENVELOPE_TAG) {
                    return Err(CodecError::Unsupported {
                        coder: CODER_NAME,
                        reason: format!("map key '{ENVELOPE_TAG}' is reserved"),
                    });
                }
                let mut map = Map::with_capacity(entries.len());
                for (key, item) in entries {
                    map.insert(key.clone(), self.nested(item, depth)?);
                }
                JsonValue::Object(map)
            }
            other => {
                return Err(CodecError::Unsupported {
                    coder: CODER_NAME,
                    reason: format!("no JSON form for {other:?}"),
                })
            }
        };
        Ok(json)
    }

    fn nested(&self, child: &CacheValue, depth: usize) -> CodecResult<JsonValue> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(nesting_too_deep(CODER_NAME));
        }
        self.to_tagged_json(child, depth + 1)
    }

    fn from_tagged_json(&self, json: JsonValue, depth: usize) -> CodecResult<CacheValue> {
        if depth > MAX_NESTING_DEPTH {
            return Err(nesting_too_deep(CODER_NAME));
        }
        let value = match json {
            JsonValue::Null => CacheValue::Null,
            JsonValue::Bool(b) => CacheValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => CacheValue::Int(i),
                None => CacheValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => CacheValue::Str(s),
            JsonValue::Array(items) => CacheValue::List(
                items
                    .into_iter()
                    .map(|item| self.from_tagged_json(item, depth + 1))
                    .collect::<CodecResult<_>>()?,
            ),
            JsonValue::Object(entries) if entries.contains_key(ENVELOPE_TAG) => {
                self.open_envelope(entries)?
            }
            JsonValue::Object(entries) => CacheValue::Map(
                entries
                    .into_iter()
                    .map(|(key, item)| Ok((key, self.from_tagged_json(item, depth + 1)?)))
                    .collect::<CodecResult<_>>()?,
            ),
        };
        Ok(value)
    }

    fn open_envelope(&self, mut envelope: Map<String, JsonValue>) -> CodecResult<CacheValue> {
        let tag = match envelope.remove(ENVELOPE_TAG) {
            Some(JsonValue::String(tag)) => tag,
            other => {
                return Err(CodecError::MalformedEnvelope(format!(
                    "'{ENVELOPE_TAG}' must be a string, got {other:?}"
                )))
            }
        };
        let repr = match envelope.remove(ENVELOPE_VALUE) {
            Some(JsonValue::String(repr)) => repr,
            other => {
                return Err(CodecError::MalformedEnvelope(format!(
                    "'{ENVELOPE_VALUE}' for tag '{tag}' must be a string, got {other:?}"
                )))
            }
        };
        self.registry.parse(&tag, &repr)
    }
}

impl Default for JsonCoder {
    fn default() -> Self {
        Self::new(TagRegistry::standard())
    }
}

impl Coder for JsonCoder {
    fn name(&self) -> &'static str {
        CODER_NAME
    }

    fn encode(&self, value: &CacheValue) -> CodecResult<Vec<u8>> {
        // The body is already the serialized response; wrapping it again would
        // double-encode it.
        if let CacheValue::Body(body) = value.resolved() {
            return Ok(body.clone());
        }
        Ok(serde_json::to_vec(&self.to_tagged_json(value, 0)?)?)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<CacheValue> {
        let json: JsonValue = serde_json::from_slice(bytes)?;
        self.from_tagged_json(json, 0)
    }
}
