//! Opaque structural coder.
//!
//! A value graph is flattened into a post-ordered node table: children are
//! always written before their parents and referenced by index. A `Shared`
//! sub-value is written once and every parent points at the same index, so
//! decoding rebuilds a single `Arc` and internal sharing survives the round
//! trip. The table is serialized with bincode behind a magic marker and a
//! format version.
//!
//! Only decode bytes this system wrote. Foreign or corrupt frames are rejected
//! with `CodecError::Binary` or `CodecError::Corrupt`.

use super::{nesting_too_deep, Coder, MAX_NESTING_DEPTH};
use crate::error::{CodecError, CodecResult};
use crate::value::CacheValue;
use bigdecimal::BigDecimal;
use bincode::Options;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

const FRAME_MAGIC: [u8; 4] = *b"CCV1";
const FRAME_VERSION: u8 = 1;
const CODER_NAME: &str = "binary";
const MAX_FRAME_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    magic: [u8; 4],
    version: u8,
    root: u32,
    nodes: Vec<Node>,
}

#[derive(Debug, Serialize, Deserialize)]
enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Body(Vec<u8>),
    List(Vec<u32>),
    Map(Vec<(String, u32)>),
    Date(i32),
    DateTime { secs: i64, nanos: u32, offset: i32 },
    Decimal(String),
    Tagged { tag: String, repr: String },
    Shared(u32),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCoder;

impl BinaryCoder {
    pub fn new() -> Self {
        Self
    }
}

fn frame_options() -> impl Options {
    bincode::options().with_limit(MAX_FRAME_BYTES)
}

impl Coder for BinaryCoder {
    fn name(&self) -> &'static str {
        CODER_NAME
    }

    fn encode(&self, value: &CacheValue) -> CodecResult<Vec<u8>> {
        let mut writer = FrameWriter::default();
        let root = writer.push(value, 0)?;
        let frame = Frame {
            magic: FRAME_MAGIC,
            version: FRAME_VERSION,
            root,
            nodes: writer.nodes,
        };
        Ok(frame_options().serialize(&frame)?)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<CacheValue> {
        let frame: Frame = frame_options().deserialize(bytes)?;
        if frame.magic != FRAME_MAGIC {
            return Err(CodecError::Corrupt("unrecognized frame marker".to_string()));
        }
        if frame.version != FRAME_VERSION {
            return Err(CodecError::Corrupt(format!(
                "unsupported frame version {}",
                frame.version
            )));
        }
        rebuild(frame)
    }
}

#[derive(Default)]
struct FrameWriter {
    nodes: Vec<Node>,
    shared: HashMap<*const CacheValue, u32>,
}

impl FrameWriter {
    fn emit(&mut self, node: Node) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    fn push_child(&mut self, child: &CacheValue, depth: usize) -> CodecResult<u32> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(nesting_too_deep(CODER_NAME));
        }
        self.push(child, depth + 1)
    }

    fn push(&mut self, value: &CacheValue, depth: usize) -> CodecResult<u32> {
        let node = match value {
            CacheValue::Shared(inner) => {
                let ptr = Arc::as_ptr(inner);
                if let Some(&index) = self.shared.get(&ptr) {
                    return Ok(index);
                }
                let child = self.push_child(inner, depth)?;
                let index = self.emit(Node::Shared(child));
                self.shared.insert(ptr, index);
                return Ok(index);
            }
            CacheValue::List(items) => Node::List(
                items
                    .iter()
                    .map(|item| self.push_child(item, depth))
                    .collect::<CodecResult<_>>()?,
            ),
            CacheValue::Map(entries) => Node::Map(
                entries
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), self.push_child(item, depth)?)))
                    .collect::<CodecResult<_>>()?,
            ),
            CacheValue::Null => Node::Null,
            CacheValue::Bool(b) => Node::Bool(*b),
            CacheValue::Int(i) => Node::Int(*i),
            CacheValue::Float(f) => Node::Float(*f),
            CacheValue::Str(s) => Node::Str(s.clone()),
            CacheValue::Bytes(b) => Node::Bytes(b.clone()),
            CacheValue::Body(b) => Node::Body(b.clone()),
            CacheValue::Date(d) => Node::Date(d.num_days_from_ce()),
            CacheValue::DateTime(dt) => Node::DateTime {
                secs: dt.timestamp(),
                nanos: dt.timestamp_subsec_nanos(),
                offset: dt.offset().local_minus_utc(),
            },
            CacheValue::Decimal(d) => Node::Decimal(d.to_string()),
            CacheValue::Tagged { tag, repr } => Node::Tagged {
                tag: tag.clone(),
                repr: repr.clone(),
            },
        };
        Ok(self.emit(node))
    }
}

fn rebuild(frame: Frame) -> CodecResult<CacheValue> {
    let total = frame.nodes.len();
    let mut slots: Vec<Option<CacheValue>> = Vec::with_capacity(total);
    // Longest parent-to-child path under each node, counted in edges
    let mut heights: Vec<usize> = Vec::with_capacity(total);

    for (index, node) in frame.nodes.into_iter().enumerate() {
        let height = node_height(&node, &heights);
        if height > MAX_NESTING_DEPTH {
            return Err(CodecError::Corrupt(format!(
                "node {index} nests deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        heights.push(height);

        let value = match node {
            Node::Null => CacheValue::Null,
            Node::Bool(b) => CacheValue::Bool(b),
            Node::Int(i) => CacheValue::Int(i),
            Node::Float(f) => CacheValue::Float(f),
            Node::Str(s) => CacheValue::Str(s),
            Node::Bytes(b) => CacheValue::Bytes(b),
            Node::Body(b) => CacheValue::Body(b),
            Node::List(children) => CacheValue::List(
                children
                    .into_iter()
                    .map(|child| take_child(&mut slots, child, index))
                    .collect::<CodecResult<_>>()?,
            ),
            Node::Map(entries) => CacheValue::Map(
                entries
                    .into_iter()
                    .map(|(key, child)| Ok((key, take_child(&mut slots, child, index)?)))
                    .collect::<CodecResult<_>>()?,
            ),
            Node::Date(days) => NaiveDate::from_num_days_from_ce_opt(days)
                .map(CacheValue::Date)
                .ok_or_else(|| CodecError::Corrupt(format!("date out of range: {days}")))?,
            Node::DateTime {
                secs,
                nanos,
                offset,
            } => {
                let offset = FixedOffset::east_opt(offset)
                    .ok_or_else(|| CodecError::Corrupt(format!("offset out of range: {offset}")))?;
                let utc = DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
                    CodecError::Corrupt(format!("timestamp out of range: {secs}.{nanos}"))
                })?;
                CacheValue::DateTime(utc.with_timezone(&offset))
            }
            Node::Decimal(repr) => BigDecimal::from_str(&repr)
                .map(CacheValue::Decimal)
                .map_err(|e| CodecError::Corrupt(format!("decimal '{repr}': {e}")))?,
            Node::Tagged { tag, repr } => CacheValue::Tagged { tag, repr },
            Node::Shared(child) => {
                CacheValue::Shared(Arc::new(take_child(&mut slots, child, index)?))
            }
        };
        slots.push(Some(value));
    }

    take_child(&mut slots, frame.root, total)
}

fn node_height(node: &Node, heights: &[usize]) -> usize {
    // Out-of-order references are reported by `take_child`
    let child_height = |child: &u32| heights.get(*child as usize).copied().unwrap_or(0);
    match node {
        Node::List(children) => children.iter().map(child_height).max().map_or(0, |h| h + 1),
        Node::Map(entries) => entries
            .iter()
            .map(|(_, child)| child_height(child))
            .max()
            .map_or(0, |h| h + 1),
        Node::Shared(child) => 1 + child_height(child),
        _ => 0,
    }
}

/// Move a child out of its slot. Shared nodes hand out clones of their `Arc`;
/// any other node may be claimed by exactly one parent.
fn take_child(
    slots: &mut [Option<CacheValue>],
    child: u32,
    parent: usize,
) -> CodecResult<CacheValue> {
    let child = child as usize;
    if child >= parent || child >= slots.len() {
        return Err(CodecError::Corrupt(format!(
            "node {parent} references node {child} out of order"
        )));
    }
    let slot = &mut slots[child];
    if let Some(CacheValue::Shared(inner)) = slot {
        return Ok(CacheValue::Shared(Arc::clone(inner)));
    }
    slot.take()
        .ok_or_else(|| CodecError::Corrupt(format!("node {child} referenced twice")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn round_trip(value: &CacheValue) -> CacheValue {
        let coder = BinaryCoder::new();
        coder.decode(&coder.encode(value).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_kinds() {
        let value = CacheValue::map([
            ("day", CacheValue::Date(NaiveDate::from_ymd_opt(2024, 10, 7).unwrap())),
            (
                "start",
                CacheValue::DateTime(
                    DateTime::parse_from_rfc3339("2024-10-07T23:59:59.123456789+05:00").unwrap(),
                ),
            ),
            ("price", CacheValue::Decimal(BigDecimal::from_str("99.990").unwrap())),
            ("page", CacheValue::Body(b"<html></html>".to_vec())),
            ("raw", CacheValue::Bytes(vec![0, 159, 146, 150])),
            ("code", CacheValue::tagged("currency", "RUB")),
            ("ratio", CacheValue::Float(-2.5e-3)),
            ("empty", CacheValue::list(Vec::<CacheValue>::new())),
        ]);
        let decoded = round_trip(&value);
        assert_eq!(decoded, value);
        assert!(matches!(decoded.get("page"), Some(CacheValue::Body(_))));
    }

    #[test]
    fn test_shared_references_stay_shared() {
        let room = CacheValue::shared(CacheValue::map([("name", "RoomA"), ("floor", "3")]));
        let value = CacheValue::map([
            ("monday", CacheValue::list([room.clone(), room.clone()])),
            ("tuesday", room),
        ]);

        let decoded = round_trip(&value);
        assert_eq!(decoded, value);

        let monday = decoded.get("monday").and_then(CacheValue::as_list).unwrap();
        let (CacheValue::Shared(a), CacheValue::Shared(b), Some(CacheValue::Shared(c))) =
            (&monday[0], &monday[1], decoded.get("tuesday"))
        else {
            panic!("expected shared nodes, got {decoded:?}");
        };
        assert!(Arc::ptr_eq(a, b));
        assert!(Arc::ptr_eq(a, c));
    }

    #[test]
    fn test_shared_node_is_written_once() {
        let big = CacheValue::shared(CacheValue::Str("x".repeat(4096)));
        let once = BinaryCoder.encode(&CacheValue::list([big.clone()])).unwrap();
        let thrice = BinaryCoder
            .encode(&CacheValue::list([big.clone(), big.clone(), big]))
            .unwrap();
        assert!(thrice.len() < once.len() + 64);
    }

    #[test]
    fn test_foreign_bytes_are_rejected() {
        let coder = BinaryCoder::new();
        assert!(coder.decode(b"not a cache frame").is_err());
        assert!(coder.decode(&[]).is_err());

        let json = br#"{"val": "2024-10-07", "_spec_type": "date"}"#;
        assert!(coder.decode(json).is_err());
    }

    #[test]
    fn test_wrong_marker_and_version_are_corrupt() {
        let options = frame_options();
        let foreign = options
            .serialize(&Frame {
                magic: *b"XXXX",
                version: FRAME_VERSION,
                root: 0,
                nodes: vec![Node::Null],
            })
            .unwrap();
        assert!(matches!(
            BinaryCoder.decode(&foreign),
            Err(CodecError::Corrupt(_))
        ));

        let future = frame_options()
            .serialize(&Frame {
                magic: FRAME_MAGIC,
                version: FRAME_VERSION + 1,
                root: 0,
                nodes: vec![Node::Null],
            })
            .unwrap();
        assert!(matches!(
            BinaryCoder.decode(&future),
            Err(CodecError::Corrupt(_))
        ));
    }

    #[test]
    fn test_inconsistent_tables_are_corrupt() {
        let forward = frame_options()
            .serialize(&Frame {
                magic: FRAME_MAGIC,
                version: FRAME_VERSION,
                root: 0,
                nodes: vec![Node::List(vec![1]), Node::Null],
            })
            .unwrap();
        assert!(matches!(
            BinaryCoder.decode(&forward),
            Err(CodecError::Corrupt(_))
        ));

        let claimed_twice = frame_options()
            .serialize(&Frame {
                magic: FRAME_MAGIC,
                version: FRAME_VERSION,
                root: 1,
                nodes: vec![Node::Int(1), Node::List(vec![0, 0])],
            })
            .unwrap();
        assert!(matches!(
            BinaryCoder.decode(&claimed_twice),
            Err(CodecError::Corrupt(_))
        ));
    }

    fn nested_lists(levels: usize) -> CacheValue {
        let mut value = CacheValue::Int(1);
        for _ in 0..levels {
            value = CacheValue::list([value]);
        }
        value
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let deepest = nested_lists(MAX_NESTING_DEPTH);
        assert_eq!(round_trip(&deepest), deepest);

        assert!(matches!(
            BinaryCoder.encode(&nested_lists(MAX_NESTING_DEPTH + 1)),
            Err(CodecError::Unsupported { .. })
        ));

        let shared_chain = CacheValue::shared(nested_lists(MAX_NESTING_DEPTH));
        assert!(BinaryCoder.encode(&shared_chain).is_err());
    }

    #[test]
    fn test_overly_deep_table_is_corrupt() {
        let mut nodes = vec![Node::Null];
        for child in 0..=MAX_NESTING_DEPTH as u32 {
            nodes.push(Node::List(vec![child]));
        }
        let too_deep = frame_options()
            .serialize(&Frame {
                magic: FRAME_MAGIC,
                version: FRAME_VERSION,
                root: (nodes.len() - 1) as u32,
                nodes,
            })
            .unwrap();
        assert!(matches!(
            BinaryCoder.decode(&too_deep),
            Err(CodecError::Corrupt(_))
        ));
    }

    #[test]
    fn test_typed_decode_applies_shape() {
        let coder = BinaryCoder::new();
        let bytes = coder
            .encode(&CacheValue::list([CacheValue::Int(1), CacheValue::Int(2)]))
            .unwrap();
        let numbers: Vec<i64> = coder.decode_as(&bytes).unwrap();
        assert_eq!(numbers, vec![1, 2]);
        assert!(matches!(
            coder.decode_as::<Vec<String>>(&bytes),
            Err(CodecError::Shape(_))
        ));
    }
}
