//! Raw body capability for response-like values.
//!
//! A live response object cannot be rebuilt from serialized state, so the
//! cache only ever keeps its body. Any framework type can opt in by
//! implementing [`RawBody`]; the coders never look at concrete response types.

/// Something that can hand over its finalized body bytes
pub trait RawBody {
    fn raw_body(&self) -> Vec<u8>;
}

impl RawBody for [u8] {
    fn raw_body(&self) -> Vec<u8> {
        self.to_vec()
    }
}

impl RawBody for Vec<u8> {
    fn raw_body(&self) -> Vec<u8> {
        self.clone()
    }
}

impl RawBody for str {
    fn raw_body(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl RawBody for String {
    fn raw_body(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}
