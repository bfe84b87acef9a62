use bytes::Bytes;
use serde_json::Value;

/// Application payload data carried alongside a frame's header.
///
/// The two variants mirror the two sub-protocols: under CBOR the bytes are
/// the bus's own native encoding and are forwarded verbatim; under JSON the
/// payload is decoded to a generic value tree so the bus can re-marshal it to
/// its native format.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw bytes, passed to/from the bus untouched.
    Native(Bytes),
    /// A generic JSON value, to be re-encoded by the bus.
    Foreign(Value),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Native(b) => b.is_empty(),
            Payload::Foreign(v) => v.is_null(),
        }
    }

    pub fn empty_native() -> Self {
        Payload::Native(Bytes::new())
    }

    pub fn empty_foreign() -> Self {
        Payload::Foreign(Value::Null)
    }
}
