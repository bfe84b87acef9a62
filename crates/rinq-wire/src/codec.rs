use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::WireError;
use crate::payload::Payload;

/// A structured data encoder/decoder used to serialize message headers and
/// application payloads.
///
/// Header values are always encoded as positional arrays (plain Rust tuples
/// already serialize that way under both `serde_json` and `ciborium`, so no
/// special "struct as array" mode is needed the way the Go source configures
/// its codec handles).
pub trait FrameCodec: Send + Sync + 'static {
    fn encode_header<H: Serialize>(&self, value: &H) -> Result<Vec<u8>, WireError>;
    fn decode_header<H: DeserializeOwned>(&self, bytes: &[u8]) -> Result<H, WireError>;

    fn encode_payload(&self, payload: &Payload) -> Result<Vec<u8>, WireError>;
    fn decode_payload(&self, bytes: &[u8]) -> Result<Payload, WireError>;
}

/// CBOR codec: rinq's native sub-protocol. Payload bytes are forwarded
/// verbatim in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl FrameCodec for CborCodec {
    fn encode_header<H: Serialize>(&self, value: &H) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(|e| WireError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn decode_header<H: DeserializeOwned>(&self, bytes: &[u8]) -> Result<H, WireError> {
        ciborium::from_reader(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }

    fn encode_payload(&self, payload: &Payload) -> Result<Vec<u8>, WireError> {
        match payload {
            Payload::Native(bytes) => Ok(bytes.to_vec()),
            Payload::Foreign(_) => Err(WireError::Encode(
                "CBOR codec cannot encode a foreign (JSON) payload value".into(),
            )),
        }
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<Payload, WireError> {
        Ok(Payload::Native(bytes::Bytes::copy_from_slice(bytes)))
    }
}

/// JSON codec: the "foreign" sub-protocol. Headers are JSON arrays; payloads
/// are decoded to a generic value tree and re-marshalled to the bus's native
/// binary form on inbound, reversed outbound.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl FrameCodec for JsonCodec {
    fn encode_header<H: Serialize>(&self, value: &H) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(value).map_err(|e| WireError::Encode(e.to_string()))
    }

    fn decode_header<H: DeserializeOwned>(&self, bytes: &[u8]) -> Result<H, WireError> {
        serde_json::from_slice(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }

    fn encode_payload(&self, payload: &Payload) -> Result<Vec<u8>, WireError> {
        match payload {
            Payload::Foreign(value) => {
                if value.is_null() {
                    return Ok(Vec::new());
                }
                serde_json::to_vec(value).map_err(|e| WireError::Encode(e.to_string()))
            }
            Payload::Native(_) => Err(WireError::Encode(
                "JSON codec cannot encode a native (CBOR-bytes) payload value".into(),
            )),
        }
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<Payload, WireError> {
        if bytes.is_empty() {
            return Ok(Payload::empty_foreign());
        }
        let value = serde_json::from_slice(bytes).map_err(|e| WireError::Decode(e.to_string()))?;
        Ok(Payload::Foreign(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbor_header_round_trips_as_positional_array() {
        let codec = CborCodec;
        let header = (7u64, "ns".to_string(), "cmd".to_string(), 1000u64);
        let bytes = codec.encode_header(&header).unwrap();
        let decoded: (u64, String, String, u64) = codec.decode_header(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn json_header_round_trips_as_array() {
        let codec = JsonCodec;
        let header = (1u64, "a".to_string(), "b".to_string(), 0u64);
        let bytes = codec.encode_header(&header).unwrap();
        assert_eq!(bytes, br#"[1,"a","b",0]"#);
        let decoded: (u64, String, String, u64) = codec.decode_header(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn cbor_payload_passes_through_verbatim() {
        let codec = CborCodec;
        let payload = Payload::Native(bytes::Bytes::from_static(b"\x01\x02\x03"));
        let encoded = codec.encode_payload(&payload).unwrap();
        assert_eq!(encoded, b"\x01\x02\x03");
        let decoded = codec.decode_payload(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn json_payload_round_trips_through_generic_value() {
        let codec = JsonCodec;
        let payload = Payload::Foreign(serde_json::json!({"a": 1}));
        let encoded = codec.encode_payload(&payload).unwrap();
        let decoded = codec.decode_payload(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn json_empty_payload_round_trips_to_zero_bytes() {
        let codec = JsonCodec;
        let encoded = codec.encode_payload(&Payload::empty_foreign()).unwrap();
        assert!(encoded.is_empty());
        let decoded = codec.decode_payload(&encoded).unwrap();
        assert_eq!(decoded, Payload::empty_foreign());
    }
}
