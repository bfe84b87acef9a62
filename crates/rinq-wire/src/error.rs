use thiserror::Error;

/// Errors raised while framing or encoding/decoding the rinq wire format.
#[derive(Debug, Error)]
pub enum WireError {
    /// The frame's declared `header_len` exceeds `u16::MAX`, or the buffer ran
    /// out before that many header bytes were available.
    #[error("header of {0} bytes exceeds the maximum frame header size")]
    HeaderTooLarge(usize),

    /// The buffer ended before a complete preamble or header could be read.
    #[error("frame truncated: {0}")]
    Truncated(&'static str),

    /// A header or payload value failed to serialize.
    #[error("encode failed: {0}")]
    Encode(String),

    /// A header or payload value failed to deserialize.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl From<std::io::Error> for WireError {
    fn from(err: std::io::Error) -> Self {
        WireError::Decode(err.to_string())
    }
}
