use crate::error::WireError;

/// A fully decoded on-wire frame, prior to interpreting `message_type` as a
/// concrete message.
///
/// Wire layout (big-endian, no padding):
/// `type:u16 | session:u16 | header_len:u16 | header:[header_len] | payload:[remainder]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_type: u16,
    pub session: u16,
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Decode a single WebSocket message's bytes into a [`Frame`].
///
/// `header_len` is mandatory (zero permitted). Anything left over after the
/// header is the payload; whether that payload is *allowed* for the message
/// type is a semantic question answered one layer up (`rinq-protocol`).
pub fn read_frame(buf: &[u8]) -> Result<Frame, WireError> {
    if buf.len() < 6 {
        return Err(WireError::Truncated("frame shorter than the 6-byte preamble"));
    }

    let message_type = u16::from_be_bytes([buf[0], buf[1]]);
    let session = u16::from_be_bytes([buf[2], buf[3]]);
    let header_len = u16::from_be_bytes([buf[4], buf[5]]) as usize;

    let header_start = 6;
    let header_end = header_start + header_len;
    if header_end > buf.len() {
        return Err(WireError::Truncated("declared header_len exceeds frame length"));
    }

    Ok(Frame {
        message_type,
        session,
        header: buf[header_start..header_end].to_vec(),
        payload: buf[header_end..].to_vec(),
    })
}

/// Encode a preamble + header + payload into a single WebSocket message.
pub fn write_frame(
    message_type: u16,
    session: u16,
    header: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>, WireError> {
    if header.len() > u16::MAX as usize {
        return Err(WireError::HeaderTooLarge(header.len()));
    }

    let mut buf = Vec::with_capacity(6 + header.len() + payload.len());
    buf.extend_from_slice(&message_type.to_be_bytes());
    buf.extend_from_slice(&session.to_be_bytes());
    buf.extend_from_slice(&(header.len() as u16).to_be_bytes());
    buf.extend_from_slice(header);
    buf.extend_from_slice(payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_frame_with_header_and_payload() {
        let bytes = write_frame(0x4343, 0xABCD, b"hdr", b"payload").unwrap();
        let frame = read_frame(&bytes).unwrap();
        assert_eq!(frame.message_type, 0x4343);
        assert_eq!(frame.session, 0xABCD);
        assert_eq!(frame.header, b"hdr");
        assert_eq!(frame.payload, b"payload");
    }

    #[test]
    fn zero_length_header_is_permitted() {
        let bytes = write_frame(0x5343, 0x0000, &[], b"x").unwrap();
        let frame = read_frame(&bytes).unwrap();
        assert!(frame.header.is_empty());
        assert_eq!(frame.payload, b"x");
    }

    #[test]
    fn zero_length_payload_is_permitted() {
        let bytes = write_frame(0x5343, 0x0000, b"hdr", &[]).unwrap();
        let frame = read_frame(&bytes).unwrap();
        assert_eq!(frame.header, b"hdr");
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn rejects_truncated_preamble() {
        let err = read_frame(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, WireError::Truncated(_)));
    }

    #[test]
    fn rejects_header_len_past_end_of_buffer() {
        // header_len claims 10 bytes, only 2 are present
        let mut buf = vec![0x43, 0x43, 0xAB, 0xCD, 0x00, 0x0A];
        buf.extend_from_slice(b"ab");
        let err = read_frame(&buf).unwrap_err();
        assert!(matches!(err, WireError::Truncated(_)));
    }

    #[test]
    fn rejects_oversize_header_on_encode() {
        let header = vec![0u8; u16::MAX as usize + 1];
        let err = write_frame(0x4343, 0, &header, &[]).unwrap_err();
        assert!(matches!(err, WireError::HeaderTooLarge(_)));
    }
}
