use rinq_wire::WireError;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame error: {0}")]
    Wire(#[from] WireError),

    #[error("unrecognized incoming message type: 0x{0:04x}")]
    UnrecognizedIncomingType(u16),

    #[error("message type 0x{0:04x} does not carry a payload, but the frame had unconsumed trailing bytes")]
    UnconsumedFrameData(u16),
}
