//! Typed message set and visitor dispatch for the rinq gateway protocol.
//!
//! Builds on `rinq-wire`'s frame/header/payload codec to define the closed
//! set of message types the gateway exchanges with a client, and the
//! [`Visitor`] pattern used to route decoded [`Incoming`] messages to
//! gateway logic.

mod error;
mod header;
mod incoming;
mod outgoing;
mod types;
mod visitor;

pub use error::ProtocolError;
pub use header::{
    AsyncCallHeader, AsyncErrorHeader, AsyncFailureHeader, AsyncSuccessHeader, ExecuteHeader,
    NotificationHeader, SyncCallHeader, SyncErrorHeader, SyncFailureHeader, SyncSuccessHeader,
};
pub use incoming::{read_incoming, Incoming};
pub use outgoing::{write_outgoing, Outgoing};
pub use types::{MessageType, SessionIndex};
pub use visitor::Visitor;

use rinq_wire::{read_frame, FrameCodec};

/// Decode a raw WebSocket message's bytes directly into a typed
/// [`Incoming`] message, going through `rinq-wire`'s frame parser first.
pub fn decode_incoming(bytes: &[u8], codec: &dyn FrameCodec) -> Result<Incoming, ProtocolError> {
    let frame = read_frame(bytes)?;
    read_incoming(&frame, codec)
}

/// Encode an [`Outgoing`] message into the raw bytes of a WebSocket message.
pub fn encode_outgoing(message: &Outgoing, codec: &dyn FrameCodec) -> Result<Vec<u8>, ProtocolError> {
    write_outgoing(message, codec)
}
