//! Frame and header codec for the rinq WebSocket-to-RPC wire format.
//!
//! This crate has no notion of sessions, visitors, or the bus — it only knows
//! how to turn a WebSocket message's bytes into a [`Frame`] (preamble + header
//! bytes + payload bytes) and back, and how to encode/decode header and
//! payload values under the two supported sub-protocols (CBOR, JSON).
//! `rinq-protocol` builds the typed message set on top of it.

mod codec;
mod error;
mod frame;
mod payload;

pub use codec::{CborCodec, FrameCodec, JsonCodec};
pub use error::WireError;
pub use frame::{read_frame, write_frame, Frame};
pub use payload::Payload;
