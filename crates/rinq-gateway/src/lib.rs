//! Per-connection WebSocket-to-bus gateway engine: frame I/O, session
//! multiplexing, capacity governance, and the handler façade that wires them
//! together.
//!
//! Built on [`rinq_wire`] (framing) and [`rinq_protocol`] (typed messages),
//! talking to a downstream bus through the [`rinq_bus`] trait boundary.

mod capacity;
mod error;
mod handler;
mod io;
mod multiplexer;

pub use capacity::{CapacityGovernor, CapacityPermit, CapacityTimedOut};
pub use error::GatewayError;
pub use handler::{Encoding, GatewayHandler, Options, ATTR_NAMESPACE, PROTOCOL_PREFIX};
pub use io::{mock_socket_pair, AxumSocket, ConnectionIo, MockSocket, MockSocketHandle, WsMessage, WsSocket};
pub use multiplexer::Multiplexer;
