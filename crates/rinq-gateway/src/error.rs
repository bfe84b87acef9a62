use rinq_bus::BusError;
use rinq_protocol::ProtocolError;

/// Fatal error kinds for a connection. Anything surfaced here terminates the
/// connection; call-level declared failures and opaque errors never reach
/// this type (they stay local to the call task).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session state error: {0}")]
    SessionState(String),

    #[error("bus transport error: {0}")]
    CallTransport(#[from] BusError),

    #[error("invalid handler configuration: {0}")]
    Configuration(String),
}
