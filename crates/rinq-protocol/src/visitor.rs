use rinq_wire::Payload;

use crate::types::SessionIndex;

/// Dispatches each incoming message variant to its own method, mirroring the
/// visitor each `Incoming` message accepts in the original protocol.
pub trait Visitor {
    type Error;

    fn visit_session_create(&mut self, session: SessionIndex) -> Result<(), Self::Error>;

    fn visit_session_destroy(&mut self, session: SessionIndex) -> Result<(), Self::Error>;

    fn visit_sync_call(
        &mut self,
        session: SessionIndex,
        seq: u64,
        namespace: String,
        command: String,
        timeout_ms: u64,
        payload: Payload,
    ) -> Result<(), Self::Error>;

    fn visit_async_call(
        &mut self,
        session: SessionIndex,
        namespace: String,
        command: String,
        timeout_ms: u64,
        payload: Payload,
    ) -> Result<(), Self::Error>;

    fn visit_execute(
        &mut self,
        session: SessionIndex,
        namespace: String,
        command: String,
        payload: Payload,
    ) -> Result<(), Self::Error>;
}
