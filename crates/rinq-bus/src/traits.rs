use std::time::Duration;

use async_trait::async_trait;
use rinq_wire::Payload;
use tokio::sync::mpsc;

use crate::error::BusError;
use crate::outcome::{BusEvent, CallOutcome};
use crate::session_id::BusSessionId;

/// A handle to a downstream bus session, owned exclusively by the
/// multiplexer slot that created it.
///
/// Notification and async-response delivery is not modelled as callbacks
/// (the way the original source binds closures over the session index);
/// instead `create_session` hands back an event receiver the gateway drains
/// on a per-connection forwarding task, recovering the `SessionIndex` from
/// the bus session's identity via the multiplexer's reverse map, which keeps
/// delivery correct even if the index has since been reused for a new
/// session.
#[async_trait]
pub trait BusSession: Send + Sync + 'static {
    fn id(&self) -> BusSessionId;

    /// Freeze a group of attributes under `namespace` on this session, e.g.
    /// the `rinq.httpd` group carrying remote address / host.
    async fn apply_attrs(
        &self,
        namespace: &str,
        attrs: Vec<(String, String)>,
    ) -> Result<(), BusError>;

    /// A synchronous command call. Resolves to [`CallOutcome`] for anything
    /// that isn't a fatal transport-level failure.
    async fn call(
        &self,
        namespace: &str,
        command: &str,
        payload: Payload,
        timeout: Duration,
    ) -> Result<CallOutcome, BusError>;

    /// A non-blocking call; its eventual outcome arrives as a
    /// [`BusEvent::AsyncResponse`] on the session's event receiver.
    async fn call_async(
        &self,
        namespace: &str,
        command: &str,
        payload: Payload,
        timeout: Duration,
    ) -> Result<(), BusError>;

    /// A one-way command with no response, ever.
    async fn execute(&self, namespace: &str, command: &str, payload: Payload) -> Result<(), BusError>;

    /// Destroy this session. Idempotent.
    async fn destroy(&self);

    /// Resolves once this session has terminated, whether by an explicit
    /// [`BusSession::destroy`] call or unsolicited bus-side termination. The
    /// monitor task (`rinq-gateway::multiplexer`) awaits this alongside
    /// connection-parent cancellation.
    async fn done(&self);
}

/// The downstream peer sessions are created against.
#[async_trait]
pub trait BusClient: Send + Sync + 'static {
    type Session: BusSession;

    /// Create a new session, returning it along with the channel its
    /// notifications and async-call responses arrive on.
    async fn create_session(
        &self,
    ) -> Result<(Self::Session, mpsc::UnboundedReceiver<BusEvent>), BusError>;

    /// Whether this bus is currently able to accept new sessions. An HTTP
    /// front end can use this to answer upgrade requests with `503` instead
    /// of accepting a connection it knows it can't serve. Defaults to
    /// always-healthy for buses that have no such notion.
    fn is_healthy(&self) -> bool {
        true
    }
}
