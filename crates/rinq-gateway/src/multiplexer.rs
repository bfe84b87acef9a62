//! Session multiplexer: per-connection `SessionIndex → bus session` map and
//! its inverse, dispatch of incoming messages onto bus operations, and the
//! per-session monitor task.
//!
//! Grounded on `examples/original_source/src/websock/native/visitor.go`. The
//! forward/reverse maps are `DashMap`s (the shape
//! `turbomcp-websocket::types::WebSocketBidirectionalTransport` uses for its
//! own correlation tables) updated together under a short-held
//! `parking_lot::Mutex` guard so the two maps never drift out of step with
//! each other, even though each map alone is lock-free for reads.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rinq_bus::{BusClient, BusEvent, BusSession, BusSessionId, CallOutcome};
use rinq_protocol::{Incoming, Outgoing, SessionIndex};
use rinq_wire::Payload;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::capacity::CapacityGovernor;
use crate::error::GatewayError;

pub struct Multiplexer<B: BusClient> {
    bus: Arc<B>,
    forward: DashMap<SessionIndex, Arc<B::Session>>,
    reverse: DashMap<BusSessionId, SessionIndex>,
    map_guard: Mutex<()>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    cancel: CancellationToken,
    capacity: Arc<CapacityGovernor>,
    /// `None` means "no server-side cap"; the client's own timeout wins.
    max_call_timeout: Option<Duration>,
    attrs: Vec<(String, String)>,
    fatal: Mutex<Option<GatewayError>>,
}

impl<B: BusClient> Multiplexer<B> {
    pub fn new(
        bus: Arc<B>,
        outgoing: mpsc::UnboundedSender<Outgoing>,
        cancel: CancellationToken,
        capacity: Arc<CapacityGovernor>,
        max_call_timeout: Option<Duration>,
        attrs: Vec<(String, String)>,
    ) -> Self {
        Multiplexer {
            bus,
            forward: DashMap::new(),
            reverse: DashMap::new(),
            map_guard: Mutex::new(()),
            outgoing,
            cancel,
            capacity,
            max_call_timeout,
            attrs,
            fatal: Mutex::new(None),
        }
    }

    /// Dispatch one decoded message. A returned `Err` is fatal to the
    /// connection (matches the source: the reader-dispatch loop treats any
    /// visitor error as terminal).
    pub async fn dispatch(self: &Arc<Self>, msg: Incoming) -> Result<(), GatewayError> {
        match msg {
            Incoming::SessionCreate { session } => self.create(session).await,
            Incoming::SessionDestroy { session } => self.destroy(session).await,
            Incoming::SyncCall {
                session,
                seq,
                namespace,
                command,
                timeout_ms,
                payload,
            } => {
                let bus_session = self
                    .find(session)
                    .ok_or_else(|| session_missing(session))?;
                self.spawn_sync_call(bus_session, session, seq, namespace, command, timeout_ms, payload);
                Ok(())
            }
            Incoming::AsyncCall {
                session,
                namespace,
                command,
                timeout_ms,
                payload,
            } => {
                let bus_session = self
                    .find(session)
                    .ok_or_else(|| session_missing(session))?;
                let timeout = self.cap_timeout(timeout_ms);
                bus_session.call_async(&namespace, &command, payload, timeout).await?;
                Ok(())
            }
            Incoming::Execute {
                session,
                namespace,
                command,
                payload,
            } => {
                let bus_session = self
                    .find(session)
                    .ok_or_else(|| session_missing(session))?;
                bus_session.execute(&namespace, &command, payload).await?;
                Ok(())
            }
        }
    }

    async fn create(self: &Arc<Self>, index: SessionIndex) -> Result<(), GatewayError> {
        {
            let _guard = self.map_guard.lock();
            if self.forward.contains_key(&index) {
                return Err(GatewayError::SessionState(format!(
                    "session {index} already exists"
                )));
            }
        }

        let (session, events) = self.bus.create_session().await?;
        let session = Arc::new(session);

        if let Err(err) = session.apply_attrs(crate::handler::ATTR_NAMESPACE, self.attrs.clone()).await {
            session.destroy().await;
            return Err(err.into());
        }

        {
            let _guard = self.map_guard.lock();
            self.forward.insert(index, session.clone());
            self.reverse.insert(session.id(), index);
        }

        info!(session = %index, bus_session = %session.id(), "session created");

        tokio::spawn(forward_bus_events(self.clone(), session.id(), events));
        tokio::spawn(monitor_session(self.clone(), index, session));

        Ok(())
    }

    async fn destroy(self: &Arc<Self>, index: SessionIndex) -> Result<(), GatewayError> {
        let session = {
            let _guard = self.map_guard.lock();
            let Some((_, session)) = self.forward.remove(&index) else {
                return Err(GatewayError::SessionState(format!(
                    "session {index} does not exist"
                )));
            };
            self.reverse.remove(&session.id());
            session
        };

        info!(session = %index, "session destroy requested by client");
        tokio::spawn(async move {
            session.destroy().await;
        });
        Ok(())
    }

    /// Destroy every remaining session in parallel. Called on connection
    /// teardown.
    pub async fn teardown(&self) {
        let sessions: Vec<_> = {
            let _guard = self.map_guard.lock();
            let sessions: Vec<_> = self.forward.iter().map(|e| e.value().clone()).collect();
            self.forward.clear();
            self.reverse.clear();
            sessions
        };

        let joins: Vec<_> = sessions
            .into_iter()
            .map(|session| tokio::spawn(async move { session.destroy().await }))
            .collect();
        for join in joins {
            let _ = join.await;
        }
    }

    fn find(&self, index: SessionIndex) -> Option<Arc<B::Session>> {
        self.forward.get(&index).map(|e| e.value().clone())
    }

    fn index_of(&self, id: BusSessionId) -> Option<SessionIndex> {
        self.reverse.get(&id).map(|e| *e.value())
    }

    /// `min(clientTimeout, serverMaxCallTimeout)`, with `0` on either side
    /// meaning "no bound".
    fn cap_timeout(&self, client_timeout_ms: u64) -> Duration {
        let client = (client_timeout_ms != 0).then(|| Duration::from_millis(client_timeout_ms));
        let server = self.max_call_timeout.filter(|d| !d.is_zero());

        match (client, server) {
            (Some(c), Some(s)) => c.min(s),
            (Some(c), None) => c,
            (None, Some(s)) => s,
            (None, None) => Duration::from_secs(u64::from(u32::MAX)),
        }
    }

    fn spawn_sync_call(
        self: &Arc<Self>,
        bus_session: Arc<B::Session>,
        index: SessionIndex,
        seq: u64,
        namespace: String,
        command: String,
        timeout_ms: u64,
        payload: Payload,
    ) {
        let mux = self.clone();
        let timeout = self.cap_timeout(timeout_ms);

        tokio::spawn(async move {
            let permit = match mux.capacity.reserve(timeout, &mux.cancel).await {
                Ok(permit) => permit,
                Err(_) => {
                    // capacity wait timed out or the connection tore down: no
                    // response, client sees its own timeout.
                    return;
                }
            };

            let outcome = tokio::select! {
                outcome = bus_session.call(&namespace, &command, payload, timeout) => outcome,
                () = mux.cancel.cancelled() => return,
            };
            drop(permit);

            match outcome {
                Ok(CallOutcome::Success(payload)) => {
                    let _ = mux.outgoing.send(Outgoing::SyncSuccess { session: index, seq, payload });
                }
                Ok(CallOutcome::Failure { failure_type, failure_message, payload }) => {
                    let _ = mux.outgoing.send(Outgoing::SyncFailure {
                        session: index,
                        seq,
                        failure_type,
                        failure_message,
                        payload,
                    });
                }
                Ok(CallOutcome::Error) => {
                    let _ = mux.outgoing.send(Outgoing::SyncError { session: index, seq });
                }
                Err(err) => mux.fail(err.into()),
            }
        });
    }

    /// Record a fatal error discovered off the dispatch call stack (inside a
    /// spawned call task) and cancel the connection.
    pub fn fail(&self, err: GatewayError) {
        let mut slot = self.fatal.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
        self.cancel.cancel();
    }

    pub fn take_fatal(&self) -> Option<GatewayError> {
        self.fatal.lock().take()
    }
}

fn session_missing(index: SessionIndex) -> GatewayError {
    GatewayError::SessionState(format!("session {index} does not exist"))
}

async fn monitor_session<B: BusClient>(
    mux: Arc<Multiplexer<B>>,
    index: SessionIndex,
    session: Arc<B::Session>,
) {
    tokio::select! {
        _ = session.done() => {
            let removed = {
                let _guard = mux.map_guard.lock();
                if mux.reverse.remove(&session.id()).is_some() {
                    mux.forward.remove(&index);
                    true
                } else {
                    false
                }
            };
            if removed {
                info!(session = %index, "session destroyed unsolicited by the bus");
                let _ = mux.outgoing.send(Outgoing::SessionDestroy { session: index });
            }
        }
        _ = mux.cancel.cancelled() => {}
    }
}

async fn forward_bus_events<B: BusClient>(
    mux: Arc<Multiplexer<B>>,
    bus_id: BusSessionId,
    mut events: mpsc::UnboundedReceiver<BusEvent>,
) {
    loop {
        tokio::select! {
            _ = mux.cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let Some(index) = mux.index_of(bus_id) else {
                    warn!(bus_session = %bus_id, "dropping bus event for a session the client already destroyed");
                    continue;
                };

                match event {
                    BusEvent::Notification { notification_type, payload } => {
                        let _ = mux.outgoing.send(Outgoing::Notification {
                            session: index,
                            notification_type,
                            payload,
                        });
                    }
                    BusEvent::AsyncResponse { namespace, command, outcome } => match outcome {
                        CallOutcome::Success(payload) => {
                            let _ = mux.outgoing.send(Outgoing::AsyncSuccess { session: index, namespace, command, payload });
                        }
                        CallOutcome::Failure { failure_type, failure_message, payload } => {
                            let _ = mux.outgoing.send(Outgoing::AsyncFailure {
                                session: index,
                                namespace,
                                command,
                                failure_type,
                                failure_message,
                                payload,
                            });
                        }
                        CallOutcome::Error => {
                            let _ = mux.outgoing.send(Outgoing::AsyncError { session: index, namespace, command });
                        }
                    },
                }
            }
        }
    }
}
