use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rinq_wire::Payload;
use tokio::sync::{mpsc, watch};

use crate::error::BusError;
use crate::outcome::{BusEvent, CallOutcome};
use crate::session_id::BusSessionId;
use crate::traits::{BusClient, BusSession};

/// An in-memory bus used by the workspace's own tests, analogous to
/// `examples/original_source/src/websock/internal/mock`.
///
/// Call outcomes are scripted globally by `(namespace, command)`, not
/// per-session: good enough for the single-active-session scenarios this
/// gateway is tested against, and considerably simpler than threading a
/// session id through test setup before the session has been created.
#[derive(Clone, Default)]
pub struct FakeBus {
    inner: Arc<FakeBusInner>,
}

struct FakeBusInner {
    next_id: AtomicU64,
    scripts: DashMap<(String, String), CallOutcome>,
    sessions: DashMap<BusSessionId, Arc<FakeSessionShared>>,
    healthy: AtomicBool,
}

impl Default for FakeBusInner {
    fn default() -> Self {
        FakeBusInner {
            next_id: AtomicU64::default(),
            scripts: DashMap::default(),
            sessions: DashMap::default(),
            healthy: AtomicBool::new(true),
        }
    }
}

struct FakeSessionShared {
    attrs: Mutex<Vec<(String, Vec<(String, String)>)>,
    events: Mutex<Option<mpsc::UnboundedSender<BusEvent>>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrange for the next call (by any session) to `namespace`/`command`
    /// to resolve with `outcome`.
    pub fn script(&self, namespace: &str, command: &str, outcome: CallOutcome) {
        self.inner
            .scripts
            .insert((namespace.to_string(), command.to_string()), outcome);
    }

    /// All session ids currently live on this bus, oldest first.
    pub fn session_ids(&self) -> Vec<BusSessionId> {
        let mut ids: Vec<_> = self.inner.sessions.iter().map(|e| *e.key()).collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Push an unsolicited [`BusEvent`] to a live session.
    pub fn deliver(&self, id: BusSessionId, event: BusEvent) -> bool {
        let Some(shared) = self.inner.sessions.get(&id) else {
            return false;
        };
        let tx = shared.events.lock();
        match tx.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Terminate a session as if the bus itself decided to, without a
    /// client `SD`. Drives the multiplexer's monitor-task path.
    pub fn kill(&self, id: BusSessionId) {
        if let Some((_, shared)) = self.inner.sessions.remove(&id) {
            let _ = shared.done_tx.send(true);
        }
    }

    /// Attributes recorded for a session, for assertions in tests.
    pub fn attrs_of(&self, id: BusSessionId) -> Option<Vec<(String, Vec<(String, String)>)>> {
        self.inner.sessions.get(&id).map(|s| s.attrs.lock().clone())
    }

    /// Flip the health flag returned by [`BusClient::is_healthy`].
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.healthy.store(healthy, Ordering::Relaxed);
    }
}

#[async_trait]
impl BusClient for FakeBus {
    type Session = FakeSession;

    fn is_healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::Relaxed)
    }

    async fn create_session(
        &self,
    ) -> Result<(Self::Session, mpsc::UnboundedReceiver<BusEvent>), BusError> {
        let id = BusSessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);

        let shared = Arc::new(FakeSessionShared {
            attrs: Mutex::new(Vec::new()),
            events: Mutex::new(Some(tx)),
            done_tx,
            done_rx,
        });
        self.inner.sessions.insert(id, shared.clone());

        Ok((
            FakeSession {
                id,
                shared,
                bus: self.inner.clone(),
            },
            rx,
        ))
    }
}

pub struct FakeSession {
    id: BusSessionId,
    shared: Arc<FakeSessionShared>,
    bus: Arc<FakeBusInner>,
}

#[async_trait]
impl BusSession for FakeSession {
    fn id(&self) -> BusSessionId {
        self.id
    }

    async fn apply_attrs(
        &self,
        namespace: &str,
        attrs: Vec<(String, String)>,
    ) -> Result<(), BusError> {
        self.shared.attrs.lock().push((namespace.to_string(), attrs));
        Ok(())
    }

    async fn call(
        &self,
        namespace: &str,
        command: &str,
        _payload: Payload,
        _timeout: Duration,
    ) -> Result<CallOutcome, BusError> {
        match self
            .bus
            .scripts
            .remove(&(namespace.to_string(), command.to_string()))
        {
            Some((_, outcome)) => Ok(outcome),
            None => Ok(CallOutcome::Success(Payload::empty_native())),
        }
    }

    async fn call_async(
        &self,
        namespace: &str,
        command: &str,
        payload: Payload,
        timeout: Duration,
    ) -> Result<(), BusError> {
        let outcome = self.call(namespace, command, payload, timeout).await?;
        let tx = self.shared.events.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(BusEvent::AsyncResponse {
                namespace: namespace.to_string(),
                command: command.to_string(),
                outcome,
            });
        }
        Ok(())
    }

    async fn execute(&self, _namespace: &str, _command: &str, _payload: Payload) -> Result<(), BusError> {
        Ok(())
    }

    async fn destroy(&self) {
        self.bus.sessions.remove(&self.id);
        *self.shared.events.lock() = None;
        let _ = self.shared.done_tx.send(true);
    }

    async fn done(&self) {
        let mut rx = self.shared.done_rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}
