//! Connection I/O loop: reader/writer tasks over a [`WsSocket`], a ping
//! ticker, and a shared first-error slot.
//!
//! Grounded on `examples/original_source/src/websock/native/connection_io.go`
//! and the `websock.Socket` trait boundary in `socket.go` /
//! `internal/mock/socket.go`, adapted to `futures::Sink`/`Stream` halves the
//! way `turbomcp-websocket` splits its transport.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use rinq_protocol::{decode_incoming, encode_outgoing, Incoming, Outgoing};
use rinq_wire::FrameCodec;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// A single WebSocket frame, codec-agnostic.
#[derive(Debug, Clone)]
pub enum WsMessage {
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

type BoxSink = Pin<Box<dyn Sink<WsMessage, Error = GatewayError> + Send>>;
type BoxStream = Pin<Box<dyn Stream<Item = Result<WsMessage, GatewayError>> + Send>>;

/// Abstracts the upgraded WebSocket so the connection loop can run against a
/// real socket or, in tests, an in-memory double — the same boundary the
/// source draws with `websock.Socket`.
pub trait WsSocket: Send + 'static {
    fn split(self) -> (BoxSink, BoxStream);
}

/// [`WsSocket`] over a real `axum` WebSocket.
pub struct AxumSocket(pub WebSocket);

impl WsSocket for AxumSocket {
    fn split(self) -> (BoxSink, BoxStream) {
        let (sink, stream) = self.0.split();

        let sink = sink
            .with(|msg: WsMessage| async move {
                Ok::<_, axum::Error>(match msg {
                    WsMessage::Binary(b) => AxumMessage::Binary(b.into()),
                    WsMessage::Ping(b) => AxumMessage::Ping(b.into()),
                    WsMessage::Pong(b) => AxumMessage::Pong(b.into()),
                    WsMessage::Close => AxumMessage::Close(None),
                })
            })
            .sink_map_err(|e| GatewayError::Transport(e.to_string()));

        let stream = stream.map(|item| {
            let msg = item.map_err(|e| GatewayError::Transport(e.to_string()))?;
            Ok(match msg {
                AxumMessage::Binary(b) => WsMessage::Binary(b.to_vec()),
                AxumMessage::Text(t) => WsMessage::Binary(t.into_bytes()),
                AxumMessage::Ping(b) => WsMessage::Ping(b.to_vec()),
                AxumMessage::Pong(b) => WsMessage::Pong(b.to_vec()),
                AxumMessage::Close(_) => WsMessage::Close,
            })
        });

        (Box::pin(sink), Box::pin(stream))
    }
}

/// An in-memory [`WsSocket`] double, analogous to `internal/mock.Socket`.
/// `mock_socket_pair` returns the socket half handed to [`ConnectionIo`] and
/// a [`MockSocketHandle`] a test drives directly.
pub struct MockSocket {
    inbound: mpsc::UnboundedReceiver<WsMessage>,
    outbound: mpsc::UnboundedSender<WsMessage>,
}

pub struct MockSocketHandle {
    pub to_server: mpsc::UnboundedSender<WsMessage>,
    pub from_server: mpsc::UnboundedReceiver<WsMessage>,
}

pub fn mock_socket_pair() -> (MockSocket, MockSocketHandle) {
    let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
    let (from_server_tx, from_server_rx) = mpsc::unbounded_channel();
    (
        MockSocket {
            inbound: to_server_rx,
            outbound: from_server_tx,
        },
        MockSocketHandle {
            to_server: to_server_tx,
            from_server: from_server_rx,
        },
    )
}

impl WsSocket for MockSocket {
    fn split(self) -> (BoxSink, BoxStream) {
        let sink = futures::sink::unfold(self.outbound, |tx, msg: WsMessage| async move {
            tx.send(msg)
                .map_err(|_| GatewayError::Transport("mock socket closed".into()))?;
            Ok::<_, GatewayError>(tx)
        });

        let stream = tokio_stream::wrappers::UnboundedReceiverStream::new(self.inbound).map(Ok);

        (Box::pin(sink), Box::pin(stream))
    }
}

/// Shared "first error wins" slot the reader and writer tasks both write to.
#[derive(Clone, Default)]
struct FirstError(Arc<Mutex<Option<GatewayError>>>);

impl FirstError {
    fn store(&self, err: GatewayError) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take(&self) -> Option<GatewayError> {
        self.0.lock().take()
    }
}

/// Handles to a running connection I/O loop.
pub struct ConnectionIo {
    pub incoming: mpsc::Receiver<Incoming>,
    pub outgoing: mpsc::UnboundedSender<Outgoing>,
    cancel: CancellationToken,
    reader: tokio::task::JoinHandle<()>,
    writer: tokio::task::JoinHandle<()>,
    first_error: FirstError,
}

impl ConnectionIo {
    /// Spawn the reader and writer tasks for `socket`.
    pub fn spawn<S: WsSocket>(socket: S, codec: Arc<dyn FrameCodec>, ping_interval: Duration) -> Self {
        let (sink, stream) = socket.split();
        let (incoming_tx, incoming_rx) = mpsc::channel(64);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let first_error = FirstError::default();

        let reader = tokio::spawn(reader_task(
            stream,
            codec.clone(),
            incoming_tx,
            cancel.clone(),
            first_error.clone(),
            ping_interval * 2,
        ));

        let writer = tokio::spawn(writer_task(
            sink,
            codec,
            outgoing_rx,
            cancel.clone(),
            first_error.clone(),
            ping_interval,
        ));

        ConnectionIo {
            incoming: incoming_rx,
            outgoing: outgoing_tx,
            cancel,
            reader,
            writer,
            first_error,
        }
    }

    /// Signal both tasks to stop and wait for them to finish, returning the
    /// first error either observed (if any).
    pub async fn shutdown(self) -> Option<GatewayError> {
        self.cancel.cancel();
        let _ = self.reader.await;
        let _ = self.writer.await;
        self.first_error.take()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

async fn reader_task(
    mut stream: BoxStream,
    codec: Arc<dyn FrameCodec>,
    incoming_tx: mpsc::Sender<Incoming>,
    cancel: CancellationToken,
    first_error: FirstError,
    read_deadline: Duration,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout(read_deadline, stream.next()) => next,
        };

        let item = match next {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_) => {
                first_error.store(GatewayError::Transport(
                    "read deadline exceeded (missed ping liveness window)".into(),
                ));
                break;
            }
        };

        let msg = match item {
            Ok(msg) => msg,
            Err(err) => {
                first_error.store(err);
                break;
            }
        };

        match msg {
            WsMessage::Binary(bytes) => match decode_incoming(&bytes, codec.as_ref()) {
                Ok(incoming) => {
                    if incoming_tx.send(incoming).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    first_error.store(GatewayError::Protocol(err));
                    break;
                }
            },
            WsMessage::Pong(_) => {
                debug!("pong received, read deadline extended");
            }
            WsMessage::Ping(_) | WsMessage::Close => {
                if matches!(msg, WsMessage::Close) {
                    break;
                }
            }
        }
    }

    cancel.cancel();
}

async fn writer_task(
    mut sink: BoxSink,
    codec: Arc<dyn FrameCodec>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
    cancel: CancellationToken,
    first_error: FirstError,
    ping_interval: Duration,
) {
    let mut ticker = tokio::time::interval(ping_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = outgoing_rx.recv() => {
                let Some(msg) = msg else { break };
                match encode_outgoing(&msg, codec.as_ref()) {
                    Ok(bytes) => {
                        if let Err(err) = sink.send(WsMessage::Binary(bytes)).await {
                            first_error.store(err);
                            break;
                        }
                    }
                    Err(err) => {
                        first_error.store(GatewayError::Protocol(err));
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if let Err(err) = sink.send(WsMessage::Ping(Vec::new())).await {
                    first_error.store(err);
                    break;
                }
            }
        }
    }

    if let Err(err) = sink.close().await {
        warn!(error = %err, "error closing socket sink");
    }
    cancel.cancel();
}
