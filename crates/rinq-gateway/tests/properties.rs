//! Property-style integration tests for session-index lifecycle, at-most-one
//! `SD` per index, and write serialization, exercised end-to-end through the
//! handler the same way `tests/scenarios.rs` does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rinq_bus::{CallOutcome, FakeBus};
use rinq_gateway::{mock_socket_pair, Encoding, GatewayHandler, MockSocketHandle, Options, WsMessage};
use rinq_protocol::{MessageType, SyncCallHeader, SyncSuccessHeader};
use rinq_wire::{read_frame, write_frame, Payload};

fn client_frame(message_type: MessageType, session: u16, header: &[u8], payload: &[u8]) -> WsMessage {
    WsMessage::Binary(write_frame(message_type.as_u16(), session, header, payload).unwrap())
}

fn json<T: serde::Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

struct DecodedFrame {
    message_type: u16,
    session: u16,
    header: Vec<u8>,
    payload: Vec<u8>,
}

fn decode(msg: WsMessage) -> DecodedFrame {
    let WsMessage::Binary(bytes) = msg else {
        panic!("expected a binary frame, got {msg:?}")
    };
    let frame = read_frame(&bytes).unwrap();
    DecodedFrame {
        message_type: frame.message_type,
        session: frame.session,
        header: frame.header,
        payload: frame.payload,
    }
}

async fn recv_data_frame(handle: &mut MockSocketHandle, timeout: Duration) -> Option<DecodedFrame> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, handle.from_server.recv()).await {
            Ok(Some(WsMessage::Ping(_))) => continue,
            Ok(Some(msg)) => return Some(decode(msg)),
            Ok(None) | Err(_) => return None,
        }
    }
}

fn handler(bus: FakeBus) -> Arc<GatewayHandler<FakeBus>> {
    Arc::new(GatewayHandler::new(Arc::new(bus), Encoding::Json, Options::default()).unwrap())
}

/// A session index cannot be created twice while live; doing so is a fatal
/// session-state error that tears down the whole connection.
#[tokio::test]
async fn duplicate_session_create_terminates_the_connection() {
    let gw = handler(FakeBus::new());
    let (socket, mut handle) = mock_socket_pair();
    let task = tokio::spawn(async move { gw.handle(socket, vec![]).await });

    handle.to_server.send(client_frame(MessageType::SessionCreate, 1, &[], &[])).unwrap();
    handle.to_server.send(client_frame(MessageType::SessionCreate, 1, &[], &[])).unwrap();

    tokio::time::timeout(Duration::from_millis(500), task)
        .await
        .expect("connection should terminate after the duplicate create")
        .unwrap();

    assert!(recv_data_frame(&mut handle, Duration::from_millis(50)).await.is_none());
}

/// Once an index reaches `Gone` (client-initiated destroy), it may be reused
/// by a later `SC` on the same connection.
#[tokio::test]
async fn index_is_reusable_after_client_destroy() {
    let bus = FakeBus::new();
    bus.script("ns", "cmd", CallOutcome::Success(Payload::Foreign(serde_json::json!("pong"))));
    let gw = handler(bus);
    let (socket, mut handle) = mock_socket_pair();
    tokio::spawn(async move { gw.handle(socket, vec![]).await });

    handle.to_server.send(client_frame(MessageType::SessionCreate, 1, &[], &[])).unwrap();
    handle.to_server.send(client_frame(MessageType::SessionDestroy, 1, &[], &[])).unwrap();
    // give the destroy a moment to clear the slot before recreating it
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.to_server.send(client_frame(MessageType::SessionCreate, 1, &[], &[])).unwrap();

    let header: SyncCallHeader = (1, "ns".into(), "cmd".into(), 1000);
    handle
        .to_server
        .send(client_frame(MessageType::SyncCall, 1, &json(&header), &json(&"ping")))
        .unwrap();

    let frame = recv_data_frame(&mut handle, Duration::from_millis(500))
        .await
        .expect("the recreated session should answer sync calls");
    assert_eq!(frame.message_type, MessageType::SyncSuccess.as_u16());
}

/// A client-initiated destroy never produces a server `SD`.
#[tokio::test]
async fn client_destroy_emits_no_server_sd() {
    let gw = handler(FakeBus::new());
    let (socket, mut handle) = mock_socket_pair();
    tokio::spawn(async move { gw.handle(socket, vec![]).await });

    handle.to_server.send(client_frame(MessageType::SessionCreate, 1, &[], &[])).unwrap();
    handle.to_server.send(client_frame(MessageType::SessionDestroy, 1, &[], &[])).unwrap();

    assert!(recv_data_frame(&mut handle, Duration::from_millis(200)).await.is_none());
}

/// Unsolicited bus-side termination produces exactly one `SD`, never more.
#[tokio::test]
async fn bus_side_kill_emits_exactly_one_sd() {
    let bus = FakeBus::new();
    let gw = handler(bus.clone());
    let (socket, mut handle) = mock_socket_pair();
    tokio::spawn(async move { gw.handle(socket, vec![]).await });

    handle.to_server.send(client_frame(MessageType::SessionCreate, 1, &[], &[])).unwrap();

    let id = {
        let mut id = None;
        for _ in 0..100 {
            if let Some(first) = bus.session_ids().first().copied() {
                id = Some(first);
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        id.expect("session was never created")
    };
    bus.kill(id);

    let frame = recv_data_frame(&mut handle, Duration::from_millis(500))
        .await
        .expect("expected one SD frame");
    assert_eq!(frame.message_type, MessageType::SessionDestroy.as_u16());
    assert_eq!(frame.session, 1);

    assert!(recv_data_frame(&mut handle, Duration::from_millis(150)).await.is_none());
}

/// Concurrently in-flight sync calls never corrupt each other's bytes on the
/// wire — every response decodes cleanly and its payload matches the seq it
/// was scripted for.
#[tokio::test]
async fn concurrent_sync_calls_never_interleave_on_the_wire() {
    let bus = FakeBus::new();
    const N: u64 = 24;
    for seq in 0..N {
        bus.script(
            &format!("ns{seq}"),
            "cmd",
            CallOutcome::Success(Payload::Foreign(serde_json::json!(format!("payload-{seq}")))),
        );
    }
    let gw = handler(bus);
    let (socket, mut handle) = mock_socket_pair();
    tokio::spawn(async move { gw.handle(socket, vec![]).await });

    handle.to_server.send(client_frame(MessageType::SessionCreate, 1, &[], &[])).unwrap();
    for seq in 0..N {
        let header: SyncCallHeader = (seq, format!("ns{seq}"), "cmd".into(), 2000);
        handle
            .to_server
            .send(client_frame(MessageType::SyncCall, 1, &json(&header), &json(&"x")))
            .unwrap();
    }

    let mut seen: HashMap<u64, Vec<u8>> = HashMap::new();
    while seen.len() < N as usize {
        let frame = recv_data_frame(&mut handle, Duration::from_millis(1000))
            .await
            .expect("expected all N sync responses");
        assert_eq!(frame.message_type, MessageType::SyncSuccess.as_u16());
        let (seq,): SyncSuccessHeader = serde_json::from_slice(&frame.header).unwrap();
        seen.insert(seq, frame.payload);
    }

    for seq in 0..N {
        let payload = seen.get(&seq).unwrap();
        assert_eq!(payload, &json(&format!("payload-{seq}")));
    }
}
