use rinq_wire::{Frame, FrameCodec, Payload};

use crate::error::ProtocolError;
use crate::header::{AsyncCallHeader, ExecuteHeader, SyncCallHeader};
use crate::types::{MessageType, SessionIndex};
use crate::visitor::Visitor;

/// A fully decoded message received from the client.
#[derive(Debug, Clone)]
pub enum Incoming {
    SessionCreate {
        session: SessionIndex,
    },
    SessionDestroy {
        session: SessionIndex,
    },
    SyncCall {
        session: SessionIndex,
        seq: u64,
        namespace: String,
        command: String,
        timeout_ms: u64,
        payload: Payload,
    },
    AsyncCall {
        session: SessionIndex,
        namespace: String,
        command: String,
        timeout_ms: u64,
        payload: Payload,
    },
    Execute {
        session: SessionIndex,
        namespace: String,
        command: String,
        payload: Payload,
    },
}

impl Incoming {
    pub fn session(&self) -> SessionIndex {
        match self {
            Incoming::SessionCreate { session }
            | Incoming::SessionDestroy { session }
            | Incoming::SyncCall { session, .. }
            | Incoming::AsyncCall { session, .. }
            | Incoming::Execute { session, .. } => *session,
        }
    }

    /// Dispatch to the matching [`Visitor`] method.
    pub fn accept<V: Visitor>(self, visitor: &mut V) -> Result<(), V::Error> {
        match self {
            Incoming::SessionCreate { session } => visitor.visit_session_create(session),
            Incoming::SessionDestroy { session } => visitor.visit_session_destroy(session),
            Incoming::SyncCall {
                session,
                seq,
                namespace,
                command,
                timeout_ms,
                payload,
            } => visitor.visit_sync_call(session, seq, namespace, command, timeout_ms, payload),
            Incoming::AsyncCall {
                session,
                namespace,
                command,
                timeout_ms,
                payload,
            } => visitor.visit_async_call(session, namespace, command, timeout_ms, payload),
            Incoming::Execute {
                session,
                namespace,
                command,
                payload,
            } => visitor.visit_execute(session, namespace, command, payload),
        }
    }
}

/// Decode a [`Frame`] already read off the wire into a typed [`Incoming`]
/// message. Message types that carry no payload (`SC`, `SD`) must leave no
/// trailing bytes in the frame; everything else simply treats the whole
/// remainder as its payload.
pub fn read_incoming(frame: &Frame, codec: &dyn FrameCodec) -> Result<Incoming, ProtocolError> {
    let message_type = MessageType::try_from(frame.message_type)
        .map_err(ProtocolError::UnrecognizedIncomingType)?;
    let session = SessionIndex::new(frame.session);

    match message_type {
        MessageType::SessionCreate => {
            no_trailing_payload(frame)?;
            Ok(Incoming::SessionCreate { session })
        }
        MessageType::SessionDestroy => {
            no_trailing_payload(frame)?;
            Ok(Incoming::SessionDestroy { session })
        }
        MessageType::SyncCall => {
            let (seq, namespace, command, timeout_ms): SyncCallHeader =
                codec.decode_header(&frame.header)?;
            let payload = codec.decode_payload(&frame.payload)?;
            Ok(Incoming::SyncCall {
                session,
                seq,
                namespace,
                command,
                timeout_ms,
                payload,
            })
        }
        MessageType::AsyncCall => {
            let (namespace, command, timeout_ms): AsyncCallHeader =
                codec.decode_header(&frame.header)?;
            let payload = codec.decode_payload(&frame.payload)?;
            Ok(Incoming::AsyncCall {
                session,
                namespace,
                command,
                timeout_ms,
                payload,
            })
        }
        MessageType::Execute => {
            let (namespace, command): ExecuteHeader = codec.decode_header(&frame.header)?;
            let payload = codec.decode_payload(&frame.payload)?;
            Ok(Incoming::Execute {
                session,
                namespace,
                command,
                payload,
            })
        }
        other => Err(ProtocolError::UnrecognizedIncomingType(other.as_u16())),
    }
}

fn no_trailing_payload(frame: &Frame) -> Result<(), ProtocolError> {
    if frame.payload.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::UnconsumedFrameData(frame.message_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rinq_wire::{write_frame, CborCodec, FrameCodec};

    #[test]
    fn decodes_a_sync_call() {
        let codec = CborCodec;
        let header: SyncCallHeader = (9, "ns".into(), "cmd".into(), 2500);
        let header_bytes = codec.encode_header(&header).unwrap();
        let bytes = write_frame(
            MessageType::SyncCall.as_u16(),
            7,
            &header_bytes,
            b"payload",
        )
        .unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();

        let msg = read_incoming(&frame, &codec).unwrap();
        match msg {
            Incoming::SyncCall {
                session,
                seq,
                namespace,
                command,
                timeout_ms,
                payload,
            } => {
                assert_eq!(session, SessionIndex::new(7));
                assert_eq!(seq, 9);
                assert_eq!(namespace, "ns");
                assert_eq!(command, "cmd");
                assert_eq!(timeout_ms, 2500);
                assert_eq!(payload, Payload::Native(bytes::Bytes::from_static(b"payload")));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn session_create_rejects_trailing_payload() {
        let codec = CborCodec;
        let bytes = write_frame(MessageType::SessionCreate.as_u16(), 1, &[], b"oops").unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        let err = read_incoming(&frame, &codec).unwrap_err();
        assert!(matches!(err, ProtocolError::UnconsumedFrameData(_)));
    }

    #[test]
    fn session_create_with_empty_payload_decodes() {
        let codec = CborCodec;
        let bytes = write_frame(MessageType::SessionCreate.as_u16(), 3, &[], &[]).unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        let msg = read_incoming(&frame, &codec).unwrap();
        assert!(matches!(msg, Incoming::SessionCreate { session } if session == SessionIndex::new(3)));
    }

    #[test]
    fn rejects_an_outgoing_only_tag_as_incoming() {
        let codec = CborCodec;
        let bytes = write_frame(MessageType::SyncSuccess.as_u16(), 1, &[], &[]).unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        let err = read_incoming(&frame, &codec).unwrap_err();
        assert!(matches!(err, ProtocolError::UnrecognizedIncomingType(_)));
    }

    #[test]
    fn rejects_an_unknown_tag() {
        let codec = CborCodec;
        let bytes = write_frame(0x0000, 1, &[], &[]).unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        let err = read_incoming(&frame, &codec).unwrap_err();
        assert!(matches!(err, ProtocolError::UnrecognizedIncomingType(0)));
    }
}
