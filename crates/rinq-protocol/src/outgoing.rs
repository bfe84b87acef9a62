use rinq_wire::{write_frame, FrameCodec, Payload};

use crate::error::ProtocolError;
use crate::header::{
    AsyncErrorHeader, AsyncFailureHeader, AsyncSuccessHeader, NotificationHeader,
    SyncErrorHeader, SyncFailureHeader, SyncSuccessHeader,
};
use crate::types::{MessageType, SessionIndex};

/// A fully typed message to send to the client.
#[derive(Debug, Clone)]
pub enum Outgoing {
    SyncSuccess {
        session: SessionIndex,
        seq: u64,
        payload: Payload,
    },
    SyncFailure {
        session: SessionIndex,
        seq: u64,
        failure_type: String,
        failure_message: String,
        payload: Payload,
    },
    SyncError {
        session: SessionIndex,
        seq: u64,
    },
    AsyncSuccess {
        session: SessionIndex,
        namespace: String,
        command: String,
        payload: Payload,
    },
    AsyncFailure {
        session: SessionIndex,
        namespace: String,
        command: String,
        failure_type: String,
        failure_message: String,
        payload: Payload,
    },
    AsyncError {
        session: SessionIndex,
        namespace: String,
        command: String,
    },
    Notification {
        session: SessionIndex,
        notification_type: String,
        payload: Payload,
    },
    SessionDestroy {
        session: SessionIndex,
    },
}

/// Encode an [`Outgoing`] message into a single WebSocket frame's bytes.
pub fn write_outgoing(message: &Outgoing, codec: &dyn FrameCodec) -> Result<Vec<u8>, ProtocolError> {
    Ok(match message {
        Outgoing::SyncSuccess {
            session,
            seq,
            payload,
        } => {
            let header: SyncSuccessHeader = (*seq,);
            frame(MessageType::SyncSuccess, *session, &header, Some(payload), codec)?
        }
        Outgoing::SyncFailure {
            session,
            seq,
            failure_type,
            failure_message,
            payload,
        } => {
            let header: SyncFailureHeader =
                (*seq, failure_type.clone(), failure_message.clone());
            frame(MessageType::SyncFailure, *session, &header, Some(payload), codec)?
        }
        Outgoing::SyncError { session, seq } => {
            let header: SyncErrorHeader = (*seq,);
            frame::<SyncErrorHeader>(MessageType::SyncError, *session, &header, None, codec)?
        }
        Outgoing::AsyncSuccess {
            session,
            namespace,
            command,
            payload,
        } => {
            let header: AsyncSuccessHeader = (namespace.clone(), command.clone());
            frame(MessageType::AsyncSuccess, *session, &header, Some(payload), codec)?
        }
        Outgoing::AsyncFailure {
            session,
            namespace,
            command,
            failure_type,
            failure_message,
            payload,
        } => {
            let header: AsyncFailureHeader = (
                namespace.clone(),
                command.clone(),
                failure_type.clone(),
                failure_message.clone(),
            );
            frame(MessageType::AsyncFailure, *session, &header, Some(payload), codec)?
        }
        Outgoing::AsyncError {
            session,
            namespace,
            command,
        } => {
            let header: AsyncErrorHeader = (namespace.clone(), command.clone());
            frame::<AsyncErrorHeader>(MessageType::AsyncError, *session, &header, None, codec)?
        }
        Outgoing::Notification {
            session,
            notification_type,
            payload,
        } => {
            let header: NotificationHeader = (notification_type.clone(),);
            frame(MessageType::Notification, *session, &header, Some(payload), codec)?
        }
        Outgoing::SessionDestroy { session } => {
            write_frame(MessageType::SessionDestroy.as_u16(), session.get(), &[], &[])?
        }
    })
}

fn frame<H: serde::Serialize>(
    message_type: MessageType,
    session: SessionIndex,
    header: &H,
    payload: Option<&Payload>,
    codec: &dyn FrameCodec,
) -> Result<Vec<u8>, ProtocolError> {
    let header_bytes = codec.encode_header(header)?;
    let payload_bytes = match payload {
        Some(p) => codec.encode_payload(p)?,
        None => Vec::new(),
    };
    Ok(write_frame(
        message_type.as_u16(),
        session.get(),
        &header_bytes,
        &payload_bytes,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incoming::read_incoming;
    use rinq_wire::{CborCodec, FrameCodec};

    #[test]
    fn sync_success_round_trips_through_the_wire() {
        let codec = CborCodec;
        let msg = Outgoing::SyncSuccess {
            session: SessionIndex::new(4),
            seq: 11,
            payload: Payload::Native(bytes::Bytes::from_static(b"ok")),
        };
        let bytes = write_outgoing(&msg, &codec).unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        assert_eq!(frame.message_type, MessageType::SyncSuccess.as_u16());
        assert_eq!(frame.session, 4);
        let (seq,): SyncSuccessHeader = codec.decode_header(&frame.header).unwrap();
        assert_eq!(seq, 11);
        assert_eq!(frame.payload, b"ok");
    }

    #[test]
    fn sync_error_carries_no_payload_bytes() {
        let codec = CborCodec;
        let msg = Outgoing::SyncError {
            session: SessionIndex::new(1),
            seq: 2,
        };
        let bytes = write_outgoing(&msg, &codec).unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn session_destroy_has_no_header_and_no_payload() {
        let codec = CborCodec;
        let msg = Outgoing::SessionDestroy {
            session: SessionIndex::new(9),
        };
        let bytes = write_outgoing(&msg, &codec).unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        assert!(frame.header.is_empty());
        assert!(frame.payload.is_empty());
        assert_eq!(frame.message_type, MessageType::SessionDestroy.as_u16());
    }

    #[test]
    fn outgoing_is_never_misread_as_incoming_after_unrecognized_check() {
        let codec = CborCodec;
        let msg = Outgoing::Notification {
            session: SessionIndex::new(1),
            notification_type: "widget.created".into(),
            payload: Payload::Native(bytes::Bytes::from_static(b"x")),
        };
        let bytes = write_outgoing(&msg, &codec).unwrap();
        let frame = rinq_wire::read_frame(&bytes).unwrap();
        let err = read_incoming(&frame, &codec).unwrap_err();
        assert!(matches!(err, ProtocolError::UnrecognizedIncomingType(_)));
    }
}
