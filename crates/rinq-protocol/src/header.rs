//! Header tuple shapes, one per message type that carries one.
//!
//! Plain tuples already serialize as positional arrays under both
//! `serde_json` and `ciborium`, so these aliases exist purely for
//! readability at call sites; there is no struct-to-array adapter to
//! configure.

/// `(seq, namespace, command, timeout_ms)`
pub type SyncCallHeader = (u64, String, String, u64);
/// `(seq,)`
pub type SyncSuccessHeader = (u64,);
/// `(seq, failure_type, failure_message)`
pub type SyncFailureHeader = (u64, String, String);
/// `(seq,)`
pub type SyncErrorHeader = (u64,);

/// `(namespace, command, timeout_ms)`
pub type AsyncCallHeader = (String, String, u64);
/// `(namespace, command)`
pub type AsyncSuccessHeader = (String, String);
/// `(namespace, command, failure_type, failure_message)`
pub type AsyncFailureHeader = (String, String, String, String);
/// `(namespace, command)`
pub type AsyncErrorHeader = (String, String);

/// `(namespace, command)`
pub type ExecuteHeader = (String, String);

/// `(notification_type,)`
pub type NotificationHeader = (String,);
