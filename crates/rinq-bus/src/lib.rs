//! The trait boundary to the downstream bus peer.
//!
//! The core gateway is specified only by the interface it consumes from the
//! bus (sessions, calls, notifications); the real bus client library is an
//! external collaborator never built here. This crate also carries
//! [`FakeBus`], an in-memory double the workspace's own tests drive,
//! analogous to `internal/mock` in the project this system is distilled
//! from.

mod error;
mod fake;
mod outcome;
mod session_id;
mod traits;

pub use error::BusError;
pub use fake::{FakeBus, FakeSession};
pub use outcome::{BusEvent, CallOutcome};
pub use session_id::BusSessionId;
pub use traits::{BusClient, BusSession};
