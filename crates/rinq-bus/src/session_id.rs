use std::fmt;

/// Identity of a bus session, stable for the session's lifetime. Used as the
/// key of the multiplexer's reverse map (`rinq-gateway`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusSessionId(pub u64);

impl fmt::Display for BusSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
