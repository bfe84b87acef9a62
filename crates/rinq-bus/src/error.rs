#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus transport error: {0}")]
    Transport(String),

    #[error("bus session has already been destroyed")]
    SessionGone,
}
