use rinq_wire::Payload;

/// The three ways a call against the bus can resolve without being a fatal
/// transport error. Anything else the bus returns is a [`crate::BusError`]
/// and is fatal to the connection.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    /// The command completed normally.
    Success(Payload),
    /// A business-level failure the bus chose to report in detail.
    Failure {
        failure_type: String,
        failure_message: String,
        payload: Payload,
    },
    /// An opaque command error; no detail may reach the client.
    Error,
}

/// Something the bus delivers to a session without being asked for it in the
/// moment: a notification, or the eventual response to an async call.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Notification {
        notification_type: String,
        payload: Payload,
    },
    AsyncResponse {
        namespace: String,
        command: String,
        outcome: CallOutcome,
    },
}
