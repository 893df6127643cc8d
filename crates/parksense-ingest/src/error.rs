//! Error types for the ingestion pipeline.

/// Why the codec refused a transport message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// Topic does not match `<namespace>/<category>/<sensorType>/<sensorInstanceId>`.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// Payload is not a finite decimal number.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Errors raised by a pub/sub transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection options are unusable; the transport cannot be built.
    #[error("invalid transport options: {0}")]
    Options(String),

    /// The broker could not be reached or refused the connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The broker refused or never acknowledged the subscription.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Operation attempted without a live connection.
    #[error("transport is not connected")]
    NotConnected,

    /// Clean disconnect could not be sent.
    #[error("disconnect failed: {0}")]
    Disconnect(String),
}

/// Errors from the persistence sink or live broadcast.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing the reading failed.
    #[error("store error: {0}")]
    Store(#[from] parksense_db::DbError),

    /// Publishing to live viewers failed.
    #[error("broadcast error: {0}")]
    Broadcast(String),

    /// The blocking write task panicked or was cancelled.
    #[error("sink task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
