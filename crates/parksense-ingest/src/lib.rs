//! Sensor telemetry ingestion.
//!
//! The [`IngestionWorker`] owns a pub/sub [`Transport`] subscription and
//! keeps it alive forever: connect, subscribe, receive, and on any
//! disconnect wait a fixed delay and start over. Each inbound message runs
//! through the [`codec`]; accepted readings are persisted and broadcast
//! (both awaited) and then handed to a [`Rewarder`] on a detached task so
//! the ledger can never stall ingestion.

pub mod clock;
pub mod codec;
pub mod error;
pub mod sink;
pub mod transport;
pub mod worker;

pub use clock::IngestClock;
pub use error::{RejectReason, SinkError, TransportError};
pub use sink::{BroadcastHub, ReadingBroadcast, ReadingSink, Rewarder, SqliteSink};
pub use transport::{MqttSettings, MqttTransport, Transport, TransportEvent};
pub use worker::{
    HandleOutcome, IngestionWorker, ReadingPipeline, WorkerSettings, WorkerState,
    DEFAULT_RECONNECT_DELAY,
};
