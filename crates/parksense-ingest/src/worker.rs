//! The ingestion worker: subscription lifecycle and per-message dispatch.

use crate::clock::IngestClock;
use crate::codec;
use crate::error::TransportError;
use crate::sink::{ReadingBroadcast, ReadingSink, Rewarder};
use crate::transport::{Transport, TransportEvent};
use parksense_types::READING_EVENT;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Default wait between a lost connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle state of the worker, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Disconnected,
    Connecting,
    Subscribed,
    Reconnecting,
    Stopped,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Disconnected => "disconnected",
            WorkerState::Connecting => "connecting",
            WorkerState::Subscribed => "subscribed",
            WorkerState::Reconnecting => "reconnecting",
            WorkerState::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Subscription filter; may contain `+`/`#` wildcards.
    pub topic_filter: String,
    /// Fixed backoff before every reconnect attempt.
    pub reconnect_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            topic_filter: "parking/sensor/#".to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// How one inbound message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Codec refused the message; nothing downstream ran.
    Rejected,
    /// Persisting failed; the message was dropped before broadcast and reward.
    StoreFailed,
    /// Persisted, broadcast attempted, reward dispatched.
    Dispatched,
}

/// Per-message half of the worker: codec, persist, broadcast, reward.
///
/// Holds no transport state, so it can be driven directly by tests and is
/// `Sync` regardless of the transport in use.
pub struct ReadingPipeline<S, B, R> {
    sink: Arc<S>,
    broadcast: Arc<B>,
    rewarder: Arc<R>,
    clock: IngestClock,
}

impl<S, B, R> ReadingPipeline<S, B, R>
where
    S: ReadingSink,
    B: ReadingBroadcast,
    R: Rewarder,
{
    pub fn new(sink: Arc<S>, broadcast: Arc<B>, rewarder: Arc<R>) -> Self {
        Self {
            sink,
            broadcast,
            rewarder,
            clock: IngestClock::new(),
        }
    }

    /// Handles one inbound message.
    ///
    /// Persisting and broadcasting are awaited; the reward is spawned and
    /// never awaited. No failure here is returned to the caller.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> HandleOutcome {
        let reading = match codec::parse(topic, payload, self.clock.now()) {
            Ok(reading) => reading,
            Err(reason) => {
                tracing::warn!(topic, %reason, "rejected sensor message");
                return HandleOutcome::Rejected;
            }
        };

        if let Err(e) = self.sink.save(&reading).await {
            tracing::error!(
                sensor_type = %reading.sensor_type,
                sensor_instance_id = %reading.sensor_instance_id,
                error = %e,
                "failed to persist reading, dropping message"
            );
            return HandleOutcome::StoreFailed;
        }

        if let Err(e) = self.broadcast.publish(READING_EVENT, &reading).await {
            tracing::warn!(
                sensor_instance_id = %reading.sensor_instance_id,
                error = %e,
                "failed to broadcast reading"
            );
        }

        tracing::debug!(
            sensor_type = %reading.sensor_type,
            sensor_instance_id = %reading.sensor_instance_id,
            value = reading.value,
            "reading accepted"
        );

        self.dispatch_reward(&reading.sensor_instance_id);
        HandleOutcome::Dispatched
    }

    fn dispatch_reward(&self, sensor_instance_id: &str) {
        let rewarder = Arc::clone(&self.rewarder);
        let id = sensor_instance_id.to_string();
        let task = tokio::spawn(async move {
            rewarder.reward_sensor(&id).await;
        });

        // Supervisor: reward tasks are detached, only their panics are reported.
        let id = sensor_instance_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(sensor_instance_id = %id, "reward task panicked");
                }
            }
        });
    }
}

/// Owns the transport and drives the connect, subscribe, receive and
/// reconnect cycle until shut down.
pub struct IngestionWorker<T, S, B, R> {
    transport: T,
    pipeline: ReadingPipeline<S, B, R>,
    settings: WorkerSettings,
    state: watch::Sender<WorkerState>,
}

impl<T, S, B, R> IngestionWorker<T, S, B, R>
where
    T: Transport,
    S: ReadingSink,
    B: ReadingBroadcast,
    R: Rewarder,
{
    pub fn new(
        transport: T,
        sink: Arc<S>,
        broadcast: Arc<B>,
        rewarder: Arc<R>,
        settings: WorkerSettings,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Disconnected);
        Self {
            transport,
            pipeline: ReadingPipeline::new(sink, broadcast, rewarder),
            settings,
            state,
        }
    }

    /// Subscribes to state transitions.
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Runs until `shutdown` resolves.
    ///
    /// Connection failures and disconnects are never fatal: every one is
    /// followed by the fixed reconnect delay and another attempt. On
    /// shutdown a live connection is closed cleanly. Dispatched reward
    /// tasks are left running.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut attempt: u64 = 0;

        'session: loop {
            if attempt > 0 {
                self.set_state(WorkerState::Reconnecting);
                tracing::info!(
                    attempt,
                    delay_secs = self.settings.reconnect_delay.as_secs_f64(),
                    "waiting before reconnect"
                );
                let stop = tokio::select! {
                    _ = &mut shutdown => true,
                    _ = tokio::time::sleep(self.settings.reconnect_delay) => false,
                };
                if stop {
                    break 'session;
                }
            }
            attempt += 1;

            self.set_state(WorkerState::Connecting);
            let established = tokio::select! {
                _ = &mut shutdown => None,
                result = establish(&mut self.transport, &self.settings.topic_filter) => Some(result),
            };
            match established {
                None => break 'session,
                Some(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "connect/subscribe failed");
                    continue 'session;
                }
                Some(Ok(())) => {
                    tracing::info!(
                        topic_filter = %self.settings.topic_filter,
                        "subscribed"
                    );
                    self.set_state(WorkerState::Subscribed);
                    attempt = 1;
                }
            }

            loop {
                let event = tokio::select! {
                    _ = &mut shutdown => None,
                    event = self.transport.next_event() => Some(event),
                };
                match event {
                    None => break 'session,
                    Some(TransportEvent::Message { topic, payload }) => {
                        self.pipeline.handle_message(&topic, &payload).await;
                    }
                    Some(TransportEvent::Disconnected { reason }) => {
                        tracing::warn!(%reason, "transport disconnected");
                        continue 'session;
                    }
                }
            }
        }

        if self.transport.is_connected() {
            match self.transport.disconnect().await {
                Ok(()) => tracing::info!("disconnected from broker"),
                Err(e) => tracing::warn!(error = %e, "clean disconnect failed"),
            }
        }
        self.set_state(WorkerState::Stopped);
    }

    fn set_state(&self, next: WorkerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = prev.as_str(), to = next.as_str(), "worker state");
        }
    }
}

async fn establish<T: Transport>(transport: &mut T, topic_filter: &str) -> Result<(), TransportError> {
    transport.connect().await?;
    if let Err(e) = transport.subscribe(topic_filter).await {
        if transport.is_connected() {
            let _ = transport.disconnect().await;
        }
        return Err(e);
    }
    Ok(())
}
