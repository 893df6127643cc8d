//! Background tasks for the ParkSense server.
//!
//! Includes:
//! - The ledger readiness protocol.
//! - The ingestion worker.
//!
//! Both stop when the shared shutdown flag flips to `true`.

use parksense_ingest::{IngestionWorker, ReadingBroadcast, ReadingSink, Rewarder, Transport};
use parksense_rewards::{InitOutcome, Ledger, RewardClient};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Resolves once `shutdown` reads `true` or its sender is gone.
pub async fn stopping(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}

/// Starts the readiness protocol alongside normal operation.
///
/// Ingestion runs from the start; rewards are skipped until this task marks
/// the ledger ready.
pub fn spawn_readiness_task<L: Ledger>(
    rewards: Arc<RewardClient<L>>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            outcome = rewards.initialize() => {
                if !matches!(outcome, InitOutcome::Ready { .. }) {
                    tracing::debug!(?outcome, "readiness task gave up");
                }
            }
            () = stopping(shutdown) => {
                tracing::info!("shutdown before ledger became ready, readiness polling stopped");
            }
        }
    })
}

/// Runs the ingestion worker until shutdown.
pub fn spawn_ingestion_worker<T, S, B, R>(
    worker: IngestionWorker<T, S, B, R>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    T: Transport,
    S: ReadingSink,
    B: ReadingBroadcast,
    R: Rewarder,
{
    tokio::spawn(worker.run(stopping(shutdown)))
}
