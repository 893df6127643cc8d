//! Downstream seams of the ingestion worker and their concrete adapters.

use crate::error::SinkError;
use parksense_db::{insert_reading, DbPool};
use parksense_rewards::{Ledger, RewardClient};
use parksense_types::{LiveEvent, SensorReading};
use std::future::Future;
use tokio::sync::broadcast;

/// Durable store of accepted readings.
pub trait ReadingSink: Send + Sync + 'static {
    fn save(&self, reading: &SensorReading) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Fan-out of accepted readings to connected live viewers.
pub trait ReadingBroadcast: Send + Sync + 'static {
    fn publish(
        &self,
        event: &str,
        reading: &SensorReading,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Fire-and-forget reward side effect. Implementations absorb their own
/// failures; there is nothing to return.
pub trait Rewarder: Send + Sync + 'static {
    fn reward_sensor(&self, sensor_instance_id: &str) -> impl Future<Output = ()> + Send;
}

/// Writes readings into the `sensor_readings` table.
#[derive(Clone)]
pub struct SqliteSink {
    pool: DbPool,
}

impl SqliteSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ReadingSink for SqliteSink {
    async fn save(&self, reading: &SensorReading) -> Result<(), SinkError> {
        let pool = self.pool.clone();
        let reading = reading.clone();
        tokio::task::spawn_blocking(move || -> Result<(), SinkError> {
            let conn = pool.get().map_err(parksense_db::DbError::from)?;
            let id = insert_reading(&conn, &reading)?;
            tracing::trace!(row_id = id, "reading stored");
            Ok(())
        })
        .await?
    }
}

/// In-process live event hub backed by a `tokio::sync::broadcast` channel.
#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<LiveEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }
}

impl ReadingBroadcast for BroadcastHub {
    async fn publish(&self, event: &str, reading: &SensorReading) -> Result<(), SinkError> {
        let event = LiveEvent {
            event: event.to_string(),
            reading: reading.clone(),
        };
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(receivers, "live event published");
            }
            Err(_) => {
                tracing::debug!("no live viewers connected, event dropped");
            }
        }
        Ok(())
    }
}

impl<L: Ledger> Rewarder for RewardClient<L> {
    async fn reward_sensor(&self, sensor_instance_id: &str) {
        // Outcome is already logged by the client.
        let _ = RewardClient::reward_sensor(self, sensor_instance_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parksense_db::{count_readings, create_pool, run_migrations, DbRuntimeSettings};
    use parksense_types::READING_EVENT;

    fn reading() -> SensorReading {
        SensorReading {
            sensor_type: "occupancy".to_string(),
            sensor_instance_id: "bay_7".to_string(),
            value: 1.0,
            unit: "status".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sqlite_sink_persists_reading() {
        let pool = create_pool(
            ":memory:",
            DbRuntimeSettings {
                pool_max_size: 1,
                ..DbRuntimeSettings::default()
            },
        )
        .unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();

        let sink = SqliteSink::new(pool.clone());
        sink.save(&reading()).await.unwrap();
        sink.save(&reading()).await.unwrap();

        let conn = pool.get().unwrap();
        assert_eq!(count_readings(&conn, Some("bay_7")).unwrap(), 2);
    }

    #[tokio::test]
    async fn sqlite_sink_reports_missing_table() {
        let pool = create_pool(
            ":memory:",
            DbRuntimeSettings {
                pool_max_size: 1,
                ..DbRuntimeSettings::default()
            },
        )
        .unwrap();

        let sink = SqliteSink::new(pool);
        assert!(matches!(
            sink.save(&reading()).await,
            Err(SinkError::Store(_))
        ));
    }

    #[tokio::test]
    async fn hub_delivers_to_subscribers() {
        let hub = BroadcastHub::new(8);
        let mut rx = hub.subscribe();

        hub.publish(READING_EVENT, &reading()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, READING_EVENT);
        assert_eq!(event.reading.sensor_instance_id, "bay_7");
    }

    #[tokio::test]
    async fn hub_without_subscribers_is_ok() {
        let hub = BroadcastHub::new(8);
        assert!(hub.publish(READING_EVENT, &reading()).await.is_ok());
    }
}
