use chrono::Utc;
use parksense_ingest::{BroadcastHub, ReadingBroadcast};
use parksense_rewards::{
    Ledger, LedgerError, RewardClient, RewardSettings, TxHandle, TxStatus, WalletDirectory,
};
use parksense_server::{app, AppState};
use parksense_types::{SensorReading, READING_EVENT};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

struct OfflineLedger;

impl Ledger for OfflineLedger {
    async fn program_exists(&self, _program: &str) -> Result<bool, LedgerError> {
        Ok(false)
    }

    async fn deploy_program(&self) -> Result<String, LedgerError> {
        Err(LedgerError::Config("offline".to_string()))
    }

    async fn submit_reward(
        &self,
        _program: &str,
        _recipient: &str,
        _amount: u64,
    ) -> Result<TxHandle, LedgerError> {
        Err(LedgerError::Config("offline".to_string()))
    }

    async fn wait_for_transaction(&self, _handle: &TxHandle) -> Result<TxStatus, LedgerError> {
        Err(LedgerError::Config("offline".to_string()))
    }

    async fn balance_of(&self, _program: &str, _address: &str) -> Result<u64, LedgerError> {
        Ok(0)
    }
}

async fn start_server() -> (String, Arc<BroadcastHub>, watch::Sender<bool>) {
    let hub = Arc::new(BroadcastHub::new(16));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState {
        hub: hub.clone(),
        rewards: Arc::new(RewardClient::new(
            OfflineLedger,
            WalletDirectory::table(Vec::<(String, String)>::new()),
            RewardSettings::default(),
        )),
        shutdown: shutdown_rx,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), hub, shutdown_tx)
}

fn reading() -> SensorReading {
    SensorReading {
        sensor_type: "temperature".to_string(),
        sensor_instance_id: "temp_sensor_1".to_string(),
        value: 21.5,
        unit: "°C".to_string(),
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn live_readings_are_streamed_as_named_events() {
    let (server_url, hub, _shutdown) = start_server().await;

    let mut response = reqwest::Client::new()
        .get(format!("{server_url}/events/readings"))
        .send()
        .await
        .expect("failed to connect to SSE stream");
    assert!(response.status().is_success());

    // Wait for the handler to subscribe before publishing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    hub.publish(READING_EVENT, &reading()).await.unwrap();

    let chunk = response
        .chunk()
        .await
        .expect("failed to read chunk")
        .expect("stream closed");
    let text = String::from_utf8(chunk.to_vec()).unwrap();

    assert!(text.contains("event: sensor_reading"), "chunk: {text}");
    assert!(text.contains("data: "));
    assert!(text.contains("\"sensorInstanceId\":\"temp_sensor_1\""));
    assert!(text.contains("\"value\":21.5"));
}

#[tokio::test]
async fn stream_ends_on_shutdown() {
    let (server_url, _hub, shutdown) = start_server().await;

    let mut response = reqwest::Client::new()
        .get(format!("{server_url}/events/readings"))
        .send()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.send(true).unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(Some(_)) = response.chunk().await {}
    })
    .await;
    assert!(ended.is_ok(), "stream should close after shutdown");
}
