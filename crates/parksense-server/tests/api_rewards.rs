use axum::body::Body;
use axum::http::{Request, StatusCode};
use parksense_ingest::BroadcastHub;
use parksense_rewards::{
    Ledger, LedgerError, RewardClient, RewardSettings, TxHandle, TxStatus, WalletDirectory,
};
use parksense_server::{app, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

/// Ledger double with fixed balances; `0xbroken` fails every balance query.
struct StubLedger {
    balances: HashMap<String, u64>,
}

impl Ledger for StubLedger {
    async fn program_exists(&self, program: &str) -> Result<bool, LedgerError> {
        Ok(program == "0xprogram")
    }

    async fn deploy_program(&self) -> Result<String, LedgerError> {
        Err(LedgerError::Config("no bundle".to_string()))
    }

    async fn submit_reward(
        &self,
        _program: &str,
        _recipient: &str,
        _amount: u64,
    ) -> Result<TxHandle, LedgerError> {
        Ok(TxHandle("0xtx".to_string()))
    }

    async fn wait_for_transaction(&self, _handle: &TxHandle) -> Result<TxStatus, LedgerError> {
        Ok(TxStatus::Confirmed)
    }

    async fn balance_of(&self, _program: &str, address: &str) -> Result<u64, LedgerError> {
        if address == "0xbroken" {
            return Err(LedgerError::Status {
                status: 500,
                body: "gateway down".to_string(),
            });
        }
        Ok(self.balances.get(address).copied().unwrap_or(0))
    }
}

fn setup() -> (axum::Router, Arc<RewardClient<StubLedger>>, watch::Sender<bool>) {
    let ledger = StubLedger {
        balances: HashMap::from([("0xaaa1".to_string(), 12), ("0xaaa2".to_string(), 3)]),
    };
    let wallets = WalletDirectory::table([
        ("temp_sensor_1", "0xaaa1"),
        ("bay_7", "0xaaa2"),
        ("co_1", "0xbroken"),
    ]);
    let rewards = Arc::new(RewardClient::new(
        ledger,
        wallets,
        RewardSettings {
            program_address: Some("0xprogram".to_string()),
            ..RewardSettings::default()
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let router = app(AppState {
        hub: Arc::new(BroadcastHub::new(16)),
        rewards: rewards.clone(),
        shutdown: shutdown_rx,
    });
    (router, rewards, shutdown_tx)
}

async fn get_json(router: axum::Router, uri: &str) -> Value {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_ledger_readiness() {
    let (router, rewards, _shutdown) = setup();

    let json = get_json(router.clone(), "/health").await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["ledger_ready"], false);

    rewards.initialize().await;

    let json = get_json(router, "/health").await;
    assert_eq!(json["ledger_ready"], true);
}

#[tokio::test]
async fn balances_are_zero_before_ledger_ready() {
    let (router, _rewards, _shutdown) = setup();

    let json = get_json(router, "/api/rewards/balances").await;
    assert_eq!(json["ledgerReady"], false);
    let balances = json["balances"].as_array().unwrap();
    assert_eq!(balances.len(), 3);
    assert!(balances.iter().all(|b| b["balance"] == 0));
}

#[tokio::test]
async fn all_balances_after_ready() {
    let (router, rewards, _shutdown) = setup();
    rewards.initialize().await;

    let json = get_json(router, "/api/rewards/balances").await;
    assert_eq!(json["ledgerReady"], true);

    let by_sensor: HashMap<String, u64> = json["balances"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| {
            (
                b["sensorInstanceId"].as_str().unwrap().to_string(),
                b["balance"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(by_sensor["temp_sensor_1"], 12);
    assert_eq!(by_sensor["bay_7"], 3);
    // A failing query reports zero instead of an error.
    assert_eq!(by_sensor["co_1"], 0);
}

#[tokio::test]
async fn single_balance_includes_resolved_address() {
    let (router, rewards, _shutdown) = setup();
    rewards.initialize().await;

    let json = get_json(router.clone(), "/api/rewards/balances/temp_sensor_1").await;
    assert_eq!(json["sensorInstanceId"], "temp_sensor_1");
    assert_eq!(json["address"], "0xaaa1");
    assert_eq!(json["balance"], 12);

    let json = get_json(router, "/api/rewards/balances/unknown_sensor").await;
    assert_eq!(json["address"], parksense_rewards::BURN_ADDRESS);
    assert_eq!(json["balance"], 0);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (router, _rewards, _shutdown) = setup();
    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/readings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
