//! `HttpLedger` against an in-process mock of the ledger REST gateway.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parksense_rewards::{HttpLedger, Ledger, LedgerConfig, LedgerError, TxStatus};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct Gateway {
    sequence_number: Mutex<u64>,
    submitted: Mutex<Vec<Value>>,
    status_polls: Mutex<HashMap<String, u32>>,
}

async fn get_program(Path(address): Path<String>) -> Response {
    if address == "0xprogram" {
        Json(json!({ "address": address })).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_account(State(gw): State<Arc<Gateway>>, Path(_address): Path<String>) -> Json<Value> {
    let seq = *gw.sequence_number.lock().unwrap();
    Json(json!({ "sequence_number": seq }))
}

async fn post_transaction(State(gw): State<Arc<Gateway>>, Json(body): Json<Value>) -> Json<Value> {
    let mut seq = gw.sequence_number.lock().unwrap();
    let hash = format!("0xtx{}", *seq);
    *seq += 1;
    let is_deploy = body["payload"]["type"] == "deploy";
    gw.submitted.lock().unwrap().push(body);
    if is_deploy {
        Json(json!({ "hash": hash, "program_address": "0xdeployed" }))
    } else {
        Json(json!({ "hash": hash }))
    }
}

async fn get_transaction(State(gw): State<Arc<Gateway>>, Path(hash): Path<String>) -> Response {
    let mut polls = gw.status_polls.lock().unwrap();
    let count = polls.entry(hash).or_insert(0);
    *count += 1;
    match *count {
        1 => StatusCode::NOT_FOUND.into_response(),
        2 => Json(json!({ "pending": true, "success": false })).into_response(),
        _ => Json(json!({ "pending": false, "success": true, "vm_status": "Executed" }))
            .into_response(),
    }
}

async fn get_balance(Path((_program, _address)): Path<(String, String)>) -> Json<Value> {
    Json(json!({ "balance": 42 }))
}

async fn spawn_gateway() -> (String, Arc<Gateway>) {
    let gateway = Arc::new(Gateway::default());
    let app = Router::new()
        .route("/v1/programs/{address}", get(get_program))
        .route(
            "/v1/programs/{program}/balances/{address}",
            get(get_balance),
        )
        .route("/v1/accounts/{address}", get(get_account))
        .route("/v1/transactions", post(post_transaction))
        .route("/v1/transactions/{hash}", get(get_transaction))
        .with_state(gateway.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), gateway)
}

fn config(endpoint: &str) -> LedgerConfig {
    LedgerConfig {
        endpoint: endpoint.to_string(),
        payer_private_key: "11".repeat(32),
        confirmation_poll_ms: 10,
        submission_timeout_secs: 5,
        ..LedgerConfig::default()
    }
}

#[tokio::test]
async fn program_existence_maps_404_to_false() {
    let (endpoint, _gw) = spawn_gateway().await;
    let ledger = HttpLedger::from_config(&config(&endpoint)).unwrap();

    assert!(ledger.program_exists("0xprogram").await.unwrap());
    assert!(!ledger.program_exists("0xmissing").await.unwrap());
}

#[tokio::test]
async fn reward_is_signed_sequenced_and_confirmed() {
    let (endpoint, gw) = spawn_gateway().await;
    let ledger = HttpLedger::from_config(&config(&endpoint)).unwrap();

    let first = ledger.submit_reward("0xprogram", "0xaaa1", 1).await.unwrap();
    assert_eq!(
        ledger.wait_for_transaction(&first).await.unwrap(),
        TxStatus::Confirmed
    );
    let second = ledger.submit_reward("0xprogram", "0xaaa2", 1).await.unwrap();
    assert_ne!(first, second);

    let submitted = gw.submitted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 2);

    let body = &submitted[0];
    assert_eq!(body["sender"], ledger.sender_address());
    assert_eq!(body["sequence_number"], 0);
    assert_eq!(body["chain_id"], 4);
    assert_eq!(body["payload"]["type"], "reward");
    assert_eq!(body["payload"]["program"], "0xprogram");
    assert_eq!(body["payload"]["recipient"], "0xaaa1");
    assert_eq!(body["payload"]["amount"], 1);
    assert_eq!(body["signature"].as_str().unwrap().len(), 128);
    assert_eq!(body["public_key"].as_str().unwrap().len(), 64);

    assert_eq!(submitted[1]["sequence_number"], 1);
}

#[tokio::test]
async fn deploy_reads_bundle_and_waits_for_confirmation() {
    let (endpoint, gw) = spawn_gateway().await;
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("payout.bundle");
    std::fs::write(&bundle, [0xca, 0xfe]).unwrap();

    let ledger = HttpLedger::from_config(&LedgerConfig {
        program_bundle_path: Some(bundle.to_string_lossy().into_owned()),
        ..config(&endpoint)
    })
    .unwrap();

    assert_eq!(ledger.deploy_program().await.unwrap(), "0xdeployed");

    let submitted = gw.submitted.lock().unwrap().clone();
    assert_eq!(submitted[0]["payload"]["type"], "deploy");
    assert_eq!(submitted[0]["payload"]["bundle_hex"], "cafe");
}

#[tokio::test]
async fn deploy_without_bundle_is_a_config_error() {
    let (endpoint, gw) = spawn_gateway().await;
    let ledger = HttpLedger::from_config(&config(&endpoint)).unwrap();

    assert!(matches!(
        ledger.deploy_program().await,
        Err(LedgerError::Config(_))
    ));
    assert!(gw.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn balance_is_read_from_gateway() {
    let (endpoint, _gw) = spawn_gateway().await;
    let ledger = HttpLedger::from_config(&config(&endpoint)).unwrap();

    assert_eq!(ledger.balance_of("0xprogram", "0xaaa1").await.unwrap(), 42);
}

#[test]
fn missing_payer_key_fails_construction() {
    let result = HttpLedger::from_config(&LedgerConfig::default());
    assert!(matches!(result, Err(LedgerError::InvalidKey(_))));
}

#[test]
fn ledger_config_parses_from_toml() {
    let config: LedgerConfig = toml::from_str(
        r#"
        endpoint = "https://ledger.example:8443"
        payer_private_key = "0x2222222222222222222222222222222222222222222222222222222222222222"
        program_address = "0xprogram"
        chain_id = 2
        reward_amount = 5
        "#,
    )
    .unwrap();

    assert_eq!(config.chain_id, 2);
    assert_eq!(config.poll_attempts, 30);
    let settings = config.reward_settings();
    assert_eq!(settings.program_address.as_deref(), Some("0xprogram"));
    assert_eq!(settings.reward_amount, 5);
    assert!(HttpLedger::from_config(&config).is_ok());
}
