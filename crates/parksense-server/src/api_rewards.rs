//! Reward balance queries.
//!
//! Both handlers always answer `200`: a ledger that is not ready yet, or a
//! query that fails, reports a zero balance.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use parksense_rewards::{Ledger, SensorBalance};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub ledger_ready: bool,
    pub balances: Vec<SensorBalance>,
}

/// Handler for `GET /api/rewards/balances`.
pub async fn get_all_balances_handler<L: Ledger>(
    Extension(state): Extension<Arc<AppState<L>>>,
) -> Json<BalancesResponse> {
    Json(BalancesResponse {
        ledger_ready: state.rewards.is_ready(),
        balances: state.rewards.get_all_balances().await,
    })
}

/// Handler for `GET /api/rewards/balances/{sensorInstanceId}`.
pub async fn get_balance_handler<L: Ledger>(
    Extension(state): Extension<Arc<AppState<L>>>,
    Path(sensor_instance_id): Path<String>,
) -> Json<SensorBalance> {
    let address = state.rewards.wallets().resolve(&sensor_instance_id);
    let balance = state.rewards.get_balance(&sensor_instance_id).await;
    Json(SensorBalance {
        sensor_instance_id,
        address,
        balance,
    })
}
