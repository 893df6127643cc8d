//! ParkSense server library logic.

pub mod api_rewards;
pub mod api_sse;
pub mod background;
pub mod config;

use axum::{routing::get, Extension, Json, Router};
use parksense_ingest::BroadcastHub;
use parksense_rewards::{Ledger, RewardClient};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
pub struct AppState<L> {
    /// Live reading fan-out fed by the ingestion worker.
    pub hub: Arc<BroadcastHub>,
    /// Reward client, shared with the ingestion worker.
    pub rewards: Arc<RewardClient<L>>,
    /// Flips to `true` once the process is shutting down; ends live streams.
    pub shutdown: watch::Receiver<bool>,
}

impl<L> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            rewards: Arc::clone(&self.rewards),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Health check handler.
async fn health<L: Ledger>(Extension(state): Extension<Arc<AppState<L>>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ledger_ready": state.rewards.is_ready(),
    }))
}

/// Builds the application router with all routes.
pub fn app<L: Ledger>(state: AppState<L>) -> Router {
    Router::new()
        .route("/health", get(health::<L>))
        .route(
            "/events/readings",
            get(api_sse::get_reading_stream_handler::<L>),
        )
        .route(
            "/api/rewards/balances",
            get(api_rewards::get_all_balances_handler::<L>),
        )
        .route(
            "/api/rewards/balances/{sensorInstanceId}",
            get(api_rewards::get_balance_handler::<L>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
