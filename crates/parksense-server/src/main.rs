//! ParkSense server binary.
//!
//! Wires the reading store, the reward client and the MQTT ingestion worker
//! together, serves the HTTP surface, and shuts everything down on
//! SIGTERM/SIGINT.

use parksense_ingest::{BroadcastHub, IngestionWorker, MqttTransport, SqliteSink};
use parksense_rewards::{HttpLedger, RewardClient, WalletDirectory};
use parksense_server::{app, background, config, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Picks the config file: first CLI argument, then `PARKSENSE_CONFIG_PATH`,
/// then `config.toml` in the working directory.
fn config_path() -> (String, &'static str) {
    let non_blank = |value: &String| !value.trim().is_empty();
    if let Some(path) = std::env::args().nth(1).filter(non_blank) {
        (path, "cli-arg")
    } else if let Some(path) = std::env::var("PARKSENSE_CONFIG_PATH").ok().filter(non_blank) {
        (path, "env-var")
    } else {
        (DEFAULT_CONFIG_PATH.to_string(), "default")
    }
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() {
    let (config_path, config_source) = config_path();
    let (config, origin) = config::load_config(Some(&config_path))
        .expect("failed to load configuration; the server cannot start without valid config");
    init_tracing(&config.logging);
    match origin {
        config::ConfigOrigin::File => {
            tracing::info!(source = config_source, path = %config_path, "loaded configuration");
        }
        config::ConfigOrigin::Defaults => {
            tracing::info!(
                source = config_source,
                path = %config_path,
                "config file not found, using defaults"
            );
        }
    }

    // Initialize database
    let pool = parksense_db::create_pool(
        &config.database.path,
        parksense_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool; check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            parksense_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Reward client
    let ledger = HttpLedger::from_config(&config.ledger)
        .expect("failed to build ledger client; check ledger.payer_private_key in config");
    tracing::info!(
        endpoint = %config.ledger.endpoint,
        payer = %ledger.sender_address(),
        "ledger client ready"
    );
    let wallets = WalletDirectory::from_config(&config.wallets);
    let rewards = Arc::new(RewardClient::new(
        ledger,
        wallets,
        config.ledger.reward_settings(),
    ));

    // Ingestion
    let transport = MqttTransport::new(&config.mqtt.transport_settings())
        .expect("failed to build MQTT client; check the [mqtt] section in config");
    let hub = Arc::new(BroadcastHub::new(config.server.live_buffer));
    let worker = IngestionWorker::new(
        transport,
        Arc::new(SqliteSink::new(pool.clone())),
        Arc::clone(&hub),
        Arc::clone(&rewards),
        config.mqtt.worker_settings(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let readiness = background::spawn_readiness_task(Arc::clone(&rewards), shutdown_rx.clone());
    tracing::info!(
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        topic_filter = %config.mqtt.topic_filter,
        "starting ingestion worker"
    );
    let ingestion = background::spawn_ingestion_worker(worker, shutdown_rx.clone());

    // Build application
    let app = app(AppState {
        hub,
        rewards,
        shutdown: shutdown_rx,
    });
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting parksense server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address; is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .expect("server error");

    if let Err(e) = ingestion.await {
        tracing::error!("ingestion worker task failed: {}", e);
    }
    if let Err(e) = readiness.await {
        tracing::error!("readiness task failed: {}", e);
    }

    tracing::info!("parksense server shut down");
}

/// Resolves on SIGINT, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.expect("failed to install Ctrl+C handler");
                tracing::info!(signal = "SIGINT", "shutting down");
            }
            _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        tracing::info!(signal = "SIGINT", "shutting down");
    }
}
