//! Server configuration loading from file and environment variables.

use parksense_ingest::{MqttSettings, WorkerSettings};
use parksense_rewards::{LedgerConfig, WalletConfig};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Reading store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Broker connection and subscription.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Ledger gateway, payer key and payout program.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Sensor to payout-address mapping.
    #[serde(default)]
    pub wallets: WalletConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-viewer buffer of the live reading stream.
    #[serde(default = "default_live_buffer")]
    pub live_buffer: usize,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "parksense_ingest=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// MQTT broker configuration.
#[derive(Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Generated per process when omitted.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub use_tls: bool,

    /// Subscription filter; may contain wildcards.
    #[serde(default = "default_topic_filter")]
    pub topic_filter: String,

    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("use_tls", &self.use_tls)
            .field("topic_filter", &self.topic_filter)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .finish()
    }
}

impl MqttConfig {
    pub fn transport_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            username: self.username.clone().filter(|u| !u.is_empty()),
            password: self.password.clone().filter(|p| !p.is_empty()),
            use_tls: self.use_tls,
            keep_alive: Duration::from_secs(self.keep_alive_secs),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            topic_filter: self.topic_filter.clone(),
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_live_buffer() -> usize {
    256
}

fn default_db_path() -> String {
    "parksense.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    format!("parksense-{}", uuid::Uuid::new_v4().simple())
}

fn default_topic_filter() -> String {
    "parking/sensor/#".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_keep_alive_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            live_buffer: default_live_buffer(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            use_tls: false,
            topic_filter: default_topic_filter(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where [`load_config`] took its base values from, before overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    /// No path given, or the file does not exist.
    Defaults,
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies `PARKSENSE_*` environment overrides (see [`apply_overrides`]).
///
/// Nothing is logged here; loading runs before the subscriber is installed.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<(Config, ConfigOrigin), ConfigError> {
    let (mut config, origin) = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => (toml::from_str(&contents)?, ConfigOrigin::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Config::default(), ConfigOrigin::Defaults)
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => (Config::default(), ConfigOrigin::Defaults),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok((config, origin))
}

/// Applies overrides looked up through `var`.
///
/// - `PARKSENSE_HOST`, `PARKSENSE_PORT` override `server.host`/`server.port`
/// - `PARKSENSE_DB_PATH` overrides `database.path`
/// - `PARKSENSE_LOG_LEVEL`, `PARKSENSE_LOG_JSON` override `logging.*`
/// - `PARKSENSE_MQTT_HOST`, `_PORT`, `_CLIENT_ID`, `_USERNAME`, `_PASSWORD`,
///   `_TLS`, `_TOPIC` override `mqtt.*`
/// - `PARKSENSE_LEDGER_ENDPOINT`, `_PRIVATE_KEY`, `_PROGRAM_ADDRESS`,
///   `_CHAIN_ID` override `ledger.*`
///
/// Values that fail to parse are ignored.
pub fn apply_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    let flag = |value: String| value == "true" || value == "1";

    if let Some(parsed) = var("PARKSENSE_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = var("PARKSENSE_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(db_path) = var("PARKSENSE_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("PARKSENSE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("PARKSENSE_LOG_JSON") {
        config.logging.json = flag(json);
    }

    if let Some(host) = var("PARKSENSE_MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Some(parsed) = var("PARKSENSE_MQTT_PORT").and_then(|v| v.parse().ok()) {
        config.mqtt.port = parsed;
    }
    if let Some(client_id) = var("PARKSENSE_MQTT_CLIENT_ID") {
        config.mqtt.client_id = client_id;
    }
    if let Some(username) = var("PARKSENSE_MQTT_USERNAME") {
        config.mqtt.username = Some(username);
    }
    if let Some(password) = var("PARKSENSE_MQTT_PASSWORD") {
        config.mqtt.password = Some(password);
    }
    if let Some(tls) = var("PARKSENSE_MQTT_TLS") {
        config.mqtt.use_tls = flag(tls);
    }
    if let Some(topic) = var("PARKSENSE_MQTT_TOPIC") {
        config.mqtt.topic_filter = topic;
    }

    if let Some(endpoint) = var("PARKSENSE_LEDGER_ENDPOINT") {
        config.ledger.endpoint = endpoint;
    }
    if let Some(key) = var("PARKSENSE_LEDGER_PRIVATE_KEY") {
        config.ledger.payer_private_key = key;
    }
    if let Some(address) = var("PARKSENSE_LEDGER_PROGRAM_ADDRESS") {
        config.ledger.program_address = Some(address);
    }
    if let Some(parsed) = var("PARKSENSE_LEDGER_CHAIN_ID").and_then(|v| v.parse().ok()) {
        config.ledger.chain_id = parsed;
    }
}
