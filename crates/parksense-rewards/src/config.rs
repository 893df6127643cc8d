use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

fn default_endpoint() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_chain_id() -> u64 {
    4
}

fn default_reward_amount() -> u64 {
    1
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_poll_attempts() -> u32 {
    30
}

fn default_submission_timeout_secs() -> u64 {
    60
}

fn default_confirmation_poll_ms() -> u64 {
    1_000
}

/// Ledger connection and payout settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the ledger REST gateway.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Hex-encoded ed25519 secret key of the payer account.
    #[serde(default, skip_serializing)]
    pub payer_private_key: String,
    /// Address of the payout program. When absent the program is deployed
    /// from `program_bundle_path` at startup.
    #[serde(default)]
    pub program_address: Option<String>,
    /// Compiled program bundle used for auto-deployment.
    #[serde(default)]
    pub program_bundle_path: Option<String>,
    /// Network / chain identifier included in every signed transaction.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Fixed amount paid per accepted reading.
    #[serde(default = "default_reward_amount")]
    pub reward_amount: u64,
    /// Seconds between program-existence checks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Number of existence checks before giving up for this run.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    /// Upper bound for one submission plus its confirmation.
    #[serde(default = "default_submission_timeout_secs")]
    pub submission_timeout_secs: u64,
    /// Milliseconds between transaction status checks.
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            payer_private_key: String::new(),
            program_address: None,
            program_bundle_path: None,
            chain_id: default_chain_id(),
            reward_amount: default_reward_amount(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_attempts: default_poll_attempts(),
            submission_timeout_secs: default_submission_timeout_secs(),
            confirmation_poll_ms: default_confirmation_poll_ms(),
        }
    }
}

impl fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("endpoint", &self.endpoint)
            .field("payer_private_key", &"[REDACTED]")
            .field("program_address", &self.program_address)
            .field("program_bundle_path", &self.program_bundle_path)
            .field("chain_id", &self.chain_id)
            .field("reward_amount", &self.reward_amount)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("poll_attempts", &self.poll_attempts)
            .field("submission_timeout_secs", &self.submission_timeout_secs)
            .field("confirmation_poll_ms", &self.confirmation_poll_ms)
            .finish()
    }
}

impl LedgerConfig {
    /// Builds the runtime settings the reward client works from.
    pub fn reward_settings(&self) -> RewardSettings {
        RewardSettings {
            program_address: self
                .program_address
                .clone()
                .filter(|address| !address.trim().is_empty()),
            reward_amount: self.reward_amount,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_attempts: self.poll_attempts,
            submission_timeout: Duration::from_secs(self.submission_timeout_secs),
        }
    }
}

/// Runtime knobs for [`crate::RewardClient`].
#[derive(Debug, Clone)]
pub struct RewardSettings {
    pub program_address: Option<String>,
    pub reward_amount: u64,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub submission_timeout: Duration,
}

impl Default for RewardSettings {
    fn default() -> Self {
        LedgerConfig::default().reward_settings()
    }
}

/// How sensor ids map to payout addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStrategy {
    /// Fixed lookup table; misses resolve to the burn address.
    #[default]
    Table,
    /// Address derived by hashing the sensor id.
    Derived,
}

/// Wallet directory settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub strategy: WalletStrategy,
    /// `sensor_instance_id -> address`, used by the `table` strategy.
    #[serde(default)]
    pub table: BTreeMap<String, String>,
    /// Sensors reported by balance queries under the `derived` strategy.
    #[serde(default)]
    pub sensors: Vec<String>,
}
