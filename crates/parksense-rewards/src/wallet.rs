//! Sensor id to payout address resolution.
//!
//! Two strategies exist and they are not interchangeable: the same sensor
//! id resolves to different addresses under each. A deployment picks one
//! via [`WalletStrategy`]. Both are total and stable.

use crate::config::{WalletConfig, WalletStrategy};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Sentinel address for sensors with no configured wallet. Payouts to it
/// are never submitted.
pub const BURN_ADDRESS: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

const DERIVATION_DOMAIN: &[u8] = b"parksense-wallet:";

/// Returns whether `address` is the burn sentinel.
pub fn is_burn_address(address: &str) -> bool {
    address.eq_ignore_ascii_case(BURN_ADDRESS)
}

/// Derives a payout address from a sensor id: `0x` + hex(sha256(domain || id)).
pub fn derive_address(sensor_instance_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(DERIVATION_DOMAIN);
    hasher.update(sensor_instance_id.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone)]
enum Strategy {
    Table(BTreeMap<String, String>),
    Derived(Vec<String>),
}

/// Immutable sensor-to-wallet mapping.
#[derive(Debug, Clone)]
pub struct WalletDirectory {
    strategy: Strategy,
}

impl WalletDirectory {
    /// Fixed lookup table; unknown sensors resolve to [`BURN_ADDRESS`].
    pub fn table<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            strategy: Strategy::Table(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Hash-derived addresses. `known_sensors` only feeds balance listings.
    pub fn derived<I, S>(known_sensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: Vec<String> = known_sensors.into_iter().map(Into::into).collect();
        known.sort();
        known.dedup();
        Self {
            strategy: Strategy::Derived(known),
        }
    }

    pub fn from_config(config: &WalletConfig) -> Self {
        match config.strategy {
            WalletStrategy::Table => Self::table(config.table.clone()),
            WalletStrategy::Derived => Self::derived(config.sensors.clone()),
        }
    }

    /// Resolves the payout address for a sensor. Never fails.
    pub fn resolve(&self, sensor_instance_id: &str) -> String {
        match &self.strategy {
            Strategy::Table(entries) => entries
                .get(sensor_instance_id)
                .cloned()
                .unwrap_or_else(|| BURN_ADDRESS.to_string()),
            Strategy::Derived(_) => derive_address(sensor_instance_id),
        }
    }

    /// Sensors this directory knows about, sorted.
    pub fn known_sensors(&self) -> Vec<String> {
        match &self.strategy {
            Strategy::Table(entries) => entries.keys().cloned().collect(),
            Strategy::Derived(known) => known.clone(),
        }
    }
}
