//! Incentive payouts for accepted sensor readings.
//!
//! Every accepted reading triggers one fixed-amount payout to the wallet of
//! the sensor that produced it. Payouts are gated on ledger readiness (the
//! payout program must be confirmed on-ledger first), resolved through a
//! [`WalletDirectory`], and serialized through a single-slot gate because
//! all transactions are signed by one payer account whose sequence number
//! orders them.
//!
//! Nothing in this crate returns ledger errors to the ingestion path.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod ledger;
pub mod readiness;
pub mod wallet;

pub use client::{InitOutcome, RewardClient, RewardOutcome, SensorBalance};
pub use config::{LedgerConfig, RewardSettings, WalletConfig, WalletStrategy};
pub use error::LedgerError;
pub use http::HttpLedger;
pub use ledger::{Ledger, TxHandle, TxStatus};
pub use readiness::Readiness;
pub use wallet::{derive_address, is_burn_address, WalletDirectory, BURN_ADDRESS};
