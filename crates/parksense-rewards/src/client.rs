//! Reward submission: readiness gating, wallet resolution, and the
//! single-slot submission gate.

use crate::config::RewardSettings;
use crate::ledger::{Ledger, TxStatus};
use crate::readiness::Readiness;
use crate::wallet::{is_burn_address, WalletDirectory};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::sleep;

/// What happened to one reward attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    /// Ledger not ready yet; nothing submitted.
    NotReady,
    /// Sensor resolved to the burn address; nothing submitted.
    UnknownWallet,
    /// Transaction confirmed with success status.
    Confirmed { tx_hash: String },
    /// Transaction confirmed but reverted on-ledger.
    Reverted { tx_hash: String, vm_status: String },
    /// Submission or confirmation raised an error.
    Failed { reason: String },
    /// Submission plus confirmation exceeded the submission timeout.
    TimedOut,
}

/// Result of the readiness initialisation protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Program confirmed; rewards enabled.
    Ready { program: String },
    /// No configured program and deployment failed.
    DeployFailed,
    /// Attempt budget exhausted without seeing the program.
    Exhausted,
}

/// Balance of one sensor's payout wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorBalance {
    pub sensor_instance_id: String,
    pub address: String,
    pub balance: u64,
}

/// Pays a fixed reward per accepted reading.
///
/// Never returns an error: every ledger failure is logged and absorbed here
/// so nothing can propagate back into ingestion.
pub struct RewardClient<L> {
    ledger: L,
    wallets: WalletDirectory,
    readiness: Readiness,
    gate: Semaphore,
    settings: RewardSettings,
}

impl<L: Ledger> RewardClient<L> {
    pub fn new(ledger: L, wallets: WalletDirectory, settings: RewardSettings) -> Self {
        Self {
            ledger,
            wallets,
            readiness: Readiness::new(),
            gate: Semaphore::new(1),
            settings,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn wallets(&self) -> &WalletDirectory {
        &self.wallets
    }

    /// Runs the readiness protocol once.
    ///
    /// Deploys the payout program when no address is configured, then polls
    /// for its existence every `poll_interval`, up to `poll_attempts` times.
    /// On exhaustion rewards stay disabled for the rest of the process.
    pub async fn initialize(&self) -> InitOutcome {
        let program = match &self.settings.program_address {
            Some(address) => address.clone(),
            None => {
                tracing::info!("no payout program configured, deploying");
                match self.ledger.deploy_program().await {
                    Ok(address) => {
                        tracing::info!(program = %address, "payout program deployed");
                        address
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "payout program deployment failed; rewards disabled for this run");
                        return InitOutcome::DeployFailed;
                    }
                }
            }
        };

        let attempts = self.settings.poll_attempts;
        for attempt in 1..=attempts {
            match self.ledger.program_exists(&program).await {
                Ok(true) => {
                    self.readiness.mark_ready(program.clone());
                    tracing::info!(program = %program, attempt, "ledger ready, rewards enabled");
                    return InitOutcome::Ready { program };
                }
                Ok(false) => {
                    tracing::debug!(program = %program, attempt, "payout program not visible yet");
                }
                Err(e) => {
                    tracing::warn!(program = %program, attempt, error = %e, "readiness check failed");
                }
            }

            if attempt < attempts {
                sleep(self.settings.poll_interval).await;
            }
        }

        tracing::error!(
            program = %program,
            attempts,
            "payout program never became visible; rewards disabled for this run"
        );
        InitOutcome::Exhausted
    }

    /// Pays the fixed reward to the wallet of `sensor_instance_id`.
    pub async fn reward_sensor(&self, sensor_instance_id: &str) -> RewardOutcome {
        let Some(program) = self.readiness.program() else {
            tracing::warn!(sensor_instance_id, "ledger not ready, skipping reward");
            return RewardOutcome::NotReady;
        };

        let address = self.wallets.resolve(sensor_instance_id);
        if is_burn_address(&address) {
            tracing::warn!(sensor_instance_id, "no wallet configured for sensor, skipping reward");
            return RewardOutcome::UnknownWallet;
        }

        // The permit is dropped on every exit path below, including timeout.
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!(sensor_instance_id, error = %e, "reward gate closed");
                return RewardOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let submission = self.submit_and_confirm(program, &address);
        let outcome = match tokio::time::timeout(self.settings.submission_timeout, submission).await
        {
            Ok(outcome) => outcome,
            Err(_) => RewardOutcome::TimedOut,
        };

        match &outcome {
            RewardOutcome::Confirmed { tx_hash } => {
                tracing::info!(
                    sensor_instance_id,
                    recipient = %address,
                    amount = self.settings.reward_amount,
                    tx_hash = %tx_hash,
                    "reward confirmed"
                );
            }
            RewardOutcome::Reverted { tx_hash, vm_status } => {
                tracing::error!(
                    sensor_instance_id,
                    tx_hash = %tx_hash,
                    vm_status = %vm_status,
                    "reward transaction reverted"
                );
            }
            RewardOutcome::Failed { reason } => {
                tracing::error!(sensor_instance_id, error = %reason, "reward submission failed");
            }
            RewardOutcome::TimedOut => {
                tracing::error!(
                    sensor_instance_id,
                    timeout_secs = self.settings.submission_timeout.as_secs(),
                    "reward submission timed out"
                );
            }
            RewardOutcome::NotReady | RewardOutcome::UnknownWallet => {}
        }

        outcome
    }

    async fn submit_and_confirm(&self, program: &str, address: &str) -> RewardOutcome {
        let handle = match self
            .ledger
            .submit_reward(program, address, self.settings.reward_amount)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                return RewardOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        match self.ledger.wait_for_transaction(&handle).await {
            Ok(TxStatus::Confirmed) => RewardOutcome::Confirmed { tx_hash: handle.0 },
            Ok(TxStatus::Reverted { vm_status }) => RewardOutcome::Reverted {
                tx_hash: handle.0,
                vm_status,
            },
            Err(e) => RewardOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Balance of one sensor's wallet. Zero when not ready or on error.
    pub async fn get_balance(&self, sensor_instance_id: &str) -> u64 {
        let address = self.wallets.resolve(sensor_instance_id);
        self.balance_of_address(sensor_instance_id, &address).await
    }

    /// Balances of every sensor the wallet directory knows.
    pub async fn get_all_balances(&self) -> Vec<SensorBalance> {
        let mut balances = Vec::new();
        for sensor_instance_id in self.wallets.known_sensors() {
            let address = self.wallets.resolve(&sensor_instance_id);
            let balance = self.balance_of_address(&sensor_instance_id, &address).await;
            balances.push(SensorBalance {
                sensor_instance_id,
                address,
                balance,
            });
        }
        balances
    }

    async fn balance_of_address(&self, sensor_instance_id: &str, address: &str) -> u64 {
        let Some(program) = self.readiness.program() else {
            return 0;
        };
        match self.ledger.balance_of(program, address).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(sensor_instance_id, error = %e, "balance query failed");
                0
            }
        }
    }
}
