//! REST gateway implementation of [`Ledger`].
//!
//! Transactions are signed locally with the payer's ed25519 key over the
//! canonical JSON encoding of the unsigned body. The body carries the
//! payer's current sequence number, fetched right before submission; two
//! concurrent submissions would read the same number and one of them would
//! be rejected, which is why [`crate::RewardClient`] funnels submissions
//! through a single-slot gate.

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ledger::{Ledger, TxHandle, TxStatus};
use ed25519_dalek::{Signer, SigningKey};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

/// Timeout applied to every individual HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound for waiting on a deployment to confirm.
const DEPLOY_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TransactionPayload {
    Reward {
        program: String,
        recipient: String,
        amount: u64,
    },
    Deploy {
        bundle_hex: String,
    },
}

#[derive(Debug, Serialize)]
struct UnsignedTransaction<'a> {
    sender: &'a str,
    sequence_number: u64,
    chain_id: u64,
    payload: &'a TransactionPayload,
}

#[derive(Debug, Serialize)]
struct SignedTransaction<'a> {
    #[serde(flatten)]
    transaction: UnsignedTransaction<'a>,
    public_key: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence_number: u64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
    #[serde(default)]
    program_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    pending: bool,
    success: bool,
    #[serde(default)]
    vm_status: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u64,
}

/// Ledger client talking to a JSON REST gateway.
pub struct HttpLedger {
    http: reqwest::Client,
    endpoint: String,
    signing_key: SigningKey,
    sender: String,
    chain_id: u64,
    bundle_path: Option<PathBuf>,
    confirmation_interval: Duration,
    confirmation_timeout: Duration,
}

impl HttpLedger {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidKey` if the payer key is missing or not a
    /// 32-byte hex string, or `LedgerError::Http` if the HTTP client cannot
    /// be constructed.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let signing_key = parse_signing_key(&config.payer_private_key)?;
        let sender = account_address(&signing_key);
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            signing_key,
            sender,
            chain_id: config.chain_id,
            bundle_path: config.program_bundle_path.as_ref().map(PathBuf::from),
            confirmation_interval: Duration::from_millis(config.confirmation_poll_ms.max(1)),
            confirmation_timeout: Duration::from_secs(config.submission_timeout_secs),
        })
    }

    /// Address of the payer account.
    pub fn sender_address(&self) -> &str {
        &self.sender
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn sequence_number(&self) -> Result<u64, LedgerError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/accounts/{}", self.sender)))
            .send()
            .await?;
        let account: AccountResponse = expect_success(response).await?.json().await?;
        Ok(account.sequence_number)
    }

    async fn submit(&self, payload: TransactionPayload) -> Result<SubmitResponse, LedgerError> {
        let sequence_number = self.sequence_number().await?;
        let unsigned = UnsignedTransaction {
            sender: &self.sender,
            sequence_number,
            chain_id: self.chain_id,
            payload: &payload,
        };
        let message = serde_json::to_vec(&unsigned)?;
        let signature = self.signing_key.sign(&message);

        let body = SignedTransaction {
            transaction: unsigned,
            public_key: hex::encode(self.signing_key.verifying_key().as_bytes()),
            signature: hex::encode(signature.to_bytes()),
        };

        let response = self
            .http
            .post(self.url("/v1/transactions"))
            .json(&body)
            .send()
            .await?;
        let submitted: SubmitResponse = expect_success(response).await?.json().await?;
        tracing::debug!(
            tx_hash = %submitted.hash,
            sequence_number,
            "transaction submitted"
        );
        Ok(submitted)
    }

    async fn poll_transaction(&self, handle: &TxHandle) -> Result<TxStatus, LedgerError> {
        loop {
            let response = self
                .http
                .get(self.url(&format!("/v1/transactions/{}", handle.0)))
                .send()
                .await?;

            // A freshly submitted transaction may not be indexed yet.
            if response.status() != StatusCode::NOT_FOUND {
                let tx: TransactionResponse = expect_success(response).await?.json().await?;
                if !tx.pending {
                    return Ok(if tx.success {
                        TxStatus::Confirmed
                    } else {
                        TxStatus::Reverted {
                            vm_status: tx.vm_status,
                        }
                    });
                }
            }

            tokio::time::sleep(self.confirmation_interval).await;
        }
    }
}

impl Ledger for HttpLedger {
    async fn program_exists(&self, program: &str) -> Result<bool, LedgerError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/programs/{program}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        expect_success(response).await?;
        Ok(true)
    }

    async fn deploy_program(&self) -> Result<String, LedgerError> {
        let path = self.bundle_path.as_ref().ok_or_else(|| {
            LedgerError::Config(
                "no program address configured and no program bundle to deploy".to_string(),
            )
        })?;
        let bundle = tokio::fs::read(path).await?;

        let submitted = self
            .submit(TransactionPayload::Deploy {
                bundle_hex: hex::encode(bundle),
            })
            .await?;
        let program = submitted.program_address.ok_or_else(|| {
            LedgerError::Config("deploy response did not include a program address".to_string())
        })?;

        let handle = TxHandle(submitted.hash);
        let status = tokio::time::timeout(DEPLOY_CONFIRMATION_TIMEOUT, self.poll_transaction(&handle))
            .await
            .map_err(|_| LedgerError::ConfirmationTimeout(handle.0.clone()))??;

        match status {
            TxStatus::Confirmed => Ok(program),
            TxStatus::Reverted { vm_status } => Err(LedgerError::Reverted(vm_status)),
        }
    }

    async fn submit_reward(
        &self,
        program: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<TxHandle, LedgerError> {
        let submitted = self
            .submit(TransactionPayload::Reward {
                program: program.to_string(),
                recipient: recipient.to_string(),
                amount,
            })
            .await?;
        Ok(TxHandle(submitted.hash))
    }

    async fn wait_for_transaction(&self, handle: &TxHandle) -> Result<TxStatus, LedgerError> {
        tokio::time::timeout(self.confirmation_timeout, self.poll_transaction(handle))
            .await
            .map_err(|_| LedgerError::ConfirmationTimeout(handle.0.clone()))?
    }

    async fn balance_of(&self, program: &str, address: &str) -> Result<u64, LedgerError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/programs/{program}/balances/{address}")))
            .send()
            .await?;
        let balance: BalanceResponse = expect_success(response).await?.json().await?;
        Ok(balance.balance)
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LedgerError::Status {
        status: status.as_u16(),
        body,
    })
}

fn parse_signing_key(raw: &str) -> Result<SigningKey, LedgerError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidKey("payer key is not configured".to_string()));
    }
    let bytes = hex::decode(trimmed).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
    let secret: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        LedgerError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
    })?;
    Ok(SigningKey::from_bytes(&secret))
}

/// Account address for a signing key: `0x` + hex(sha256(public key)).
pub fn account_address(key: &SigningKey) -> String {
    let digest = Sha256::digest(key.verifying_key().as_bytes());
    format!("0x{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_key_parses_with_or_without_prefix() {
        let hex_key = "11".repeat(32);
        let a = parse_signing_key(&hex_key).expect("plain hex");
        let b = parse_signing_key(&format!("0x{hex_key}")).expect("prefixed hex");
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn signing_key_rejects_bad_input() {
        assert!(matches!(parse_signing_key(""), Err(LedgerError::InvalidKey(_))));
        assert!(matches!(parse_signing_key("zz"), Err(LedgerError::InvalidKey(_))));
        assert!(matches!(
            parse_signing_key(&"11".repeat(16)),
            Err(LedgerError::InvalidKey(_))
        ));
    }

    #[test]
    fn account_address_is_stable_hex() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let address = account_address(&key);
        assert_eq!(address, account_address(&key));
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 66);
    }

    #[test]
    fn reward_payload_is_tagged() {
        let payload = TransactionPayload::Reward {
            program: "0xabc".to_string(),
            recipient: "0xdef".to_string(),
            amount: 1,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "reward");
        assert_eq!(json["amount"], 1);
    }
}
