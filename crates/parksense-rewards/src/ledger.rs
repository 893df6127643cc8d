//! The seam between the reward client and the ledger it pays out on.

use crate::error::LedgerError;
use std::fmt;
use std::future::Future;

/// Ledger-assigned identifier of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal status of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Executed successfully.
    Confirmed,
    /// Included but reverted on-ledger.
    Reverted { vm_status: String },
}

/// Operations the reward pipeline needs from a ledger.
///
/// Every submitted transaction is signed by the same payer account, so
/// implementations assume callers never run two submissions at once.
pub trait Ledger: Send + Sync + 'static {
    /// Returns whether a program exists at `program`.
    fn program_exists(&self, program: &str)
        -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Deploys the payout program, waits for confirmation, and returns its
    /// address.
    fn deploy_program(&self) -> impl Future<Output = Result<String, LedgerError>> + Send;

    /// Submits a payout of `amount` to `recipient` through `program`.
    fn submit_reward(
        &self,
        program: &str,
        recipient: &str,
        amount: u64,
    ) -> impl Future<Output = Result<TxHandle, LedgerError>> + Send;

    /// Waits until the transaction leaves the pending state.
    fn wait_for_transaction(
        &self,
        handle: &TxHandle,
    ) -> impl Future<Output = Result<TxStatus, LedgerError>> + Send;

    /// Returns the payout balance held by `address` under `program`.
    fn balance_of(
        &self,
        program: &str,
        address: &str,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send;
}
