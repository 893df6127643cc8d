use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ledger returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid payer key: {0}")]
    InvalidKey(String),

    #[error("invalid ledger configuration: {0}")]
    Config(String),

    #[error("failed to read program bundle: {0}")]
    Bundle(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("transaction {0} was not confirmed in time")]
    ConfirmationTimeout(String),
}
