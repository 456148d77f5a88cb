use solana_sdk::signature::Signature;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rpc error: {0}")]
    Rpc(String),

    #[error("Simulation rejected transaction: {reason}")]
    SimulationFailed { reason: String, logs: Vec<String> },

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Confirmation timed out for {signature}")]
    ConfirmationTimeout { signature: Signature },

    #[error("Transaction {signature} failed on ledger: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    #[error("Insufficient funds: need {need} lamports, have {available}")]
    InsufficientFunds { need: u64, available: u64 },

    #[error("Transaction bundle is empty")]
    EmptyBundle,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Signing error: {0}")]
    Signing(#[from] solana_sdk::signer::SignerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }

    pub fn broadcast(msg: impl Into<String>) -> Self {
        Self::Broadcast(msg.into())
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether resending the same signed bytes may resolve the failure.
    /// Only transport-level broadcast errors qualify; a rejected simulation
    /// or an on-ledger failure is final for the bundle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Broadcast(_))
    }
}
