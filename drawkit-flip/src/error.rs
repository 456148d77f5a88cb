use drawkit_core::CoreError;
use solana_sdk::signature::Signature;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlipError>;

/// Pipeline steps, used to label aborts so a caller can decide whether to
/// resume from the next incomplete transition or abandon the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStep {
    Initialize,
    FundEscrow,
    CreateCommitment,
    Commit,
    Settle,
    ExtractResult,
}

impl std::fmt::Display for DrawStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initialize => "initialize",
            Self::FundEscrow => "fund-escrow",
            Self::CreateCommitment => "create-commitment",
            Self::Commit => "commit",
            Self::Settle => "settle",
            Self::ExtractResult => "extract-result",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum FlipError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Escrow funding failed and cannot be resolved: {0}")]
    FundingUnresolvable(#[source] Box<CoreError>),

    #[error("No draw outcome found in logs of {signature}")]
    ResultNotFound { signature: Signature },

    #[error("Malformed outcome line: {line}")]
    MalformedResult { line: String },

    #[error("Invalid draw state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Draw aborted at {step}: {source}")]
    Aborted {
        step: DrawStep,
        /// Last signature seen before the abort, for manual recovery.
        last_signature: Option<Signature>,
        #[source]
        source: Box<FlipError>,
    },
}

impl FlipError {
    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
