use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::Signature;

/// How long to wait before treating a transaction as durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    Processed,
    Confirmed,
    Finalized,
}

impl Default for Durability {
    fn default() -> Self {
        Self::Confirmed
    }
}

impl Durability {
    pub fn commitment_config(self) -> CommitmentConfig {
        match self {
            Self::Processed => CommitmentConfig::processed(),
            Self::Confirmed => CommitmentConfig::confirmed(),
            Self::Finalized => CommitmentConfig::finalized(),
        }
    }
}

/// Ledger-side view of a broadcast signature.
#[derive(Debug, Clone)]
pub struct SignatureStatus {
    pub durability: Durability,
    /// Execution error reported by the ledger, if the transaction ran and failed.
    pub err: Option<String>,
}

/// Result of a dry run against current ledger state.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

/// An ordered, non-empty sequence of instructions sharing one payer and one
/// signer set, submitted atomically. Instruction order is semantically
/// significant and must never be reordered by the submitter.
#[derive(Debug, Clone)]
pub struct TransactionBundle {
    instructions: Vec<Instruction>,
}

impl TransactionBundle {
    pub fn new(instructions: Vec<Instruction>) -> Result<Self> {
        if instructions.is_empty() {
            return Err(CoreError::EmptyBundle);
        }
        Ok(Self { instructions })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Proof of a confirmed submission.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub signature: Signature,
    pub durability: Durability,
    pub logs: Vec<String>,
    pub confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durability_is_ordered() {
        assert!(Durability::Processed < Durability::Confirmed);
        assert!(Durability::Confirmed < Durability::Finalized);
    }

    #[test]
    fn empty_bundle_is_rejected() {
        assert!(matches!(
            TransactionBundle::new(Vec::new()),
            Err(CoreError::EmptyBundle)
        ));
    }
}
