//! Transaction bundle submission.
//!
//! The submitter is the central failure and retry boundary: it assembles
//! the transaction, optionally dry-runs it, broadcasts, and blocks until
//! the requested durability is observed.

use crate::error::{CoreError, Result};
use crate::ledger::LedgerRpc;
use crate::types::{Durability, SimulationOutcome, TransactionBundle, TransactionReceipt};
use chrono::Utc;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;

const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Priority hint for inclusion. Influences fees, not correctness.
#[derive(Debug, Clone, Copy)]
pub struct ComputeBudgetHint {
    pub unit_price_micro_lamports: u64,
    /// Headroom over the simulated unit consumption.
    pub unit_limit_multiplier: f64,
}

#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub durability: Durability,
    /// Bypass the dry run when speed matters more than early error detection.
    pub skip_preflight: bool,
    /// Network-level resend attempts for transient broadcast failures.
    /// Zero delegates all retry responsibility to the caller.
    pub max_retries: u32,
    pub priority: Option<ComputeBudgetHint>,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            durability: Durability::Confirmed,
            skip_preflight: false,
            max_retries: 3,
            priority: None,
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(400),
        }
    }
}

pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerRpc>,
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    /// Submit a bundle and wait until the requested durability is observed.
    ///
    /// Instruction order inside the bundle is preserved verbatim; priority
    /// instructions, when requested, are prepended ahead of the bundle.
    pub async fn submit(
        &self,
        bundle: &TransactionBundle,
        payer: &Keypair,
        extra_signers: &[&Keypair],
        opts: &SubmitOptions,
    ) -> Result<TransactionReceipt> {
        let blockhash = self.ledger.latest_blockhash().await?;

        let mut simulation: Option<SimulationOutcome> = None;
        if !opts.skip_preflight {
            let probe = sign(bundle.instructions(), payer, extra_signers, blockhash)?;
            let outcome = self.ledger.simulate(&probe).await?;
            if let Some(err) = outcome.err {
                tracing::error!(error = %err, "bundle rejected in preflight simulation");
                return Err(CoreError::SimulationFailed {
                    reason: err,
                    logs: outcome.logs,
                });
            }
            simulation = Some(outcome);
        }

        let instructions = with_priority(bundle.instructions(), simulation.as_ref(), opts);
        let tx = sign(&instructions, payer, extra_signers, blockhash)?;

        let signature = self.broadcast_with_retries(&tx, opts.max_retries).await?;
        tracing::debug!(%signature, "bundle broadcast");

        self.await_durability(signature, opts).await
    }

    async fn broadcast_with_retries(&self, tx: &Transaction, max_retries: u32) -> Result<Signature> {
        let mut attempt = 0u32;
        loop {
            match self.ledger.broadcast(tx).await {
                Ok(signature) => return Ok(signature),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        error = %e,
                        "broadcast failed, resending identical signed transaction"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn await_durability(
        &self,
        signature: Signature,
        opts: &SubmitOptions,
    ) -> Result<TransactionReceipt> {
        let deadline = tokio::time::Instant::now() + opts.confirm_timeout;

        loop {
            if let Some(status) = self.ledger.signature_status(&signature).await? {
                if let Some(err) = status.err {
                    return Err(CoreError::TransactionFailed {
                        signature,
                        reason: err,
                    });
                }
                if status.durability >= opts.durability {
                    let logs = self.ledger.transaction_logs(&signature).await?;
                    return Ok(TransactionReceipt {
                        signature,
                        durability: status.durability,
                        logs,
                        confirmed_at: Utc::now(),
                    });
                }
            }

            if tokio::time::Instant::now() >= deadline {
                // Ambiguous outcome: the signature may still land. The caller
                // must re-query status before assuming failure.
                return Err(CoreError::ConfirmationTimeout { signature });
            }
            tokio::time::sleep(opts.poll_interval).await;
        }
    }
}

fn sign(
    instructions: &[Instruction],
    payer: &Keypair,
    extra_signers: &[&Keypair],
    blockhash: Hash,
) -> Result<Transaction> {
    let message = Message::new_with_blockhash(instructions, Some(&payer.pubkey()), &blockhash);
    let mut tx = Transaction::new_unsigned(message);

    let mut signers: Vec<&Keypair> = Vec::with_capacity(1 + extra_signers.len());
    signers.push(payer);
    signers.extend_from_slice(extra_signers);
    tx.try_sign(&signers, blockhash)?;

    Ok(tx)
}

fn with_priority(
    instructions: &[Instruction],
    simulation: Option<&SimulationOutcome>,
    opts: &SubmitOptions,
) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(instructions.len() + 2);
    if let Some(hint) = &opts.priority {
        out.push(ComputeBudgetInstruction::set_compute_unit_price(
            hint.unit_price_micro_lamports,
        ));
        if let Some(units) = simulation.and_then(|s| s.units_consumed) {
            let limit = (units as f64 * hint.unit_limit_multiplier) as u32;
            out.push(ComputeBudgetInstruction::set_compute_unit_limit(
                limit.min(MAX_COMPUTE_UNIT_LIMIT),
            ));
        }
    }
    out.extend_from_slice(instructions);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::system_instruction;

    fn transfer_ix() -> Instruction {
        system_instruction::transfer(&Pubkey::new_unique(), &Pubkey::new_unique(), 1)
    }

    #[test]
    fn priority_instructions_are_prepended_not_interleaved() {
        let ixs = vec![transfer_ix(), transfer_ix()];
        let opts = SubmitOptions {
            priority: Some(ComputeBudgetHint {
                unit_price_micro_lamports: 1_000,
                unit_limit_multiplier: 1.2,
            }),
            ..SubmitOptions::default()
        };
        let simulation = SimulationOutcome {
            err: None,
            logs: Vec::new(),
            units_consumed: Some(10_000),
        };

        let out = with_priority(&ixs, Some(&simulation), &opts);

        assert_eq!(out.len(), 4);
        assert_eq!(out[0].program_id, solana_sdk::compute_budget::id());
        assert_eq!(out[1].program_id, solana_sdk::compute_budget::id());
        // The bundle's own order survives verbatim.
        assert_eq!(out[2], ixs[0]);
        assert_eq!(out[3], ixs[1]);
    }

    #[test]
    fn without_hint_the_bundle_is_untouched() {
        let ixs = vec![transfer_ix()];
        let out = with_priority(&ixs, None, &SubmitOptions::default());
        assert_eq!(out, ixs);
    }
}
