//! Escrow funding guard.

use crate::error::Result;
use crate::ledger::LedgerRpc;
use crate::submit::{SubmitOptions, TransactionSubmitter};
use crate::types::TransactionBundle;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::system_instruction;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingOutcome {
    AlreadyFunded,
    ToppedUp { lamports: u64, signature: Signature },
}

pub struct BalanceGuard {
    ledger: Arc<dyn LedgerRpc>,
    submitter: TransactionSubmitter,
}

impl BalanceGuard {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self {
            submitter: TransactionSubmitter::new(ledger.clone()),
            ledger,
        }
    }

    /// Top `account` up to at least the rent-exempt minimum for a zero-data
    /// account.
    pub async fn ensure_rent_exempt(
        &self,
        account: &Pubkey,
        payer: &Keypair,
        opts: &SubmitOptions,
    ) -> Result<FundingOutcome> {
        let minimum = self.ledger.minimum_rent_exempt_balance(0).await?;
        self.ensure_funded(account, minimum, payer, opts).await
    }

    /// Check-then-act: the balance is read at call time, never cached.
    /// There is no lock between this check and a later spend, so callers
    /// re-invoke the guard immediately before the step that debits the
    /// account.
    pub async fn ensure_funded(
        &self,
        account: &Pubkey,
        minimum_balance: u64,
        payer: &Keypair,
        opts: &SubmitOptions,
    ) -> Result<FundingOutcome> {
        let current = self.ledger.balance(account).await?;
        if current >= minimum_balance {
            tracing::debug!(%account, current, minimum_balance, "account already funded");
            return Ok(FundingOutcome::AlreadyFunded);
        }

        let deficit = minimum_balance - current;
        let transfer = system_instruction::transfer(&payer.pubkey(), account, deficit);
        let bundle = TransactionBundle::new(vec![transfer])?;
        let receipt = self.submitter.submit(&bundle, payer, &[], opts).await?;

        tracing::info!(
            %account,
            lamports = deficit,
            signature = %receipt.signature,
            "account topped up to minimum balance"
        );
        Ok(FundingOutcome::ToppedUp {
            lamports: deficit,
            signature: receipt.signature,
        })
    }
}
