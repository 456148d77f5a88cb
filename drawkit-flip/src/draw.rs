//! The draw state machine.
//!
//! A draw walks `Uninitialized -> PlayerStateReady -> EscrowFunded ->
//! CommitmentCreated -> Committed -> Revealed -> Settled`, submitting
//! exactly one bundle per transition and never starting a step before the
//! prior bundle is confirmed at the configured durability. Later steps
//! read ledger state written by earlier ones and the ledger offers no
//! cross-transaction atomicity, so the sequencing is the correctness
//! mechanism, not an optimization.

use crate::error::{DrawStep, FlipError, Result};
use crate::observer::{DrawEvent, DrawObserver};
use crate::oracle::RandomnessOracle;
use crate::outcome::{self, DrawOutcome};
use crate::program::FlipProgram;
use chrono::Utc;
use drawkit_core::{
    BalanceGuard, CoreError, FundingOutcome, LedgerRpc, SubmitOptions, TransactionBundle,
    TransactionReceipt, TransactionSubmitter,
};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a draw currently stands. `Settled` is the terminal success state;
/// any state may fall to `Aborted` on an unrecoverable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawState {
    Uninitialized,
    PlayerStateReady,
    EscrowFunded,
    CommitmentCreated,
    Committed,
    Revealed,
    Settled,
    Aborted { reason: String },
}

impl fmt::Display for DrawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::PlayerStateReady => write!(f, "player-state-ready"),
            Self::EscrowFunded => write!(f, "escrow-funded"),
            Self::CommitmentCreated => write!(f, "commitment-created"),
            Self::Committed => write!(f, "committed"),
            Self::Revealed => write!(f, "revealed"),
            Self::Settled => write!(f, "settled"),
            Self::Aborted { reason } => write!(f, "aborted: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrawConfig {
    /// Endpoint handed to the oracle for queue resolution.
    pub rpc_endpoint: String,
    /// Explicit queue override; resolved by endpoint when absent.
    pub queue: Option<Pubkey>,
    pub submit: SubmitOptions,
}

/// Sequences one draw end to end.
///
/// Independent draws may run concurrently: every address is derived
/// per-participant and the orchestrator holds no shared mutable state.
pub struct DrawOrchestrator {
    id: Uuid,
    ledger: Arc<dyn LedgerRpc>,
    oracle: Arc<dyn RandomnessOracle>,
    observer: Arc<dyn DrawObserver>,
    program: FlipProgram,
    submitter: TransactionSubmitter,
    guard: BalanceGuard,
    config: DrawConfig,
}

impl DrawOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        oracle: Arc<dyn RandomnessOracle>,
        observer: Arc<dyn DrawObserver>,
        program_id: Pubkey,
        config: DrawConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            submitter: TransactionSubmitter::new(ledger.clone()),
            guard: BalanceGuard::new(ledger.clone()),
            program: FlipProgram::new(program_id),
            ledger,
            oracle,
            observer,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn program(&self) -> &FlipProgram {
        &self.program
    }

    /// Run a complete draw for `participant` and return the decoded outcome.
    pub async fn run(&self, participant: &Keypair) -> Result<DrawOutcome> {
        let mut last_signature: Option<Signature> = None;

        self.transition(DrawState::Uninitialized, None);

        // Uninitialized -> PlayerStateReady: establish the player-state
        // account, tolerating one that already exists.
        let receipt = match self.ensure_player_state(participant).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.abort(DrawStep::Initialize, last_signature, e)),
        };
        if let Some(receipt) = &receipt {
            last_signature = Some(receipt.signature);
        }
        self.transition(DrawState::PlayerStateReady, last_signature);

        // PlayerStateReady -> EscrowFunded: the balance is re-checked here,
        // immediately before the steps that spend it, never carried over
        // from an earlier read.
        let funding = match self.fund_escrow(participant).await {
            Ok(funding) => funding,
            Err(e) => return Err(self.abort(DrawStep::FundEscrow, last_signature, e)),
        };
        if let FundingOutcome::ToppedUp { signature, .. } = &funding {
            last_signature = Some(*signature);
        }
        self.transition(DrawState::EscrowFunded, last_signature);

        // EscrowFunded -> CommitmentCreated: a fresh ephemeral keypair per
        // draw; reuse would let the outcome be predicted.
        let ephemeral = Keypair::new();
        let randomness_account = ephemeral.pubkey();
        let queue = match self.resolve_queue().await {
            Ok(queue) => queue,
            Err(e) => return Err(self.abort(DrawStep::CreateCommitment, last_signature, e)),
        };
        let receipt = match self.create_commitment(participant, &ephemeral, &queue).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.abort(DrawStep::CreateCommitment, last_signature, e)),
        };
        last_signature = Some(receipt.signature);
        self.transition(DrawState::CommitmentCreated, last_signature);

        // CommitmentCreated -> Committed: oracle commit and program
        // generation in one atomic bundle, commit first; the generation
        // instruction reads the commitment account the first instruction
        // populates.
        let receipt = match self.commit(participant, &randomness_account, &queue).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.abort(DrawStep::Commit, last_signature, e)),
        };
        last_signature = Some(receipt.signature);
        self.transition(DrawState::Committed, last_signature);

        // Committed -> Revealed -> Settled: reveal and settle in one
        // bundle, reveal first, for the same reason.
        let receipt = match self.settle(participant, &randomness_account).await {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.abort(DrawStep::Settle, last_signature, e)),
        };
        last_signature = Some(receipt.signature);
        self.transition(DrawState::Revealed, last_signature);
        self.transition(DrawState::Settled, last_signature);

        let outcome = match outcome::extract(&receipt) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.abort(DrawStep::ExtractResult, last_signature, e)),
        };
        self.observer.on_outcome(self.id, &outcome);

        Ok(outcome)
    }

    async fn ensure_player_state(
        &self,
        participant: &Keypair,
    ) -> Result<Option<TransactionReceipt>> {
        let user = participant.pubkey();
        let (player_state, _) = self.program.player_state_address(&user)?;

        if self.ledger.account_exists(&player_state).await? {
            tracing::debug!(%player_state, "player state already initialized");
            return Ok(None);
        }

        let bundle = TransactionBundle::new(vec![self.program.initialize(&user)?])?;
        match self
            .submitter
            .submit(&bundle, participant, &[], &self.config.submit)
            .await
        {
            Ok(receipt) => Ok(Some(receipt)),
            // A concurrent initialize may land between the existence check
            // and this submit; the step is idempotent by address, so that
            // still counts as success.
            Err(CoreError::SimulationFailed { reason, .. })
                if reason.contains("already in use") =>
            {
                tracing::debug!(%player_state, "player state initialized concurrently");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fund_escrow(&self, participant: &Keypair) -> Result<FundingOutcome> {
        let (escrow, _) = self.program.escrow_address(&participant.pubkey())?;
        self.guard
            .ensure_rent_exempt(&escrow, participant, &self.config.submit)
            .await
            .map_err(|e| FlipError::FundingUnresolvable(Box::new(e)))
    }

    async fn create_commitment(
        &self,
        participant: &Keypair,
        ephemeral: &Keypair,
        queue: &Pubkey,
    ) -> Result<TransactionReceipt> {
        let create = self.oracle.create_instruction(ephemeral, queue).await?;
        let bundle = TransactionBundle::new(vec![create])?;
        Ok(self
            .submitter
            .submit(&bundle, participant, &[ephemeral], &self.config.submit)
            .await?)
    }

    async fn commit(
        &self,
        participant: &Keypair,
        randomness_account: &Pubkey,
        queue: &Pubkey,
    ) -> Result<TransactionReceipt> {
        let user = participant.pubkey();
        let commit = self
            .oracle
            .commit_instruction(randomness_account, queue)
            .await?;
        let generate = self.program.generate_randomness(&user, randomness_account)?;
        let bundle = TransactionBundle::new(vec![commit, generate])?;
        Ok(self
            .submitter
            .submit(&bundle, participant, &[], &self.config.submit)
            .await?)
    }

    async fn settle(
        &self,
        participant: &Keypair,
        randomness_account: &Pubkey,
    ) -> Result<TransactionReceipt> {
        let user = participant.pubkey();
        let reveal = self.oracle.reveal_instruction(randomness_account).await?;
        let settle = self.program.settle_flip(&user, randomness_account)?;
        let bundle = TransactionBundle::new(vec![reveal, settle])?;
        Ok(self
            .submitter
            .submit(&bundle, participant, &[], &self.config.submit)
            .await?)
    }

    async fn resolve_queue(&self) -> Result<Pubkey> {
        match self.config.queue {
            Some(queue) => Ok(queue),
            None => {
                self.oracle
                    .queue_for_endpoint(&self.config.rpc_endpoint)
                    .await
            }
        }
    }

    fn transition(&self, state: DrawState, signature: Option<Signature>) {
        self.observer.on_transition(DrawEvent {
            draw_id: self.id,
            state,
            signature,
            at: Utc::now(),
        });
    }

    fn abort(
        &self,
        step: DrawStep,
        last_signature: Option<Signature>,
        source: FlipError,
    ) -> FlipError {
        self.transition(
            DrawState::Aborted {
                reason: source.to_string(),
            },
            last_signature,
        );
        FlipError::Aborted {
            step,
            last_signature,
            source: Box::new(source),
        }
    }
}
