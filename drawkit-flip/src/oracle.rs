//! Randomness oracle boundary.
//!
//! The oracle service is consumed as a black box: it hands out the
//! instructions that create, commit, and reveal a randomness session, and
//! resolves which queue serves a given RPC endpoint. Production adapters
//! implement this trait against the real service; the simulation adapter
//! lives in [`crate::sim`].

use crate::error::Result;
use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    /// Instruction creating the randomness account for a fresh ephemeral
    /// keypair, bound to `queue`. The ephemeral keypair co-signs the
    /// creating bundle; it is never reused across draws.
    async fn create_instruction(&self, ephemeral: &Keypair, queue: &Pubkey)
        -> Result<Instruction>;

    /// Instruction binding the hidden value to an upcoming ledger state.
    async fn commit_instruction(
        &self,
        randomness_account: &Pubkey,
        queue: &Pubkey,
    ) -> Result<Instruction>;

    /// Instruction disclosing the committed value for on-ledger validation.
    async fn reveal_instruction(&self, randomness_account: &Pubkey) -> Result<Instruction>;

    /// The queue serving `rpc_url`.
    async fn queue_for_endpoint(&self, rpc_url: &str) -> Result<Pubkey>;
}
