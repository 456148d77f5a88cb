//! Instruction builders for the draw program.
//!
//! The program is consumed as an externally-defined set of callable
//! operations with a fixed account layout; instruction data follows the
//! Anchor global-namespace discriminator convention, so no generated
//! bindings are needed.

use drawkit_core::{pda, Result};
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

pub const PLAYER_STATE_SEED: &[u8] = b"playerState";
pub const ESCROW_SEED: &[u8] = b"stateEscrow";

/// First eight bytes of `sha256("global:<name>")`.
pub fn discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{}", name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[derive(Debug, Clone, Copy)]
pub struct FlipProgram {
    program_id: Pubkey,
}

impl FlipProgram {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn id(&self) -> Pubkey {
        self.program_id
    }

    /// Player-state address for `participant`. Derivations must not be
    /// cached across program-id changes; the program handle owns the id.
    pub fn player_state_address(&self, participant: &Pubkey) -> Result<(Pubkey, u8)> {
        pda::derive(PLAYER_STATE_SEED, &self.program_id, participant)
    }

    pub fn escrow_address(&self, participant: &Pubkey) -> Result<(Pubkey, u8)> {
        pda::derive(ESCROW_SEED, &self.program_id, participant)
    }

    /// Establish the player-state account.
    pub fn initialize(&self, participant: &Pubkey) -> Result<Instruction> {
        let (player_state, _) = self.player_state_address(participant)?;
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(player_state, false),
                AccountMeta::new(*participant, true),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: discriminator("initialize").to_vec(),
        })
    }

    /// Bind the draw to `randomness_account`. Reads the commitment account
    /// populated by the oracle's commit instruction, so it must execute
    /// after it within the same bundle.
    pub fn generate_randomness(
        &self,
        participant: &Pubkey,
        randomness_account: &Pubkey,
    ) -> Result<Instruction> {
        let (player_state, _) = self.player_state_address(participant)?;
        let mut data = discriminator("generate_randomness").to_vec();
        data.extend_from_slice(randomness_account.as_ref());
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(player_state, false),
                AccountMeta::new(*participant, true),
                AccountMeta::new_readonly(*randomness_account, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data,
        })
    }

    /// Resolve the draw against the revealed value and the escrow. Must
    /// execute after the oracle's reveal instruction within the same bundle.
    pub fn settle_flip(
        &self,
        participant: &Pubkey,
        randomness_account: &Pubkey,
    ) -> Result<Instruction> {
        let (player_state, _) = self.player_state_address(participant)?;
        let (escrow, escrow_bump) = self.escrow_address(participant)?;
        let mut data = discriminator("settle_flip").to_vec();
        data.push(escrow_bump);
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(player_state, false),
                AccountMeta::new(*participant, true),
                AccountMeta::new_readonly(*randomness_account, false),
                AccountMeta::new(escrow, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_follow_the_anchor_convention() {
        // Known vectors from the Anchor global namespace.
        assert_eq!(
            discriminator("initialize"),
            [175, 175, 109, 31, 13, 152, 155, 237]
        );
        assert_eq!(
            discriminator("generate_randomness"),
            [184, 236, 174, 26, 122, 173, 183, 73]
        );
    }

    #[test]
    fn settle_data_carries_the_escrow_bump() {
        let program = FlipProgram::new(Pubkey::new_unique());
        let participant = Pubkey::new_unique();
        let randomness = Pubkey::new_unique();

        let (_, bump) = program.escrow_address(&participant).unwrap();
        let ix = program.settle_flip(&participant, &randomness).unwrap();

        assert_eq!(ix.data.len(), 9);
        assert_eq!(ix.data[8], bump);
    }

    #[test]
    fn generate_randomness_embeds_the_account_argument() {
        let program = FlipProgram::new(Pubkey::new_unique());
        let participant = Pubkey::new_unique();
        let randomness = Pubkey::new_unique();

        let ix = program.generate_randomness(&participant, &randomness).unwrap();

        assert_eq!(&ix.data[8..40], randomness.as_ref());
    }
}
