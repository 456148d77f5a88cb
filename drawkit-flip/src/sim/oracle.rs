use crate::error::{FlipError, Result};
use crate::oracle::RandomnessOracle;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::collections::HashMap;

/// Program id the simulated ledger routes oracle instructions to.
pub const ORACLE_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11, 11,
    11, 11, 11, 11, 11, 11, 11, 11, 11,
]);

/// Instruction tags understood by the simulated ledger.
pub const ORACLE_IX_CREATE: u8 = 0;
pub const ORACLE_IX_COMMIT: u8 = 1;
pub const ORACLE_IX_REVEAL: u8 = 2;

pub fn commitment_hash(value: &[u8; 32]) -> [u8; 32] {
    let digest = Sha256::digest(value);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Simulated randomness service.
///
/// Each session's value is bound with SHA-256 at create time; the reveal
/// instruction discloses it and the simulated ledger re-checks the binding,
/// mirroring the commit-reveal contract of the real service.
pub struct SimOracle {
    queue: Pubkey,
    fixed_value: Option<[u8; 32]>,
    sessions: Mutex<HashMap<Pubkey, [u8; 32]>>,
}

impl SimOracle {
    pub fn new() -> Self {
        Self {
            queue: Pubkey::new_unique(),
            fixed_value: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Make every session reveal `value`, so tests can pin the outcome.
    pub fn with_value(value: [u8; 32]) -> Self {
        Self {
            fixed_value: Some(value),
            ..Self::new()
        }
    }

    pub fn queue(&self) -> Pubkey {
        self.queue
    }

    /// Number of randomness sessions created so far.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    fn fresh_value(&self) -> [u8; 32] {
        match self.fixed_value {
            Some(value) => value,
            None => {
                let mut value = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut value);
                value
            }
        }
    }
}

impl Default for SimOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RandomnessOracle for SimOracle {
    async fn create_instruction(
        &self,
        ephemeral: &Keypair,
        queue: &Pubkey,
    ) -> Result<Instruction> {
        let randomness_account = ephemeral.pubkey();
        let value = self.fresh_value();
        self.sessions.lock().insert(randomness_account, value);

        let mut data = vec![ORACLE_IX_CREATE];
        data.extend_from_slice(&commitment_hash(&value));
        Ok(Instruction {
            program_id: ORACLE_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(randomness_account, true),
                AccountMeta::new_readonly(*queue, false),
            ],
            data,
        })
    }

    async fn commit_instruction(
        &self,
        randomness_account: &Pubkey,
        queue: &Pubkey,
    ) -> Result<Instruction> {
        if !self.sessions.lock().contains_key(randomness_account) {
            return Err(FlipError::oracle(format!(
                "unknown randomness account {}",
                randomness_account
            )));
        }
        Ok(Instruction {
            program_id: ORACLE_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(*randomness_account, false),
                AccountMeta::new_readonly(*queue, false),
            ],
            data: vec![ORACLE_IX_COMMIT],
        })
    }

    async fn reveal_instruction(&self, randomness_account: &Pubkey) -> Result<Instruction> {
        let value = self
            .sessions
            .lock()
            .get(randomness_account)
            .copied()
            .ok_or_else(|| {
                FlipError::oracle(format!(
                    "unknown randomness account {}",
                    randomness_account
                ))
            })?;

        let mut data = vec![ORACLE_IX_REVEAL];
        data.extend_from_slice(&value);
        Ok(Instruction {
            program_id: ORACLE_PROGRAM_ID,
            accounts: vec![AccountMeta::new(*randomness_account, false)],
            data,
        })
    }

    async fn queue_for_endpoint(&self, _rpc_url: &str) -> Result<Pubkey> {
        Ok(self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reveal_discloses_the_committed_value() {
        let oracle = SimOracle::with_value([42u8; 32]);
        let ephemeral = Keypair::new();
        let queue = oracle.queue();

        let create = oracle.create_instruction(&ephemeral, &queue).await.unwrap();
        assert_eq!(create.data[0], ORACLE_IX_CREATE);
        assert_eq!(&create.data[1..33], &commitment_hash(&[42u8; 32]));

        let reveal = oracle
            .reveal_instruction(&ephemeral.pubkey())
            .await
            .unwrap();
        assert_eq!(reveal.data[0], ORACLE_IX_REVEAL);
        assert_eq!(&reveal.data[1..33], &[42u8; 32]);
    }

    #[tokio::test]
    async fn unknown_sessions_are_rejected() {
        let oracle = SimOracle::new();
        let stranger = Pubkey::new_unique();

        assert!(oracle
            .commit_instruction(&stranger, &oracle.queue())
            .await
            .is_err());
        assert!(oracle.reveal_instruction(&stranger).await.is_err());
    }
}
