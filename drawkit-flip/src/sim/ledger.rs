use crate::outcome::RESULT_MARKER;
use crate::program::{discriminator, ESCROW_SEED, PLAYER_STATE_SEED};
use crate::sim::oracle::{
    commitment_hash, ORACLE_IX_COMMIT, ORACLE_IX_CREATE, ORACLE_IX_REVEAL, ORACLE_PROGRAM_ID,
};
use async_trait::async_trait;
use drawkit_core::{pda, CoreError, Durability, LedgerRpc, SignatureStatus, SimulationOutcome};
use parking_lot::Mutex;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use std::collections::HashMap;

type CoreResult<T> = drawkit_core::Result<T>;

/// Rent-exempt minimum for a zero-data account, in lamports.
pub const SIM_RENT_MINIMUM: u64 = 890_880;

const SYSTEM_IX_TRANSFER: u32 = 2;

/// One compiled instruction resolved back to addresses. Tests use this to
/// assert what the submitter actually broadcast.
#[derive(Debug, Clone)]
pub struct SimInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

pub fn decompile(tx: &Transaction) -> Vec<SimInstruction> {
    let keys = &tx.message.account_keys;
    tx.message
        .instructions
        .iter()
        .map(|ci| SimInstruction {
            program_id: keys[ci.program_id_index as usize],
            accounts: ci.accounts.iter().map(|&i| keys[i as usize]).collect(),
            data: ci.data.clone(),
        })
        .collect()
}

#[derive(Debug, Clone)]
enum AccountKind {
    Wallet,
    PlayerState { randomness_account: Option<Pubkey> },
    Randomness { commitment: [u8; 32], committed: bool, revealed: Option<[u8; 32]> },
}

#[derive(Debug, Clone)]
struct SimAccount {
    lamports: u64,
    kind: AccountKind,
}

#[derive(Default)]
struct SimState {
    accounts: HashMap<Pubkey, SimAccount>,
    statuses: HashMap<Signature, SignatureStatus>,
    logs: HashMap<Signature, Vec<String>>,
    broadcast_attempts: Vec<Transaction>,
    /// Broadcast attempt indices that fail with a transient transport error.
    failing_attempts: Vec<usize>,
    labels: HashMap<Pubkey, String>,
}

/// In-process ledger.
///
/// Implements the same RPC seam the live adapter does, with lamport
/// accounts and atomic bundle execution for the system transfer, the draw
/// program's three operations, and the simulated oracle's commit-reveal
/// session. Every broadcast attempt is recorded, including failed ones, so
/// tests can assert resend behavior byte for byte.
pub struct SimLedger {
    program_id: Pubkey,
    state: Mutex<SimState>,
}

impl SimLedger {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn airdrop(&self, account: &Pubkey, lamports: u64) {
        let mut state = self.state.lock();
        state
            .accounts
            .entry(*account)
            .or_insert(SimAccount {
                lamports: 0,
                kind: AccountKind::Wallet,
            })
            .lamports += lamports;
    }

    /// Display label used in the settle log line for this participant.
    pub fn register_participant(&self, account: &Pubkey, label: &str) {
        self.state.lock().labels.insert(*account, label.to_string());
    }

    /// Fail the broadcast attempt with the given zero-based index with a
    /// transient transport error. The attempt is still recorded.
    pub fn fail_broadcast_at(&self, attempt_index: usize) {
        self.state.lock().failing_attempts.push(attempt_index);
    }

    pub fn broadcast_attempts(&self) -> Vec<Transaction> {
        self.state.lock().broadcast_attempts.clone()
    }

    pub fn lamports(&self, account: &Pubkey) -> u64 {
        self.state
            .lock()
            .accounts
            .get(account)
            .map(|a| a.lamports)
            .unwrap_or(0)
    }

    fn execute(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        labels: &HashMap<Pubkey, String>,
        tx: &Transaction,
    ) -> std::result::Result<Vec<String>, (String, Vec<String>)> {
        let mut logs = Vec::new();
        for ix in decompile(tx) {
            if let Err(err) = self.run_instruction(accounts, labels, &ix, &mut logs) {
                logs.push(format!("Program log: Error: {}", err));
                return Err((err, logs));
            }
        }
        Ok(logs)
    }

    fn run_instruction(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        labels: &HashMap<Pubkey, String>,
        ix: &SimInstruction,
        logs: &mut Vec<String>,
    ) -> std::result::Result<(), String> {
        if ix.program_id == system_program::id() {
            run_system(accounts, ix, logs)
        } else if ix.program_id == ORACLE_PROGRAM_ID {
            run_oracle(accounts, ix, logs)
        } else if ix.program_id == self.program_id {
            self.run_flip(accounts, labels, ix, logs)
        } else {
            Err(format!("unknown program {}", ix.program_id))
        }
    }

    fn run_flip(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        labels: &HashMap<Pubkey, String>,
        ix: &SimInstruction,
        logs: &mut Vec<String>,
    ) -> std::result::Result<(), String> {
        let disc: [u8; 8] = ix
            .data
            .get(0..8)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| "malformed draw instruction".to_string())?;

        if disc == discriminator("initialize") {
            self.run_initialize(accounts, ix, logs)
        } else if disc == discriminator("generate_randomness") {
            self.run_generate_randomness(accounts, ix, logs)
        } else if disc == discriminator("settle_flip") {
            self.run_settle_flip(accounts, labels, ix, logs)
        } else {
            Err("unknown draw instruction".to_string())
        }
    }

    fn run_initialize(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        ix: &SimInstruction,
        logs: &mut Vec<String>,
    ) -> std::result::Result<(), String> {
        let [player_state, user] = expect_accounts::<2>(ix)?;
        logs.push("Program log: Instruction: Initialize".to_string());

        let (expected, _) = pda::derive(PLAYER_STATE_SEED, &self.program_id, &user)
            .map_err(|e| e.to_string())?;
        if player_state != expected {
            return Err("player state address does not match derivation".to_string());
        }

        if accounts.contains_key(&player_state) {
            return Err(format!("account {} already in use", player_state));
        }

        debit(accounts, &user, SIM_RENT_MINIMUM)?;
        accounts.insert(
            player_state,
            SimAccount {
                lamports: SIM_RENT_MINIMUM,
                kind: AccountKind::PlayerState {
                    randomness_account: None,
                },
            },
        );
        Ok(())
    }

    fn run_generate_randomness(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        ix: &SimInstruction,
        logs: &mut Vec<String>,
    ) -> std::result::Result<(), String> {
        let [player_state, user, randomness_account] = expect_accounts::<3>(ix)?;
        logs.push("Program log: Instruction: GenerateRandomness".to_string());

        let (expected, _) = pda::derive(PLAYER_STATE_SEED, &self.program_id, &user)
            .map_err(|e| e.to_string())?;
        if player_state != expected {
            return Err("player state address does not match derivation".to_string());
        }

        let arg: [u8; 32] = ix
            .data
            .get(8..40)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| "malformed randomness argument".to_string())?;
        if Pubkey::new_from_array(arg) != randomness_account {
            return Err("randomness argument does not match account".to_string());
        }

        match accounts.get(&randomness_account).map(|a| &a.kind) {
            Some(AccountKind::Randomness {
                committed: true,
                revealed: None,
                ..
            }) => {}
            Some(AccountKind::Randomness {
                revealed: Some(_), ..
            }) => return Err("RandomnessAlreadyRevealed".to_string()),
            Some(AccountKind::Randomness { .. }) => {
                return Err("RandomnessNotResolved".to_string())
            }
            _ => return Err("randomness account missing".to_string()),
        }

        match accounts.get_mut(&player_state).map(|a| &mut a.kind) {
            Some(AccountKind::PlayerState {
                randomness_account: bound,
            }) => {
                *bound = Some(randomness_account);
                Ok(())
            }
            _ => Err("player state missing".to_string()),
        }
    }

    fn run_settle_flip(
        &self,
        accounts: &mut HashMap<Pubkey, SimAccount>,
        labels: &HashMap<Pubkey, String>,
        ix: &SimInstruction,
        logs: &mut Vec<String>,
    ) -> std::result::Result<(), String> {
        let [player_state, user, randomness_account, escrow] = expect_accounts::<4>(ix)?;
        logs.push("Program log: Instruction: SettleFlip".to_string());

        let (expected_escrow, expected_bump) = pda::derive(ESCROW_SEED, &self.program_id, &user)
            .map_err(|e| e.to_string())?;
        if escrow != expected_escrow || ix.data.get(8) != Some(&expected_bump) {
            return Err("Unauthorized".to_string());
        }

        let escrow_lamports = accounts.get(&escrow).map(|a| a.lamports).unwrap_or(0);
        if escrow_lamports < SIM_RENT_MINIMUM {
            return Err("NotEnoughFundsToPlay".to_string());
        }

        let bound = match accounts.get(&player_state).map(|a| &a.kind) {
            Some(AccountKind::PlayerState {
                randomness_account: bound,
            }) => *bound,
            _ => return Err("player state missing".to_string()),
        };
        if bound != Some(randomness_account) {
            return Err("Unauthorized".to_string());
        }

        let value = match accounts.get(&randomness_account).map(|a| &a.kind) {
            Some(AccountKind::Randomness {
                revealed: Some(value),
                ..
            }) => *value,
            Some(AccountKind::Randomness { .. }) => {
                return Err("RandomnessNotResolved".to_string())
            }
            _ => return Err("randomness account missing".to_string()),
        };

        // Consume the session.
        if let Some(account) = accounts.get_mut(&player_state) {
            account.kind = AccountKind::PlayerState {
                randomness_account: None,
            };
        }

        logs.push(format!(
            "Program log: revealed value {}",
            hex::encode(value)
        ));
        let result = if value[0] % 2 == 0 { "WINNER" } else { "LOSER" };
        let label = labels
            .get(&user)
            .cloned()
            .unwrap_or_else(|| user.to_string());
        logs.push(format!("Program log: {} {}: {}", RESULT_MARKER, label, result));
        Ok(())
    }
}

fn run_system(
    accounts: &mut HashMap<Pubkey, SimAccount>,
    ix: &SimInstruction,
    logs: &mut Vec<String>,
) -> std::result::Result<(), String> {
    let tag: [u8; 4] = ix
        .data
        .get(0..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| "malformed system instruction".to_string())?;
    if u32::from_le_bytes(tag) != SYSTEM_IX_TRANSFER {
        return Err("unsupported system instruction".to_string());
    }

    let lamports: [u8; 8] = ix
        .data
        .get(4..12)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| "malformed transfer amount".to_string())?;
    let lamports = u64::from_le_bytes(lamports);
    let [from, to] = expect_accounts::<2>(ix)?;

    debit(accounts, &from, lamports)?;
    accounts
        .entry(to)
        .or_insert(SimAccount {
            lamports: 0,
            kind: AccountKind::Wallet,
        })
        .lamports += lamports;

    logs.push(format!(
        "Program log: transferred {} lamports to {}",
        lamports, to
    ));
    Ok(())
}

fn run_oracle(
    accounts: &mut HashMap<Pubkey, SimAccount>,
    ix: &SimInstruction,
    logs: &mut Vec<String>,
) -> std::result::Result<(), String> {
    let tag = *ix.data.first().ok_or("empty oracle instruction")?;
    match tag {
        ORACLE_IX_CREATE => {
            let commitment: [u8; 32] = ix
                .data
                .get(1..33)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| "malformed commitment".to_string())?;
            let [randomness_account, _queue] = expect_accounts::<2>(ix)?;
            if accounts.contains_key(&randomness_account) {
                return Err(format!("account {} already in use", randomness_account));
            }
            accounts.insert(
                randomness_account,
                SimAccount {
                    lamports: 0,
                    kind: AccountKind::Randomness {
                        commitment,
                        committed: false,
                        revealed: None,
                    },
                },
            );
            logs.push("Program log: randomness session created".to_string());
            Ok(())
        }
        ORACLE_IX_COMMIT => {
            let [randomness_account, _queue] = expect_accounts::<2>(ix)?;
            match accounts.get_mut(&randomness_account).map(|a| &mut a.kind) {
                Some(AccountKind::Randomness { revealed: Some(_), .. }) => {
                    Err("RandomnessAlreadyRevealed".to_string())
                }
                Some(AccountKind::Randomness { committed, .. }) => {
                    *committed = true;
                    logs.push("Program log: randomness committed".to_string());
                    Ok(())
                }
                _ => Err("randomness account missing".to_string()),
            }
        }
        ORACLE_IX_REVEAL => {
            let value: [u8; 32] = ix
                .data
                .get(1..33)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| "malformed reveal value".to_string())?;
            let [randomness_account] = expect_accounts::<1>(ix)?;
            match accounts.get_mut(&randomness_account).map(|a| &mut a.kind) {
                Some(AccountKind::Randomness {
                    commitment,
                    committed,
                    revealed,
                }) => {
                    if !*committed {
                        return Err("RandomnessNotResolved".to_string());
                    }
                    if commitment_hash(&value) != *commitment {
                        return Err("revealed value does not match commitment".to_string());
                    }
                    *revealed = Some(value);
                    logs.push("Program log: randomness revealed".to_string());
                    Ok(())
                }
                _ => Err("randomness account missing".to_string()),
            }
        }
        _ => Err("unknown oracle instruction".to_string()),
    }
}

fn expect_accounts<const N: usize>(ix: &SimInstruction) -> std::result::Result<[Pubkey; N], String> {
    if ix.accounts.len() < N {
        return Err(format!(
            "expected at least {} accounts, got {}",
            N,
            ix.accounts.len()
        ));
    }
    let mut out = [Pubkey::default(); N];
    out.copy_from_slice(&ix.accounts[..N]);
    Ok(out)
}

fn debit(
    accounts: &mut HashMap<Pubkey, SimAccount>,
    account: &Pubkey,
    lamports: u64,
) -> std::result::Result<(), String> {
    let entry = accounts
        .get_mut(account)
        .ok_or_else(|| format!("unknown funding account {}", account))?;
    if entry.lamports < lamports {
        return Err(format!(
            "insufficient lamports in {}: need {}, have {}",
            account, lamports, entry.lamports
        ));
    }
    entry.lamports -= lamports;
    Ok(())
}

#[async_trait]
impl LedgerRpc for SimLedger {
    async fn balance(&self, account: &Pubkey) -> CoreResult<u64> {
        Ok(self.lamports(account))
    }

    async fn account_exists(&self, account: &Pubkey) -> CoreResult<bool> {
        Ok(self.state.lock().accounts.contains_key(account))
    }

    async fn minimum_rent_exempt_balance(&self, _data_len: usize) -> CoreResult<u64> {
        Ok(SIM_RENT_MINIMUM)
    }

    async fn latest_blockhash(&self) -> CoreResult<Hash> {
        Ok(Hash::new_unique())
    }

    async fn simulate(&self, tx: &Transaction) -> CoreResult<SimulationOutcome> {
        let state = self.state.lock();
        let mut scratch = state.accounts.clone();
        let labels = state.labels.clone();
        drop(state);

        let (err, logs) = match self.execute(&mut scratch, &labels, tx) {
            Ok(logs) => (None, logs),
            Err((err, logs)) => (Some(err), logs),
        };
        Ok(SimulationOutcome {
            err,
            logs,
            units_consumed: Some(2_000 * tx.message.instructions.len() as u64),
        })
    }

    async fn broadcast(&self, tx: &Transaction) -> CoreResult<Signature> {
        let mut state = self.state.lock();
        let attempt = state.broadcast_attempts.len();
        state.broadcast_attempts.push(tx.clone());

        if let Some(pos) = state.failing_attempts.iter().position(|&i| i == attempt) {
            state.failing_attempts.swap_remove(pos);
            return Err(CoreError::broadcast("simulated connection reset"));
        }

        let signature = tx
            .signatures
            .first()
            .copied()
            .ok_or_else(|| CoreError::broadcast("unsigned transaction"))?;

        let mut scratch = state.accounts.clone();
        let labels = state.labels.clone();
        match self.execute(&mut scratch, &labels, tx) {
            Ok(logs) => {
                state.accounts = scratch;
                state.statuses.insert(
                    signature,
                    SignatureStatus {
                        durability: Durability::Finalized,
                        err: None,
                    },
                );
                state.logs.insert(signature, logs);
            }
            Err((err, logs)) => {
                state.statuses.insert(
                    signature,
                    SignatureStatus {
                        durability: Durability::Finalized,
                        err: Some(err),
                    },
                );
                state.logs.insert(signature, logs);
            }
        }
        Ok(signature)
    }

    async fn signature_status(&self, signature: &Signature) -> CoreResult<Option<SignatureStatus>> {
        Ok(self.state.lock().statuses.get(signature).cloned())
    }

    async fn transaction_logs(&self, signature: &Signature) -> CoreResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .logs
            .get(signature)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Keypair;
    use solana_sdk::signer::Signer;
    use solana_sdk::system_instruction;
    use solana_sdk::transaction::Transaction;

    fn signed_transfer(from: &Keypair, to: &Pubkey, lamports: u64) -> Transaction {
        let ix = system_instruction::transfer(&from.pubkey(), to, lamports);
        Transaction::new_signed_with_payer(
            &[ix],
            Some(&from.pubkey()),
            &[from],
            Hash::new_unique(),
        )
    }

    #[tokio::test]
    async fn transfers_move_lamports_atomically() {
        let ledger = SimLedger::new(Pubkey::new_unique());
        let payer = Keypair::new();
        let target = Pubkey::new_unique();
        ledger.airdrop(&payer.pubkey(), 1_000);

        let signature = ledger
            .broadcast(&signed_transfer(&payer, &target, 400))
            .await
            .unwrap();

        let status = ledger.signature_status(&signature).await.unwrap().unwrap();
        assert!(status.err.is_none());
        assert_eq!(ledger.lamports(&payer.pubkey()), 600);
        assert_eq!(ledger.lamports(&target), 400);
    }

    #[tokio::test]
    async fn overdraft_fails_without_side_effects() {
        let ledger = SimLedger::new(Pubkey::new_unique());
        let payer = Keypair::new();
        let target = Pubkey::new_unique();
        ledger.airdrop(&payer.pubkey(), 100);

        let signature = ledger
            .broadcast(&signed_transfer(&payer, &target, 400))
            .await
            .unwrap();

        let status = ledger.signature_status(&signature).await.unwrap().unwrap();
        assert!(status.err.is_some());
        assert_eq!(ledger.lamports(&payer.pubkey()), 100);
        assert_eq!(ledger.lamports(&target), 0);
    }

    #[tokio::test]
    async fn injected_failures_hit_the_chosen_attempt() {
        let ledger = SimLedger::new(Pubkey::new_unique());
        let payer = Keypair::new();
        let target = Pubkey::new_unique();
        ledger.airdrop(&payer.pubkey(), 1_000);
        ledger.fail_broadcast_at(0);

        let tx = signed_transfer(&payer, &target, 1);
        let first = ledger.broadcast(&tx).await;
        assert!(matches!(first, Err(CoreError::Broadcast(_))));

        ledger.broadcast(&tx).await.unwrap();
        assert_eq!(ledger.broadcast_attempts().len(), 2);
        assert_eq!(ledger.lamports(&target), 1);
    }
}
