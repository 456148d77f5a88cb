//! Drawkit core - ledger primitives for the commit-reveal draw client.
//!
//! Provides the address derivation, funding guard, and transaction
//! submission layers that the draw orchestration builds on, behind a
//! ledger RPC seam that tests drive with an in-process simulation.

pub mod config;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod pda;
pub mod signer;
pub mod submit;
pub mod types;

pub use config::ClusterConfig;
pub use error::{CoreError, Result};
pub use guard::{BalanceGuard, FundingOutcome};
pub use ledger::{LedgerRpc, RpcLedger};
pub use submit::{ComputeBudgetHint, SubmitOptions, TransactionSubmitter};
pub use types::{
    Durability, SignatureStatus, SimulationOutcome, TransactionBundle, TransactionReceipt,
};

pub use solana_sdk::pubkey::Pubkey;
pub use solana_sdk::signature::{Keypair, Signature};
