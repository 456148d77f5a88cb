//! In-process simulation of the ledger and oracle collaborators.
//!
//! Implements exactly the interface contracts the orchestration consumes,
//! so the full draw pipeline can be exercised end to end without a
//! cluster. Used by the test suite and by the CLI's simulated draw.

mod ledger;
mod oracle;

pub use ledger::{decompile, SimInstruction, SimLedger, SIM_RENT_MINIMUM};
pub use oracle::{
    commitment_hash, SimOracle, ORACLE_IX_COMMIT, ORACLE_IX_CREATE, ORACLE_IX_REVEAL,
    ORACLE_PROGRAM_ID,
};
