use drawkit_core::{pda, SubmitOptions};
use drawkit_flip::program::{discriminator, ESCROW_SEED, PLAYER_STATE_SEED};
use drawkit_flip::sim::{
    decompile, SimInstruction, SimLedger, SimOracle, ORACLE_IX_COMMIT, ORACLE_IX_REVEAL,
    ORACLE_PROGRAM_ID, SIM_RENT_MINIMUM,
};
use drawkit_flip::{
    DrawConfig, DrawOrchestrator, DrawState, DrawStep, FlipError, FlipResult, RecordingObserver,
};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    program_id: Pubkey,
    ledger: Arc<SimLedger>,
    oracle: Arc<SimOracle>,
    observer: Arc<RecordingObserver>,
    orchestrator: DrawOrchestrator,
    participant: Keypair,
}

fn submit_opts(max_retries: u32) -> SubmitOptions {
    SubmitOptions {
        max_retries,
        confirm_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(1),
        ..SubmitOptions::default()
    }
}

fn harness(label: &str, oracle: SimOracle, max_retries: u32) -> Harness {
    let program_id = Pubkey::new_unique();
    let ledger = Arc::new(SimLedger::new(program_id));
    let oracle = Arc::new(oracle);
    let observer = Arc::new(RecordingObserver::new());

    let participant = Keypair::new();
    ledger.airdrop(&participant.pubkey(), 10_000_000_000);
    ledger.register_participant(&participant.pubkey(), label);

    let config = DrawConfig {
        rpc_endpoint: "http://localhost:8899".to_string(),
        queue: None,
        submit: submit_opts(max_retries),
    };
    let orchestrator = DrawOrchestrator::new(
        ledger.clone(),
        oracle.clone(),
        observer.clone(),
        program_id,
        config,
    );

    Harness {
        program_id,
        ledger,
        oracle,
        observer,
        orchestrator,
        participant,
    }
}

fn escrow_address(h: &Harness) -> Pubkey {
    pda::derive(ESCROW_SEED, &h.program_id, &h.participant.pubkey())
        .unwrap()
        .0
}

fn bundle_containing(attempts: &[Transaction], disc: &[u8; 8]) -> Vec<SimInstruction> {
    attempts
        .iter()
        .map(decompile)
        .find(|ixs| ixs.iter().any(|ix| ix.data.starts_with(disc)))
        .expect("no broadcast bundle contains the instruction")
}

fn position_of_oracle_tag(ixs: &[SimInstruction], tag: u8) -> usize {
    ixs.iter()
        .position(|ix| ix.program_id == ORACLE_PROGRAM_ID && ix.data.first() == Some(&tag))
        .expect("oracle instruction missing from bundle")
}

fn position_of_program_ix(ixs: &[SimInstruction], disc: &[u8; 8]) -> usize {
    ixs.iter()
        .position(|ix| ix.data.starts_with(disc))
        .expect("program instruction missing from bundle")
}

#[tokio::test]
async fn full_draw_walks_every_state_in_order() {
    let h = harness("alice", SimOracle::with_value([2u8; 32]), 3);

    let outcome = h.orchestrator.run(&h.participant).await.unwrap();

    assert_eq!(outcome.participant, "alice");
    assert_eq!(outcome.result, FlipResult::Winner);

    assert_eq!(
        h.observer.states(),
        vec![
            DrawState::Uninitialized,
            DrawState::PlayerStateReady,
            DrawState::EscrowFunded,
            DrawState::CommitmentCreated,
            DrawState::Committed,
            DrawState::Revealed,
            DrawState::Settled,
        ]
    );

    // Exactly one ephemeral randomness session and one reported outcome.
    assert_eq!(h.oracle.session_count(), 1);
    assert_eq!(h.observer.outcomes().len(), 1);
}

#[tokio::test]
async fn odd_revealed_value_loses() {
    let h = harness("bob", SimOracle::with_value([3u8; 32]), 3);

    let outcome = h.orchestrator.run(&h.participant).await.unwrap();

    assert_eq!(outcome.participant, "bob");
    assert_eq!(outcome.result, FlipResult::Loser);
}

#[tokio::test]
async fn player_state_initialization_is_idempotent() {
    let h = harness("alice", SimOracle::new(), 3);
    let player_state = pda::derive(PLAYER_STATE_SEED, &h.program_id, &h.participant.pubkey())
        .unwrap()
        .0;

    h.orchestrator.run(&h.participant).await.unwrap();
    let lamports_after_first = h.ledger.lamports(&player_state);

    h.orchestrator.run(&h.participant).await.unwrap();

    // The second draw neither re-submits initialize nor touches the account.
    let initialize_bundles = h
        .ledger
        .broadcast_attempts()
        .iter()
        .map(decompile)
        .filter(|ixs| {
            ixs.iter()
                .any(|ix| ix.data.starts_with(&discriminator("initialize")))
        })
        .count();
    assert_eq!(initialize_bundles, 1);
    assert_eq!(h.ledger.lamports(&player_state), lamports_after_first);
}

#[tokio::test]
async fn commit_strictly_precedes_generation_in_one_bundle() {
    let h = harness("alice", SimOracle::new(), 3);

    h.orchestrator.run(&h.participant).await.unwrap();

    let attempts = h.ledger.broadcast_attempts();
    let bundle = bundle_containing(&attempts, &discriminator("generate_randomness"));
    assert_eq!(bundle.len(), 2);
    assert!(
        position_of_oracle_tag(&bundle, ORACLE_IX_COMMIT)
            < position_of_program_ix(&bundle, &discriminator("generate_randomness"))
    );
}

#[tokio::test]
async fn reveal_strictly_precedes_settle_in_one_bundle() {
    let h = harness("alice", SimOracle::new(), 3);

    h.orchestrator.run(&h.participant).await.unwrap();

    let attempts = h.ledger.broadcast_attempts();
    let bundle = bundle_containing(&attempts, &discriminator("settle_flip"));
    assert_eq!(bundle.len(), 2);
    assert!(
        position_of_oracle_tag(&bundle, ORACLE_IX_REVEAL)
            < position_of_program_ix(&bundle, &discriminator("settle_flip"))
    );
}

#[tokio::test]
async fn escrow_is_rent_exempt_after_funding() {
    let h = harness("alice", SimOracle::new(), 3);
    let escrow = escrow_address(&h);
    assert_eq!(h.ledger.lamports(&escrow), 0);

    h.orchestrator.run(&h.participant).await.unwrap();

    assert!(h.ledger.lamports(&escrow) >= SIM_RENT_MINIMUM);
}

#[tokio::test]
async fn prefunded_escrow_issues_no_transfer() {
    let h = harness("alice", SimOracle::new(), 3);
    let escrow = escrow_address(&h);
    h.ledger.airdrop(&escrow, SIM_RENT_MINIMUM);

    h.orchestrator.run(&h.participant).await.unwrap();

    let transfers_to_escrow = h
        .ledger
        .broadcast_attempts()
        .iter()
        .flat_map(|tx| decompile(tx))
        .filter(|ix| {
            ix.program_id == system_program::id() && ix.accounts.get(1) == Some(&escrow)
        })
        .count();
    assert_eq!(transfers_to_escrow, 0);
}

#[tokio::test]
async fn transient_broadcast_failure_resends_identical_bytes_once() {
    let h = harness("alice", SimOracle::new(), 1);

    // First draw establishes player state and escrow funding; its commit
    // bundle is broadcast attempt 3 (initialize, fund, create, commit,
    // settle). The second draw's commit bundle is then attempt 6.
    h.orchestrator.run(&h.participant).await.unwrap();
    assert_eq!(h.ledger.broadcast_attempts().len(), 5);

    h.ledger.fail_broadcast_at(6);
    h.orchestrator.run(&h.participant).await.unwrap();

    let attempts = h.ledger.broadcast_attempts();
    // create, failed commit, identical resend, settle.
    assert_eq!(attempts.len(), 9);
    assert_eq!(attempts[6], attempts[7]);

    let failed = decompile(&attempts[6]);
    assert_eq!(position_of_oracle_tag(&failed, ORACLE_IX_COMMIT), 0);
    assert!(failed[1]
        .data
        .starts_with(&discriminator("generate_randomness")));
}

#[tokio::test]
async fn aborted_draw_names_the_failing_step() {
    let h = harness("alice", SimOracle::new(), 3);
    let broke = Keypair::new(); // never airdropped

    let err = h.orchestrator.run(&broke).await.unwrap_err();

    match err {
        FlipError::Aborted { step, .. } => assert_eq!(step, DrawStep::Initialize),
        other => panic!("expected abort, got {other}"),
    }

    let states = h.observer.states();
    assert!(matches!(states.last(), Some(DrawState::Aborted { .. })));
}
