use anyhow::{anyhow, Context};
use comfy_table::{presets::UTF8_FULL, Table};
use drawkit_core::{
    signer, BalanceGuard, ClusterConfig, FundingOutcome, LedgerRpc, RpcLedger, SubmitOptions,
};
use drawkit_flip::sim::{SimLedger, SimOracle};
use drawkit_flip::{DrawConfig, DrawOrchestrator, FlipProgram, RecordingObserver};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

type CliResult = anyhow::Result<()>;

fn load_config(path: &Path) -> anyhow::Result<ClusterConfig> {
    ClusterConfig::load(path)
        .with_context(|| format!("failed to load cluster config from {}", path.display()))
}

fn submit_options(config: &ClusterConfig) -> SubmitOptions {
    SubmitOptions {
        durability: config.durability,
        skip_preflight: config.skip_preflight,
        max_retries: config.max_retries,
        confirm_timeout: config.confirm_timeout(),
        ..SubmitOptions::default()
    }
}

pub async fn init_config(path: &Path, cluster: &str, program: &str) -> CliResult {
    let mut config = match cluster {
        "localnet" => ClusterConfig::localnet(),
        "devnet" => ClusterConfig::devnet(),
        "mainnet" => ClusterConfig::mainnet(),
        other => return Err(anyhow!("unknown cluster preset '{}'", other)),
    };
    config.program_id = program.to_string();
    config.validate()?;
    config.save(path)?;

    println!("Wrote cluster config to {}", path.display());
    Ok(())
}

pub async fn show_addresses(
    config_path: &Path,
    wallet: &Path,
    program_override: Option<&str>,
) -> CliResult {
    let keypair = signer::load_keypair(wallet)?;
    let program_id = match program_override {
        Some(raw) => {
            Pubkey::from_str(raw).map_err(|e| anyhow!("invalid program id '{}': {}", raw, e))?
        }
        None => load_config(config_path)?.program_pubkey()?,
    };
    let program = FlipProgram::new(program_id);
    let user = keypair.pubkey();

    let (player_state, state_bump) = program.player_state_address(&user)?;
    let (escrow, escrow_bump) = program.escrow_address(&user)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Account", "Address", "Bump"]);
    table.add_row(vec![
        "Participant".to_string(),
        user.to_string(),
        "-".to_string(),
    ]);
    table.add_row(vec![
        "Player state".to_string(),
        player_state.to_string(),
        state_bump.to_string(),
    ]);
    table.add_row(vec![
        "Escrow".to_string(),
        escrow.to_string(),
        escrow_bump.to_string(),
    ]);
    println!("{}", table);

    Ok(())
}

pub async fn show_status(config_path: &Path, wallet: &Path) -> CliResult {
    let config = load_config(config_path)?;
    let keypair = signer::load_keypair(wallet)?;
    let program = FlipProgram::new(config.program_pubkey()?);
    let user = keypair.pubkey();

    let ledger = RpcLedger::new(config.rpc_url.clone());
    let (player_state, _) = program.player_state_address(&user)?;
    let (escrow, _) = program.escrow_address(&user)?;

    let initialized = ledger.account_exists(&player_state).await?;
    let escrow_balance = ledger.balance(&escrow).await?;
    let rent_minimum = ledger.minimum_rent_exempt_balance(0).await?;
    let payer_balance = ledger.balance(&user).await?;

    println!("Draw status on {}", config.rpc_url);
    println!("  Participant: {}", user);
    println!(
        "  Player state: {} ({})",
        player_state,
        if initialized {
            "initialized"
        } else {
            "not initialized"
        }
    );
    println!(
        "  Escrow: {} ({} lamports, rent minimum {})",
        escrow, escrow_balance, rent_minimum
    );
    println!("  Payer balance: {} lamports", payer_balance);

    Ok(())
}

pub async fn fund_escrow(config_path: &Path, wallet: &Path, yes: bool) -> CliResult {
    let config = load_config(config_path)?;
    let keypair = signer::load_keypair(wallet)?;
    let program = FlipProgram::new(config.program_pubkey()?);
    let (escrow, _) = program.escrow_address(&keypair.pubkey())?;

    let ledger: Arc<dyn LedgerRpc> = Arc::new(RpcLedger::new(config.rpc_url.clone()));
    let current = ledger.balance(&escrow).await?;
    let minimum = ledger.minimum_rent_exempt_balance(0).await?;

    if current >= minimum {
        println!(
            "Escrow {} already holds {} lamports (minimum {})",
            escrow, current, minimum
        );
        return Ok(());
    }

    let deficit = minimum - current;
    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Transfer {} lamports to escrow {}?",
                deficit, escrow
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let guard = BalanceGuard::new(ledger);
    match guard
        .ensure_rent_exempt(&escrow, &keypair, &submit_options(&config))
        .await?
    {
        FundingOutcome::AlreadyFunded => println!("Escrow already funded."),
        FundingOutcome::ToppedUp {
            lamports,
            signature,
        } => {
            println!("Topped escrow up by {} lamports: {}", lamports, signature);
        }
    }

    Ok(())
}

pub async fn run_simulated_draw(participant_label: &str, seed: Option<&str>) -> CliResult {
    let oracle = match seed {
        Some(raw) => {
            let bytes = hex::decode(raw).context("seed must be hex encoded")?;
            let value: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow!("seed must be exactly 32 bytes"))?;
            SimOracle::with_value(value)
        }
        None => SimOracle::new(),
    };

    let program_id = Pubkey::new_unique();
    let ledger = Arc::new(SimLedger::new(program_id));
    let observer = Arc::new(RecordingObserver::new());

    let participant = Keypair::new();
    ledger.airdrop(&participant.pubkey(), 10_000_000_000);
    ledger.register_participant(&participant.pubkey(), participant_label);

    let config = DrawConfig {
        rpc_endpoint: "sim://local".to_string(),
        queue: None,
        submit: SubmitOptions {
            poll_interval: std::time::Duration::from_millis(1),
            ..SubmitOptions::default()
        },
    };
    let orchestrator = DrawOrchestrator::new(
        ledger.clone(),
        Arc::new(oracle),
        observer.clone(),
        program_id,
        config,
    );

    let outcome = orchestrator.run(&participant).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["State", "Signature", "Time"]);
    for event in observer.events() {
        table.add_row(vec![
            event.state.to_string(),
            event
                .signature
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            event.at.format("%H:%M:%S%.3f").to_string(),
        ]);
    }
    println!("{}", table);
    println!();
    println!("Result for {}: {}", outcome.participant, outcome.result);

    Ok(())
}
