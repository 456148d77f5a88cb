mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "drawkit")]
#[command(about = "Commit-reveal draw client")]
#[command(version)]
struct Cli {
    /// Cluster config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a cluster config file for a preset
    InitConfig {
        /// Cluster preset: localnet, devnet or mainnet
        #[arg(default_value = "localnet")]
        cluster: String,
        /// Draw program id, base58
        program: String,
    },
    /// Show the derived player-state and escrow addresses
    Addresses {
        /// Signing keypair file
        wallet: PathBuf,
        /// Program id override, base58
        #[arg(short, long)]
        program: Option<String>,
    },
    /// Show on-ledger draw state for a participant
    Status {
        /// Signing keypair file
        wallet: PathBuf,
    },
    /// Top the escrow account up to the rent-exempt minimum
    Fund {
        /// Signing keypair file
        wallet: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Run a complete draw against the in-process simulation
    Flip {
        /// Display label for the participant
        #[arg(short, long, default_value = "player-1")]
        participant: String,
        /// Hex-encoded 32-byte value pinning the revealed randomness
        #[arg(long)]
        seed: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "drawkit={},drawkit_flip={},drawkit_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    let result = match cli.command {
        Commands::InitConfig { cluster, program } => {
            commands::init_config(&config_path, &cluster, &program).await
        }
        Commands::Addresses { wallet, program } => {
            commands::show_addresses(&config_path, &wallet, program.as_deref()).await
        }
        Commands::Status { wallet } => commands::show_status(&config_path, &wallet).await,
        Commands::Fund { wallet, yes } => commands::fund_escrow(&config_path, &wallet, yes).await,
        Commands::Flip { participant, seed } => {
            commands::run_simulated_draw(&participant, seed.as_deref()).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
