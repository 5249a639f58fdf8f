//! ECCPoW Node - local LDPC proof-of-work miner.
//!
//! This is the main entry point for the eccpow-node binary.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;

use config::NodeConfig;
use node::Node;

/// ECCPoW mining node.
#[derive(Parser, Debug)]
#[command(name = "eccpow-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "eccpow-node.toml")]
    config: PathBuf,

    /// Number of mining threads (0 = auto-detect)
    #[arg(long)]
    threads: Option<usize>,

    /// Trial budget per candidate attempt
    #[arg(long)]
    max_trials: Option<u64>,

    /// Difficulty level to mine at
    #[arg(long)]
    level: Option<usize>,

    /// Number of candidate identities
    #[arg(long)]
    candidates: Option<usize>,

    /// Rounds over all candidates
    #[arg(long)]
    rounds: Option<u64>,

    /// Message candidates are admitted for
    #[arg(long)]
    message: Option<String>,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ECCPoW node v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = NodeConfig::load(&args.config, &args)?;

    if args.write_config {
        config.save(&args.config)?;
        info!("Configuration written to {:?}", args.config);
        return Ok(());
    }

    info!("Node: {}", config.node_name);
    info!(
        "Level: {}, candidates: {}, rounds: {}",
        config.run.level, config.run.candidates, config.run.rounds
    );

    let node = Node::new(config)?;

    tokio::select! {
        result = node.run() => {
            match result {
                Ok(Some(block)) => info!(
                    candidate = block.candidate,
                    round = block.round,
                    nonce = block.outcome.nonce,
                    "Run finished"
                ),
                Ok(None) => info!("Run finished without a solution"),
                Err(e) => tracing::error!("Node error: {:#}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    node.shutdown();
    info!("ECCPoW node stopped");

    Ok(())
}
