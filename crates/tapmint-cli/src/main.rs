//! NFT minting on a UTXO ledger via taproot commit/reveal transactions.
//!
//! Usage:
//!   tapmint --config config.json mint --id <collectionId> --resource ./resource
//!   tapmint --config config.json collections --owner <tokenAddress>

mod commands;
mod config;
mod resource;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{CollectionsCommand, MintCommand};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tapmint")]
#[command(about = "Mint NFTs through taproot commit/reveal transactions", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file path.
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mint NFTs from a deployed collection.
    Mint(MintCommand),
    /// List collections and holdings of an owner.
    Collections(CollectionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Mint(cmd) => cmd.run(config).await,
        Command::Collections(cmd) => cmd.run(config).await,
    }
}
