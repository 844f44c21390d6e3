//! Faro CLI binary.
//!
//! Runs the research pipeline stage by stage: fetch, join, features, train,
//! backtest and strategies. Every stage reads the previous stage's files, so
//! any of them can be re-run on its own.

mod cmd;

use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "faro")]
#[command(about = "Point-in-time factor research for equity outperformance", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download raw tables for one or more universes
    Fetch(cmd::fetch::FetchArgs),

    /// Join statements with prices, dividends and shares
    Join(cmd::join::JoinArgs),

    /// Build the feature tables from joined universes
    Features(cmd::features::FeaturesArgs),

    /// Fit and score a classifier on a date split
    Train(cmd::train::TrainArgs),

    /// Walk-forward scoring into a probability matrix
    Backtest(cmd::backtest::BacktestArgs),

    /// Simulate weighting strategies from a probability matrix
    Strategies(cmd::strategies::StrategiesArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("faro=info")))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => cmd::fetch::run_fetch(args).await?,
        Commands::Join(args) => cmd::join::run_join(&args)?,
        Commands::Features(args) => cmd::features::run_features(&args)?,
        Commands::Train(args) => cmd::train::run_train(&args)?,
        Commands::Backtest(args) => cmd::backtest::run_backtest(&args)?,
        Commands::Strategies(args) => cmd::strategies::run_strategies(&args)?,
    }

    Ok(())
}
