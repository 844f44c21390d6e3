//! Backtest command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use faro_eval::{StepSize, WalkForward, WalkForwardConfig};
use faro_features::{DEFAULT_TARGET, FeatureTable};
use faro_model::{DatasetEncoder, EncoderConfig, LogisticRegression};

use crate::cmd::{banner, cli_date};

/// Arguments of `faro backtest`.
#[derive(Debug, Args)]
pub(crate) struct BacktestArgs {
    /// Feature table
    #[arg(long, default_value = "data/data_clean.csv")]
    input: PathBuf,

    /// First cursor date (YYYY-MM-DD)
    #[arg(long, default_value = "2018-01-01")]
    start: String,

    /// Training window in years
    #[arg(long, default_value_t = 1)]
    window_years: i32,

    /// Fixed cursor step in days (default: every distinct row date)
    #[arg(long)]
    step_days: Option<i64>,

    /// Days between the end of the training window and the cursor
    #[arg(long, default_value_t = 0)]
    embargo_days: i64,

    /// Binary target column
    #[arg(long, default_value = DEFAULT_TARGET)]
    target: String,

    /// Run cycles one after another
    #[arg(long)]
    sequential: bool,

    /// Output probability matrix
    #[arg(long, default_value = "backtest/probas.csv")]
    output: PathBuf,
}

/// Walk forward from `start`, writing one probability row per cycle.
pub(crate) fn run_backtest(args: &BacktestArgs) -> Result<()> {
    banner("Walk-forward backtest");

    let table = FeatureTable::read_csv(&args.input)?;
    let start = cli_date(&args.start)?;
    let config = WalkForwardConfig {
        window_years: args.window_years,
        step: args.step_days.map_or(StepSize::DistinctDates, StepSize::EveryDays),
        label_embargo_days: args.embargo_days,
        parallel: !args.sequential,
    };
    let walk = WalkForward::new(config, DatasetEncoder::new(EncoderConfig::default()));

    println!("Rows:     {}", table.len());
    println!("Start:    {start}");
    println!("Window:   {} year(s)", args.window_years);
    println!();

    let result = walk.run(
        &LogisticRegression::default(),
        &table.rows,
        start,
        &table.default_features(),
        &args.target,
    )?;
    result.probas.write_csv(&args.output)?;

    let scored: usize = result.cycles.iter().map(|c| c.scored).sum();
    println!("Cycles:   {}", result.cycles.len());
    println!("Skipped:  {}", result.skipped());
    println!("Scored:   {scored}");
    println!("\nWrote {}", args.output.display());
    Ok(())
}
