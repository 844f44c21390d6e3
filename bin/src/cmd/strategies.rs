//! Strategies command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use faro_eval::{StrategyConfig, WeightScheme, YieldLog, curves_to_frame, sweep_top_k};
use faro_traits::DatedMatrix;

use crate::cmd::banner;

/// Arguments of `faro strategies`.
#[derive(Debug, Args)]
pub(crate) struct StrategiesArgs {
    /// Probability matrix written by `faro backtest`
    #[arg(long, default_value = "backtest/probas.csv")]
    probas: PathBuf,

    /// Price files, merged left to right; earlier files win on shared tickers
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "data/sp500/prices_daily.csv,data/nyse/prices_daily.csv,data/nasdaq/prices_daily.csv"
    )]
    prices: Vec<PathBuf>,

    /// Portfolio sizes simulated next to the softmax scheme
    #[arg(long, value_delimiter = ',', default_value = "100,1000")]
    top_k: Vec<usize>,

    /// Benchmark columns of the price files
    #[arg(long, value_delimiter = ',', default_value = "^GSPC,^IXIC")]
    benchmarks: Vec<String>,

    /// Tickers removed from the strategy universe
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Output equity curves
    #[arg(long, default_value = "backtest/strategies.csv")]
    output: PathBuf,

    /// Resumable log of final value per portfolio size
    #[arg(long, default_value = "backtest/yields.csv")]
    yields: PathBuf,

    /// Largest portfolio size of the sweep
    #[arg(long, default_value_t = 2000)]
    max_k: usize,

    /// Do not run the portfolio-size sweep
    #[arg(long)]
    skip_sweep: bool,
}

fn load_prices(paths: &[PathBuf]) -> Result<DatedMatrix> {
    let mut merged: Option<DatedMatrix> = None;
    for path in paths {
        let prices = DatedMatrix::read_csv(path)
            .with_context(|| format!("reading {}", path.display()))?;
        merged = Some(match merged {
            Some(acc) => acc.merge_outer(&prices),
            None => prices,
        });
    }
    merged.context("no price files given")
}

/// Simulate every scheme, print the summary table and extend the sweep.
pub(crate) fn run_strategies(args: &StrategiesArgs) -> Result<()> {
    banner("Strategies");

    let probas = DatedMatrix::read_csv(&args.probas)
        .with_context(|| format!("reading {}", args.probas.display()))?;
    if probas.is_empty() {
        bail!("{} has no scoring dates", args.probas.display());
    }
    let prices = load_prices(&args.prices)?;

    let mut schemes = vec![WeightScheme::Softmax];
    schemes.extend(args.top_k.iter().map(|&k| WeightScheme::TopK(k)));
    let config = StrategyConfig {
        schemes,
        benchmarks: args.benchmarks.clone(),
        exclude: args.exclude.clone(),
        ..StrategyConfig::default()
    };
    let report = faro_eval::run_strategies(&probas, &prices, &config)?;

    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Strategy", "Final", "Ann.Ret", "Ann.Vol", "Sharpe", "MaxDD"
    );
    println!("{}", "─".repeat(67));
    for s in &report.summaries {
        println!(
            "{:<12} {:>10.4} {:>9.2}% {:>9.2}% {:>10.2} {:>9.2}%",
            s.name,
            s.final_value,
            s.annualized_return * 100.0,
            s.annualized_volatility * 100.0,
            s.sharpe_ratio,
            s.max_drawdown * 100.0
        );
    }
    curves_to_frame(&report.curves)?.write_csv_file(&args.output)?;
    println!("\nWrote {}", args.output.display());

    if !args.skip_sweep {
        let mut log = YieldLog::open(&args.yields)?;
        let computed = sweep_top_k(&probas, &prices, &args.exclude, &mut log, args.max_k)?;
        println!(
            "Sweep: {computed} new portfolio sizes, {} recorded in {}",
            log.entries().len(),
            log.path().display()
        );
    }
    Ok(())
}
