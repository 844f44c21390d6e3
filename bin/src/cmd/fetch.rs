//! Fetch command implementation.

use std::{collections::BTreeSet, path::PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use faro_fetch::{FetchConfig, FmpClient, UniverseFetcher, assemble};
use faro_join::{UniverseLayout, io::load_universe_symbols};
use faro_traits::{FileProgressStore, format_date};

use crate::cmd::{banner, universe_dirs};

/// Arguments of `faro fetch`.
#[derive(Debug, Args)]
pub(crate) struct FetchArgs {
    /// Universes to fetch, in order (default: sp500, nyse, nasdaq)
    universes: Vec<String>,

    /// Root data directory
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Seconds to wait before retrying a failed request
    #[arg(long, default_value_t = 300)]
    backoff_secs: u64,

    /// Milliseconds to wait between entities
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Years of daily prices to request
    #[arg(long, default_value_t = 7)]
    history_years: u32,

    /// Annual statements to request per entity
    #[arg(long, default_value_t = 10)]
    periods: u32,

    /// Reference indices fetched with every universe
    #[arg(long, value_delimiter = ',', default_value = "^GSPC,^IXIC")]
    benchmarks: Vec<String>,
}

/// Fetch every universe and assemble its raw tables.
pub(crate) async fn run_fetch(args: FetchArgs) -> Result<()> {
    banner("Fetching raw data");

    let config = FetchConfig {
        backoff_secs: args.backoff_secs,
        delay_ms: args.delay_ms,
        history_years: args.history_years,
        periods: args.periods,
        benchmarks: args.benchmarks,
    };
    let client = FmpClient::from_env()?
        .with_backoff(config.backoff())
        .with_history_from(format_date(config.history_start(Utc::now().date_naive())))
        .with_periods(config.periods);
    let fetcher = UniverseFetcher::new(client, config);

    let mut seen = BTreeSet::new();
    let mut failures = 0;
    for dir in universe_dirs(&args.data_dir, &args.universes) {
        let layout = UniverseLayout::new(dir);
        let symbols = load_universe_symbols(&layout.universe())
            .with_context(|| format!("reading {}", layout.universe().display()))?;
        let mut progress = FileProgressStore::open(layout.progress())?;

        println!("{}: {} listed", layout.name(), symbols.len());
        let report = fetcher
            .fetch_universe(&layout, &symbols, &mut seen, &mut progress)
            .await?;
        assemble(&layout, &report.available())?;

        println!(
            "  fetched {:>5}   resumed {:>5}   skipped {:>5}   failed {:>5}",
            report.fetched.len(),
            report.resumed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        for (symbol, error) in &report.failed {
            println!("  {symbol:<8} {error}");
        }
        failures += report.failed.len();
    }

    if failures > 0 {
        println!("\n{failures} entities failed; re-run to retry only those.");
    }
    Ok(())
}
