//! Join command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use faro_join::{AsOfJoinEngine, AsOfMatch, JoinConfig, UniverseLayout, join_universe, write_joined};

use crate::cmd::{banner, universe_dirs};

/// As-of matching rule.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum MatchArg {
    /// Closest observation in either direction
    Nearest,
    /// Last observation at or before the date
    Backward,
}

impl From<MatchArg> for AsOfMatch {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Nearest => Self::Nearest,
            MatchArg::Backward => Self::Backward,
        }
    }
}

/// Arguments of `faro join`.
#[derive(Debug, Args)]
pub(crate) struct JoinArgs {
    /// Universes to join (default: sp500, nyse, nasdaq)
    universes: Vec<String>,

    /// Root data directory
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Reference index column of the price file
    #[arg(long, default_value = "^GSPC")]
    reference: String,

    /// Look-back and look-ahead horizon in years
    #[arg(long, default_value_t = 1)]
    offset_years: i32,

    /// Days between period end and publication
    #[arg(long, default_value_t = 0)]
    publication_lag_days: i64,

    /// Share count matching rule
    #[arg(long, value_enum, default_value = "nearest")]
    shares: MatchArg,

    /// Reference level matching rule
    #[arg(long, value_enum, default_value = "nearest")]
    reference_match: MatchArg,

    /// Join entities on a single thread
    #[arg(long)]
    sequential: bool,
}

/// Join each universe into its `data.csv`.
pub(crate) fn run_join(args: &JoinArgs) -> Result<()> {
    banner("As-of join");

    let engine = AsOfJoinEngine::new(JoinConfig {
        offset_years: args.offset_years,
        publication_lag_days: args.publication_lag_days,
        shares_match: args.shares.into(),
        reference_match: args.reference_match.into(),
        parallel: !args.sequential,
    });

    println!(
        "{:<10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Universe", "Rows", "NoPrice", "NoNext", "NoShares", "NoSector", "NoRef"
    );
    println!("{}", "─".repeat(74));
    for dir in universe_dirs(&args.data_dir, &args.universes) {
        let layout = UniverseLayout::new(dir);
        let (rows, diagnostics) = join_universe(&engine, &layout, &args.reference)?;
        write_joined(&rows, &layout.joined())?;
        println!(
            "{:<10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
            layout.name(),
            diagnostics.rows,
            diagnostics.missing_price,
            diagnostics.missing_next,
            diagnostics.missing_shares,
            diagnostics.missing_sector,
            diagnostics.missing_reference
        );
    }
    Ok(())
}
