//! Features command implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use faro_features::{FeatureConfig, FeaturePass, evolution, load_joined_tables};
use faro_join::UniverseLayout;

use crate::cmd::{banner, universe_dirs};

/// Arguments of `faro features`.
#[derive(Debug, Args)]
pub(crate) struct FeaturesArgs {
    /// Joined universes to concatenate (default: sp500, nyse, nasdaq)
    universes: Vec<String>,

    /// Root data directory
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Output feature table
    #[arg(long, default_value = "data/data_clean.csv")]
    output: PathBuf,

    /// Output evolution table
    #[arg(long, default_value = "data/data_evol_clean.csv")]
    evol_output: PathBuf,

    /// Maximum days between statement date and price date
    #[arg(long, default_value_t = 14)]
    tolerance_days: i64,

    /// Drop statement fields missing in more than this fraction of rows
    #[arg(long, default_value_t = 0.2)]
    max_missing_rate: f64,

    /// Print the diagnostics as JSON
    #[arg(long)]
    json: bool,
}

/// Run the feature pass over every joined universe.
pub(crate) fn run_features(args: &FeaturesArgs) -> Result<()> {
    banner("Feature engineering");

    let joined_paths: Vec<PathBuf> = universe_dirs(&args.data_dir, &args.universes)
        .into_iter()
        .map(|dir| UniverseLayout::new(dir).joined())
        .collect();
    let paths: Vec<&Path> = joined_paths.iter().map(PathBuf::as_path).collect();
    let joined = load_joined_tables(&paths)?;

    let pass = FeaturePass::new(FeatureConfig {
        tolerance_days: args.tolerance_days,
        max_missing_rate: args.max_missing_rate,
        ..FeatureConfig::default()
    });
    let (table, diagnostics) = pass.run(joined);
    table.write_csv(&args.output)?;
    let evol = evolution(&table);
    evol.write_csv(&args.evol_output)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        return Ok(());
    }

    println!("Input rows:        {:>8}", diagnostics.input_rows);
    println!("Duplicates:        {:>8}", diagnostics.duplicate_rows);
    println!("Out of sync:       {:>8}", diagnostics.sync_violations);
    println!("Without label:     {:>8}", diagnostics.missing_label);
    println!("Dropped fields:    {:>8}", diagnostics.dropped_columns.len());
    println!("Output rows:       {:>8}", diagnostics.output_rows);
    println!("Evolution rows:    {:>8}", evol.len());
    println!();
    println!("Wrote {}", args.output.display());
    println!("Wrote {}", args.evol_output.display());
    Ok(())
}
