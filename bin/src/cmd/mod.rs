//! CLI subcommand modules.
//!
//! This module contains the implementations for all faro CLI subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use faro_traits::{Date, parse_date};

pub(crate) mod backtest;
pub(crate) mod features;
pub(crate) mod fetch;
pub(crate) mod join;
pub(crate) mod strategies;
pub(crate) mod train;

/// Universes processed when none are named.
pub(crate) const DEFAULT_UNIVERSES: &[&str] = &["sp500", "nyse", "nasdaq"];

/// Universe directories under `data_dir`, defaulting to [`DEFAULT_UNIVERSES`].
pub(crate) fn universe_dirs(data_dir: &std::path::Path, universes: &[String]) -> Vec<PathBuf> {
    if universes.is_empty() {
        DEFAULT_UNIVERSES.iter().map(|u| data_dir.join(u)).collect()
    } else {
        universes.iter().map(|u| data_dir.join(u)).collect()
    }
}

/// Parse a `YYYY-MM-DD` command-line date.
pub(crate) fn cli_date(value: &str) -> Result<Date> {
    parse_date(value).with_context(|| format!("invalid date {value:?}, expected YYYY-MM-DD"))
}

/// Print a boxed section title.
pub(crate) fn banner(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║ {title:<60} ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}
