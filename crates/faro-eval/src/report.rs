//! Strategy reports and the resumable portfolio-size sweep.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use faro_traits::{DatedMatrix, Frame, Result, Symbol};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    metrics::{MetricsConfig, PerformanceSummary},
    portfolio::{EquityCurve, benchmark_curve, daily_returns, simulate},
    strategy::WeightScheme,
};

/// Header of `yields.csv`.
pub const YIELD_LOG_HEADER: &str = "nb,yield";

/// Configuration for [`run_strategies`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Weighting schemes to simulate.
    pub schemes: Vec<WeightScheme>,

    /// Price columns simulated as buy-and-hold benchmarks.
    pub benchmarks: Vec<Symbol>,

    /// Tickers removed from the strategy universe.
    pub exclude: Vec<Symbol>,

    /// Annualization settings for the summaries.
    pub metrics: MetricsConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            schemes: vec![
                WeightScheme::Softmax,
                WeightScheme::TopK(100),
                WeightScheme::TopK(1000),
            ],
            benchmarks: vec!["^GSPC".to_string(), "^IXIC".to_string()],
            exclude: Vec::new(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Curves and summaries of every strategy and benchmark.
#[derive(Debug, Clone, Default)]
pub struct StrategyReport {
    /// Equity curves, strategies first, then benchmarks.
    pub curves: Vec<EquityCurve>,
    /// One summary per curve, same order.
    pub summaries: Vec<PerformanceSummary>,
}

/// Blank out probabilities of entities without a price on the scoring date.
pub fn mask_unpriced(probas: &DatedMatrix, prices: &DatedMatrix) -> Result<DatedMatrix> {
    let columns: Vec<Option<usize>> = probas
        .symbols()
        .iter()
        .map(|s| prices.column_index(s))
        .collect();
    let cells: Vec<Vec<Option<f64>>> = probas
        .rows()
        .map(|(date, row)| {
            let price_row = prices.row_at_or_before(date).map(|i| prices.row(i));
            row.iter()
                .zip(&columns)
                .map(|(p, col)| {
                    let priced = price_row
                        .zip(*col)
                        .is_some_and(|(prices, c)| prices[c].is_some());
                    p.filter(|_| priced)
                })
                .collect()
        })
        .collect();
    DatedMatrix::from_parts(probas.dates().to_vec(), probas.symbols().to_vec(), cells)
}

/// Simulate every configured scheme and benchmark from the first scoring
/// date on.
pub fn run_strategies(
    probas: &DatedMatrix,
    prices: &DatedMatrix,
    config: &StrategyConfig,
) -> Result<StrategyReport> {
    let mut report = StrategyReport::default();
    let Some(&start) = probas.dates().first() else {
        warn!("No probabilities to simulate");
        return Ok(report);
    };

    let probas = mask_unpriced(&probas.without_columns(&config.exclude), prices)?;
    let returns = daily_returns(&prices.since(start))?;

    for scheme in &config.schemes {
        let weights = scheme.weight_matrix(&probas)?;
        report.curves.push(simulate(&scheme.to_string(), &weights, &returns));
    }
    for symbol in &config.benchmarks {
        match benchmark_curve(&returns, symbol, start) {
            Ok(curve) => report.curves.push(curve),
            Err(e) => warn!(benchmark = %symbol, error = %e, "Skipping benchmark"),
        }
    }

    report.summaries = report
        .curves
        .iter()
        .map(|c| PerformanceSummary::from_curve(c, &config.metrics))
        .collect();
    for s in &report.summaries {
        info!(
            strategy = %s.name,
            final_value = s.final_value,
            sharpe = s.sharpe_ratio,
            max_drawdown = s.max_drawdown,
            "Strategy summary"
        );
    }
    Ok(report)
}

/// The append-only `yields.csv` log of `(portfolio size, final value)`.
#[derive(Debug, Clone)]
pub struct YieldLog {
    path: PathBuf,
    entries: Vec<(usize, f64)>,
}

impl YieldLog {
    /// Open the log at `path`, reading any existing entries.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() && fs::metadata(&path)?.len() > 0 {
            let frame = Frame::read_csv(&path)?;
            let nb = frame.f64_values("nb")?;
            let values = frame.f64_values("yield")?;
            nb.into_iter()
                .zip(values)
                .filter_map(|(n, v)| Some((n? as usize, v?)))
                .collect()
        } else {
            Vec::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened yield log");
        Ok(Self { path, entries })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded entries, in file order.
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// Largest recorded portfolio size, or 0.
    pub fn last_completed(&self) -> usize {
        self.entries.iter().map(|(n, _)| *n).max().unwrap_or(0)
    }

    /// Append one entry and flush it to disk.
    pub fn append(&mut self, nb: usize, value: f64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let new_file = !self.path.exists() || fs::metadata(&self.path)?.len() == 0;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if new_file {
            writeln!(file, "{YIELD_LOG_HEADER}")?;
        }
        writeln!(file, "{nb},{value}")?;
        self.entries.push((nb, value));
        Ok(())
    }
}

/// Simulate top-`k` portfolios for every `k` after the last recorded one up
/// to `max_k`, appending each result as it completes.
///
/// Returns the number of sizes computed in this call.
pub fn sweep_top_k(
    probas: &DatedMatrix,
    prices: &DatedMatrix,
    exclude: &[Symbol],
    log: &mut YieldLog,
    max_k: usize,
) -> Result<usize> {
    let Some(&start) = probas.dates().first() else {
        return Ok(0);
    };
    let probas = mask_unpriced(&probas.without_columns(exclude), prices)?;
    let returns = daily_returns(&prices.since(start))?;

    let first = log.last_completed() + 1;
    if first > max_k {
        info!(max_k, "Yield sweep already complete");
        return Ok(0);
    }
    for k in first..=max_k {
        let scheme = WeightScheme::TopK(k);
        let curve = simulate(&scheme.to_string(), &scheme.weight_matrix(&probas)?, &returns);
        let value = curve.final_value().unwrap_or(1.0);
        log.append(k, value)?;
        debug!(k, value, "Recorded portfolio size");
    }
    info!(from = first, to = max_k, path = %log.path().display(), "Yield sweep complete");
    Ok(max_k + 1 - first)
}
