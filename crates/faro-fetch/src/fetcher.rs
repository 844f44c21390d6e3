//! Resumable per-universe download and raw table assembly.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    time::Duration,
};

use chrono::NaiveDate;
use faro_join::{
    UniverseLayout,
    io::{ORDINARY_SHARES, PREFERRED_SHARES},
};
use faro_traits::{Date, DatedMatrix, FrameBuilder, ProgressStore, Result, Symbol, shift_years};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    client::SnapshotSource,
    types::{EntitySnapshot, RawStatement, parse_provider_date},
};

/// Configuration for a [`UniverseFetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Wait before the single retry of a failed request, in seconds.
    pub backoff_secs: u64,

    /// Pause between entities, in milliseconds.
    pub delay_ms: u64,

    /// Years of daily prices to request.
    pub history_years: u32,

    /// Annual statements to request per entity.
    pub periods: u32,

    /// Reference indices fetched for every universe, prices only.
    pub benchmarks: Vec<Symbol>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backoff_secs: 300,
            delay_ms: 1000,
            history_years: 7,
            periods: 10,
            benchmarks: vec!["^GSPC".to_string(), "^IXIC".to_string()],
        }
    }
}

impl FetchConfig {
    /// Retry backoff as a duration.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// First price date to request when running on `today`.
    #[must_use]
    pub fn history_start(&self, today: NaiveDate) -> Date {
        shift_years(today, -(self.history_years as i32))
    }
}

/// Outcome of one universe fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Entities downloaded in this run.
    pub fetched: Vec<Symbol>,
    /// Entities already in the progress log.
    pub resumed: Vec<Symbol>,
    /// Entities filtered out: index-like tickers or fetched by an earlier universe.
    pub skipped: Vec<Symbol>,
    /// Entities whose download failed twice, with the error.
    pub failed: Vec<(Symbol, String)>,
}

impl FetchReport {
    /// Entities with a snapshot on disk, sorted.
    pub fn available(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.resumed.iter().chain(&self.fetched).cloned().collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

/// Whether a universe entry is a tradable constituent.
fn is_constituent(symbol: &str) -> bool {
    !symbol.contains('^') && !symbol.contains('/')
}

/// Downloads one universe entity by entity, checkpointing each.
#[derive(Debug, Clone)]
pub struct UniverseFetcher<S> {
    source: S,
    config: FetchConfig,
}

impl<S: SnapshotSource> UniverseFetcher<S> {
    /// Create a fetcher over `source`.
    pub const fn new(source: S, config: FetchConfig) -> Self {
        Self { source, config }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch every constituent of `symbols` plus the configured benchmarks.
    ///
    /// Constituents in `seen` are skipped and every newly listed constituent
    /// is added to it, so universes fetched in sequence do not overlap.
    /// Completed entities are written to `.raw/<SYMBOL>.json` and marked in
    /// `progress`; failures are reported and left unmarked.
    pub async fn fetch_universe(
        &self,
        layout: &UniverseLayout,
        symbols: &[Symbol],
        seen: &mut BTreeSet<Symbol>,
        progress: &mut impl ProgressStore,
    ) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        let mut queue: Vec<(Symbol, bool)> = Vec::new();
        for symbol in symbols {
            if !is_constituent(symbol) || !seen.insert(symbol.clone()) {
                report.skipped.push(symbol.clone());
                continue;
            }
            queue.push((symbol.clone(), true));
        }
        queue.extend(self.config.benchmarks.iter().map(|b| (b.clone(), false)));

        fs::create_dir_all(layout.raw_dir())?;
        let delay = Duration::from_millis(self.config.delay_ms);
        let mut requested = false;
        for (symbol, fundamentals) in queue {
            if progress.is_done(&symbol) && layout.raw_snapshot(&symbol).exists() {
                debug!(symbol = %symbol, "Already fetched");
                report.resumed.push(symbol);
                continue;
            }
            if requested && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            requested = true;

            match self.source.snapshot(&symbol, fundamentals).await {
                Ok(snapshot) => {
                    fs::write(
                        layout.raw_snapshot(&symbol),
                        serde_json::to_string(&snapshot)?,
                    )?;
                    progress.mark_done(&symbol)?;
                    debug!(symbol = %symbol, prices = snapshot.prices.len(), "Fetched entity");
                    report.fetched.push(symbol);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Fetch failed, entity left for the next run");
                    report.failed.push((symbol, e.to_string()));
                }
            }
        }

        info!(
            universe = %layout.name(),
            fetched = report.fetched.len(),
            resumed = report.resumed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Universe fetch complete"
        );
        Ok(report)
    }
}

/// Read the snapshots of `symbols` that exist on disk.
pub fn load_snapshots(layout: &UniverseLayout, symbols: &[Symbol]) -> Result<Vec<EntitySnapshot>> {
    let mut snapshots = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let path = layout.raw_snapshot(symbol);
        if !path.exists() {
            warn!(symbol = %symbol, "No snapshot, entity left out of the raw tables");
            continue;
        }
        snapshots.push(serde_json::from_str(&fs::read_to_string(&path)?)?);
    }
    Ok(snapshots)
}

fn wide_matrix<'a>(
    snapshots: &'a [EntitySnapshot],
    points: impl Fn(&'a EntitySnapshot) -> Vec<(&'a str, Option<f64>)>,
) -> Result<DatedMatrix> {
    let symbols: Vec<Symbol> = snapshots.iter().map(|s| s.symbol.clone()).collect();
    let mut rows: BTreeMap<Date, Vec<Option<f64>>> = BTreeMap::new();
    for (j, snapshot) in snapshots.iter().enumerate() {
        for (date, value) in points(snapshot) {
            let (Some(date), Some(value)) = (parse_provider_date(date), value) else {
                continue;
            };
            rows.entry(date).or_insert_with(|| vec![None; symbols.len()])[j] = Some(value);
        }
    }
    let (dates, cells) = rows.into_iter().unzip();
    DatedMatrix::from_parts(dates, symbols, cells)
}

fn write_statements(
    snapshots: &[EntitySnapshot],
    statements: impl Fn(&EntitySnapshot) -> &[RawStatement],
    path: &std::path::Path,
) -> Result<usize> {
    let mut dates = Vec::new();
    let mut symbols = Vec::new();
    let mut records: Vec<BTreeMap<&str, f64>> = Vec::new();
    for snapshot in snapshots {
        for statement in statements(snapshot) {
            let Some(date) = parse_provider_date(&statement.date) else {
                continue;
            };
            dates.push(Some(date));
            symbols.push(Some(snapshot.symbol.clone()));
            records.push(statement.numeric_fields().collect());
        }
    }
    let fields: BTreeSet<&str> = records.iter().flat_map(|r| r.keys().copied()).collect();

    let mut builder = FrameBuilder::new()
        .date("date", &dates)
        .str("symbol", symbols);
    for field in fields {
        builder = builder.f64(field, records.iter().map(|r| r.get(field).copied()).collect());
    }
    builder.build()?.write_csv_file(path)?;
    Ok(records.len())
}

fn write_shares(snapshots: &[EntitySnapshot], path: &std::path::Path) -> Result<usize> {
    let mut dates = Vec::new();
    let mut symbols = Vec::new();
    let mut ordinary = Vec::new();
    let mut preferred = Vec::new();
    for snapshot in snapshots {
        for point in &snapshot.shares {
            let Some(date) = parse_provider_date(&point.date) else {
                continue;
            };
            dates.push(Some(date));
            symbols.push(Some(snapshot.symbol.clone()));
            ordinary.push(point.ordinary);
            preferred.push(point.preferred);
        }
    }
    let rows = dates.len();
    FrameBuilder::new()
        .date("date", &dates)
        .str("symbol", symbols)
        .f64(ORDINARY_SHARES, ordinary)
        .f64(PREFERRED_SHARES, preferred)
        .build()?
        .write_csv_file(path)?;
    Ok(rows)
}

/// Write the universe's raw tables from the snapshots of `symbols`.
///
/// Prices and dividends are wide (one column per entity, benchmarks
/// included); statements and share counts are long `(date, symbol, ...)`.
pub fn assemble(layout: &UniverseLayout, symbols: &[Symbol]) -> Result<()> {
    let snapshots = load_snapshots(layout, symbols)?;

    let prices = wide_matrix(&snapshots, |s| {
        s.prices.iter().map(|p| (p.date.as_str(), p.adj_close)).collect()
    })?;
    prices.write_csv(&layout.prices())?;
    let dividends = wide_matrix(&snapshots, |s| {
        s.dividends
            .iter()
            .map(|d| (d.date.as_str(), d.adj_dividend))
            .collect()
    })?;
    dividends.write_csv(&layout.dividends())?;

    let income = write_statements(&snapshots, |s| s.income.as_slice(), &layout.income())?;
    let balance = write_statements(&snapshots, |s| s.balance.as_slice(), &layout.balance())?;
    let cashflow = write_statements(&snapshots, |s| s.cashflow.as_slice(), &layout.cashflow())?;
    let shares = write_shares(&snapshots, &layout.shares())?;

    info!(
        universe = %layout.name(),
        entities = snapshots.len(),
        price_days = prices.len(),
        income,
        balance,
        cashflow,
        shares,
        "Assembled raw tables"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::FetchError,
        types::{AdjustedPrice, Dividend, SharesPoint},
    };
    use faro_join::io::{load_shares, load_statements, load_wide_series};
    use faro_traits::MemoryProgressStore;
    use std::sync::Mutex;

    /// Serves canned snapshots; symbols in `failing` always error.
    #[derive(Default)]
    struct FakeSource {
        failing: Vec<String>,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl SnapshotSource for FakeSource {
        async fn snapshot(&self, symbol: &str, fundamentals: bool) -> crate::Result<EntitySnapshot> {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), fundamentals));
            if self.failing.iter().any(|s| s == symbol) {
                return Err(FetchError::Api("HTTP 500".into()));
            }
            let statement = |revenue: f64| RawStatement {
                date: "2020-12-31".to_string(),
                fields: [
                    ("symbol".to_string(), serde_json::json!(symbol)),
                    ("revenue".to_string(), serde_json::json!(revenue)),
                ]
                .into_iter()
                .collect(),
            };
            let mut snapshot = EntitySnapshot {
                symbol: symbol.to_string(),
                prices: vec![
                    AdjustedPrice {
                        date: "2021-01-04".into(),
                        adj_close: Some(10.0),
                    },
                    AdjustedPrice {
                        date: "2021-01-05".into(),
                        adj_close: Some(11.0),
                    },
                ],
                dividends: vec![Dividend {
                    date: "2021-01-05".into(),
                    adj_dividend: Some(0.5),
                }],
                ..EntitySnapshot::default()
            };
            if fundamentals {
                snapshot.income = vec![statement(100.0)];
                snapshot.balance = vec![statement(100.0)];
                snapshot.cashflow = vec![statement(100.0)];
                snapshot.shares = vec![SharesPoint {
                    date: "2020-12-31".into(),
                    ordinary: Some(1000.0),
                    preferred: None,
                }];
            }
            Ok(snapshot)
        }
    }

    fn quiet() -> FetchConfig {
        FetchConfig {
            delay_ms: 0,
            benchmarks: vec!["^GSPC".into()],
            ..FetchConfig::default()
        }
    }

    fn temp_layout(tag: &str) -> UniverseLayout {
        let dir = std::env::temp_dir().join(format!("faro-fetch-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        UniverseLayout::new(dir)
    }

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetch_skips_indices_and_seen() {
        let layout = temp_layout("skip");
        let fetcher = UniverseFetcher::new(FakeSource::default(), quiet());
        let mut seen: BTreeSet<Symbol> = ["MSFT".to_string()].into();
        let mut progress = MemoryProgressStore::new();

        let report = fetcher
            .fetch_universe(&layout, &symbols(&["AAPL", "MSFT", "^DJI", "BRK/B"]), &mut seen, &mut progress)
            .await
            .unwrap();

        assert_eq!(report.fetched, symbols(&["AAPL", "^GSPC"]));
        assert_eq!(report.skipped, symbols(&["MSFT", "^DJI", "BRK/B"]));
        assert!(seen.contains("AAPL"));
        let calls = fetcher.source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("AAPL".to_string(), true), ("^GSPC".to_string(), false)]);
        assert!(layout.raw_snapshot("AAPL").exists());
        let _ = fs::remove_dir_all(layout.dir());
    }

    #[tokio::test]
    async fn test_failed_entity_is_retried_next_run() {
        let layout = temp_layout("resume");
        let mut progress = MemoryProgressStore::new();
        let universe = symbols(&["AAPL", "BAD"]);

        let failing = UniverseFetcher::new(
            FakeSource {
                failing: vec!["BAD".into()],
                ..FakeSource::default()
            },
            quiet(),
        );
        let first = failing
            .fetch_universe(&layout, &universe, &mut BTreeSet::new(), &mut progress)
            .await
            .unwrap();
        assert_eq!(first.failed.len(), 1);
        assert_eq!(first.failed[0].0, "BAD");
        assert!(!progress.is_done("BAD"));
        assert!(progress.is_done("AAPL"));

        let healthy = UniverseFetcher::new(FakeSource::default(), quiet());
        let second = healthy
            .fetch_universe(&layout, &universe, &mut BTreeSet::new(), &mut progress)
            .await
            .unwrap();
        assert_eq!(second.fetched, symbols(&["BAD"]));
        assert_eq!(second.resumed, symbols(&["AAPL", "^GSPC"]));
        let calls = healthy.source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("BAD".to_string(), true)]);
        let _ = fs::remove_dir_all(layout.dir());
    }

    #[tokio::test]
    async fn test_assemble_writes_loadable_tables() {
        let layout = temp_layout("assemble");
        let fetcher = UniverseFetcher::new(FakeSource::default(), quiet());
        let report = fetcher
            .fetch_universe(
                &layout,
                &symbols(&["AAPL", "MSFT"]),
                &mut BTreeSet::new(),
                &mut MemoryProgressStore::new(),
            )
            .await
            .unwrap();
        assemble(&layout, &report.available()).unwrap();

        let prices = DatedMatrix::read_csv(&layout.prices()).unwrap();
        assert_eq!(prices.symbols(), &symbols(&["AAPL", "MSFT", "^GSPC"])[..]);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.row(1), &[Some(11.0), Some(11.0), Some(11.0)]);

        let (dividends, _) = load_wide_series(&layout.dividends(), "dividends").unwrap();
        assert_eq!(dividends.len(), 3);

        let (income, conflicts) = load_statements(&layout.income(), "income").unwrap();
        assert!(conflicts.is_empty());
        assert_eq!(income.len(), 2);

        let (shares, _) = load_shares(&layout.shares()).unwrap();
        assert_eq!(shares.len(), 2);
        let _ = fs::remove_dir_all(layout.dir());
    }

    #[test]
    fn test_history_start() {
        let config = FetchConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            config.history_start(today),
            NaiveDate::from_ymd_opt(2017, 2, 28).unwrap()
        );
        assert_eq!(config.backoff(), Duration::from_secs(300));
    }
}
