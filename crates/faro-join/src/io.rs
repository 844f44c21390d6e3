//! Raw universe files and the joined `data.csv` artifact.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use faro_traits::{
    Date, FaroError, Frame, FrameBuilder, Result, Symbol, matrix::DATE_INDEX_CANDIDATES,
};
use tracing::{info, warn};

use crate::{
    DataConflict, EntitySeries, JoinInputs, JoinedRow, SeriesBuilder, StatementTable, TimeSeries,
    merge_statements,
};

/// Ordinary share count column of `shares.csv`.
pub const ORDINARY_SHARES: &str = "annualOrdinarySharesNumber";
/// Preferred share count column of `shares.csv`.
pub const PREFERRED_SHARES: &str = "annualPreferredSharesNumber";

/// Accepted names for the symbol column of a universe file.
pub const UNIVERSE_SYMBOL_COLUMNS: &[&str] = &["Symbol", "symbol", "Ticker"];
/// Accepted names for the sector column of a universe file.
pub const UNIVERSE_SECTOR_COLUMNS: &[&str] = &["GICS Sector", "Sector", "sector"];

/// Fixed leading columns of `data.csv`; statement fields follow, sorted.
pub const JOINED_CORE_COLUMNS: &[&str] = &[
    "date",
    "symbol",
    "period_end",
    "sector",
    "price",
    "date_price",
    "price_previous",
    "date_price_previous",
    "price_next",
    "date_price_next",
    "dividends",
    "shares",
    "ref",
    "date_ref",
    "ref_previous",
    "date_ref_previous",
    "ref_next",
    "date_ref_next",
];

/// File locations of one universe directory.
///
/// A universe `data/sp500` holds `prices_daily.csv`, `dividends.csv`, the
/// three statement histories, `shares.csv`, the membership file `sp500.csv`
/// and, once joined, `data.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseLayout {
    dir: PathBuf,
}

impl UniverseLayout {
    /// Layout rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Universe directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Universe name, the last component of the directory.
    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Membership file `<dir>/<name>.csv`.
    pub fn universe(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.name()))
    }

    /// Daily adjusted closes, wide.
    pub fn prices(&self) -> PathBuf {
        self.dir.join("prices_daily.csv")
    }

    /// Dividend payments, wide.
    pub fn dividends(&self) -> PathBuf {
        self.dir.join("dividends.csv")
    }

    /// Income statements, long.
    pub fn income(&self) -> PathBuf {
        self.dir.join("incomeStatementHistory.csv")
    }

    /// Balance sheets, long.
    pub fn balance(&self) -> PathBuf {
        self.dir.join("balanceSheetHistory.csv")
    }

    /// Cash flow statements, long.
    pub fn cashflow(&self) -> PathBuf {
        self.dir.join("cashflowStatementHistory.csv")
    }

    /// Share counts, long.
    pub fn shares(&self) -> PathBuf {
        self.dir.join("shares.csv")
    }

    /// Joined table.
    pub fn joined(&self) -> PathBuf {
        self.dir.join("data.csv")
    }

    /// Directory of per-entity fetch snapshots.
    pub fn raw_dir(&self) -> PathBuf {
        self.dir.join(".raw")
    }

    /// Fetch snapshot of one entity.
    pub fn raw_snapshot(&self, symbol: &str) -> PathBuf {
        self.raw_dir().join(format!("{symbol}.json"))
    }

    /// Fetch progress log.
    pub fn progress(&self) -> PathBuf {
        self.dir.join(".progress")
    }
}

/// Read a wide date-by-entity file into per-entity series.
///
/// Missing cells are skipped; repeated dates are reported as conflicts.
pub fn load_wide_series(path: &Path, metric: &str) -> Result<(EntitySeries, Vec<DataConflict>)> {
    let frame = Frame::read_csv(path)?;
    let date_col = frame
        .find_column(DATE_INDEX_CANDIDATES)
        .ok_or_else(|| FaroError::MissingColumn(format!("Date in {}", path.display())))?;
    let dates = frame.date_values(&date_col)?;

    let mut builder = SeriesBuilder::new(metric);
    for column in frame.columns().into_iter().filter(|c| *c != date_col) {
        for (date, value) in dates.iter().zip(frame.f64_values(&column)?) {
            if let (Some(date), Some(value)) = (date, value) {
                builder.push(&column, *date, value);
            }
        }
    }
    Ok(builder.build())
}

/// Read one long statement history.
pub fn load_statements(path: &Path, name: &str) -> Result<(StatementTable, Vec<DataConflict>)> {
    StatementTable::from_frame(name, &Frame::read_csv(path)?)
}

/// Read `shares.csv`: share count = ordinary + preferred, a missing component
/// counting as zero. Rows with neither component are skipped.
pub fn load_shares(path: &Path) -> Result<(EntitySeries, Vec<DataConflict>)> {
    let frame = Frame::read_csv(path)?;
    let dates = frame.date_values("date")?;
    let symbols = frame.str_values("symbol")?;
    let ordinary = frame.f64_values(ORDINARY_SHARES)?;
    let preferred = if frame.has_column(PREFERRED_SHARES) {
        frame.f64_values(PREFERRED_SHARES)?
    } else {
        vec![None; frame.len()]
    };

    let mut builder = SeriesBuilder::new("shares");
    for i in 0..frame.len() {
        let (Some(symbol), Some(date)) = (&symbols[i], dates[i]) else {
            continue;
        };
        if ordinary[i].is_none() && preferred[i].is_none() {
            continue;
        }
        let total = ordinary[i].unwrap_or(0.0) + preferred[i].unwrap_or(0.0);
        builder.push(symbol, date, total);
    }
    Ok(builder.build())
}

fn read_universe_frame(path: &Path) -> Result<(Frame, String)> {
    let header = fs::read_to_string(path)?
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    let separator = if header.contains(';') { b';' } else { b',' };
    let frame = Frame::read_csv_with_separator(path, separator)?;
    let symbol_col = frame
        .find_column(UNIVERSE_SYMBOL_COLUMNS)
        .ok_or_else(|| FaroError::MissingColumn(format!("Symbol in {}", path.display())))?;
    Ok((frame, symbol_col))
}

/// Read a universe membership file into `symbol -> sector`.
///
/// Both `,` and `;` separated files are accepted.
pub fn load_universe(path: &Path) -> Result<BTreeMap<Symbol, String>> {
    let (frame, symbol_col) = read_universe_frame(path)?;
    let symbols = frame.str_values(&symbol_col)?;
    let sectors = match frame.find_column(UNIVERSE_SECTOR_COLUMNS) {
        Some(col) => frame.str_values(&col)?,
        None => {
            warn!(path = %path.display(), "Universe file has no sector column");
            vec![None; frame.len()]
        }
    };

    Ok(symbols
        .into_iter()
        .zip(sectors)
        .filter_map(|(symbol, sector)| Some((symbol?.trim().to_string(), sector?)))
        .collect())
}

/// Read the universe tickers in file order.
pub fn load_universe_symbols(path: &Path) -> Result<Vec<Symbol>> {
    let (frame, symbol_col) = read_universe_frame(path)?;
    Ok(frame
        .str_values(&symbol_col)?
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .collect())
}

/// Load and merge every raw table of a universe.
///
/// The reference index is read from the `reference` column of the price
/// file; when absent the reference series is empty and every `ref*` field
/// will be missing.
pub fn load_join_inputs(
    layout: &UniverseLayout,
    reference: &str,
) -> Result<(JoinInputs, Vec<DataConflict>)> {
    let mut conflicts = Vec::new();

    let (prices, c) = load_wide_series(&layout.prices(), "price")?;
    conflicts.extend(c);
    let (dividends, c) = load_wide_series(&layout.dividends(), "dividends")?;
    conflicts.extend(c);

    let mut tables = Vec::with_capacity(3);
    for (path, name) in [
        (layout.income(), "income"),
        (layout.balance(), "balance"),
        (layout.cashflow(), "cashflow"),
    ] {
        let (table, c) = load_statements(&path, name)?;
        conflicts.extend(c);
        tables.push(table);
    }
    let statements = merge_statements(&tables);

    let (shares, c) = load_shares(&layout.shares())?;
    conflicts.extend(c);
    let sectors = load_universe(&layout.universe())?;

    let reference_series = match prices.get(reference) {
        Some(series) => series.clone(),
        None => {
            warn!(reference, "Reference index not found in price file");
            TimeSeries::default()
        }
    };

    info!(
        universe = %layout.name(),
        statements = statements.len(),
        priced = prices.len(),
        conflicts = conflicts.len(),
        "Loaded raw tables"
    );

    Ok((
        JoinInputs {
            statements,
            prices,
            dividends,
            shares,
            sectors,
            reference: reference_series,
        },
        conflicts,
    ))
}

/// Render joined rows as a table with [`JOINED_CORE_COLUMNS`] followed by the
/// union of statement fields in sorted order.
pub fn joined_to_frame(rows: &[JoinedRow]) -> Result<Frame> {
    let fields: std::collections::BTreeSet<&String> =
        rows.iter().flat_map(|r| r.fields.keys()).collect();

    let dates = |f: fn(&JoinedRow) -> Option<Date>| -> Vec<_> {
        rows.iter().map(f).collect()
    };
    let nums = |f: fn(&JoinedRow) -> Option<f64>| -> Vec<_> { rows.iter().map(f).collect() };

    let mut builder = FrameBuilder::new()
        .date("date", &dates(|r| Some(r.date)))
        .str("symbol", rows.iter().map(|r| Some(r.symbol.clone())).collect())
        .date("period_end", &dates(|r| Some(r.period_end)))
        .str("sector", rows.iter().map(|r| r.sector.clone()).collect())
        .f64("price", nums(|r| r.price))
        .date("date_price", &dates(|r| r.date_price))
        .f64("price_previous", nums(|r| r.price_previous))
        .date("date_price_previous", &dates(|r| r.date_price_previous))
        .f64("price_next", nums(|r| r.price_next))
        .date("date_price_next", &dates(|r| r.date_price_next))
        .f64("dividends", nums(|r| r.dividends))
        .f64("shares", nums(|r| r.shares))
        .f64("ref", nums(|r| r.ref_level))
        .date("date_ref", &dates(|r| r.date_ref))
        .f64("ref_previous", nums(|r| r.ref_previous))
        .date("date_ref_previous", &dates(|r| r.date_ref_previous))
        .f64("ref_next", nums(|r| r.ref_next))
        .date("date_ref_next", &dates(|r| r.date_ref_next));

    for field in fields {
        let values = rows
            .iter()
            .map(|r| r.fields.get(field).copied().flatten())
            .collect();
        builder = builder.f64(field, values);
    }
    builder.build()
}

/// Write joined rows to `path`.
pub fn write_joined(rows: &[JoinedRow], path: &Path) -> Result<()> {
    joined_to_frame(rows)?.write_csv_file(path)?;
    info!(path = %path.display(), rows = rows.len(), "Wrote joined table");
    Ok(())
}

/// Parse a table produced by [`joined_to_frame`].
///
/// Every column outside [`JOINED_CORE_COLUMNS`] is read as a statement field.
pub fn joined_from_frame(frame: &Frame) -> Result<Vec<JoinedRow>> {
    let date = frame.date_values("date")?;
    let symbol = frame.str_values("symbol")?;
    let period_end = if frame.has_column("period_end") {
        frame.date_values("period_end")?
    } else {
        date.clone()
    };
    let sector = frame.str_values("sector")?;
    let price = frame.f64_values("price")?;
    let date_price = frame.date_values("date_price")?;
    let price_previous = frame.f64_values("price_previous")?;
    let date_price_previous = frame.date_values("date_price_previous")?;
    let price_next = frame.f64_values("price_next")?;
    let date_price_next = frame.date_values("date_price_next")?;
    let dividends = frame.f64_values("dividends")?;
    let shares = frame.f64_values("shares")?;
    let ref_level = frame.f64_values("ref")?;
    let date_ref = frame.date_values("date_ref")?;
    let ref_previous = frame.f64_values("ref_previous")?;
    let date_ref_previous = frame.date_values("date_ref_previous")?;
    let ref_next = frame.f64_values("ref_next")?;
    let date_ref_next = frame.date_values("date_ref_next")?;

    let field_names: Vec<String> = frame
        .columns()
        .into_iter()
        .filter(|c| !JOINED_CORE_COLUMNS.contains(&c.as_str()))
        .collect();
    let field_values = field_names
        .iter()
        .map(|f| frame.f64_values(f))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(frame.len());
    for i in 0..frame.len() {
        let (Some(d), Some(s)) = (date[i], symbol[i].clone()) else {
            return Err(FaroError::InvalidData(format!(
                "Joined row {i} lacks a date or symbol"
            )));
        };
        rows.push(JoinedRow {
            symbol: s,
            date: d,
            period_end: period_end[i].unwrap_or(d),
            sector: sector[i].clone(),
            price: price[i],
            date_price: date_price[i],
            price_previous: price_previous[i],
            date_price_previous: date_price_previous[i],
            price_next: price_next[i],
            date_price_next: date_price_next[i],
            dividends: dividends[i],
            shares: shares[i],
            ref_level: ref_level[i],
            date_ref: date_ref[i],
            ref_previous: ref_previous[i],
            date_ref_previous: date_ref_previous[i],
            ref_next: ref_next[i],
            date_ref_next: date_ref_next[i],
            fields: field_names
                .iter()
                .zip(&field_values)
                .map(|(name, col)| (name.clone(), col[i]))
                .collect(),
        });
    }
    Ok(rows)
}

/// Read a `data.csv` file.
pub fn read_joined(path: &Path) -> Result<Vec<JoinedRow>> {
    joined_from_frame(&Frame::read_csv(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("faro-join-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_layout_paths() {
        let layout = UniverseLayout::new("data/sp500");
        assert_eq!(layout.name(), "sp500");
        assert_eq!(layout.universe(), PathBuf::from("data/sp500/sp500.csv"));
        assert_eq!(layout.joined(), PathBuf::from("data/sp500/data.csv"));
        assert_eq!(
            layout.raw_snapshot("MSFT"),
            PathBuf::from("data/sp500/.raw/MSFT.json")
        );
    }

    #[test]
    fn test_load_universe_semicolon() {
        let dir = temp_dir("universe");
        let path = dir.join("nyse.csv");
        fs::write(&path, "Symbol;Name;GICS Sector\nAAA;Alpha;Utilities\nBBB;Beta;\n").unwrap();
        let sectors = load_universe(&path).unwrap();
        assert_eq!(sectors.get("AAA").map(String::as_str), Some("Utilities"));
        assert!(!sectors.contains_key("BBB"));
        assert_eq!(load_universe_symbols(&path).unwrap(), vec!["AAA", "BBB"]);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_load_shares_sums_components() {
        let dir = temp_dir("shares");
        let path = dir.join("shares.csv");
        fs::write(
            &path,
            "date,symbol,annualOrdinarySharesNumber,annualPreferredSharesNumber\n\
             2020-12-31,AAA,100,5\n\
             2019-12-31,AAA,90,\n\
             2018-12-31,AAA,,\n",
        )
        .unwrap();
        let (shares, conflicts) = load_shares(&path).unwrap();
        assert!(conflicts.is_empty());
        let series = shares.get("AAA").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.as_of_backward(d(2020, 12, 31)).map(|o| o.value), Some(105.0));
        assert_eq!(series.as_of_backward(d(2020, 1, 1)).map(|o| o.value), Some(90.0));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_load_wide_series_reports_duplicate_dates() {
        let dir = temp_dir("wide");
        let path = dir.join("prices_daily.csv");
        fs::write(
            &path,
            "Date,AAA,BBB\n2020-01-02,1.0,\n2020-01-03,2.0,5.0\n2020-01-03,2.5,5.5\n",
        )
        .unwrap();
        let (prices, conflicts) = load_wide_series(&path, "price").unwrap();
        assert_eq!(conflicts.len(), 2);
        assert_eq!(prices.get("AAA").unwrap().len(), 2);
        assert_eq!(
            prices.as_of_backward("AAA", d(2020, 1, 3)).map(|o| o.value),
            Some(2.5)
        );
        assert_eq!(prices.get("BBB").unwrap().len(), 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_joined_round_trip() {
        let rows = vec![JoinedRow {
            symbol: "AAA".into(),
            date: d(2020, 12, 31),
            period_end: d(2020, 12, 31),
            sector: Some("Energy".into()),
            price: Some(100.0),
            date_price: Some(d(2020, 12, 30)),
            dividends: Some(0.0),
            fields: BTreeMap::from([
                ("ebit".to_string(), Some(5.0)),
                ("cash".to_string(), None),
            ]),
            ..JoinedRow::default()
        }];
        let mut frame = joined_to_frame(&rows).unwrap();
        let columns = frame.columns();
        assert_eq!(&columns[..JOINED_CORE_COLUMNS.len()], JOINED_CORE_COLUMNS);
        assert_eq!(&columns[JOINED_CORE_COLUMNS.len()..], &["cash", "ebit"]);

        let bytes = frame.to_csv_bytes().unwrap();
        let parsed = joined_from_frame(&Frame::from_csv_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, rows);
    }
}
