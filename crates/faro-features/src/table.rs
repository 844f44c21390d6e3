//! Feature rows and the `data_clean.csv` layout.

use std::{collections::BTreeMap, path::Path};

use faro_traits::{Date, FaroError, Frame, FrameBuilder, Result, Symbol};
use tracing::info;

/// Suffix of absolute (non-normalized) copies of statement fields.
pub const ABS_SUFFIX: &str = "Abs";
/// Suffix of first-differenced columns.
pub const EVOL_SUFFIX: &str = "_evol";

/// Leading identification columns.
pub const INFO_COLUMNS: &[&str] = &["date", "symbol", "sector"];
/// Derived numeric and boolean columns, in file order.
pub const TARGET_COLUMNS: &[&str] = &[
    "market_cap",
    "div_percent",
    "yield",
    "yield_ref",
    "yield_next",
    "yield_ref_next",
    "outperform",
    "outperform_next",
    "positive",
    "positive_next",
];
/// Trailing price-date columns kept for auditing point-in-time alignment.
pub const DATE_COLUMNS: &[&str] = &["date_price", "date_price_previous"];

/// Default classification target.
pub const DEFAULT_TARGET: &str = "outperform_next";

/// One feature value, as seen by the encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    /// A finite number.
    Number(f64),
    /// A category label.
    Text(&'a str),
    /// A boolean flag.
    Flag(bool),
    /// No value.
    Missing,
}

impl Cell<'_> {
    fn from_number(value: Option<f64>) -> Self {
        value.filter(|v| v.is_finite()).map_or(Self::Missing, Self::Number)
    }

    fn from_flag(value: Option<bool>) -> Self {
        value.map_or(Self::Missing, Self::Flag)
    }
}

/// One `(symbol, date)` observation after feature engineering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    /// Statement date.
    pub date: Date,
    /// Entity.
    pub symbol: Symbol,
    /// Coarse sector bucket.
    pub sector: Option<String>,
    /// Statement fields divided by market capitalization.
    pub variables: BTreeMap<String, Option<f64>>,
    /// Absolute copies of selected statement fields, keyed with [`ABS_SUFFIX`].
    pub absolute: BTreeMap<String, Option<f64>>,
    /// First differences against the previous row, keyed with [`EVOL_SUFFIX`].
    pub evolution: BTreeMap<String, Option<f64>>,
    /// Price times shares outstanding.
    pub market_cap: Option<f64>,
    /// Trailing dividends over price.
    pub div_percent: Option<f64>,
    /// Annualized log-yield over the past year.
    pub yield_past: Option<f64>,
    /// Reference yield over the past year.
    pub yield_ref: Option<f64>,
    /// Annualized log-yield over the next year.
    pub yield_next: Option<f64>,
    /// Reference yield over the next year.
    pub yield_ref_next: Option<f64>,
    /// `yield > yield_ref`.
    pub outperform: Option<bool>,
    /// `yield_next > yield_ref_next`.
    pub outperform_next: Option<bool>,
    /// `yield > 0`.
    pub positive: Option<bool>,
    /// `yield_next > 0`.
    pub positive_next: Option<bool>,
    /// Date of the current price.
    pub date_price: Option<Date>,
    /// Date of the previous-year price.
    pub date_price_previous: Option<Date>,
}

impl FeatureRow {
    /// Value of column `name`.
    ///
    /// Unknown names are [`Cell::Missing`].
    pub fn value(&self, name: &str) -> Cell<'_> {
        match name {
            "symbol" => Cell::Text(&self.symbol),
            "sector" => self.sector.as_deref().map_or(Cell::Missing, Cell::Text),
            "market_cap" => Cell::from_number(self.market_cap),
            "div_percent" => Cell::from_number(self.div_percent),
            "yield" => Cell::from_number(self.yield_past),
            "yield_ref" => Cell::from_number(self.yield_ref),
            "yield_next" => Cell::from_number(self.yield_next),
            "yield_ref_next" => Cell::from_number(self.yield_ref_next),
            "outperform" => Cell::from_flag(self.outperform),
            "outperform_next" => Cell::from_flag(self.outperform_next),
            "positive" => Cell::from_flag(self.positive),
            "positive_next" => Cell::from_flag(self.positive_next),
            other => {
                let value = self
                    .variables
                    .get(other)
                    .or_else(|| self.absolute.get(other))
                    .or_else(|| self.evolution.get(other));
                Cell::from_number(value.copied().flatten())
            }
        }
    }

    /// Binary label of column `name`: a flag, or a number read as `> 0`.
    pub fn label(&self, name: &str) -> Option<bool> {
        match self.value(name) {
            Cell::Flag(b) => Some(b),
            Cell::Number(x) => Some(x > 0.0),
            Cell::Text(_) | Cell::Missing => None,
        }
    }
}

/// A feature table with its column groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    /// Normalized statement fields, sorted.
    pub variables: Vec<String>,
    /// Absolute copies, in configured order.
    pub absolute: Vec<String>,
    /// Evolution columns; empty for the base table.
    pub evolution: Vec<String>,
    /// Rows sorted by `(symbol, date)`.
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Default model inputs: normalized fields, size and dividend yield,
    /// absolute fields, past yield, sector and the past-year flags, then any
    /// evolution columns.
    ///
    /// No forward-looking column is included.
    pub fn default_features(&self) -> Vec<String> {
        let mut features = self.variables.clone();
        features.extend(["market_cap", "div_percent"].map(String::from));
        features.extend(self.absolute.iter().cloned());
        features.extend(["yield", "sector", "outperform", "positive"].map(String::from));
        features.extend(self.evolution.iter().cloned());
        features
    }

    /// Distinct row dates, ascending.
    pub fn dates(&self) -> Vec<Date> {
        let mut dates: Vec<Date> = self.rows.iter().map(|r| r.date).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Render in file layout: info, variables, absolute, targets, evolution,
    /// then price dates.
    pub fn to_frame(&self) -> Result<Frame> {
        let rows = &self.rows;
        let nums = |f: fn(&FeatureRow) -> Option<f64>| -> Vec<_> { rows.iter().map(f).collect() };
        let flags = |f: fn(&FeatureRow) -> Option<bool>| -> Vec<_> { rows.iter().map(f).collect() };

        let dates: Vec<Option<Date>> = rows.iter().map(|r| Some(r.date)).collect();
        let mut builder = FrameBuilder::new()
            .date("date", &dates)
            .str("symbol", rows.iter().map(|r| Some(r.symbol.clone())).collect())
            .str("sector", rows.iter().map(|r| r.sector.clone()).collect());
        for name in &self.variables {
            builder = builder.f64(name, rows.iter().map(|r| r.variables.get(name).copied().flatten()).collect());
        }
        for name in &self.absolute {
            builder = builder.f64(name, rows.iter().map(|r| r.absolute.get(name).copied().flatten()).collect());
        }
        builder = builder
            .f64("market_cap", nums(|r| r.market_cap))
            .f64("div_percent", nums(|r| r.div_percent))
            .f64("yield", nums(|r| r.yield_past))
            .f64("yield_ref", nums(|r| r.yield_ref))
            .f64("yield_next", nums(|r| r.yield_next))
            .f64("yield_ref_next", nums(|r| r.yield_ref_next))
            .bool("outperform", flags(|r| r.outperform))
            .bool("outperform_next", flags(|r| r.outperform_next))
            .bool("positive", flags(|r| r.positive))
            .bool("positive_next", flags(|r| r.positive_next));
        for name in &self.evolution {
            builder = builder.f64(name, rows.iter().map(|r| r.evolution.get(name).copied().flatten()).collect());
        }
        let price_dates: Vec<Option<Date>> = rows.iter().map(|r| r.date_price).collect();
        let previous_dates: Vec<Option<Date>> =
            rows.iter().map(|r| r.date_price_previous).collect();
        builder
            .date("date_price", &price_dates)
            .date("date_price_previous", &previous_dates)
            .build()
    }

    /// Parse a table produced by [`Self::to_frame`].
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let date = frame.date_values("date")?;
        let symbol = frame.str_values("symbol")?;
        let sector = frame.str_values("sector")?;

        let optional_dates = |name: &str| -> Result<Vec<Option<Date>>> {
            if frame.has_column(name) {
                frame.date_values(name)
            } else {
                Ok(vec![None; frame.len()])
            }
        };
        let date_price = optional_dates("date_price")?;
        let date_price_previous = optional_dates("date_price_previous")?;

        let num = |name: &str| frame.f64_values(name);
        let flag = |name: &str| frame.bool_values(name);
        let market_cap = num("market_cap")?;
        let div_percent = num("div_percent")?;
        let yield_past = num("yield")?;
        let yield_ref = num("yield_ref")?;
        let yield_next = num("yield_next")?;
        let yield_ref_next = num("yield_ref_next")?;
        let outperform = flag("outperform")?;
        let outperform_next = flag("outperform_next")?;
        let positive = flag("positive")?;
        let positive_next = flag("positive_next")?;

        let mut table = Self::default();
        for column in frame.columns() {
            let name = column.as_str();
            if INFO_COLUMNS.contains(&name)
                || TARGET_COLUMNS.contains(&name)
                || DATE_COLUMNS.contains(&name)
            {
                continue;
            }
            if name.ends_with(EVOL_SUFFIX) {
                table.evolution.push(column);
            } else if name.ends_with(ABS_SUFFIX) {
                table.absolute.push(column);
            } else {
                table.variables.push(column);
            }
        }
        let read_group = |names: &[String]| -> Result<Vec<Vec<Option<f64>>>> {
            names.iter().map(|n| frame.f64_values(n)).collect()
        };
        let variable_values = read_group(&table.variables)?;
        let absolute_values = read_group(&table.absolute)?;
        let evolution_values = read_group(&table.evolution)?;
        let pick = |names: &[String], values: &[Vec<Option<f64>>], i: usize| {
            names
                .iter()
                .zip(values)
                .map(|(n, col)| (n.clone(), col[i]))
                .collect::<BTreeMap<_, _>>()
        };

        for i in 0..frame.len() {
            let (Some(d), Some(s)) = (date[i], symbol[i].clone()) else {
                return Err(FaroError::InvalidData(format!(
                    "Feature row {i} lacks a date or symbol"
                )));
            };
            table.rows.push(FeatureRow {
                date: d,
                symbol: s,
                sector: sector[i].clone(),
                variables: pick(&table.variables, &variable_values, i),
                absolute: pick(&table.absolute, &absolute_values, i),
                evolution: pick(&table.evolution, &evolution_values, i),
                market_cap: market_cap[i],
                div_percent: div_percent[i],
                yield_past: yield_past[i],
                yield_ref: yield_ref[i],
                yield_next: yield_next[i],
                yield_ref_next: yield_ref_next[i],
                outperform: outperform[i],
                outperform_next: outperform_next[i],
                positive: positive[i],
                positive_next: positive_next[i],
                date_price: date_price[i],
                date_price_previous: date_price_previous[i],
            });
        }
        Ok(table)
    }

    /// Write as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        self.to_frame()?.write_csv_file(path)?;
        info!(path = %path.display(), rows = self.rows.len(), "Wrote feature table");
        Ok(())
    }

    /// Read a CSV written by [`Self::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::from_frame(&Frame::read_csv(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureTable {
        let row = FeatureRow {
            date: Date::from_ymd_opt(2020, 12, 31).unwrap(),
            symbol: "AAA".into(),
            sector: Some("Energy".into()),
            variables: BTreeMap::from([("ebit".into(), Some(0.05)), ("cash".into(), None)]),
            absolute: BTreeMap::from([("ebitAbs".into(), Some(5.0))]),
            market_cap: Some(100.0),
            yield_past: Some(0.1),
            yield_ref: Some(0.05),
            outperform: Some(true),
            positive: Some(true),
            ..FeatureRow::default()
        };
        FeatureTable {
            variables: vec!["cash".into(), "ebit".into()],
            absolute: vec!["ebitAbs".into()],
            evolution: Vec::new(),
            rows: vec![row],
        }
    }

    #[test]
    fn test_value_lookup() {
        let table = sample();
        let row = &table.rows[0];
        assert_eq!(row.value("ebit"), Cell::Number(0.05));
        assert_eq!(row.value("cash"), Cell::Missing);
        assert_eq!(row.value("ebitAbs"), Cell::Number(5.0));
        assert_eq!(row.value("sector"), Cell::Text("Energy"));
        assert_eq!(row.value("outperform"), Cell::Flag(true));
        assert_eq!(row.value("outperform_next"), Cell::Missing);
        assert_eq!(row.value("nope"), Cell::Missing);
        assert_eq!(row.label("yield"), Some(true));
    }

    #[test]
    fn test_default_features_exclude_forward_columns() {
        let features = sample().default_features();
        assert!(features.iter().all(|f| !f.contains("_next")));
        assert!(features.contains(&"sector".to_string()));
        assert!(features.contains(&"ebitAbs".to_string()));
    }

    #[test]
    fn test_frame_round_trip() {
        let table = sample();
        let mut frame = table.to_frame().unwrap();
        let columns = frame.columns();
        assert_eq!(&columns[..5], &["date", "symbol", "sector", "cash", "ebit"]);
        assert_eq!(columns.last().map(String::as_str), Some("date_price_previous"));

        let bytes = frame.to_csv_bytes().unwrap();
        let parsed = FeatureTable::from_frame(&Frame::from_csv_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, table);
    }
}
