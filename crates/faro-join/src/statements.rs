//! Financial statement records and the statement merge.

use std::collections::{BTreeMap, BTreeSet};

use faro_traits::{Date, Frame, Result, Symbol};
use tracing::{info, warn};

use crate::DataConflict;

/// Columns of a long statement table that are not line items.
pub const STATEMENT_KEY_COLUMNS: &[&str] = &["date", "symbol"];

/// One reporting period of one company.
///
/// `date` is the close of the fiscal period. Treating it as the date the
/// figures became public is a simplification; see
/// [`JoinConfig::publication_lag_days`](crate::JoinConfig::publication_lag_days).
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRecord {
    /// Reporting company.
    pub symbol: Symbol,
    /// Fiscal period end.
    pub date: Date,
    /// Line items by field name; `None` is a reported-but-empty cell.
    pub fields: BTreeMap<String, Option<f64>>,
}

/// All records of one statement kind, keyed by `(symbol, date)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementTable {
    name: String,
    records: BTreeMap<(Symbol, Date), BTreeMap<String, Option<f64>>>,
    fields: BTreeSet<String>,
}

impl StatementTable {
    /// An empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Table name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a record, replacing an earlier one for the same key.
    ///
    /// Returns the conflict when a record was replaced.
    pub fn insert(&mut self, record: StatementRecord) -> Option<DataConflict> {
        self.fields.extend(record.fields.keys().cloned());
        let key = (record.symbol, record.date);
        let replaced = self.records.insert(key.clone(), record.fields).is_some();
        replaced.then(|| DataConflict {
            metric: self.name.clone(),
            entity: key.0,
            date: key.1,
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every field name seen in the table, sorted.
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    /// Parse a long table: `date`, `symbol`, then one numeric column per line
    /// item. Text columns other than the keys are ignored.
    ///
    /// Rows lacking a symbol or date are skipped.
    pub fn from_frame(name: &str, frame: &Frame) -> Result<(Self, Vec<DataConflict>)> {
        let dates = frame.date_values("date")?;
        let symbols = frame.str_values("symbol")?;
        let field_names: Vec<String> = frame
            .columns()
            .into_iter()
            .filter(|c| !STATEMENT_KEY_COLUMNS.contains(&c.as_str()))
            .filter(|c| !frame.is_text_column(c))
            .collect();
        let columns = field_names
            .iter()
            .map(|f| frame.f64_values(f))
            .collect::<Result<Vec<_>>>()?;

        let mut table = Self::new(name);
        let mut conflicts = Vec::new();
        for (i, (symbol, date)) in symbols.into_iter().zip(dates).enumerate() {
            let (Some(symbol), Some(date)) = (symbol, date) else {
                continue;
            };
            let fields = field_names
                .iter()
                .zip(&columns)
                .map(|(f, col)| (f.clone(), col[i]))
                .collect();
            if let Some(conflict) = table.insert(StatementRecord {
                symbol,
                date,
                fields,
            }) {
                warn!(table = name, entity = %conflict.entity, date = %conflict.date, "Duplicate statement, keeping last row");
                conflicts.push(conflict);
            }
        }
        Ok((table, conflicts))
    }
}

/// Inner-join statement tables on `(symbol, date)`.
///
/// A record survives only if every table has it. When several tables report
/// the same field, the first table's value is kept, so pass the tables in
/// priority order (income, balance sheet, cash flow).
pub fn merge_statements(tables: &[StatementTable]) -> Vec<StatementRecord> {
    let Some((first, rest)) = tables.split_first() else {
        return Vec::new();
    };

    let merged: Vec<StatementRecord> = first
        .records
        .iter()
        .filter(|(key, _)| rest.iter().all(|t| t.records.contains_key(*key)))
        .map(|((symbol, date), fields)| {
            let mut fields = fields.clone();
            for table in rest {
                if let Some(other) = table.records.get(&(symbol.clone(), *date)) {
                    for (name, value) in other {
                        fields.entry(name.clone()).or_insert(*value);
                    }
                }
            }
            StatementRecord {
                symbol: symbol.clone(),
                date: *date,
                fields,
            }
        })
        .collect();

    info!(
        tables = tables.len(),
        candidates = first.len(),
        merged = merged.len(),
        "Merged financial statements"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(symbol: &str, date: Date, fields: &[(&str, f64)]) -> StatementRecord {
        StatementRecord {
            symbol: symbol.into(),
            date,
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), Some(*v)))
                .collect(),
        }
    }

    #[test]
    fn test_inner_merge_first_table_wins() {
        let mut income = StatementTable::new("income");
        income.insert(record("AAA", d(2020, 12, 31), &[("netIncome", 10.0), ("shared", 1.0)]));
        income.insert(record("BBB", d(2020, 12, 31), &[("netIncome", 5.0)]));

        let mut balance = StatementTable::new("balance");
        balance.insert(record("AAA", d(2020, 12, 31), &[("totalAssets", 100.0), ("shared", 2.0)]));

        let merged = merge_statements(&[income, balance]);
        assert_eq!(merged.len(), 1);
        let row = &merged[0];
        assert_eq!(row.symbol, "AAA");
        assert_eq!(row.fields["netIncome"], Some(10.0));
        assert_eq!(row.fields["totalAssets"], Some(100.0));
        assert_eq!(row.fields["shared"], Some(1.0));
    }

    #[test]
    fn test_from_frame_reports_duplicates() {
        let df = df! {
            "date" => &["2020-12-31", "2020-12-31", "2019-12-31"],
            "symbol" => &["AAA", "AAA", "AAA"],
            "ebit" => &[1.0, 2.0, 3.0],
            "reportedCurrency" => &["USD", "USD", "USD"],
        }
        .unwrap();
        let (table, conflicts) = StatementTable::from_frame("income", &Frame::new(df)).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].date, d(2020, 12, 31));
        assert!(table.fields().contains("ebit"));
        assert!(!table.fields().contains("reportedCurrency"));

        let merged = merge_statements(&[table]);
        assert_eq!(merged[1].fields["ebit"], Some(2.0));
    }
}
