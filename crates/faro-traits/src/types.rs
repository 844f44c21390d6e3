//! Common types used throughout the Faro pipeline.
//!
//! This module defines the date and symbol aliases, calendar helpers, and
//! [`Frame`], a thin wrapper over a Polars `DataFrame` that every stage uses
//! to read and write its CSV artifacts.

use std::{
    fs::File,
    io::{BufWriter, Cursor, Write},
    path::Path,
};

use chrono::Months;
use polars::prelude::*;

use crate::{FaroError, Result};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// A market symbol identifier.
///
/// Symbols identify listed companies and reference indices, e.g. `"AAPL"` or
/// `"^GSPC"`.
pub type Symbol = String;

/// Calendar format used for every date column written by the pipeline.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a date string in `YYYY-MM-DD` format.
///
/// Only the first ten characters are read, so timestamps such as
/// `2020-01-02 00:00:00-05:00` resolve to their calendar day.
pub fn parse_date(value: &str) -> Result<Date> {
    let trimmed = value.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    Date::parse_from_str(day, DATE_FORMAT)
        .map_err(|e| FaroError::InvalidDate(format!("{value}: {e}")))
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Shift a date by a whole number of calendar years.
///
/// February 29th clamps to February 28th in non-leap years. Results outside
/// the representable range saturate at [`Date::MIN`] / [`Date::MAX`], which
/// keeps the shift monotone for binary searches.
pub fn shift_years(date: Date, years: i32) -> Date {
    let months = Months::new(years.unsigned_abs() * 12);
    if years >= 0 {
        date.checked_add_months(months).unwrap_or(Date::MAX)
    } else {
        date.checked_sub_months(months).unwrap_or(Date::MIN)
    }
}

/// Container for a tabular artifact.
///
/// `Frame` wraps a Polars DataFrame. Dates are stored as `YYYY-MM-DD`
/// strings so that CSV round trips are byte-stable, and numeric cells are
/// nullable `Float64` where null means "missing".
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// The underlying DataFrame.
    data: DataFrame,
}

impl Frame {
    /// Creates a new `Frame` from a DataFrame.
    pub const fn new(data: DataFrame) -> Self {
        Self { data }
    }

    /// Returns a reference to the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Consumes self and returns the underlying DataFrame.
    pub fn into_inner(self) -> DataFrame {
        self.data
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Returns whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Checks if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.data
            .get_column_names()
            .iter()
            .any(|s| s.as_str() == name)
    }

    /// Gets a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.data.column(name).ok()
    }

    /// Returns the first column whose name matches one of `candidates`,
    /// ignoring ASCII case.
    pub fn find_column(&self, candidates: &[&str]) -> Option<String> {
        let names = self.columns();
        candidates.iter().find_map(|candidate| {
            names
                .iter()
                .find(|name| name.eq_ignore_ascii_case(candidate))
                .cloned()
        })
    }

    /// Whether a column was parsed as text rather than numbers.
    pub fn is_text_column(&self, name: &str) -> bool {
        self.column(name)
            .is_some_and(|c| matches!(c.dtype(), DataType::String))
    }

    /// Read a comma-separated file with a header row.
    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::read_csv_with_separator(path, b',')
    }

    /// Read a delimited file with a header row and the given separator.
    pub fn read_csv_with_separator(path: &Path, separator: u8) -> Result<Self> {
        let data = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(Self::new(data))
    }

    /// Parse comma-separated bytes with a header row.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let data = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?;
        Ok(Self::new(data))
    }

    /// Write the frame as CSV with a header row.
    pub fn write_csv<W: Write>(&mut self, writer: W) -> Result<()> {
        CsvWriter::new(writer)
            .include_header(true)
            .finish(&mut self.data)?;
        Ok(())
    }

    /// Write the frame as CSV to `path`, creating parent directories.
    pub fn write_csv_file(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Render the frame as CSV bytes.
    pub fn to_csv_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(buffer)
    }

    fn require(&self, name: &str) -> Result<&Column> {
        self.data
            .column(name)
            .map_err(|_| FaroError::MissingColumn(name.to_string()))
    }

    /// Numeric values of a column; nulls and non-finite values are `None`.
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self
            .require(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        Ok(series
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect())
    }

    /// Text values of a column; empty strings are `None`.
    pub fn str_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        let series = self
            .require(name)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        Ok(series
            .str()?
            .into_iter()
            .map(|v| v.filter(|s| !s.is_empty()).map(str::to_string))
            .collect())
    }

    /// Boolean values of a column, accepting `true`/`false` or `1`/`0`.
    pub fn bool_values(&self, name: &str) -> Result<Vec<Option<bool>>> {
        self.str_values(name)?
            .into_iter()
            .map(|v| match v.as_deref() {
                None => Ok(None),
                Some("true" | "True" | "1") => Ok(Some(true)),
                Some("false" | "False" | "0") => Ok(Some(false)),
                Some(other) => Err(FaroError::InvalidData(format!(
                    "Column {name}: expected boolean, found {other}"
                ))),
            })
            .collect()
    }

    /// Date values of a column.
    pub fn date_values(&self, name: &str) -> Result<Vec<Option<Date>>> {
        self.str_values(name)?
            .into_iter()
            .map(|v| v.as_deref().map(parse_date).transpose())
            .collect()
    }
}

impl From<DataFrame> for Frame {
    fn from(data: DataFrame) -> Self {
        Self::new(data)
    }
}

impl AsRef<DataFrame> for Frame {
    fn as_ref(&self) -> &DataFrame {
        &self.data
    }
}

/// Column-by-column builder for [`Frame`].
#[derive(Debug, Default)]
pub struct FrameBuilder {
    columns: Vec<Column>,
}

impl FrameBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a nullable numeric column.
    pub fn f64(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        let values: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        self.columns.push(Column::new(name.into(), values));
        self
    }

    /// Append a nullable text column.
    pub fn str(mut self, name: &str, values: Vec<Option<String>>) -> Self {
        self.columns.push(Column::new(name.into(), values));
        self
    }

    /// Append a nullable boolean column.
    pub fn bool(mut self, name: &str, values: Vec<Option<bool>>) -> Self {
        self.columns.push(Column::new(name.into(), values));
        self
    }

    /// Append a nullable date column, stored as `YYYY-MM-DD` text.
    pub fn date(self, name: &str, values: &[Option<Date>]) -> Self {
        let text = values.iter().map(|d| d.map(format_date)).collect();
        self.str(name, text)
    }

    /// Assemble the frame.
    pub fn build(self) -> Result<Frame> {
        Ok(Frame::new(DataFrame::new(self.columns)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(parse_date("2020-01-02").unwrap(), d(2020, 1, 2));
        assert_eq!(parse_date("2020-01-02 00:00:00-05:00").unwrap(), d(2020, 1, 2));
        assert!(parse_date("not a date").is_err());
    }

    #[test]
    fn test_shift_years_clamps_leap_day() {
        assert_eq!(shift_years(d(2020, 2, 29), 1), d(2021, 2, 28));
        assert_eq!(shift_years(d(2021, 3, 1), -1), d(2020, 3, 1));
        assert_eq!(shift_years(d(2020, 2, 29), -1), d(2019, 2, 28));
    }

    #[test]
    fn test_frame_round_trip() {
        let mut frame = FrameBuilder::new()
            .date("date", &[Some(d(2020, 1, 1)), None])
            .str("symbol", vec![Some("AAA".into()), Some("BBB".into())])
            .f64("price", vec![Some(1.5), Some(f64::NAN)])
            .bool("flag", vec![Some(true), None])
            .build()
            .unwrap();

        let bytes = frame.to_csv_bytes().unwrap();
        let parsed = Frame::from_csv_bytes(&bytes).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed.date_values("date").unwrap(),
            vec![Some(d(2020, 1, 1)), None]
        );
        assert_eq!(parsed.f64_values("price").unwrap(), vec![Some(1.5), None]);
        assert_eq!(parsed.bool_values("flag").unwrap(), vec![Some(true), None]);
    }

    #[test]
    fn test_find_column_ignores_case() {
        let frame = FrameBuilder::new()
            .str("GICS Sector", vec![Some("Energy".into())])
            .build()
            .unwrap();
        assert_eq!(
            frame.find_column(&["sector", "gics sector"]),
            Some("GICS Sector".to_string())
        );
        assert!(frame.find_column(&["industry"]).is_none());
    }

    #[test]
    fn test_missing_column_error() {
        let frame = Frame::default();
        assert!(matches!(
            frame.f64_values("price"),
            Err(FaroError::MissingColumn(_))
        ));
    }
}
