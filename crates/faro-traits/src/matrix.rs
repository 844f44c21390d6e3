//! Date-indexed, entity-column matrices.
//!
//! Daily prices, walk-forward probabilities and portfolio weights all share
//! the same wide layout: one row per date, one column per symbol, and a
//! nullable cell. [`DatedMatrix`] is that layout, with CSV I/O matching the
//! `prices_daily.csv` / `probas.csv` artifacts.

use std::{collections::BTreeMap, path::Path};

use crate::{Date, FaroError, Frame, FrameBuilder, Result, Symbol};

/// Names accepted for the date index column of a wide CSV.
pub const DATE_INDEX_CANDIDATES: &[&str] = &["Date", "date"];

/// A wide matrix of optional values indexed by date (rows) and symbol
/// (columns).
///
/// Rows are kept sorted by date and dates are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatedMatrix {
    dates: Vec<Date>,
    symbols: Vec<Symbol>,
    /// Row-major cells, `cells[row][col]`.
    cells: Vec<Vec<Option<f64>>>,
}

impl DatedMatrix {
    /// Create an empty matrix over a fixed set of symbols.
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            dates: Vec::new(),
            symbols,
            cells: Vec::new(),
        }
    }

    /// Build a matrix from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if dates are not strictly increasing or a row has the
    /// wrong width.
    pub fn from_parts(
        dates: Vec<Date>,
        symbols: Vec<Symbol>,
        cells: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if dates.len() != cells.len() {
            return Err(FaroError::InvalidData(format!(
                "{} dates but {} rows",
                dates.len(),
                cells.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FaroError::InvalidData(
                "Matrix dates must be strictly increasing".to_string(),
            ));
        }
        if let Some(row) = cells.iter().find(|row| row.len() != symbols.len()) {
            return Err(FaroError::InvalidData(format!(
                "Row has {} cells, expected {}",
                row.len(),
                symbols.len()
            )));
        }
        Ok(Self {
            dates,
            symbols,
            cells,
        })
    }

    /// Append a row dated after every existing row.
    ///
    /// # Errors
    ///
    /// Returns an error if the date does not advance or the width differs.
    pub fn push_row(&mut self, date: Date, row: Vec<Option<f64>>) -> Result<()> {
        if let Some(last) = self.dates.last() {
            if date <= *last {
                return Err(FaroError::InvalidDate(format!(
                    "Row {date} does not follow {last}"
                )));
            }
        }
        if row.len() != self.symbols.len() {
            return Err(FaroError::InvalidData(format!(
                "Row has {} cells, expected {}",
                row.len(),
                self.symbols.len()
            )));
        }
        self.dates.push(date);
        self.cells.push(row);
        Ok(())
    }

    /// Row dates, ascending.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Column symbols.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Cells of row `index`.
    pub fn row(&self, index: usize) -> &[Option<f64>] {
        &self.cells[index]
    }

    /// Iterate over `(date, row)` pairs.
    pub fn rows(&self) -> impl Iterator<Item = (Date, &[Option<f64>])> {
        self.dates
            .iter()
            .copied()
            .zip(self.cells.iter().map(Vec::as_slice))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column index of a symbol.
    pub fn column_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Values of one column, aligned with [`Self::dates`].
    pub fn column(&self, symbol: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(symbol)?;
        Some(self.cells.iter().map(|row| row[idx]).collect())
    }

    /// Row index of the last date at or before `date`.
    pub fn row_at_or_before(&self, date: Date) -> Option<usize> {
        self.dates.partition_point(|d| *d <= date).checked_sub(1)
    }

    /// Keep only rows dated on or after `start`.
    pub fn since(&self, start: Date) -> Self {
        let from = self.dates.partition_point(|d| *d < start);
        Self {
            dates: self.dates[from..].to_vec(),
            symbols: self.symbols.clone(),
            cells: self.cells[from..].to_vec(),
        }
    }

    /// Remove the named columns.
    pub fn without_columns(&self, excluded: &[Symbol]) -> Self {
        let keep: Vec<usize> = (0..self.symbols.len())
            .filter(|&i| !excluded.contains(&self.symbols[i]))
            .collect();
        Self {
            dates: self.dates.clone(),
            symbols: keep.iter().map(|&i| self.symbols[i].clone()).collect(),
            cells: self
                .cells
                .iter()
                .map(|row| keep.iter().map(|&i| row[i]).collect())
                .collect(),
        }
    }

    /// Outer-join `other` on date, adding only the columns not already
    /// present. Existing columns keep their values.
    pub fn merge_outer(&self, other: &Self) -> Self {
        let added: Vec<usize> = (0..other.symbols.len())
            .filter(|&i| !self.symbols.contains(&other.symbols[i]))
            .collect();

        let mut rows: BTreeMap<Date, Vec<Option<f64>>> = BTreeMap::new();
        let width = self.symbols.len() + added.len();
        for (date, row) in self.rows() {
            let mut cells = vec![None; width];
            cells[..row.len()].copy_from_slice(row);
            rows.insert(date, cells);
        }
        for (date, row) in other.rows() {
            let cells = rows.entry(date).or_insert_with(|| vec![None; width]);
            for (offset, &i) in added.iter().enumerate() {
                cells[self.symbols.len() + offset] = row[i];
            }
        }

        let mut symbols = self.symbols.clone();
        symbols.extend(added.iter().map(|&i| other.symbols[i].clone()));
        let (dates, cells) = rows.into_iter().unzip();
        Self {
            dates,
            symbols,
            cells,
        }
    }

    /// Parse a wide table: a date column plus one numeric column per symbol.
    ///
    /// Duplicate dates keep the last row.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let date_col = frame
            .find_column(DATE_INDEX_CANDIDATES)
            .ok_or_else(|| FaroError::MissingColumn("Date".to_string()))?;
        let dates = frame.date_values(&date_col)?;
        let symbols: Vec<Symbol> = frame
            .columns()
            .into_iter()
            .filter(|c| *c != date_col)
            .collect();
        let columns = symbols
            .iter()
            .map(|s| frame.f64_values(s))
            .collect::<Result<Vec<_>>>()?;

        let mut rows: BTreeMap<Date, Vec<Option<f64>>> = BTreeMap::new();
        for (i, date) in dates.iter().enumerate() {
            let Some(date) = date else { continue };
            rows.insert(*date, columns.iter().map(|col| col[i]).collect());
        }
        let (dates, cells) = rows.into_iter().unzip();
        Ok(Self {
            dates,
            symbols,
            cells,
        })
    }

    /// Read a wide CSV file.
    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::from_frame(&Frame::read_csv(path)?)
    }

    /// Render as a wide table with a leading `Date` column.
    pub fn to_frame(&self) -> Result<Frame> {
        let dates: Vec<Option<Date>> = self.dates.iter().copied().map(Some).collect();
        let mut builder = FrameBuilder::new().date("Date", &dates);
        for (j, symbol) in self.symbols.iter().enumerate() {
            builder = builder.f64(symbol, self.cells.iter().map(|row| row[j]).collect());
        }
        builder.build()
    }

    /// Write as a wide CSV file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        self.to_frame()?.write_csv_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2021, 1, day).unwrap()
    }

    fn sample() -> DatedMatrix {
        DatedMatrix::from_parts(
            vec![d(1), d(2), d(4)],
            vec!["A".into(), "B".into()],
            vec![
                vec![Some(1.0), None],
                vec![Some(2.0), Some(10.0)],
                vec![None, Some(11.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_unsorted_dates() {
        let result = DatedMatrix::from_parts(
            vec![d(2), d(1)],
            vec!["A".into()],
            vec![vec![None], vec![None]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_row_at_or_before() {
        let m = sample();
        assert_eq!(m.row_at_or_before(d(3)), Some(1));
        assert_eq!(m.row_at_or_before(d(4)), Some(2));
        assert_eq!(
            m.row_at_or_before(Date::from_ymd_opt(2020, 12, 31).unwrap()),
            None
        );
    }

    #[test]
    fn test_merge_outer_keeps_existing_columns() {
        let left = sample();
        let right = DatedMatrix::from_parts(
            vec![d(3), d(4)],
            vec!["B".into(), "C".into()],
            vec![vec![Some(99.0), Some(5.0)], vec![Some(99.0), Some(6.0)]],
        )
        .unwrap();

        let merged = left.merge_outer(&right);
        assert_eq!(merged.dates(), &[d(1), d(2), d(3), d(4)]);
        assert_eq!(merged.symbols(), &["A", "B", "C"]);
        assert_eq!(
            merged.column("B").unwrap(),
            vec![None, Some(10.0), None, Some(11.0)]
        );
        assert_eq!(
            merged.column("C").unwrap(),
            vec![None, None, Some(5.0), Some(6.0)]
        );
    }

    #[test]
    fn test_frame_round_trip() {
        let m = sample();
        let mut frame = m.to_frame().unwrap();
        let bytes = frame.to_csv_bytes().unwrap();
        let parsed = DatedMatrix::from_frame(&Frame::from_csv_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn test_without_columns_and_since() {
        let m = sample().without_columns(&["A".to_string()]).since(d(2));
        assert_eq!(m.symbols(), &["B"]);
        assert_eq!(m.dates(), &[d(2), d(4)]);
    }
}
