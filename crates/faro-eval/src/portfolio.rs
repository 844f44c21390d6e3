//! Equity curves from weights and daily prices.
//!
//! Weights assigned on a scoring date are held until the next non-empty
//! weight row and earn the returns of the trading days strictly after the
//! date they were assigned.

use faro_traits::{DatedMatrix, Date, FaroError, Frame, FrameBuilder, Result, Symbol};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cumulative value of a strategy, starting at `1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    /// Strategy name.
    pub name: String,
    /// Trading dates.
    pub dates: Vec<Date>,
    /// Value at each date.
    pub values: Vec<f64>,
}

impl EquityCurve {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last value.
    pub fn final_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Period returns between consecutive points.
    pub fn returns(&self) -> Vec<f64> {
        self.values.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
    }
}

/// Render several curves side by side, outer-joined on date.
pub fn curves_to_frame(curves: &[EquityCurve]) -> Result<Frame> {
    let mut dates: Vec<Date> = curves.iter().flat_map(|c| c.dates.iter().copied()).collect();
    dates.sort_unstable();
    dates.dedup();

    let mut builder = FrameBuilder::new().date(
        "Date",
        &dates.iter().map(|d| Some(*d)).collect::<Vec<_>>(),
    );
    for curve in curves {
        let values = dates
            .iter()
            .map(|d| {
                curve
                    .dates
                    .binary_search(d)
                    .ok()
                    .map(|i| curve.values[i])
            })
            .collect();
        builder = builder.f64(&curve.name, values);
    }
    builder.build()
}

/// Simple daily returns of every column.
///
/// A missing price is carried forward from the last known price, so the
/// return on the next known price spans the gap. Returns are missing where
/// the price is missing or no earlier positive price exists.
pub fn daily_returns(prices: &DatedMatrix) -> Result<DatedMatrix> {
    let width = prices.symbols().len();
    let mut last: Vec<Option<f64>> = vec![None; width];
    let mut cells = Vec::with_capacity(prices.len());
    for (_, row) in prices.rows() {
        let mut out = vec![None; width];
        for (j, price) in row.iter().enumerate() {
            let Some(price) = price.filter(|p| p.is_finite()) else {
                continue;
            };
            if let Some(prev) = last[j].filter(|p| *p > 0.0) {
                out[j] = Some(price / prev - 1.0);
            }
            last[j] = Some(price);
        }
        cells.push(out);
    }
    DatedMatrix::from_parts(prices.dates().to_vec(), prices.symbols().to_vec(), cells)
}

/// Equity curve of `weights` applied to `returns`.
///
/// The curve starts at `1.0` on the first trading date on or after the
/// first non-empty weight row. On every later date the portfolio earns
/// `sum_i w_i * r_i` with the latest weights dated strictly before that day;
/// a missing return contributes nothing. Weight columns absent from
/// `returns` are ignored.
pub fn simulate(name: &str, weights: &DatedMatrix, returns: &DatedMatrix) -> EquityCurve {
    let columns: Vec<Option<usize>> = weights
        .symbols()
        .iter()
        .map(|s| returns.column_index(s))
        .collect();
    let active_rows: Vec<(Date, &[Option<f64>])> = weights
        .rows()
        .filter(|(_, row)| row.iter().any(Option::is_some))
        .collect();

    let mut curve = EquityCurve {
        name: name.to_string(),
        ..EquityCurve::default()
    };
    let Some(&(first, _)) = active_rows.first() else {
        return curve;
    };

    let mut value = 1.0;
    for (date, row) in returns.rows().filter(|(d, _)| *d >= first) {
        if !curve.is_empty() {
            let held = active_rows.partition_point(|(d, _)| *d < date);
            let (_, w) = active_rows[held - 1];
            let portfolio: f64 = w
                .iter()
                .zip(&columns)
                .filter_map(|(w, col)| Some(w.unwrap_or(0.0) * (*col).and_then(|c| row[c])?))
                .filter(|x| x.is_finite())
                .sum();
            value *= 1.0 + portfolio;
        }
        curve.dates.push(date);
        curve.values.push(value);
    }
    debug!(strategy = name, points = curve.len(), final_value = value, "Simulated equity curve");
    curve
}

/// Buy-and-hold curve of one column of `returns` from `start`.
pub fn benchmark_curve(returns: &DatedMatrix, symbol: &str, start: Date) -> Result<EquityCurve> {
    if returns.column_index(symbol).is_none() {
        return Err(FaroError::MissingColumn(symbol.to_string()));
    }
    let weights = DatedMatrix::from_parts(
        vec![start],
        vec![Symbol::from(symbol)],
        vec![vec![Some(1.0)]],
    )?;
    Ok(simulate(symbol, &weights, returns))
}
