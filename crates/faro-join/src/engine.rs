//! The as-of join engine.
//!
//! Each statement record is joined with the auxiliary series of its entity:
//!
//! | Field | Lookup |
//! |---|---|
//! | `price` | backward as-of at `date` |
//! | `price_previous` | backward as-of at `date`, prices shifted forward one year |
//! | `price_next` | backward as-of at `date`, prices shifted back one year |
//! | `dividends` | sum over `(date - 1y, date]` |
//! | `shares` | nearest (or backward) share count |
//! | `ref*` | reference index level nearest (or backward) to each price date |
//!
//! The `_next` fields resolve after `date`; they exist to build the label and
//! never become features. With nearest reference matching, `ref_level` can
//! also be dated up to half a gap after `date`.

use std::collections::BTreeMap;

use chrono::Duration;
use faro_traits::{Date, Result, Symbol, shift_years};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{EntitySeries, Observation, StatementRecord, TimeSeries};

/// How an auxiliary observation is matched to a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsOfMatch {
    /// Closest observation in either direction.
    #[default]
    Nearest,
    /// Last observation at or before the date.
    Backward,
}

/// Configuration for [`AsOfJoinEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Look-back and look-ahead horizon in years for the previous and next
    /// prices and the dividend window.
    pub offset_years: i32,

    /// Days between a fiscal period end and the date its statement is
    /// treated as known. Every lookup is made against the shifted date.
    pub publication_lag_days: i64,

    /// Share count matching rule.
    pub shares_match: AsOfMatch,

    /// Reference level matching rule. `Nearest` can pick a level dated after
    /// the statement; `Backward` never does.
    pub reference_match: AsOfMatch,

    /// Join entities on the rayon pool.
    pub parallel: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            offset_years: 1,
            publication_lag_days: 0,
            shares_match: AsOfMatch::Nearest,
            reference_match: AsOfMatch::Nearest,
            parallel: true,
        }
    }
}

/// Everything the engine joins.
#[derive(Debug, Clone)]
pub struct JoinInputs {
    /// Merged statements, one per `(symbol, period end)`.
    pub statements: Vec<StatementRecord>,
    /// Daily adjusted close per entity.
    pub prices: EntitySeries,
    /// Dividend payments per entity.
    pub dividends: EntitySeries,
    /// Share counts per entity.
    pub shares: EntitySeries,
    /// Static sector per entity.
    pub sectors: BTreeMap<Symbol, String>,
    /// Reference index levels.
    pub reference: TimeSeries,
}

/// One statement joined with its point-in-time market data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedRow {
    /// Entity.
    pub symbol: Symbol,
    /// Date the statement is treated as known.
    pub date: Date,
    /// Fiscal period end; equals `date` without a publication lag.
    pub period_end: Date,
    /// Sector of the entity.
    pub sector: Option<String>,
    /// Last price at or before `date`.
    pub price: Option<f64>,
    /// Date of `price`.
    pub date_price: Option<Date>,
    /// Last price known one year before `date`.
    pub price_previous: Option<f64>,
    /// Date of `price_previous`.
    pub date_price_previous: Option<Date>,
    /// Last price known one year after `date`.
    pub price_next: Option<f64>,
    /// Date of `price_next`.
    pub date_price_next: Option<Date>,
    /// Dividends paid in the trailing year.
    pub dividends: Option<f64>,
    /// Shares outstanding.
    pub shares: Option<f64>,
    /// Reference level nearest `date_price`.
    pub ref_level: Option<f64>,
    /// Date of `ref_level`.
    pub date_ref: Option<Date>,
    /// Reference level nearest `date_price_previous`.
    pub ref_previous: Option<f64>,
    /// Date of `ref_previous`.
    pub date_ref_previous: Option<Date>,
    /// Reference level nearest `date_price_next`.
    pub ref_next: Option<f64>,
    /// Date of `ref_next`.
    pub date_ref_next: Option<Date>,
    /// Statement line items.
    pub fields: BTreeMap<String, Option<f64>>,
}

/// Counts of unresolved lookups. None of these abort a join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDiagnostics {
    /// Rows produced.
    pub rows: usize,
    /// Rows with no price at or before the statement date.
    pub missing_price: usize,
    /// Rows with no previous-year price.
    pub missing_previous: usize,
    /// Rows with no next-year price.
    pub missing_next: usize,
    /// Rows whose entity has no dividend series.
    pub missing_dividends: usize,
    /// Rows with no share count.
    pub missing_shares: usize,
    /// Rows whose entity has no sector.
    pub missing_sector: usize,
    /// Rows with no reference level.
    pub missing_reference: usize,
}

impl JoinDiagnostics {
    fn record(&mut self, row: &JoinedRow) {
        self.rows += 1;
        self.missing_price += usize::from(row.price.is_none());
        self.missing_previous += usize::from(row.price_previous.is_none());
        self.missing_next += usize::from(row.price_next.is_none());
        self.missing_dividends += usize::from(row.dividends.is_none());
        self.missing_shares += usize::from(row.shares.is_none());
        self.missing_sector += usize::from(row.sector.is_none());
        self.missing_reference += usize::from(row.ref_level.is_none());
    }
}

/// Point-in-time join of statements with market data.
#[derive(Debug, Clone, Default)]
pub struct AsOfJoinEngine {
    config: JoinConfig,
}

impl AsOfJoinEngine {
    /// Creates a new engine.
    pub const fn new(config: JoinConfig) -> Self {
        Self { config }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Join every statement record.
    ///
    /// Rows come back sorted by `(symbol, date)`. A lookup with no match
    /// leaves the field missing; the row is always emitted.
    pub fn join(&self, inputs: &JoinInputs) -> Result<(Vec<JoinedRow>, JoinDiagnostics)> {
        let mut by_entity: BTreeMap<&str, Vec<&StatementRecord>> = BTreeMap::new();
        for record in &inputs.statements {
            by_entity.entry(&record.symbol).or_default().push(record);
        }
        let groups: Vec<(&str, Vec<&StatementRecord>)> = by_entity.into_iter().collect();

        let join_group = |(entity, records): &(&str, Vec<&StatementRecord>)| {
            let mut rows: Vec<JoinedRow> = records
                .iter()
                .map(|record| self.join_record(entity, record, inputs))
                .collect();
            rows.sort_by_key(|row| row.date);
            debug!(entity, rows = rows.len(), "Joined entity");
            rows
        };

        let per_entity: Vec<Vec<JoinedRow>> = if self.config.parallel {
            groups.par_iter().map(join_group).collect()
        } else {
            groups.iter().map(join_group).collect()
        };

        let rows: Vec<JoinedRow> = per_entity.into_iter().flatten().collect();
        let mut diagnostics = JoinDiagnostics::default();
        for row in &rows {
            diagnostics.record(row);
        }

        info!(
            entities = groups.len(),
            rows = diagnostics.rows,
            missing_price = diagnostics.missing_price,
            missing_shares = diagnostics.missing_shares,
            "As-of join complete"
        );
        if diagnostics.missing_sector > 0 {
            warn!(rows = diagnostics.missing_sector, "Rows without a sector");
        }
        Ok((rows, diagnostics))
    }

    fn join_record(&self, entity: &str, record: &StatementRecord, inputs: &JoinInputs) -> JoinedRow {
        let years = self.config.offset_years;
        let date = record.date + Duration::days(self.config.publication_lag_days);

        let price = inputs.prices.as_of_backward(entity, date);
        let previous = inputs.prices.as_of_backward_shifted(entity, date, years);
        let next = inputs.prices.as_of_backward_shifted(entity, date, -years);

        let dividends =
            inputs
                .dividends
                .windowed_sum(entity, shift_years(date, -years), date);

        let shares = match self.config.shares_match {
            AsOfMatch::Nearest => inputs.shares.as_of_nearest(entity, date),
            AsOfMatch::Backward => inputs.shares.as_of_backward(entity, date),
        };

        let reference = |at: Option<&Observation>| {
            at.and_then(|o| match self.config.reference_match {
                AsOfMatch::Nearest => inputs.reference.as_of_nearest(o.date),
                AsOfMatch::Backward => inputs.reference.as_of_backward(o.date),
            })
            .copied()
        };
        let ref_now = reference(price);
        let ref_previous = reference(previous);
        let ref_next = reference(next);

        JoinedRow {
            symbol: entity.to_string(),
            date,
            period_end: record.date,
            sector: inputs.sectors.get(entity).cloned(),
            price: price.map(|o| o.value),
            date_price: price.map(|o| o.date),
            price_previous: previous.map(|o| o.value),
            date_price_previous: previous.map(|o| o.date),
            price_next: next.map(|o| o.value),
            date_price_next: next.map(|o| o.date),
            dividends,
            shares: shares.map(|o| o.value),
            ref_level: ref_now.map(|o| o.value),
            date_ref: ref_now.map(|o| o.date),
            ref_previous: ref_previous.map(|o| o.value),
            date_ref_previous: ref_previous.map(|o| o.date),
            ref_next: ref_next.map(|o| o.value),
            date_ref_next: ref_next.map(|o| o.date),
            fields: record.fields.clone(),
        }
    }
}
