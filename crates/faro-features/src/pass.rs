//! The feature engineering pass: joined rows in, feature rows out.

use std::collections::{BTreeMap, BTreeSet};

use faro_join::JoinedRow;
use faro_traits::Date;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    ABS_SUFFIX, EVOL_SUFFIX, FeatureRow, FeatureTable, SectorMap,
    yields::{annualized_log_yield, greater, ratio},
};

/// Configuration for [`FeaturePass`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Rows whose price date is this many days or more away from the
    /// statement date are dropped (default: 14).
    pub tolerance_days: i64,

    /// Statement fields missing in more than this fraction of the input rows
    /// are dropped (default: 0.2).
    pub max_missing_rate: f64,

    /// Statement fields also kept un-normalized (default: `ebit`,
    /// `totalRevenue`).
    pub absolute_fields: Vec<String>,

    /// Sector buckets.
    pub sectors: SectorMap,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            tolerance_days: 14,
            max_missing_rate: 0.2,
            absolute_fields: vec!["ebit".to_string(), "totalRevenue".to_string()],
            sectors: SectorMap::default(),
        }
    }
}

/// What the pass removed, and why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDiagnostics {
    /// Rows received.
    pub input_rows: usize,
    /// Repeated `(symbol, date)` rows collapsed.
    pub duplicate_rows: usize,
    /// Rows whose price was too far from the statement date, or absent.
    pub sync_violations: usize,
    /// Rows without a forward yield.
    pub missing_label: usize,
    /// Statement fields dropped for missing values.
    pub dropped_columns: Vec<String>,
    /// Rows emitted.
    pub output_rows: usize,
}

/// Turns joined rows into model-ready feature rows.
#[derive(Debug, Clone, Default)]
pub struct FeaturePass {
    config: FeatureConfig,
}

impl FeaturePass {
    /// Creates a new pass.
    pub const fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// The pass configuration.
    #[must_use]
    pub const fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Run the pass.
    ///
    /// Steps, in order: collapse repeated `(symbol, date)` rows, choose the
    /// statement fields to keep from missing rates over all rows, drop rows
    /// whose price is out of sync, derive yields, flags and ratios, remap
    /// sectors, and drop rows without a forward yield. Output is sorted by
    /// `(symbol, date)`.
    pub fn run(&self, joined: Vec<JoinedRow>) -> (FeatureTable, FeatureDiagnostics) {
        let mut diagnostics = FeatureDiagnostics {
            input_rows: joined.len(),
            ..FeatureDiagnostics::default()
        };

        let rows = dedup_rows(joined);
        diagnostics.duplicate_rows = diagnostics.input_rows - rows.len();

        let all_fields: BTreeSet<&String> = rows.iter().flat_map(|r| r.fields.keys()).collect();
        let dropped = columns_to_drop(&rows, self.config.max_missing_rate);
        let variables: Vec<String> = all_fields
            .into_iter()
            .filter(|f| !dropped.contains(*f))
            .cloned()
            .collect();
        let absolute: Vec<String> = self
            .config
            .absolute_fields
            .iter()
            .filter(|f| variables.contains(*f))
            .map(|f| format!("{f}{ABS_SUFFIX}"))
            .collect();
        if !dropped.is_empty() {
            info!(columns = dropped.len(), "Dropped statement fields over the missing-value threshold");
            debug!(?dropped, "Dropped fields");
        }
        diagnostics.dropped_columns = dropped.into_iter().collect();

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            if !self.in_sync(row) {
                diagnostics.sync_violations += 1;
                continue;
            }
            let features = self.derive(row, &variables);
            if features.yield_next.is_none() {
                diagnostics.missing_label += 1;
                continue;
            }
            out.push(features);
        }

        if diagnostics.sync_violations > 0 {
            warn!(
                rows = diagnostics.sync_violations,
                tolerance_days = self.config.tolerance_days,
                "Dropped rows with stale or missing prices"
            );
        }
        diagnostics.output_rows = out.len();
        info!(
            input = diagnostics.input_rows,
            output = diagnostics.output_rows,
            missing_label = diagnostics.missing_label,
            "Feature pass complete"
        );

        (
            FeatureTable {
                variables,
                absolute,
                evolution: Vec::new(),
                rows: out,
            },
            diagnostics,
        )
    }

    fn in_sync(&self, row: &JoinedRow) -> bool {
        row.date_price
            .is_some_and(|dp| (row.date - dp).num_days().abs() < self.config.tolerance_days)
    }

    fn derive(&self, row: &JoinedRow, variables: &[String]) -> FeatureRow {
        let market_cap = row
            .price
            .zip(row.shares)
            .map(|(p, s)| p * s)
            .filter(|m| m.is_finite());

        let yield_past =
            annualized_log_yield(row.price_previous, row.date_price_previous, row.price, row.date_price);
        let yield_next =
            annualized_log_yield(row.price, row.date_price, row.price_next, row.date_price_next);
        let yield_ref =
            annualized_log_yield(row.ref_previous, row.date_ref_previous, row.ref_level, row.date_ref);
        let yield_ref_next =
            annualized_log_yield(row.ref_level, row.date_ref, row.ref_next, row.date_ref_next);

        let raw = |field: &str| row.fields.get(field).copied().flatten();
        let normalized = variables
            .iter()
            .map(|f| (f.clone(), ratio(raw(f), market_cap)))
            .collect();
        let absolute = self
            .config
            .absolute_fields
            .iter()
            .filter(|f| variables.contains(*f))
            .map(|f| (format!("{f}{ABS_SUFFIX}"), raw(f)))
            .collect();

        FeatureRow {
            date: row.date,
            symbol: row.symbol.clone(),
            sector: row
                .sector
                .as_deref()
                .map(|s| self.config.sectors.remap(s).to_string()),
            variables: normalized,
            absolute,
            evolution: BTreeMap::new(),
            market_cap,
            div_percent: ratio(row.dividends, row.price),
            yield_past,
            yield_ref,
            yield_next,
            yield_ref_next,
            outperform: greater(yield_past, yield_ref),
            outperform_next: greater(yield_next, yield_ref_next),
            positive: greater(yield_past, Some(0.0)),
            positive_next: greater(yield_next, Some(0.0)),
            date_price: row.date_price,
            date_price_previous: row.date_price_previous,
        }
    }
}

/// Sort by `(symbol, date)`, keeping the last of repeated keys.
pub fn dedup_rows(rows: Vec<JoinedRow>) -> Vec<JoinedRow> {
    let mut keyed: BTreeMap<(String, Date), JoinedRow> = BTreeMap::new();
    for row in rows {
        keyed.insert((row.symbol.clone(), row.date), row);
    }
    keyed.into_values().collect()
}

/// Statement fields whose missing rate over `rows` exceeds `max_missing_rate`.
///
/// A field absent from a row counts as missing for that row. The comparison
/// is strict: a field missing in exactly `max_missing_rate` of rows is kept.
pub fn columns_to_drop(rows: &[JoinedRow], max_missing_rate: f64) -> BTreeSet<String> {
    if rows.is_empty() {
        return BTreeSet::new();
    }
    let mut present: BTreeMap<&String, usize> = BTreeMap::new();
    for row in rows {
        for (field, value) in &row.fields {
            let count = present.entry(field).or_insert(0);
            if value.is_some_and(f64::is_finite) {
                *count += 1;
            }
        }
    }
    let n = rows.len();
    present
        .into_iter()
        .filter(|(_, count)| (n - count) as f64 / n as f64 > max_missing_rate)
        .map(|(field, _)| field.clone())
        .collect()
}

/// Evolution features: each row gains `field_evol = field - field_prev`
/// against the latest row of the same symbol dated strictly earlier.
///
/// Differenced columns are the normalized fields plus `div_percent`, `yield`
/// and `market_cap`. Rows without a predecessor are dropped; the input table
/// is left untouched.
pub fn evolution(table: &FeatureTable) -> FeatureTable {
    let mut base: Vec<String> = table.variables.clone();
    base.extend(["div_percent", "yield", "market_cap"].map(String::from));
    let evolution_names: Vec<String> = base.iter().map(|f| format!("{f}{EVOL_SUFFIX}")).collect();

    let mut by_symbol: BTreeMap<&str, Vec<&FeatureRow>> = BTreeMap::new();
    for row in &table.rows {
        by_symbol.entry(&row.symbol).or_default().push(row);
    }

    let mut rows = Vec::new();
    for history in by_symbol.values_mut() {
        history.sort_by_key(|r| r.date);
        for (i, row) in history.iter().enumerate() {
            // Strictly earlier: skip same-day rows.
            let earlier = history[..i].partition_point(|r| r.date < row.date);
            let Some(previous) = earlier.checked_sub(1).map(|j| history[j]) else {
                continue;
            };
            let mut current = (*row).clone();
            current.evolution = base
                .iter()
                .zip(&evolution_names)
                .map(|(field, name)| {
                    let diff = numeric(row, field)
                        .zip(numeric(previous, field))
                        .map(|(now, before)| now - before);
                    (name.clone(), diff)
                })
                .collect();
            rows.push(current);
        }
    }

    info!(
        input = table.rows.len(),
        output = rows.len(),
        "Built evolution table"
    );
    FeatureTable {
        variables: table.variables.clone(),
        absolute: table.absolute.clone(),
        evolution: evolution_names,
        rows,
    }
}

fn numeric(row: &FeatureRow, field: &str) -> Option<f64> {
    match row.value(field) {
        crate::Cell::Number(x) => Some(x),
        _ => None,
    }
}
