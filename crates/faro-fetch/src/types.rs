//! Provider responses and per-entity snapshots.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reporting period for financial statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    /// Annual reports (10-K filings).
    #[default]
    Annual,
    /// Quarterly reports (10-Q filings).
    Quarter,
}

impl Period {
    /// Get the API parameter value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarter => "quarter",
        }
    }
}

/// One dividend-adjusted daily bar; only the close is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustedPrice {
    /// Trading date.
    pub date: String,
    /// Adjusted close.
    #[serde(default)]
    pub adj_close: Option<f64>,
}

/// One dividend payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dividend {
    /// Ex-dividend date.
    pub date: String,
    /// Split-adjusted amount per share.
    #[serde(default)]
    pub adj_dividend: Option<f64>,
}

/// One statement as returned by the provider: a date plus every reported
/// field. Only numeric fields survive into the CSV tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatement {
    /// Period end date.
    pub date: String,
    /// Remaining fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl RawStatement {
    /// Numeric fields, excluding identification keys.
    pub fn numeric_fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields
            .iter()
            .filter(|(k, _)| k.as_str() != "symbol")
            .filter_map(|(k, v)| Some((k.as_str(), v.as_f64()?)))
    }
}

/// One enterprise-value record; only the share count is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterpriseValue {
    /// Period end date.
    pub date: String,
    /// Shares outstanding.
    #[serde(default)]
    pub number_of_shares: Option<f64>,
}

/// Share counts at one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharesPoint {
    /// Period end date.
    pub date: String,
    /// Ordinary shares.
    pub ordinary: Option<f64>,
    /// Preferred shares.
    pub preferred: Option<f64>,
}

/// Everything fetched for one entity, persisted as `.raw/<SYMBOL>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Ticker.
    pub symbol: String,
    /// Daily adjusted closes.
    pub prices: Vec<AdjustedPrice>,
    /// Dividend payments.
    pub dividends: Vec<Dividend>,
    /// Annual income statements.
    pub income: Vec<RawStatement>,
    /// Annual balance sheets.
    pub balance: Vec<RawStatement>,
    /// Annual cash flow statements.
    pub cashflow: Vec<RawStatement>,
    /// Annual share counts.
    pub shares: Vec<SharesPoint>,
}

/// Parse a provider date, accepting a trailing time component.
pub fn parse_provider_date(value: &str) -> Option<NaiveDate> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
