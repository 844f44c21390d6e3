//! Coarse sector buckets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Many-to-one mapping from provider sectors to coarse buckets.
///
/// Sectors without an entry pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorMap {
    mapping: BTreeMap<String, String>,
}

impl Default for SectorMap {
    fn default() -> Self {
        let pairs = [
            ("Consumer Discretionary", "Consumer Services"),
            ("Consumer Non-Durables", "Consumer Services"),
            ("Consumer Durables", "Consumer Services"),
            ("Consumer Staples", "Consumer Services"),
            ("Utilities", "Energy"),
            ("Basic Industries", "Industrials"),
            ("Materials", "Industrials"),
            ("Information Technology", "Technology"),
            ("Financials", "Finance"),
        ];
        Self::new(
            pairs
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string())),
        )
    }
}

impl SectorMap {
    /// Build a map from `(fine, coarse)` pairs.
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            mapping: pairs.into_iter().collect(),
        }
    }

    /// The coarse bucket of `sector`.
    pub fn remap<'a>(&'a self, sector: &'a str) -> &'a str {
        self.mapping.get(sector).map_or(sector, String::as_str)
    }
}
