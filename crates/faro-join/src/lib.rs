#![doc(issue_tracker_base_url = "https://github.com/factordynamics/faro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Point-in-time as-of join for Faro.
//!
//! Statements, prices, dividends, share counts and a reference index are
//! sampled on different calendars. This crate aligns them into one row per
//! `(symbol, statement date)` in which every backward-looking value was
//! knowable on that date.
//!
//! # Example
//!
//! ```no_run
//! use faro_join::{AsOfJoinEngine, JoinConfig, UniverseLayout, join_universe};
//!
//! let layout = UniverseLayout::new("data/sp500");
//! let engine = AsOfJoinEngine::new(JoinConfig::default());
//! let (rows, diagnostics) = join_universe(&engine, &layout, "^GSPC")?;
//! println!("{} rows, {} without price", rows.len(), diagnostics.missing_price);
//! # Ok::<(), faro_traits::FaroError>(())
//! ```

pub mod engine;
pub mod io;
pub mod series;
pub mod statements;

pub use engine::{AsOfJoinEngine, AsOfMatch, JoinConfig, JoinDiagnostics, JoinInputs, JoinedRow};
pub use io::{UniverseLayout, read_joined, write_joined};
pub use series::{DataConflict, EntitySeries, Observation, SeriesBuilder, TimeSeries};
pub use statements::{StatementRecord, StatementTable, merge_statements};

use faro_traits::Result;

/// Load a universe's raw tables and join them.
pub fn join_universe(
    engine: &AsOfJoinEngine,
    layout: &UniverseLayout,
    reference: &str,
) -> Result<(Vec<JoinedRow>, JoinDiagnostics)> {
    let (inputs, conflicts) = io::load_join_inputs(layout, reference)?;
    if !conflicts.is_empty() {
        tracing::warn!(
            conflicts = conflicts.len(),
            "Duplicate timestamps resolved by keeping the last value"
        );
    }
    engine.join(&inputs)
}
