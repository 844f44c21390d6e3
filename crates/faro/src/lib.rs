#![doc(issue_tracker_base_url = "https://github.com/factordynamics/faro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # faro
//!
//! Point-in-time factor research for equity outperformance.
//!
//! faro is an umbrella crate that re-exports all faro sub-crates for
//! convenience. Together they take raw prices and annual statements to a
//! backtested long-only strategy.
//!
//! ## Quick Start
//!
//! ```no_run
//! use faro::prelude::*;
//! use faro::features::FeaturePass;
//! use faro::join::{AsOfJoinEngine, UniverseLayout, join_universe};
//!
//! # fn main() -> Result<()> {
//! let layout = UniverseLayout::new("data/sp500");
//! let (joined, _) = join_universe(&AsOfJoinEngine::default(), &layout, "^GSPC")?;
//! let (table, _) = FeaturePass::default().run(joined);
//!
//! let model = LogisticRegression::default();
//! let result = WalkForward::default().run(
//!     &model,
//!     &table.rows,
//!     parse_date("2018-01-01")?,
//!     &table.default_features(),
//!     faro::features::DEFAULT_TARGET,
//! )?;
//! println!("{} scoring dates", result.probas.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Errors, frames, dated matrices and the classifier contract
//! - [`join`] - As-of join of statements, prices, dividends and shares
//! - [`features`] - Yields, labels, normalization and evolution features
//! - [`model`] - Dataset splitting, encoding and the logistic classifier
//! - [`eval`] - Walk-forward scoring, weighting schemes and equity curves
//! - [`fetch`] - Resumable download of the raw tables
//!
//! ## Pipeline
//!
//! 1. **Fetch** raw per-universe tables
//! 2. **Join** every statement with the prices knowable on its date
//! 3. **Engineer** features and the outperformance label
//! 4. **Score** entities with one classifier per walk-forward cycle
//! 5. **Simulate** weighted portfolios against the reference indices

/// Version information for the faro crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core types and traits.
pub mod traits {
    pub use faro_traits::*;
}

// Re-export core traits at top level for convenience
pub use faro_traits::{Classifier, ProgressStore, TrainedModel};

// Re-export error types
pub use faro_traits::{FaroError, Result};

// Re-export common types
pub use faro_traits::{Date, DatedMatrix, Frame, Symbol};

/// Point-in-time as-of join.
pub mod join {
    pub use faro_join::*;
}

/// Feature engineering.
pub mod features {
    pub use faro_features::*;
}

/// Dataset encoding and classifiers.
pub mod model {
    pub use faro_model::*;
}

/// Walk-forward scoring and strategy simulation.
///
/// ## Weighting schemes
///
/// ```text
/// Softmax:  w_i = exp(p_i) / sum_j exp(p_j)
/// Best K:   w_i = 1/K for the K highest p_i, else 0
/// ```
pub mod eval {
    pub use faro_eval::*;
}

/// Financial Modeling Prep downloads.
///
/// ## Setup
///
/// 1. Get an API key at <https://financialmodelingprep.com/>
/// 2. Set the `FMP_API_KEY` environment variable or add it to `.env`
pub mod fetch {
    pub use faro_fetch::*;
}

/// Prelude module for convenient imports.
///
/// ```
/// use faro::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Classifier, FaroError, ProgressStore, Result, TrainedModel};
    pub use faro_eval::{StrategyConfig, WalkForward, WeightScheme, run_strategies};
    pub use faro_model::{DatasetEncoder, LogisticRegression, SplitSpec};
    pub use faro_traits::{Date, DatedMatrix, Symbol, parse_date};
}
