#![doc(issue_tracker_base_url = "https://github.com/factordynamics/faro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Backtesting for Faro.
//!
//! This crate covers everything after a model exists:
//! - Walk-forward scoring with a fresh classifier per cycle
//! - Softmax and top-K weighting of probability rows
//! - Equity curves with forward-filled weights, plus buy-and-hold benchmarks
//! - Performance summaries and the resumable `yields.csv` sweep
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use faro_eval::{StrategyConfig, WalkForward, run_strategies};
//! use faro_features::{DEFAULT_TARGET, FeatureTable};
//! use faro_model::LogisticRegression;
//! use faro_traits::{DatedMatrix, parse_date};
//!
//! let table = FeatureTable::read_csv(Path::new("data/data_clean.csv"))?;
//! let result = WalkForward::default().run(
//!     &LogisticRegression::default(),
//!     &table.rows,
//!     parse_date("2018-01-01")?,
//!     &table.default_features(),
//!     DEFAULT_TARGET,
//! )?;
//! let prices = DatedMatrix::read_csv(Path::new("data/sp500/prices_daily.csv"))?;
//! let report = run_strategies(&result.probas, &prices, &StrategyConfig::default())?;
//! # Ok::<(), faro_traits::FaroError>(())
//! ```

pub mod metrics;
pub mod portfolio;
pub mod report;
pub mod strategy;
pub mod walkforward;

pub use metrics::{MetricsConfig, PerformanceSummary, max_drawdown, sharpe_ratio};
pub use portfolio::{EquityCurve, benchmark_curve, curves_to_frame, daily_returns, simulate};
pub use report::{
    StrategyConfig, StrategyReport, YIELD_LOG_HEADER, YieldLog, mask_unpriced, run_strategies,
    sweep_top_k,
};
pub use strategy::{WeightScheme, softmax_weights, top_k_weights};
pub use walkforward::{
    Cycle, CycleOutcome, CycleState, SkipReason, StepSize, WalkForward, WalkForwardConfig,
    WalkForwardResult,
};
