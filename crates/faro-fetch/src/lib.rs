#![doc(issue_tracker_base_url = "https://github.com/factordynamics/faro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, deny(unsafe_code))]

//! Raw data acquisition for Faro.
//!
//! Downloads adjusted prices, dividends, annual statements and share counts
//! from the [Financial Modeling Prep](https://financialmodelingprep.com/) API,
//! one entity at a time. Every completed entity is checkpointed so an
//! interrupted run resumes where it stopped; [`assemble`] then writes the raw
//! CSV tables the join stage reads.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeSet;
//! use faro_fetch::{FetchConfig, FmpClient, UniverseFetcher, assemble};
//! use faro_join::UniverseLayout;
//! use faro_traits::FileProgressStore;
//!
//! # async fn run() -> Result<(), faro_traits::FaroError> {
//! let layout = UniverseLayout::new("data/sp500");
//! let fetcher = UniverseFetcher::new(FmpClient::from_env()?, FetchConfig::default());
//! let mut progress = FileProgressStore::open(layout.progress())?;
//! let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
//! let report = fetcher
//!     .fetch_universe(&layout, &symbols, &mut BTreeSet::new(), &mut progress)
//!     .await?;
//! assemble(&layout, &report.available())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! Set `FMP_API_KEY` in your environment or `.env` file:
//!
//! ```bash
//! FMP_API_KEY=your_api_key_here
//! ```

mod client;
mod error;
mod fetcher;
mod types;

pub use client::{FmpClient, SnapshotSource, retry_once};
pub use error::FetchError;
pub use fetcher::{FetchConfig, FetchReport, UniverseFetcher, assemble, load_snapshots};
pub use types::*;

/// Result type for FMP operations.
pub type Result<T> = std::result::Result<T, FetchError>;
