#![doc(issue_tracker_base_url = "https://github.com/factordynamics/faro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Dataset preparation and a baseline classifier for Faro.
//!
//! Feature rows are split into train / valid / test partitions by date,
//! encoded into dense matrices, and fed to any [`Classifier`]. The crate ships
//! an L2-regularized [`LogisticRegression`] as the reference implementation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use faro_features::{DEFAULT_TARGET, FeatureTable};
//! use faro_model::{DatasetEncoder, LogisticRegression, SplitSpec, evaluate};
//! use faro_traits::parse_date;
//!
//! let table = FeatureTable::read_csv(Path::new("data/data_clean.csv"))?;
//! let spec = SplitSpec {
//!     valid_cutoff: parse_date("2019-01-01")?,
//!     test_cutoff: parse_date("2020-01-01")?,
//!     features: table.default_features(),
//!     target: DEFAULT_TARGET.to_string(),
//! };
//! let (model, _, report) = evaluate(
//!     &LogisticRegression::default(),
//!     &DatasetEncoder::default(),
//!     &table.rows,
//!     &spec,
//! )?;
//! model.save(Path::new("data/model.json"))?;
//! # Ok::<(), faro_traits::FaroError>(())
//! ```
//!
//! [`Classifier`]: faro_traits::Classifier

pub mod dataset;
pub mod evaluate;
pub mod logistic;
pub mod metrics;

pub use dataset::{
    ColumnEncoder, DatasetEncoder, EncodedDataset, EncodedPartition, EncoderConfig, FitScalersOn,
    Partition, SplitSpec,
};
pub use evaluate::{ModelReport, PartitionScore, evaluate};
pub use logistic::{LogisticConfig, LogisticModel, LogisticRegression};
pub use metrics::{accuracy, roc_auc};
