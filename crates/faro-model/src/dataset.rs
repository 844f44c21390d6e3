//! Date-based dataset splitting and feature encoding.
//!
//! Rows are partitioned by date only, never by entity, so a model is never
//! trained on a later period of a company it is evaluated on:
//!
//! ```text
//! train: date < valid_cutoff <= valid < test_cutoff <= test
//! ```
//!
//! Each requested feature is then encoded into one numeric column. Text
//! columns become codes into a sorted vocabulary and low-cardinality numeric
//! columns become the rank of their value. Other numeric columns are
//! mean-imputed and z-scored.

use std::collections::BTreeSet;

use derive_more::Display;
use faro_features::{Cell, FeatureRow};
use faro_traits::{Date, FaroError, Result, stats::ScaleParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker of a forward-looking column name.
pub const LOOK_AHEAD_MARKER: &str = "_next";

/// Partition of a row.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Dated before the validation cutoff.
    #[display("train")]
    Train,
    /// Dated from the validation cutoff up to the test cutoff.
    #[display("valid")]
    Valid,
    /// Dated from the test cutoff on.
    #[display("test")]
    Test,
}

impl Partition {
    /// Partition of a row dated `date`.
    pub fn of(date: Date, valid_cutoff: Date, test_cutoff: Date) -> Self {
        if date < valid_cutoff {
            Self::Train
        } else if date < test_cutoff {
            Self::Valid
        } else {
            Self::Test
        }
    }
}

/// Which rows location and scale are fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitScalersOn {
    /// Training rows only.
    #[default]
    TrainOnly,
    /// Every row of every partition. Leaks later statistics into earlier
    /// rows; kept for comparison with older results.
    AllPartitions,
}

/// Configuration for [`DatasetEncoder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Numeric columns with fewer distinct values are categorical
    /// (default: 200).
    pub categorical_threshold: usize,

    /// Rows used to fit imputation means and scalers.
    pub fit_scalers_on: FitScalersOn,

    /// Category assigned to missing cells (default: `"Unknown"`).
    pub missing_category: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            categorical_threshold: 200,
            fit_scalers_on: FitScalersOn::TrainOnly,
            missing_category: "Unknown".to_string(),
        }
    }
}

/// What to split and encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSpec {
    /// First date of the validation partition.
    pub valid_cutoff: Date,
    /// First date of the test partition.
    pub test_cutoff: Date,
    /// Feature columns, in matrix order.
    pub features: Vec<String>,
    /// Binary target column.
    pub target: String,
}

impl SplitSpec {
    /// Check cutoff order and reject forward-looking features.
    pub fn validate(&self) -> Result<()> {
        if self.valid_cutoff > self.test_cutoff {
            return Err(FaroError::InvalidDate(format!(
                "valid cutoff {} is after test cutoff {}",
                self.valid_cutoff, self.test_cutoff
            )));
        }
        if self.features.is_empty() {
            return Err(FaroError::InvalidData("No features requested".to_string()));
        }
        if let Some(f) = self
            .features
            .iter()
            .find(|f| f.contains(LOOK_AHEAD_MARKER) || **f == self.target)
        {
            return Err(FaroError::LookAhead(f.clone()));
        }
        Ok(())
    }
}

/// How one feature column is turned into numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnEncoder {
    /// Index into a sorted vocabulary.
    Categorical {
        /// Sorted category labels, including the missing sentinel if seen.
        vocabulary: Vec<String>,
    },
    /// Rank among the distinct values of a low-cardinality numeric column.
    /// Missing and unseen values take the code after the largest level.
    Levels {
        /// Distinct values in ascending order.
        values: Vec<f64>,
    },
    /// Mean imputation then z-score.
    Continuous(ScaleParams),
}

impl ColumnEncoder {
    fn encode(&self, cell: Cell<'_>, missing: &str) -> f64 {
        match self {
            Self::Categorical { vocabulary } => {
                let key = category_key(cell, missing);
                vocabulary
                    .binary_search(&key)
                    .map_or(vocabulary.len() as f64, |i| i as f64)
            }
            Self::Levels { values } => match cell {
                Cell::Number(x) => values
                    .binary_search_by(|v| v.total_cmp(&x))
                    .map_or(values.len() as f64, |i| i as f64),
                _ => values.len() as f64,
            },
            Self::Continuous(params) => params.apply(match cell {
                Cell::Number(x) => Some(x),
                _ => None,
            }),
        }
    }

    /// Whether the column is categorical.
    pub const fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical { .. } | Self::Levels { .. })
    }
}

fn category_key(cell: Cell<'_>, missing: &str) -> String {
    match cell {
        Cell::Number(x) => x.to_string(),
        Cell::Text(s) => s.to_string(),
        Cell::Flag(b) => b.to_string(),
        Cell::Missing => missing.to_string(),
    }
}

/// One partition's matrix.
#[derive(Debug, Clone)]
pub struct EncodedPartition {
    /// Encoded features, one row per input row of this partition.
    pub features: Array2<f64>,
    /// Target per row; `None` where the target is missing.
    pub labels: Vec<Option<bool>>,
    /// Index of each row in the encoder input.
    pub rows: Vec<usize>,
}

impl EncodedPartition {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the partition has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with a known target, as a feature matrix and 0/1 labels.
    pub fn labeled(&self) -> (Array2<f64>, Array1<f64>) {
        let keep: Vec<usize> = (0..self.labels.len())
            .filter(|&i| self.labels[i].is_some())
            .collect();
        let features = self.features.select(ndarray::Axis(0), &keep);
        let labels = keep
            .iter()
            .map(|&i| if self.labels[i] == Some(true) { 1.0 } else { 0.0 })
            .collect();
        (features, labels)
    }
}

/// The result of [`DatasetEncoder::encode`].
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    /// Partition of every input row, in input order.
    pub partitions: Vec<Partition>,
    /// Training partition.
    pub train: EncodedPartition,
    /// Validation partition.
    pub valid: EncodedPartition,
    /// Test partition.
    pub test: EncodedPartition,
    /// Fitted encoder per feature, in matrix column order.
    pub encoders: Vec<(String, ColumnEncoder)>,
}

impl EncodedDataset {
    /// The partition with the given tag.
    pub const fn partition(&self, partition: Partition) -> &EncodedPartition {
        match partition {
            Partition::Train => &self.train,
            Partition::Valid => &self.valid,
            Partition::Test => &self.test,
        }
    }
}

/// Splits feature rows by date and encodes them.
#[derive(Debug, Clone, Default)]
pub struct DatasetEncoder {
    config: EncoderConfig,
}

impl DatasetEncoder {
    /// Creates a new encoder.
    pub const fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// The encoder configuration.
    #[must_use]
    pub const fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Partition, fit and encode.
    ///
    /// Category vocabularies are built from every row passed in. Means and
    /// scales come from the rows selected by
    /// [`EncoderConfig::fit_scalers_on`]; with `TrainOnly` and an empty
    /// training partition they fall back to every row.
    ///
    /// # Errors
    ///
    /// Returns [`FaroError::LookAhead`] if a feature is forward-looking or is
    /// the target, and [`FaroError::InvalidDate`] if the cutoffs are out of
    /// order.
    pub fn encode(&self, rows: &[FeatureRow], spec: &SplitSpec) -> Result<EncodedDataset> {
        spec.validate()?;

        let partitions: Vec<Partition> = rows
            .iter()
            .map(|r| Partition::of(r.date, spec.valid_cutoff, spec.test_cutoff))
            .collect();
        let has_train = partitions.contains(&Partition::Train);
        let fit_rows: Vec<&FeatureRow> = rows
            .iter()
            .zip(&partitions)
            .filter(|(_, p)| {
                self.config.fit_scalers_on == FitScalersOn::AllPartitions
                    || !has_train
                    || **p == Partition::Train
            })
            .map(|(r, _)| r)
            .collect();

        let encoders: Vec<(String, ColumnEncoder)> = spec
            .features
            .iter()
            .map(|f| (f.clone(), self.fit_column(rows, &fit_rows, f)))
            .collect();

        let categorical = encoders.iter().filter(|(_, e)| e.is_categorical()).count();
        debug!(
            rows = rows.len(),
            features = encoders.len(),
            categorical,
            "Fitted column encoders"
        );

        let build = |partition: Partition| {
            let idx: Vec<usize> = (0..rows.len())
                .filter(|&i| partitions[i] == partition)
                .collect();
            let mut features = Array2::zeros((idx.len(), encoders.len()));
            for (out, &i) in idx.iter().enumerate() {
                for (j, (name, encoder)) in encoders.iter().enumerate() {
                    features[[out, j]] =
                        encoder.encode(rows[i].value(name), &self.config.missing_category);
                }
            }
            EncodedPartition {
                features,
                labels: idx.iter().map(|&i| rows[i].label(&spec.target)).collect(),
                rows: idx,
            }
        };

        Ok(EncodedDataset {
            train: build(Partition::Train),
            valid: build(Partition::Valid),
            test: build(Partition::Test),
            partitions,
            encoders,
        })
    }

    fn fit_column(&self, rows: &[FeatureRow], fit_rows: &[&FeatureRow], name: &str) -> ColumnEncoder {
        let mut labels: BTreeSet<String> = BTreeSet::new();
        let mut numbers: Vec<f64> = Vec::new();
        let mut numeric = true;
        let mut any_missing = false;
        for row in rows {
            let cell = row.value(name);
            match cell {
                Cell::Number(x) => numbers.push(x),
                Cell::Text(_) | Cell::Flag(_) => numeric = false,
                Cell::Missing => any_missing = true,
            }
            if cell != Cell::Missing {
                labels.insert(category_key(cell, &self.config.missing_category));
            }
        }

        if !numeric {
            let mut vocabulary = labels;
            if any_missing {
                vocabulary.insert(self.config.missing_category.clone());
            }
            return ColumnEncoder::Categorical {
                vocabulary: vocabulary.into_iter().collect(),
            };
        }

        numbers.sort_by(f64::total_cmp);
        numbers.dedup_by(|a, b| a.total_cmp(b).is_eq());
        if numbers.len() < self.config.categorical_threshold {
            return ColumnEncoder::Levels { values: numbers };
        }

        let values = fit_rows.iter().map(|r| match r.value(name) {
            Cell::Number(x) => Some(x),
            _ => None,
        });
        ColumnEncoder::Continuous(ScaleParams::fit(values, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: Date, x: Option<f64>, sector: Option<&str>, label: Option<bool>) -> FeatureRow {
        FeatureRow {
            date,
            symbol: "AAA".into(),
            sector: sector.map(String::from),
            variables: BTreeMap::from([("x".to_string(), x)]),
            outperform_next: label,
            ..FeatureRow::default()
        }
    }

    fn spec(threshold_features: &[&str]) -> SplitSpec {
        SplitSpec {
            valid_cutoff: d(2020, 1, 1),
            test_cutoff: d(2021, 1, 1),
            features: threshold_features.iter().map(|s| s.to_string()).collect(),
            target: "outperform_next".into(),
        }
    }

    #[test]
    fn test_partition_boundaries() {
        let (v, t) = (d(2020, 1, 1), d(2021, 1, 1));
        assert_eq!(Partition::of(d(2019, 12, 31), v, t), Partition::Train);
        assert_eq!(Partition::of(v, v, t), Partition::Valid);
        assert_eq!(Partition::of(d(2020, 12, 31), v, t), Partition::Valid);
        assert_eq!(Partition::of(t, v, t), Partition::Test);
        assert_eq!(Partition::Valid.to_string(), "valid");
    }

    #[test]
    fn test_rejects_forward_looking_feature() {
        let err = spec(&["x", "yield_next"]).validate().unwrap_err();
        assert!(matches!(err, FaroError::LookAhead(ref f) if f == "yield_next"));

        let mut bad = spec(&["x"]);
        bad.valid_cutoff = d(2022, 1, 1);
        assert!(matches!(bad.validate(), Err(FaroError::InvalidDate(_))));
    }

    #[test]
    fn test_categorical_encoding_with_sentinel() {
        let rows = vec![
            row(d(2019, 1, 1), Some(1.0), Some("Energy"), Some(true)),
            row(d(2019, 6, 1), Some(2.0), None, Some(false)),
            row(d(2020, 6, 1), Some(3.0), Some("Banks"), None),
        ];
        let data = DatasetEncoder::default().encode(&rows, &spec(&["sector"])).unwrap();

        let (_, encoder) = &data.encoders[0];
        assert_eq!(
            encoder,
            &ColumnEncoder::Categorical {
                vocabulary: vec!["Banks".into(), "Energy".into(), "Unknown".into()]
            }
        );
        assert_eq!(data.train.features[[0, 0]], 1.0);
        assert_eq!(data.train.features[[1, 0]], 2.0);
        assert_eq!(data.valid.features[[0, 0]], 0.0);
        assert_eq!(data.valid.labels, vec![None]);
    }

    #[test]
    fn test_low_cardinality_numbers_keep_their_order() {
        let mut rows: Vec<FeatureRow> = (1..=12)
            .map(|x| row(d(2019, 1, x), Some(f64::from(x)), None, Some(x > 6)))
            .collect();
        rows.push(row(d(2019, 2, 1), None, None, Some(false)));
        let data = DatasetEncoder::default().encode(&rows, &spec(&["x"])).unwrap();

        let (_, encoder) = &data.encoders[0];
        assert!(encoder.is_categorical());
        let codes: Vec<f64> = data.train.features.column(0).to_vec();
        assert!(codes[..12].windows(2).all(|w| w[0] < w[1]));
        assert_eq!(codes[0], 0.0);
        assert_eq!(codes[11], 11.0);
        assert_eq!(codes[12], 12.0);
    }

    #[test]
    fn test_continuous_scaled_on_train_only() {
        let rows = vec![
            row(d(2019, 1, 1), Some(1.0), None, Some(true)),
            row(d(2019, 2, 1), Some(3.0), None, Some(false)),
            row(d(2019, 3, 1), None, None, Some(false)),
            row(d(2020, 6, 1), Some(101.0), None, Some(true)),
        ];
        let encoder = DatasetEncoder::new(EncoderConfig {
            categorical_threshold: 2,
            ..EncoderConfig::default()
        });
        let data = encoder.encode(&rows, &spec(&["x"])).unwrap();

        let (_, ColumnEncoder::Continuous(params)) = &data.encoders[0] else {
            panic!("expected continuous encoder");
        };
        assert_relative_eq!(params.mean, 2.0);
        assert_relative_eq!(params.std, 1.0);
        assert_relative_eq!(data.train.features[[0, 0]], -1.0);
        assert_relative_eq!(data.train.features[[2, 0]], 0.0);
        assert_relative_eq!(data.valid.features[[0, 0]], 99.0);

        let all = DatasetEncoder::new(EncoderConfig {
            categorical_threshold: 2,
            fit_scalers_on: FitScalersOn::AllPartitions,
            ..EncoderConfig::default()
        })
        .encode(&rows, &spec(&["x"]))
        .unwrap();
        let (_, ColumnEncoder::Continuous(params)) = &all.encoders[0] else {
            panic!("expected continuous encoder");
        };
        assert_relative_eq!(params.mean, 35.0);
    }

    #[test]
    fn test_labeled_skips_missing_targets() {
        let rows = vec![
            row(d(2019, 1, 1), Some(1.0), None, Some(true)),
            row(d(2019, 2, 1), Some(2.0), None, None),
            row(d(2019, 3, 1), Some(3.0), None, Some(false)),
        ];
        let data = DatasetEncoder::default().encode(&rows, &spec(&["x"])).unwrap();
        let (x, y) = data.train.labeled();
        assert_eq!(x.nrows(), 2);
        assert_eq!(y.to_vec(), vec![1.0, 0.0]);
        assert_eq!(data.train.len(), 3);
    }
}
