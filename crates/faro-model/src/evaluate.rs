//! Single-shot evaluation: split, encode, fit once, score every partition.

use faro_features::FeatureRow;
use faro_traits::{Classifier, LabeledView, Result, TrainedModel};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    dataset::{DatasetEncoder, EncodedDataset, Partition, SplitSpec},
    metrics::roc_auc,
};

/// Scores of one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionScore {
    /// Which partition.
    pub partition: Partition,
    /// Rows in the partition.
    pub rows: usize,
    /// Rows with a known target.
    pub labeled: usize,
    /// ROC-AUC over labeled rows; `None` unless both classes are present.
    pub auc: Option<f64>,
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    /// Classifier name.
    pub classifier: String,
    /// Train, valid and test scores, in that order.
    pub scores: Vec<PartitionScore>,
    /// `(feature, importance)`, ascending by importance.
    pub importances: Vec<(String, f64)>,
}

impl ModelReport {
    /// Score of one partition.
    pub fn score(&self, partition: Partition) -> Option<&PartitionScore> {
        self.scores.iter().find(|s| s.partition == partition)
    }
}

/// Fit `classifier` on the training partition, using the validation
/// partition for early stopping, and report ROC-AUC on all three.
///
/// Returns the encoded dataset too, so callers can score rows again or
/// inspect the fitted encoders.
pub fn evaluate<C: Classifier>(
    classifier: &C,
    encoder: &DatasetEncoder,
    rows: &[FeatureRow],
    spec: &SplitSpec,
) -> Result<(C::Model, EncodedDataset, ModelReport)> {
    let data = encoder.encode(rows, spec)?;
    let (train_x, train_y) = data.train.labeled();
    let (valid_x, valid_y) = data.valid.labeled();

    let train = LabeledView::new(train_x.view(), train_y.view())?;
    let valid = LabeledView::new(valid_x.view(), valid_y.view())?;
    if !train.has_both_classes() {
        warn!(rows = train.len(), "Training partition has a single class");
    }
    let eval: Vec<LabeledView<'_>> = if valid.is_empty() { Vec::new() } else { vec![valid] };
    let model = classifier.fit(train, &eval)?;

    let mut scores = Vec::with_capacity(3);
    for partition in [Partition::Train, Partition::Valid, Partition::Test] {
        let part = data.partition(partition);
        let (x, y) = part.labeled();
        let auc = if x.nrows() == 0 {
            None
        } else {
            let proba = model.predict_proba(x.view())?.to_vec();
            let labels: Vec<bool> = y.iter().map(|&v| v > 0.5).collect();
            roc_auc(&labels, &proba)
        };
        info!(%partition, rows = part.len(), labeled = y.len(), auc = ?auc, "Scored partition");
        scores.push(PartitionScore {
            partition,
            rows: part.len(),
            labeled: y.len(),
            auc,
        });
    }

    let mut importances: Vec<(String, f64)> = data
        .encoders
        .iter()
        .map(|(name, _)| name.clone())
        .zip(model.feature_importances())
        .collect();
    importances.sort_by(|a, b| a.1.total_cmp(&b.1));

    let report = ModelReport {
        classifier: classifier.name().to_string(),
        scores,
        importances,
    };
    Ok((model, data, report))
}
