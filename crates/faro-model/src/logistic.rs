//! L2-regularized logistic regression trained by full-batch gradient descent.

use std::path::Path;

use faro_traits::{Classifier, FaroError, LabeledView, Result, TrainedModel};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for [`LogisticRegression`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// Gradient step size.
    pub learning_rate: f64,

    /// L2 penalty on the weights (not the bias).
    pub l2: f64,

    /// Maximum number of gradient steps.
    pub max_epochs: usize,

    /// Stop after this many epochs without improving the evaluation loss.
    pub patience: usize,

    /// Minimum loss decrease that counts as an improvement.
    pub tolerance: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            l2: 1e-3,
            max_epochs: 200,
            patience: 20,
            tolerance: 1e-6,
        }
    }
}

/// Baseline binary classifier.
///
/// Early stopping watches the log-loss of the last evaluation set passed to
/// [`Classifier::fit`] and returns the best weights seen. Without an
/// evaluation set it watches the training loss.
///
/// # Examples
///
/// ```
/// use faro_model::{LogisticConfig, LogisticRegression};
/// use faro_traits::{Classifier, LabeledView, TrainedModel};
/// use ndarray::array;
///
/// let x = array![[-2.0], [-1.0], [1.0], [2.0]];
/// let y = array![0.0, 0.0, 1.0, 1.0];
/// let model = LogisticRegression::new(LogisticConfig::default())
///     .fit(LabeledView::new(x.view(), y.view())?, &[])?;
/// let p = model.predict_proba(x.view())?;
/// assert!(p[3] > p[0]);
/// # Ok::<(), faro_traits::FaroError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: LogisticConfig,
}

impl LogisticRegression {
    /// Creates a new classifier.
    pub const fn new(config: LogisticConfig) -> Self {
        Self { config }
    }

    /// The classifier configuration.
    #[must_use]
    pub const fn config(&self) -> &LogisticConfig {
        &self.config
    }
}

impl Classifier for LogisticRegression {
    type Model = LogisticModel;

    fn name(&self) -> &str {
        "logistic"
    }

    fn fit(&self, train: LabeledView<'_>, eval: &[LabeledView<'_>]) -> Result<LogisticModel> {
        if train.is_empty() {
            return Err(FaroError::InsufficientData(
                "Cannot fit on an empty training set".to_string(),
            ));
        }
        let n_features = train.features.ncols();
        if let Some(bad) = eval.iter().find(|e| e.features.ncols() != n_features) {
            return Err(FaroError::InvalidData(format!(
                "Evaluation set has {} features, training set has {n_features}",
                bad.features.ncols()
            )));
        }

        let (monitor_x, monitor_y) = match eval.last() {
            Some(e) => (e.features.reborrow(), e.labels.reborrow()),
            None => (train.features.reborrow(), train.labels.reborrow()),
        };
        let n = train.len() as f64;
        let mut model = LogisticModel {
            weights: Array1::zeros(n_features),
            bias: 0.0,
        };
        let mut best = model.clone();
        let mut best_loss = model.log_loss(monitor_x, monitor_y);
        let mut since_best = 0;
        let mut epochs = 0;

        for epoch in 0..self.config.max_epochs {
            epochs = epoch + 1;
            let p = model.scores(train.features);
            let residual = &p - &train.labels;
            let grad_w = train.features.t().dot(&residual) / n + &model.weights * self.config.l2;
            let grad_b = residual.sum() / n;
            model.weights.scaled_add(-self.config.learning_rate, &grad_w);
            model.bias -= self.config.learning_rate * grad_b;

            let loss = model.log_loss(monitor_x, monitor_y);
            if loss < best_loss - self.config.tolerance {
                best_loss = loss;
                best = model.clone();
                since_best = 0;
            } else {
                since_best += 1;
                if since_best >= self.config.patience {
                    debug!(epoch, loss = best_loss, "Early stopping");
                    break;
                }
            }
        }

        info!(
            rows = train.len(),
            features = n_features,
            epochs,
            loss = best_loss,
            "Fitted logistic model"
        );
        Ok(best)
    }
}

/// Fitted weights of a [`LogisticRegression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// Weight per feature column.
    pub weights: Array1<f64>,
    /// Intercept.
    pub bias: f64,
}

impl LogisticModel {
    fn scores(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
        (features.dot(&self.weights) + self.bias).mapv(sigmoid)
    }

    fn log_loss(&self, features: ArrayView2<'_, f64>, labels: ArrayView1<'_, f64>) -> f64 {
        if labels.is_empty() {
            return 0.0;
        }
        let eps = 1e-12;
        let p = self.scores(features);
        let total: f64 = p
            .iter()
            .zip(labels.iter())
            .map(|(&p, &y)| {
                let p = p.clamp(eps, 1.0 - eps);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum();
        total / labels.len() as f64
    }

    /// Write the model as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved model");
        Ok(())
    }

    /// Read a model written by [`LogisticModel::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl TrainedModel for LogisticModel {
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if features.ncols() != self.weights.len() {
            return Err(FaroError::Model(format!(
                "Expected {} features, got {}",
                self.weights.len(),
                features.ncols()
            )));
        }
        Ok(self.scores(features))
    }

    fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.weights.iter().map(|w| w.abs()).sum();
        if total <= 0.0 {
            return vec![0.0; self.weights.len()];
        }
        self.weights.iter().map(|w| w.abs() / total).collect()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_separable_data() {
        let x = array![[-2.0, 0.1], [-1.0, -0.1], [1.0, 0.2], [2.0, -0.2]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let train = LabeledView::new(x.view(), y.view()).unwrap();
        let model = LogisticRegression::default().fit(train, &[train]).unwrap();

        let p = model.predict_proba(x.view()).unwrap();
        assert!(p[0] < 0.5 && p[1] < 0.5);
        assert!(p[2] > 0.5 && p[3] > 0.5);

        let importances = model.feature_importances();
        assert_relative_eq!(importances.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(importances[0] > importances[1]);
    }

    fn fit_with_held_out(train: LabeledView<'_>) -> LogisticModel {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0];
        let held_out = LabeledView::new(x.view(), y.view()).unwrap();
        LogisticRegression::default().fit(train, &[held_out]).unwrap()
    }

    #[test]
    fn test_fit_monitors_set_with_shorter_borrow() {
        let x = array![[0.0, 0.0], [0.2, 0.1], [0.8, 0.9], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let train = LabeledView::new(x.view(), y.view()).unwrap();

        let model = fit_with_held_out(train);
        let without_eval = LogisticRegression::default().fit(train, &[]).unwrap();
        let p = model.predict_proba(x.view()).unwrap();
        assert!(p[0] < p[3]);
        assert_eq!(without_eval.weights.len(), 2);
    }

    #[test]
    fn test_empty_training_set() {
        let x = ndarray::Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        let err = LogisticRegression::default()
            .fit(LabeledView::new(x.view(), y.view()).unwrap(), &[])
            .unwrap_err();
        assert!(matches!(err, FaroError::InsufficientData(_)));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let model = LogisticModel {
            weights: array![1.0, 2.0],
            bias: 0.0,
        };
        let x = array![[1.0]];
        assert!(model.predict_proba(x.view()).is_err());
        assert_relative_eq!(model.predict_proba(array![[0.0, 0.0]].view()).unwrap()[0], 0.5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("faro-model-{}", std::process::id()));
        let path = dir.join("model.json");
        let model = LogisticModel {
            weights: array![0.5, -1.5],
            bias: 0.25,
        };
        model.save(&path).unwrap();
        assert_eq!(LogisticModel::load(&path).unwrap(), model);
        let _ = std::fs::remove_dir_all(dir);
    }
}
