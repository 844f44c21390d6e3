//! Binary classifier contract.
//!
//! The pipeline treats the classifier as an opaque capability: anything that
//! can be fit on a labelled feature matrix and then emit probabilities of the
//! positive class can drive single-shot evaluation and the walk-forward loop.

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{FaroError, Result};

/// A feature matrix paired with its 0/1 labels.
#[derive(Debug, Clone, Copy)]
pub struct LabeledView<'a> {
    /// Row-major features, one row per sample.
    pub features: ArrayView2<'a, f64>,
    /// Labels, `1.0` for the positive class and `0.0` otherwise.
    pub labels: ArrayView1<'a, f64>,
}

impl<'a> LabeledView<'a> {
    /// Pair features with labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the row counts differ.
    pub fn new(features: ArrayView2<'a, f64>, labels: ArrayView1<'a, f64>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(FaroError::InvalidData(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the view has no samples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Whether both classes are present.
    pub fn has_both_classes(&self) -> bool {
        let positives = self.labels.iter().filter(|&&y| y > 0.5).count();
        positives > 0 && positives < self.labels.len()
    }
}

/// A trainable binary classifier.
///
/// Implementations hold hyper-parameters only. Every call to [`fit`] starts
/// from scratch, so one instance can be shared across walk-forward cycles
/// without carrying state between them.
///
/// # Example
///
/// ```no_run
/// use faro_traits::{Classifier, LabeledView, Result, TrainedModel};
/// use ndarray::{Array1, ArrayView2};
///
/// struct BaseRate;
/// struct Constant(f64);
///
/// impl TrainedModel for Constant {
///     fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
///         Ok(Array1::from_elem(features.nrows(), self.0))
///     }
///
///     fn feature_importances(&self) -> Vec<f64> {
///         Vec::new()
///     }
/// }
///
/// impl Classifier for BaseRate {
///     type Model = Constant;
///
///     fn name(&self) -> &str {
///         "base_rate"
///     }
///
///     fn fit(&self, train: LabeledView<'_>, _eval: &[LabeledView<'_>]) -> Result<Constant> {
///         Ok(Constant(train.labels.mean().unwrap_or(0.5)))
///     }
/// }
/// ```
///
/// [`fit`]: Classifier::fit
pub trait Classifier: Send + Sync {
    /// The fitted model produced by [`Classifier::fit`].
    type Model: TrainedModel;

    /// Returns the name of this classifier.
    fn name(&self) -> &str;

    /// Fit a fresh model on `train`.
    ///
    /// `eval` sets are used for monitoring and early stopping only; they never
    /// contribute gradient updates.
    ///
    /// # Errors
    ///
    /// Returns an error if the training set is empty or malformed.
    fn fit(&self, train: LabeledView<'_>, eval: &[LabeledView<'_>]) -> Result<Self::Model>;
}

/// A fitted classifier.
pub trait TrainedModel: Send + Sync {
    /// Probability of the positive class for every row of `features`.
    ///
    /// # Errors
    ///
    /// Returns an error if the feature width does not match the training data.
    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Relative importance of each feature, aligned with the training columns.
    fn feature_importances(&self) -> Vec<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn test_labeled_view_rejects_mismatch() {
        let x = Array2::<f64>::zeros((3, 2));
        let y = array![1.0, 0.0];
        assert!(LabeledView::new(x.view(), y.view()).is_err());
    }

    #[test]
    fn test_has_both_classes() {
        let x = Array2::<f64>::zeros((3, 1));
        let mixed = array![1.0, 0.0, 1.0];
        let single = array![1.0, 1.0, 1.0];
        assert!(LabeledView::new(x.view(), mixed.view()).unwrap().has_both_classes());
        assert!(!LabeledView::new(x.view(), single.view()).unwrap().has_both_classes());
    }
}
