//! Turning probability rows into portfolio weights.

use derive_more::Display;
use faro_traits::{DatedMatrix, Result};
use serde::{Deserialize, Serialize};

/// A rule mapping one row of probabilities to weights.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightScheme {
    /// Softmax over the probabilities.
    #[display("Softmax")]
    Softmax,
    /// Equal weight on the `k` most probable entities.
    #[display("Best {_0}")]
    TopK(usize),
}

impl WeightScheme {
    /// Weights for one row. Missing entries get zero weight.
    pub fn weights(&self, row: &[Option<f64>]) -> Vec<f64> {
        match *self {
            Self::Softmax => softmax_weights(row),
            Self::TopK(k) => top_k_weights(row, k),
        }
    }

    /// Weight matrix with the same shape as `probas`.
    ///
    /// A row without any probability is left entirely missing so that the
    /// previous allocation stays in force.
    pub fn weight_matrix(&self, probas: &DatedMatrix) -> Result<DatedMatrix> {
        let cells: Vec<Vec<Option<f64>>> = probas
            .rows()
            .map(|(_, row)| {
                if row.iter().all(Option::is_none) {
                    vec![None; row.len()]
                } else {
                    self.weights(row).into_iter().map(Some).collect()
                }
            })
            .collect();
        DatedMatrix::from_parts(probas.dates().to_vec(), probas.symbols().to_vec(), cells)
    }
}

/// `exp(p_i - max) / sum_j exp(p_j - max)` over the known entries.
///
/// # Examples
///
/// ```
/// use faro_eval::softmax_weights;
///
/// let w = softmax_weights(&[Some(0.2), None, Some(0.2)]);
/// assert_eq!(w, vec![0.5, 0.0, 0.5]);
/// ```
pub fn softmax_weights(row: &[Option<f64>]) -> Vec<f64> {
    let known = || row.iter().flatten().filter(|p| p.is_finite());
    let Some(max) = known().copied().reduce(f64::max) else {
        return vec![0.0; row.len()];
    };
    let total: f64 = known().map(|p| (p - max).exp()).sum();
    row.iter()
        .map(|p| match p {
            Some(p) if p.is_finite() => (p - max).exp() / total,
            _ => 0.0,
        })
        .collect()
}

/// `1 / min(k, n)` on the `k` highest of the `n` known entries, zero
/// elsewhere. Ties keep column order.
pub fn top_k_weights(row: &[Option<f64>], k: usize) -> Vec<f64> {
    let mut known: Vec<(usize, f64)> = row
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.filter(|p| p.is_finite()).map(|p| (i, p)))
        .collect();
    let mut weights = vec![0.0; row.len()];
    let held = k.min(known.len());
    if held == 0 {
        return weights;
    }
    known.sort_by(|a, b| b.1.total_cmp(&a.1));
    for &(i, _) in &known[..held] {
        weights[i] = 1.0 / held as f64;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faro_traits::Date;

    #[test]
    fn test_softmax_sums_to_one() {
        let row = [Some(0.9), None, Some(0.1), Some(0.55), Some(0.3)];
        let w = softmax_weights(&row);
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(w[1], 0.0);
        assert!(w[0] > w[3] && w[3] > w[4] && w[4] > w[2]);
    }

    #[test]
    fn test_softmax_all_missing() {
        assert_eq!(softmax_weights(&[None, None]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_top_three_of_five() {
        let row = [Some(0.4), Some(0.9), Some(0.1), Some(0.7), Some(0.5)];
        let w = top_k_weights(&row, 3);
        let third = 1.0 / 3.0;
        assert_eq!(w, vec![0.0, third, 0.0, third, third]);
    }

    #[test]
    fn test_top_k_larger_than_row() {
        let w = top_k_weights(&[Some(0.4), None, Some(0.9)], 100);
        assert_eq!(w, vec![0.5, 0.0, 0.5]);
        assert_eq!(WeightScheme::TopK(100).to_string(), "Best 100");
    }

    #[test]
    fn test_weight_matrix_keeps_empty_rows_missing() {
        let d = |m| Date::from_ymd_opt(2020, m, 1).unwrap();
        let probas = DatedMatrix::from_parts(
            vec![d(1), d(2)],
            vec!["A".into(), "B".into()],
            vec![vec![Some(0.8), Some(0.2)], vec![None, None]],
        )
        .unwrap();
        let weights = WeightScheme::TopK(1).weight_matrix(&probas).unwrap();
        assert_eq!(weights.row(0), &[Some(1.0), Some(0.0)]);
        assert_eq!(weights.row(1), &[None, None]);
    }
}
