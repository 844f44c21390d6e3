//! Statistical utility functions shared by the encoder and the evaluators.
//!
//! Inputs are nullable columns (`Option<f64>`): missing cells and non-finite
//! values never contribute to a statistic.

/// Minimum threshold for standard deviation to avoid division by zero.
/// Values below this threshold are treated as zero variance.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Location and scale fitted on one column.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScaleParams {
    /// Mean of the observed values.
    pub mean: f64,
    /// Standard deviation of the observed values; `1.0` when degenerate.
    pub std: f64,
}

impl Default for ScaleParams {
    fn default() -> Self {
        Self { mean: 0.0, std: 1.0 }
    }
}

impl ScaleParams {
    /// Fit mean and standard deviation with `ddof` delta degrees of freedom.
    ///
    /// An all-missing column fits `mean = 0`. A constant column, or one with
    /// too few observations for `ddof`, fits `std = 1` so that scaling leaves
    /// centred values unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use faro_traits::stats::ScaleParams;
    ///
    /// let params = ScaleParams::fit([Some(1.0), None, Some(3.0)], 0.0);
    /// assert_eq!(params.mean, 2.0);
    /// assert_eq!(params.std, 1.0);
    /// ```
    pub fn fit<I>(values: I, ddof: f64) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let observed: Vec<f64> = values
            .into_iter()
            .flatten()
            .filter(|x| x.is_finite())
            .collect();
        let Some(mean) = mean(&observed) else {
            return Self::default();
        };

        let n = observed.len() as f64;
        let std = if n - ddof > 0.0 {
            let ss: f64 = observed.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (n - ddof)).sqrt()
        } else {
            0.0
        };

        Self {
            mean,
            std: if std > MIN_STD_THRESHOLD { std } else { 1.0 },
        }
    }

    /// Z-score of `value`, filling a missing value with the fitted mean first.
    pub fn apply(&self, value: Option<f64>) -> f64 {
        let filled = value.filter(|x| x.is_finite()).unwrap_or(self.mean);
        (filled - self.mean) / self.std
    }
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (N-1 denominator), or `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Fraction of cells that are missing, in `[0, 1]`; zero for an empty column.
pub fn missing_rate(values: &[Option<f64>]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let missing = values.iter().filter(|v| v.is_none()).count();
    missing as f64 / values.len() as f64
}

/// Compute ranks for a slice of values, averaging ties.
///
/// Ranks are 1-based. NaN values receive NaN rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![f64::NAN; values.len()];
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i + 1;
        while j < indexed.len() && indexed[j].1 == indexed[i].1 {
            j += 1;
        }
        // Positions i..j share the average of ranks i+1..=j.
        let avg = (i + j + 1) as f64 / 2.0;
        for &(idx, _) in &indexed[i..j] {
            ranks[idx] = avg;
        }
        i = j;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_population_std() {
        let params = ScaleParams::fit([Some(1.0), Some(2.0), Some(3.0), Some(4.0)], 0.0);
        assert_relative_eq!(params.mean, 2.5);
        assert_relative_eq!(params.std, 1.25_f64.sqrt());
    }

    #[test]
    fn test_fit_ignores_missing_and_nan() {
        let params = ScaleParams::fit([Some(2.0), None, Some(f64::NAN), Some(4.0)], 1.0);
        assert_relative_eq!(params.mean, 3.0);
        assert_relative_eq!(params.std, 2.0_f64.sqrt());
    }

    #[test]
    fn test_fit_degenerate() {
        let constant = ScaleParams::fit([Some(5.0), Some(5.0)], 0.0);
        assert_eq!(constant, ScaleParams { mean: 5.0, std: 1.0 });

        let empty = ScaleParams::fit(std::iter::empty(), 0.0);
        assert_eq!(empty, ScaleParams::default());
    }

    #[test]
    fn test_apply_fills_missing_with_mean() {
        let params = ScaleParams { mean: 10.0, std: 2.0 };
        assert_relative_eq!(params.apply(Some(14.0)), 2.0);
        assert_relative_eq!(params.apply(None), 0.0);
    }

    #[test]
    fn test_missing_rate() {
        assert_relative_eq!(missing_rate(&[Some(1.0), None, None, Some(2.0)]), 0.5);
        assert_relative_eq!(missing_rate(&[]), 0.0);
    }

    #[test]
    fn test_sample_std() {
        assert!(sample_std(&[1.0]).is_none());
        assert_relative_eq!(sample_std(&[1.0, 3.0]).unwrap(), 2.0_f64.sqrt());
    }

    #[test]
    fn test_average_ranks_with_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 20.0, 5.0, f64::NAN]);
        assert_relative_eq!(ranks[0], 2.0);
        assert_relative_eq!(ranks[1], 3.5);
        assert_relative_eq!(ranks[2], 3.5);
        assert_relative_eq!(ranks[3], 1.0);
        assert!(ranks[4].is_nan());
    }
}
