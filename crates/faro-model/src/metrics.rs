//! Classification metrics.

use faro_traits::stats::average_ranks;

/// Area under the ROC curve, via the Mann-Whitney rank statistic.
///
/// Tied scores share their average rank. Returns `None` unless both classes
/// are present or if the lengths differ.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&y| y).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    let ranks = average_ranks(scores);
    let rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, y)| **y)
        .map(|(r, _)| r)
        .sum();
    let (p, n) = (positives as f64, negatives as f64);
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Fraction of rows where `score > 0.5` agrees with the label.
pub fn accuracy(labels: &[bool], scores: &[f64]) -> Option<f64> {
    if labels.is_empty() || labels.len() != scores.len() {
        return None;
    }
    let hits = labels
        .iter()
        .zip(scores)
        .filter(|(y, s)| (**s > 0.5) == **y)
        .count();
    Some(hits as f64 / labels.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_roc_auc() {
        let labels = [false, false, true, true];
        assert_relative_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_relative_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
        assert_relative_eq!(roc_auc(&labels, &[0.1, 0.4, 0.35, 0.8]).unwrap(), 0.75);
        assert_relative_eq!(roc_auc(&labels, &[0.5; 4]).unwrap(), 0.5);
        assert!(roc_auc(&[true, true], &[0.1, 0.2]).is_none());
    }

    #[test]
    fn test_accuracy() {
        let acc = accuracy(&[true, false, true], &[0.9, 0.6, 0.4]).unwrap();
        assert_relative_eq!(acc, 1.0 / 3.0);
    }
}
