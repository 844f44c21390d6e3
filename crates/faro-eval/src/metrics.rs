//! Performance metrics of an equity curve.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::portfolio::EquityCurve;

/// Configuration for metrics calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Number of trading days per year for annualization
    pub trading_days_per_year: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            trading_days_per_year: 252,
        }
    }
}

/// Summary statistics of one curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Strategy name.
    pub name: String,
    /// Last curve value.
    pub final_value: f64,
    /// `final_value - 1`.
    pub total_return: f64,
    /// Geometric annual return.
    pub annualized_return: f64,
    /// Annualized standard deviation of period returns.
    pub annualized_volatility: f64,
    /// Annualized Sharpe ratio with a zero risk-free rate.
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough loss, as a positive fraction.
    pub max_drawdown: f64,
    /// Number of period returns.
    pub periods: usize,
}

impl PerformanceSummary {
    /// Summarize a curve. Statistics that need more points are NaN.
    pub fn from_curve(curve: &EquityCurve, config: &MetricsConfig) -> Self {
        let returns = curve.returns();
        let final_value = curve.final_value().unwrap_or(1.0);
        let days = config.trading_days_per_year as f64;

        let annualized_return = if returns.is_empty() || final_value <= 0.0 {
            f64::NAN
        } else {
            final_value.powf(days / returns.len() as f64) - 1.0
        };
        let annualized_volatility = if returns.len() < 2 {
            f64::NAN
        } else {
            Array1::from_vec(returns.clone()).std(1.0) * days.sqrt()
        };

        Self {
            name: curve.name.clone(),
            final_value,
            total_return: final_value - 1.0,
            annualized_return,
            annualized_volatility,
            sharpe_ratio: sharpe_ratio(&returns, config.trading_days_per_year),
            max_drawdown: max_drawdown(&curve.values),
            periods: returns.len(),
        }
    }
}

/// Annualized Sharpe ratio of period returns.
pub fn sharpe_ratio(returns: &[f64], trading_days_per_year: usize) -> f64 {
    let valid: Array1<f64> = returns.iter().copied().filter(|x| x.is_finite()).collect();
    if valid.len() < 2 {
        return f64::NAN;
    }
    let std = valid.std(1.0);
    match valid.mean() {
        Some(mean) if std > 0.0 => mean / std * (trading_days_per_year as f64).sqrt(),
        _ => f64::NAN,
    }
}

/// Maximum drawdown of a value series.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut max_dd = 0.0;
    let mut peak = f64::NEG_INFINITY;
    for &value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = f64::max(max_dd, (peak - value) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faro_traits::Date;

    fn curve(values: &[f64]) -> EquityCurve {
        let start = Date::from_ymd_opt(2021, 1, 1).unwrap();
        EquityCurve {
            name: "test".into(),
            dates: (0..values.len() as i64)
                .map(|i| start + chrono::Duration::days(i))
                .collect(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_calculate_sharpe() {
        let returns = vec![0.01, -0.005, 0.015, 0.002, -0.003];
        let sharpe = sharpe_ratio(&returns, 252);
        assert!(sharpe.is_finite());
        assert!(sharpe_ratio(&[0.01, 0.01], 252).is_nan());
    }

    #[test]
    fn test_calculate_max_drawdown() {
        assert_relative_eq!(max_drawdown(&[1.0, 1.2, 0.9, 1.1, 1.5]), 0.25);
        assert_relative_eq!(max_drawdown(&[1.0, 1.1, 1.2]), 0.0);
    }

    #[test]
    fn test_summary() {
        let summary = PerformanceSummary::from_curve(&curve(&[1.0, 1.1, 0.99, 1.21]), &MetricsConfig::default());
        assert_relative_eq!(summary.final_value, 1.21);
        assert_relative_eq!(summary.total_return, 0.21, epsilon = 1e-12);
        assert_relative_eq!(summary.max_drawdown, 0.1, epsilon = 1e-12);
        assert_eq!(summary.periods, 3);
        assert_relative_eq!(summary.annualized_return, 1.21_f64.powf(84.0) - 1.0, max_relative = 1e-9);
        assert!(summary.annualized_volatility > 0.0);
    }

    #[test]
    fn test_summary_of_single_point() {
        let summary = PerformanceSummary::from_curve(&curve(&[1.0]), &MetricsConfig::default());
        assert_relative_eq!(summary.total_return, 0.0);
        assert!(summary.annualized_return.is_nan());
        assert!(summary.sharpe_ratio.is_nan());
    }
}
