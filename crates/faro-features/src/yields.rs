//! Annualized continuous yields.

use faro_traits::Date;

/// Days in the 52-week year used for annualization.
pub const YEAR_DAYS: f64 = 364.0;

/// Continuous yield from `(start_date, start)` to `(end_date, end)`,
/// annualized over 52-week years.
///
/// `ln(end / start) / (days / 364)`. Missing when either price is missing or
/// non-positive, or when both dates coincide.
///
/// # Examples
///
/// ```
/// use faro_features::yields::annualized_log_yield;
/// use faro_traits::Date;
///
/// let start = Date::from_ymd_opt(2020, 1, 1).unwrap();
/// let end = start + chrono::Duration::days(364);
/// let y = annualized_log_yield(Some(100.0), Some(start), Some(110.0), Some(end)).unwrap();
/// assert!((y - 1.1_f64.ln()).abs() < 1e-12);
/// ```
pub fn annualized_log_yield(
    start: Option<f64>,
    start_date: Option<Date>,
    end: Option<f64>,
    end_date: Option<Date>,
) -> Option<f64> {
    let (start, end) = (start?, end?);
    if start <= 0.0 || end <= 0.0 {
        return None;
    }
    let days = (end_date? - start_date?).num_days();
    if days == 0 {
        return None;
    }
    let years = days as f64 / YEAR_DAYS;
    Some((end / start).ln() / years).filter(|y| y.is_finite())
}

/// `a > b` when both are known.
pub fn greater(a: Option<f64>, b: Option<f64>) -> Option<bool> {
    Some(a? > b?)
}

/// `a / b` when both are known and `b` is strictly positive.
pub fn ratio(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let b = b.filter(|b| *b > 0.0)?;
    Some(a? / b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_half_year_doubles_rate() {
        let start = d(2020, 1, 1);
        let end = start + chrono::Duration::days(182);
        let y = annualized_log_yield(Some(100.0), Some(start), Some(110.0), Some(end)).unwrap();
        assert_relative_eq!(y, 2.0 * 1.1_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_inputs_are_missing() {
        let a = d(2020, 1, 1);
        let b = d(2021, 1, 1);
        assert!(annualized_log_yield(Some(0.0), Some(a), Some(1.0), Some(b)).is_none());
        assert!(annualized_log_yield(Some(1.0), Some(a), Some(-1.0), Some(b)).is_none());
        assert!(annualized_log_yield(Some(1.0), Some(a), Some(2.0), Some(a)).is_none());
        assert!(annualized_log_yield(None, Some(a), Some(2.0), Some(b)).is_none());
        assert!(annualized_log_yield(Some(1.0), None, Some(2.0), Some(b)).is_none());
    }

    #[test]
    fn test_ratio_and_greater() {
        assert_eq!(ratio(Some(1.0), Some(4.0)), Some(0.25));
        assert_eq!(ratio(Some(1.0), Some(0.0)), None);
        assert_eq!(greater(Some(0.1), Some(0.0)), Some(true));
        assert_eq!(greater(None, Some(0.0)), None);
    }
}
