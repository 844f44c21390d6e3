//! Per-entity time series and the as-of lookup primitives.
//!
//! Every auxiliary input of the join (prices, dividends, share counts, the
//! reference index) is a set of `(date, value)` series keyed by symbol. Each
//! series is sorted with strictly increasing dates, so every lookup is a
//! binary search.

use std::collections::BTreeMap;

use faro_traits::{Date, DatedMatrix, Symbol, shift_years};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A dated value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation<V = f64> {
    /// Timestamp of the observation.
    pub date: Date,
    /// Observed value.
    pub value: V,
}

/// A duplicate `(entity, date)` found while indexing a series.
///
/// The last-seen value is kept; the conflict is reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConflict {
    /// Name of the series, e.g. `"price"`.
    pub metric: String,
    /// Entity whose series held the duplicate.
    pub entity: Symbol,
    /// Duplicated timestamp.
    pub date: Date,
}

/// A single entity's observations, sorted by strictly increasing date.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<V = f64> {
    points: Vec<Observation<V>>,
}

impl<V> Default for TimeSeries<V> {
    fn default() -> Self {
        Self { points: Vec::new() }
    }
}

impl<V> TimeSeries<V> {
    /// Index unordered points.
    ///
    /// Points are sorted by date; for a duplicated date the value that came
    /// last in `points` wins. Returns the series and the duplicated dates.
    pub fn from_points(points: Vec<(Date, V)>) -> (Self, Vec<Date>) {
        let mut points = points;
        // Stable sort keeps input order among equal dates.
        points.sort_by_key(|(date, _)| *date);

        let mut deduped: Vec<Observation<V>> = Vec::with_capacity(points.len());
        let mut duplicates = Vec::new();
        for (date, value) in points {
            match deduped.last_mut() {
                Some(last) if last.date == date => {
                    if duplicates.last() != Some(&date) {
                        duplicates.push(date);
                    }
                    last.value = value;
                }
                _ => deduped.push(Observation { date, value }),
            }
        }
        (Self { points: deduped }, duplicates)
    }

    /// Observations in date order.
    pub fn points(&self) -> &[Observation<V>] {
        &self.points
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no observations.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Latest observation dated at or before `t`.
    ///
    /// # Examples
    ///
    /// ```
    /// use faro_join::TimeSeries;
    /// use faro_traits::Date;
    ///
    /// let d = |day| Date::from_ymd_opt(2020, 1, day).unwrap();
    /// let (series, _) = TimeSeries::from_points(vec![(d(1), 5.0), (d(3), 7.0)]);
    /// assert_eq!(series.as_of_backward(d(2)).map(|o| o.value), Some(5.0));
    /// ```
    pub fn as_of_backward(&self, t: Date) -> Option<&Observation<V>> {
        let idx = self.points.partition_point(|p| p.date <= t);
        idx.checked_sub(1).map(|i| &self.points[i])
    }

    /// Latest observation whose date, shifted by `years`, is at or before `t`.
    ///
    /// With `years = 1` this is the last value known one year before `t`;
    /// with `years = -1` it is the last value known one year after `t`. The
    /// returned observation carries its original, unshifted date.
    pub fn as_of_backward_shifted(&self, t: Date, years: i32) -> Option<&Observation<V>> {
        let idx = self
            .points
            .partition_point(|p| shift_years(p.date, years) <= t);
        idx.checked_sub(1).map(|i| &self.points[i])
    }

    /// Observation closest in time to `t`; ties go to the earlier one.
    pub fn as_of_nearest(&self, t: Date) -> Option<&Observation<V>> {
        let idx = self.points.partition_point(|p| p.date < t);
        let before = idx.checked_sub(1).map(|i| &self.points[i]);
        let after = self.points.get(idx);
        match (before, after) {
            (Some(b), Some(a)) => {
                if (a.date - t) < (t - b.date) {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (b, a) => b.or(a),
        }
    }

    /// Latest observation dated strictly before `t`.
    pub fn strictly_before(&self, t: Date) -> Option<&Observation<V>> {
        let idx = self.points.partition_point(|p| p.date < t);
        idx.checked_sub(1).map(|i| &self.points[i])
    }
}

impl TimeSeries<f64> {
    /// Sum of values dated in `(start, end]`, skipping NaN.
    ///
    /// An empty window sums to zero.
    pub fn windowed_sum(&self, start_exclusive: Date, end_inclusive: Date) -> f64 {
        let lo = self.points.partition_point(|p| p.date <= start_exclusive);
        let hi = self.points.partition_point(|p| p.date <= end_inclusive);
        if lo >= hi {
            return 0.0;
        }
        self.points[lo..hi]
            .iter()
            .map(|p| p.value)
            .filter(|v| !v.is_nan())
            .sum()
    }
}

/// A metric's series for every entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySeries<V = f64> {
    metric: String,
    series: BTreeMap<Symbol, TimeSeries<V>>,
}

impl<V> EntitySeries<V> {
    /// An empty collection for `metric`.
    pub fn empty(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            series: BTreeMap::new(),
        }
    }

    /// Name of the metric.
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Series of one entity, if it has any data.
    pub fn get(&self, entity: &str) -> Option<&TimeSeries<V>> {
        self.series.get(entity)
    }

    /// Whether the entity has any data.
    pub fn contains(&self, entity: &str) -> bool {
        self.series.contains_key(entity)
    }

    /// Entities with data, sorted.
    pub fn entities(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether no entity has data.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// See [`TimeSeries::as_of_backward`].
    pub fn as_of_backward(&self, entity: &str, t: Date) -> Option<&Observation<V>> {
        self.get(entity)?.as_of_backward(t)
    }

    /// See [`TimeSeries::as_of_backward_shifted`].
    pub fn as_of_backward_shifted(
        &self,
        entity: &str,
        t: Date,
        years: i32,
    ) -> Option<&Observation<V>> {
        self.get(entity)?.as_of_backward_shifted(t, years)
    }

    /// See [`TimeSeries::as_of_nearest`].
    pub fn as_of_nearest(&self, entity: &str, t: Date) -> Option<&Observation<V>> {
        self.get(entity)?.as_of_nearest(t)
    }
}

impl EntitySeries<f64> {
    /// See [`TimeSeries::windowed_sum`]. `None` when the entity has no data
    /// at all, so that a missing join target stays distinguishable from a
    /// genuine zero.
    pub fn windowed_sum(
        &self,
        entity: &str,
        start_exclusive: Date,
        end_inclusive: Date,
    ) -> Option<f64> {
        self.get(entity)
            .map(|s| s.windowed_sum(start_exclusive, end_inclusive))
    }

    /// One series per matrix column, skipping missing cells.
    pub fn from_matrix(metric: &str, matrix: &DatedMatrix) -> Self {
        let mut builder = SeriesBuilder::new(metric);
        for (date, row) in matrix.rows() {
            for (symbol, value) in matrix.symbols().iter().zip(row) {
                if let Some(value) = value {
                    builder.push(symbol, date, *value);
                }
            }
        }
        // Matrix dates are unique, so there is nothing to report.
        builder.build().0
    }
}

/// Accumulates raw `(entity, date, value)` records before indexing.
#[derive(Debug, Clone)]
pub struct SeriesBuilder<V = f64> {
    metric: String,
    records: BTreeMap<Symbol, Vec<(Date, V)>>,
}

impl<V> SeriesBuilder<V> {
    /// Start collecting records for `metric`.
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            records: BTreeMap::new(),
        }
    }

    /// Add one record.
    pub fn push(&mut self, entity: &str, date: Date, value: V) {
        self.records
            .entry(entity.to_string())
            .or_default()
            .push((date, value));
    }

    /// Sort and de-duplicate every entity's series.
    ///
    /// Duplicate `(entity, date)` pairs keep the last pushed value and are
    /// returned as [`DataConflict`]s.
    pub fn build(self) -> (EntitySeries<V>, Vec<DataConflict>) {
        let mut conflicts = Vec::new();
        let mut series = BTreeMap::new();
        for (entity, points) in self.records {
            let (ts, duplicates) = TimeSeries::from_points(points);
            for date in duplicates {
                warn!(metric = %self.metric, entity = %entity, %date, "Duplicate timestamp, keeping last value");
                conflicts.push(DataConflict {
                    metric: self.metric.clone(),
                    entity: entity.clone(),
                    date,
                });
            }
            series.insert(entity, ts);
        }
        (
            EntitySeries {
                metric: self.metric,
                series,
            },
            conflicts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn t(day: i64) -> Date {
        Date::from_ymd_opt(2000, 1, 1).unwrap() + chrono::Duration::days(day)
    }

    fn series(points: &[(i64, f64)]) -> TimeSeries {
        TimeSeries::from_points(points.iter().map(|&(d, v)| (t(d), v)).collect()).0
    }

    #[test]
    fn test_as_of_backward() {
        let s = series(&[(1, 5.0), (3, 7.0), (5, 9.0)]);
        assert_eq!(s.as_of_backward(t(4)).map(|o| o.value), Some(7.0));
        assert_eq!(s.as_of_backward(t(3)).map(|o| o.value), Some(7.0));
        assert_eq!(s.as_of_backward(t(10)).map(|o| o.value), Some(9.0));
        assert!(s.as_of_backward(t(0)).is_none());
    }

    #[test]
    fn test_as_of_nearest_tie_goes_earlier() {
        let s = series(&[(1, 5.0), (3, 7.0), (5, 9.0)]);
        assert_eq!(s.as_of_nearest(t(4)).map(|o| o.value), Some(7.0));
        assert_eq!(s.as_of_nearest(t(2)).map(|o| o.value), Some(5.0));
        assert_eq!(s.as_of_nearest(t(-10)).map(|o| o.value), Some(5.0));
        assert_eq!(s.as_of_nearest(t(50)).map(|o| o.value), Some(9.0));

        let uneven = series(&[(1, 5.0), (4, 7.0)]);
        assert_eq!(uneven.as_of_nearest(t(3)).map(|o| o.value), Some(7.0));
    }

    #[test]
    fn test_as_of_nearest_empty() {
        let s = series(&[]);
        assert!(s.as_of_nearest(t(1)).is_none());
    }

    #[test]
    fn test_windowed_sum_start_exclusive() {
        let s = series(&[(100, 0.5), (200, 0.5)]);
        assert_relative_eq!(s.windowed_sum(t(50), t(200)), 1.0);
        assert_relative_eq!(s.windowed_sum(t(100), t(200)), 0.5);
        assert_relative_eq!(s.windowed_sum(t(200), t(300)), 0.0);
        assert_relative_eq!(s.windowed_sum(t(300), t(100)), 0.0);
    }

    #[test]
    fn test_shifted_lookups() {
        let d = |y, m, day| Date::from_ymd_opt(y, m, day).unwrap();
        let (s, _) = TimeSeries::from_points(vec![
            (d(2019, 1, 2), 10.0),
            (d(2019, 1, 4), 11.0),
            (d(2020, 1, 3), 20.0),
            (d(2021, 1, 4), 30.0),
        ]);

        // Previous: last point with date + 1y <= 2020-01-03.
        let prev = s.as_of_backward_shifted(d(2020, 1, 3), 1).unwrap();
        assert_eq!(prev.date, d(2019, 1, 2));
        // Next: last point with date - 1y <= 2020-01-03.
        let next = s.as_of_backward_shifted(d(2020, 1, 3), -1).unwrap();
        assert_eq!(next.date, d(2020, 1, 3));
        let next = s.as_of_backward_shifted(d(2020, 1, 4), -1).unwrap();
        assert_eq!(next.date, d(2021, 1, 4));
    }

    #[test]
    fn test_duplicates_keep_last_seen() {
        let mut builder = SeriesBuilder::new("price");
        builder.push("AAA", t(2), 1.0);
        builder.push("AAA", t(1), 0.5);
        builder.push("AAA", t(2), 2.0);
        builder.push("BBB", t(1), 3.0);
        let (series, conflicts) = builder.build();

        let aaa = series.get("AAA").unwrap();
        assert_eq!(aaa.len(), 2);
        assert_eq!(aaa.as_of_backward(t(2)).map(|o| o.value), Some(2.0));
        assert_eq!(
            conflicts,
            vec![DataConflict {
                metric: "price".into(),
                entity: "AAA".into(),
                date: t(2),
            }]
        );
    }

    #[test]
    fn test_missing_entity() {
        let mut builder = SeriesBuilder::new("dividends");
        builder.push("AAA", t(1), 1.0);
        let (series, _) = builder.build();
        assert!(series.windowed_sum("ZZZ", t(0), t(10)).is_none());
        assert_eq!(series.windowed_sum("AAA", t(5), t(10)), Some(0.0));
        assert!(series.as_of_backward("ZZZ", t(10)).is_none());
    }
}
