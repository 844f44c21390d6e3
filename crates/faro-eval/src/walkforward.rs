//! Walk-forward scoring.
//!
//! The scheduler moves a cursor over the scoring dates. Each cycle trains a
//! fresh classifier on the rows dated in the window before the cursor and
//! scores the rows dated at the cursor:
//!
//! ```text
//! Idle -> Training -> Scoring -> Advancing -> Training -> ... -> Done
//!
//! train: [cursor - window - embargo, cursor - embargo)
//! score: [cursor, next cursor)
//! ```
//!
//! Cycles share nothing but the read-only feature rows, so they can run on
//! the rayon pool. Results are always assembled in cursor order.

use std::collections::BTreeSet;

use chrono::Duration;
use derive_more::Display;
use faro_features::FeatureRow;
use faro_model::{DatasetEncoder, SplitSpec};
use faro_traits::{
    Classifier, DatedMatrix, Date, FaroError, LabeledView, Result, Symbol, TrainedModel,
    shift_years,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Scheduler states.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    /// Before the first cycle.
    Idle,
    /// Fitting on the training window.
    Training,
    /// Predicting the scoring window.
    Scoring,
    /// Recording the cycle's scores and moving the cursor.
    Advancing,
    /// Past the last scoring date.
    Done,
}

/// How the cursor moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSize {
    /// Every distinct row date from the start on.
    #[default]
    DistinctDates,
    /// A fixed number of calendar days.
    EveryDays(i64),
}

/// Configuration for [`WalkForward`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Training window length in calendar years (default: 1).
    pub window_years: i32,

    /// Cursor step.
    pub step: StepSize,

    /// Days between the end of the training window and the cursor. Training
    /// labels look one year ahead, so an embargo of a year keeps every
    /// training label realised before the cursor.
    pub label_embargo_days: i64,

    /// Run cycles on the rayon pool.
    pub parallel: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            window_years: 1,
            step: StepSize::DistinctDates,
            label_embargo_days: 0,
            parallel: true,
        }
    }
}

/// One unit of work: train before `cursor`, score `[cursor, next)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    /// Position in cursor order.
    pub index: usize,
    /// First scoring date.
    pub cursor: Date,
    /// End of the scoring window (exclusive); `None` for the last cycle.
    pub next: Option<Date>,
}

/// Why a cycle produced no scores.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No labelled rows in the training window.
    #[display("empty training window")]
    EmptyTrainingWindow,
    /// No rows in the scoring window.
    #[display("empty scoring window")]
    EmptyScoringWindow,
    /// The classifier could not be fit on the window.
    #[display("insufficient data to fit")]
    InsufficientData,
}

/// What happened in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    /// Cursor of the cycle.
    pub cursor: Date,
    /// Labelled training rows.
    pub train_rows: usize,
    /// Latest training row date.
    pub train_end: Option<Date>,
    /// Earliest scoring row date.
    pub score_start: Option<Date>,
    /// Entities scored.
    pub scored: usize,
    /// Set when the cycle was skipped.
    pub skipped: Option<SkipReason>,
}

/// Output of [`WalkForward::run`].
#[derive(Debug, Clone)]
pub struct WalkForwardResult {
    /// One row per cycle, one column per entity; missing where unscored.
    pub probas: DatedMatrix,
    /// Per-cycle outcomes, in cursor order.
    pub cycles: Vec<CycleOutcome>,
}

impl WalkForwardResult {
    /// Number of cycles skipped.
    pub fn skipped(&self) -> usize {
        self.cycles.iter().filter(|c| c.skipped.is_some()).count()
    }
}

/// Walk-forward scheduler.
#[derive(Debug, Clone, Default)]
pub struct WalkForward {
    config: WalkForwardConfig,
    encoder: DatasetEncoder,
}

impl WalkForward {
    /// Creates a new scheduler.
    pub const fn new(config: WalkForwardConfig, encoder: DatasetEncoder) -> Self {
        Self { config, encoder }
    }

    /// The scheduler configuration.
    #[must_use]
    pub const fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    /// Plan the cycles from `start` to the last row date.
    pub fn plan(&self, rows: &[FeatureRow], start: Date) -> Result<Vec<Cycle>> {
        let dates: BTreeSet<Date> = rows.iter().map(|r| r.date).filter(|d| *d >= start).collect();
        let Some(&last) = dates.last() else {
            return Ok(Vec::new());
        };

        let cursors: Vec<Date> = match self.config.step {
            StepSize::DistinctDates => dates.into_iter().collect(),
            StepSize::EveryDays(days) => {
                if days <= 0 {
                    return Err(FaroError::InvalidData(format!(
                        "Walk-forward step must be positive, got {days} days"
                    )));
                }
                let step = Duration::days(days);
                std::iter::successors(Some(start), |c| Some(*c + step))
                    .take_while(|c| *c <= last)
                    .collect()
            }
        };

        Ok(cursors
            .iter()
            .enumerate()
            .map(|(index, &cursor)| Cycle {
                index,
                cursor,
                next: cursors.get(index + 1).copied(),
            })
            .collect())
    }

    /// Run every cycle from `start` and collect the scores.
    ///
    /// `features` and `target` are the columns fed to the classifier. A
    /// cycle whose windows are empty is skipped and leaves an empty row.
    ///
    /// # Errors
    ///
    /// Returns an error if `features` is forward-looking or a classifier
    /// fails for a reason other than insufficient data.
    pub fn run<C: Classifier>(
        &self,
        classifier: &C,
        rows: &[FeatureRow],
        start: Date,
        features: &[String],
        target: &str,
    ) -> Result<WalkForwardResult> {
        debug!(state = %CycleState::Idle, rows = rows.len(), %start, "Planning walk-forward");
        let cycles = self.plan(rows, start)?;
        let symbols: Vec<Symbol> = rows
            .iter()
            .map(|r| r.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let run_one = |cycle: &Cycle| self.run_cycle(classifier, rows, cycle, &symbols, features, target);
        let results: Vec<(CycleOutcome, Vec<Option<f64>>)> = if self.config.parallel {
            cycles.par_iter().map(run_one).collect::<Result<_>>()?
        } else {
            cycles.iter().map(run_one).collect::<Result<_>>()?
        };

        let mut probas = DatedMatrix::new(symbols);
        let mut outcomes = Vec::with_capacity(results.len());
        for (outcome, scores) in results {
            debug!(state = %CycleState::Advancing, cursor = %outcome.cursor, scored = outcome.scored);
            probas.push_row(outcome.cursor, scores)?;
            outcomes.push(outcome);
        }

        let result = WalkForwardResult {
            probas,
            cycles: outcomes,
        };
        info!(
            state = %CycleState::Done,
            cycles = result.cycles.len(),
            skipped = result.skipped(),
            "Walk-forward complete"
        );
        Ok(result)
    }

    /// Train and score one cycle.
    ///
    /// Returns the outcome and one cell per symbol. An entity scored more
    /// than once keeps its first (lowest row index) score.
    pub fn run_cycle<C: Classifier>(
        &self,
        classifier: &C,
        rows: &[FeatureRow],
        cycle: &Cycle,
        symbols: &[Symbol],
        features: &[String],
        target: &str,
    ) -> Result<(CycleOutcome, Vec<Option<f64>>)> {
        let train_end = cycle.cursor - Duration::days(self.config.label_embargo_days);
        let train_start = shift_years(train_end, -self.config.window_years);
        let in_train = |d: Date| d >= train_start && d < train_end;
        let in_score = |d: Date| d >= cycle.cursor && cycle.next.is_none_or(|n| d < n);

        debug!(state = %CycleState::Training, cursor = %cycle.cursor, %train_start, %train_end);
        let window: Vec<FeatureRow> = rows
            .iter()
            .filter(|r| in_train(r.date) || in_score(r.date))
            .cloned()
            .collect();

        let mut outcome = CycleOutcome {
            cursor: cycle.cursor,
            train_rows: 0,
            train_end: window.iter().map(|r| r.date).filter(|d| in_train(*d)).max(),
            score_start: window.iter().map(|r| r.date).filter(|d| in_score(*d)).min(),
            scored: 0,
            skipped: None,
        };
        let empty = vec![None; symbols.len()];

        if outcome.score_start.is_none() {
            return Ok(self.skip(outcome, SkipReason::EmptyScoringWindow, empty));
        }
        if outcome.train_end.is_none() {
            return Ok(self.skip(outcome, SkipReason::EmptyTrainingWindow, empty));
        }

        // Training rows sort before the cursor, scoring rows from it on.
        let spec = SplitSpec {
            valid_cutoff: cycle.cursor,
            test_cutoff: cycle.cursor,
            features: features.to_vec(),
            target: target.to_string(),
        };
        let data = self.encoder.encode(&window, &spec)?;
        let (train_x, train_y) = data.train.labeled();
        outcome.train_rows = train_y.len();
        if train_y.is_empty() {
            return Ok(self.skip(outcome, SkipReason::EmptyTrainingWindow, empty));
        }

        let train = LabeledView::new(train_x.view(), train_y.view())?;
        let model = match classifier.fit(train, &[]) {
            Ok(model) => model,
            Err(FaroError::InsufficientData(reason)) => {
                debug!(%reason, "Classifier declined the window");
                return Ok(self.skip(outcome, SkipReason::InsufficientData, empty));
            }
            Err(e) => return Err(e),
        };

        debug!(state = %CycleState::Scoring, cursor = %cycle.cursor, rows = data.test.len());
        let proba = model.predict_proba(data.test.features.view())?;
        let mut scores = empty;
        for (&row, &p) in data.test.rows.iter().zip(proba.iter()) {
            let symbol = &window[row].symbol;
            if let Ok(col) = symbols.binary_search(symbol) {
                if scores[col].is_none() {
                    scores[col] = Some(p);
                    outcome.scored += 1;
                }
            }
        }
        Ok((outcome, scores))
    }

    fn skip(
        &self,
        mut outcome: CycleOutcome,
        reason: SkipReason,
        scores: Vec<Option<f64>>,
    ) -> (CycleOutcome, Vec<Option<f64>>) {
        warn!(cursor = %outcome.cursor, %reason, "Skipping walk-forward cycle");
        outcome.skipped = Some(reason);
        (outcome, scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use faro_model::{EncoderConfig, LogisticRegression};

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(symbol: &str, date: Date, x: f64, label: bool) -> FeatureRow {
        FeatureRow {
            date,
            symbol: symbol.into(),
            variables: BTreeMap::from([("x".to_string(), Some(x))]),
            outperform_next: Some(label),
            ..FeatureRow::default()
        }
    }

    fn rows() -> Vec<FeatureRow> {
        let mut rows = Vec::new();
        for (i, month) in [3, 6, 9, 12].into_iter().enumerate() {
            for year in [2018, 2019] {
                let date = d(year, month, 1);
                rows.push(row("AAA", date, 1.0 + i as f64, true));
                rows.push(row("BBB", date, -1.0 - i as f64, false));
            }
        }
        rows
    }

    fn scheduler(parallel: bool) -> WalkForward {
        WalkForward::new(
            WalkForwardConfig {
                parallel,
                ..WalkForwardConfig::default()
            },
            DatasetEncoder::new(EncoderConfig {
                categorical_threshold: 1,
                ..EncoderConfig::default()
            }),
        )
    }

    #[test]
    fn test_plan_distinct_dates() {
        let cycles = scheduler(false).plan(&rows(), d(2019, 1, 1)).unwrap();
        let cursors: Vec<Date> = cycles.iter().map(|c| c.cursor).collect();
        assert_eq!(cursors, vec![d(2019, 3, 1), d(2019, 6, 1), d(2019, 9, 1), d(2019, 12, 1)]);
        assert_eq!(cycles[0].next, Some(d(2019, 6, 1)));
        assert_eq!(cycles[3].next, None);
    }

    #[test]
    fn test_plan_fixed_step() {
        let wf = WalkForward::new(
            WalkForwardConfig {
                step: StepSize::EveryDays(120),
                ..WalkForwardConfig::default()
            },
            DatasetEncoder::default(),
        );
        let cycles = wf.plan(&rows(), d(2019, 1, 1)).unwrap();
        assert_eq!(cycles.len(), 3);
        assert_eq!(cycles[1].cursor, d(2019, 5, 1));

        let bad = WalkForward::new(
            WalkForwardConfig {
                step: StepSize::EveryDays(0),
                ..WalkForwardConfig::default()
            },
            DatasetEncoder::default(),
        );
        assert!(bad.plan(&rows(), d(2019, 1, 1)).is_err());
    }

    #[test]
    fn test_no_leakage_between_windows() {
        let result = scheduler(false)
            .run(&LogisticRegression::default(), &rows(), d(2019, 1, 1), &["x".to_string()], "outperform_next")
            .unwrap();
        assert_eq!(result.cycles.len(), 4);
        for cycle in &result.cycles {
            let (Some(train_end), Some(score_start)) = (cycle.train_end, cycle.score_start) else {
                panic!("cycle {} has an empty window", cycle.cursor);
            };
            assert!(train_end < score_start);
            assert_eq!(score_start, cycle.cursor);
        }
    }

    #[test]
    fn test_scores_and_parallel_order() {
        let features = ["x".to_string()];
        let sequential = scheduler(false)
            .run(&LogisticRegression::default(), &rows(), d(2019, 1, 1), &features, "outperform_next")
            .unwrap();
        let parallel = scheduler(true)
            .run(&LogisticRegression::default(), &rows(), d(2019, 1, 1), &features, "outperform_next")
            .unwrap();

        assert_eq!(sequential.probas, parallel.probas);
        assert_eq!(sequential.probas.symbols(), &["AAA".to_string(), "BBB".to_string()]);
        for (_, scores) in sequential.probas.rows() {
            let (aaa, bbb) = (scores[0].unwrap(), scores[1].unwrap());
            assert!(aaa > bbb);
        }
    }

    #[test]
    fn test_empty_training_window_is_skipped() {
        let result = scheduler(false)
            .run(&LogisticRegression::default(), &rows(), d(2018, 1, 1), &["x".to_string()], "outperform_next")
            .unwrap();
        let first = &result.cycles[0];
        assert_eq!(first.cursor, d(2018, 3, 1));
        assert_eq!(first.skipped, Some(SkipReason::EmptyTrainingWindow));
        assert!(result.probas.row(0).iter().all(Option::is_none));
        assert_eq!(result.skipped(), 1);
    }

    #[test]
    fn test_gap_in_dates_leaves_empty_score_row() {
        let wf = WalkForward::new(
            WalkForwardConfig {
                step: StepSize::EveryDays(30),
                parallel: false,
                ..WalkForwardConfig::default()
            },
            scheduler(false).encoder,
        );
        let result = wf
            .run(&LogisticRegression::default(), &rows(), d(2019, 1, 1), &["x".to_string()], "outperform_next")
            .unwrap();

        assert_eq!(result.cycles[0].cursor, d(2019, 1, 1));
        assert_eq!(result.cycles[0].skipped, Some(SkipReason::EmptyScoringWindow));
        assert!(result.probas.row(0).iter().all(Option::is_none));

        assert_eq!(result.cycles[1].cursor, d(2019, 1, 31));
        assert_eq!(result.cycles[1].skipped, None);
        assert_eq!(result.cycles[1].score_start, Some(d(2019, 3, 1)));
        assert_eq!(result.cycles[1].scored, 2);
        assert_eq!(result.probas.len(), result.cycles.len());
    }

    /// Declines any window with fewer than `min_rows` labelled rows.
    struct MinRows {
        min_rows: usize,
        inner: LogisticRegression,
    }

    impl Classifier for MinRows {
        type Model = <LogisticRegression as Classifier>::Model;

        fn name(&self) -> &str {
            "min_rows"
        }

        fn fit(&self, train: LabeledView<'_>, eval: &[LabeledView<'_>]) -> Result<Self::Model> {
            if train.len() < self.min_rows {
                return Err(FaroError::InsufficientData(format!("{} rows", train.len())));
            }
            self.inner.fit(train, eval)
        }
    }

    #[test]
    fn test_declined_fit_skips_cycle_and_continues() {
        let classifier = MinRows {
            min_rows: 4,
            inner: LogisticRegression::default(),
        };
        let result = scheduler(false)
            .run(&classifier, &rows(), d(2018, 6, 1), &["x".to_string()], "outperform_next")
            .unwrap();

        let first = &result.cycles[0];
        assert_eq!(first.cursor, d(2018, 6, 1));
        assert_eq!(first.train_rows, 2);
        assert_eq!(first.skipped, Some(SkipReason::InsufficientData));
        assert!(result.probas.row(0).iter().all(Option::is_none));

        let second = &result.cycles[1];
        assert_eq!(second.cursor, d(2018, 9, 1));
        assert_eq!(second.skipped, None);
        assert_eq!(second.scored, 2);
        assert_eq!(result.skipped(), 1);
    }

    #[test]
    fn test_first_score_per_entity_kept() {
        let mut rows = rows();
        rows.push(row("AAA", d(2019, 3, 1), -50.0, false));
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];
        let wf = scheduler(false);
        let cycle = wf.plan(&rows, d(2019, 3, 1)).unwrap()[0];
        let (outcome, scores) = wf
            .run_cycle(&LogisticRegression::default(), &rows, &cycle, &symbols, &["x".to_string()], "outperform_next")
            .unwrap();
        assert_eq!(outcome.scored, 2);
        assert!(scores[0].unwrap() > 0.5);
    }

    #[test]
    fn test_label_embargo_shifts_window() {
        let wf = WalkForward::new(
            WalkForwardConfig {
                label_embargo_days: 365,
                parallel: false,
                ..WalkForwardConfig::default()
            },
            DatasetEncoder::default(),
        );
        let result = wf
            .run(&LogisticRegression::default(), &rows(), d(2019, 12, 1), &["x".to_string()], "outperform_next")
            .unwrap();
        let cycle = &result.cycles[0];
        assert!(cycle.train_end.unwrap() < d(2018, 12, 2));
    }

    #[test]
    fn test_forward_looking_feature_rejected() {
        let err = scheduler(false)
            .run(
                &LogisticRegression::default(),
                &rows(),
                d(2019, 1, 1),
                &["yield_next".to_string()],
                "outperform_next",
            )
            .unwrap_err();
        assert!(matches!(err, FaroError::LookAhead(_)));
    }
}
