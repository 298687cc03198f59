//! Volume-burst detector.
//!
//! Scans every configured window length for rolling totals that exceed the
//! series' mean rate under a Poisson model, optionally calibrated against
//! simulated maxima, and reports the subgroup composition of each window.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sa_common::{CalibrationMode, TimeBucketSeries};
use sa_config::BurstConfig;
use sa_math::{median, rolling_sum};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use super::{
    calibrate_windows, log_policy, rank_significant, resolve_significance, CalibrationRun,
    CalibrationSummary, NullDistribution, NullStatistic, SignificanceCounts, SignificanceInputs,
    WindowSignificance,
};
use crate::calibrate::{
    calibration_alpha, CalibrationError, CountNullModel, IterationBudget, NullSimulator,
    StratumTable,
};
use crate::logging::event_names;
use crate::significance::PolicyResolution;
use crate::stats::parametric::pick;
use crate::stats::{baseline_rate, count_test, ShareColumns};

/// Significant windows whose share moved at least this far count as
/// composition shifts (unless the median significant shift is larger).
const COMPOSITION_SHIFT_FLOOR: f64 = 0.10;

/// One row per (window length, window start).
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct BurstWindowTests {
    pub window_minutes: Vec<usize>,
    pub start_minute: Vec<NaiveDateTime>,
    pub end_minute: Vec<NaiveDateTime>,
    pub observed_count: Vec<f64>,
    pub expected_count: Vec<f64>,
    pub rate_ratio: Vec<f64>,
    pub p_value: Vec<f64>,
    /// Subgroup-a share of each window against the global share.
    #[serde(flatten)]
    pub composition: ShareColumns,
    #[serde(flatten)]
    pub significance: WindowSignificance,
}

impl BurstWindowTests {
    pub fn len(&self) -> usize {
        self.window_minutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window_minutes.is_empty()
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        BurstWindowTests {
            window_minutes: pick(&self.window_minutes, indices),
            start_minute: pick(&self.start_minute, indices),
            end_minute: pick(&self.end_minute, indices),
            observed_count: pick(&self.observed_count, indices),
            expected_count: pick(&self.expected_count, indices),
            rate_ratio: pick(&self.rate_ratio, indices),
            p_value: pick(&self.p_value, indices),
            composition: self.composition.select(indices),
            significance: self.significance.select(indices),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct BurstSummary {
    #[serde(flatten)]
    pub counts: SignificanceCounts,
    pub baseline_rate_per_minute: f64,
    /// Unclipped global subgroup-a share.
    pub baseline_share: f64,
    pub max_observed_window_count: f64,
    pub max_abs_delta_share: f64,
    pub max_significant_abs_delta_share: f64,
    pub n_significant_composition_shifts: usize,
    pub min_q_value: f64,
    #[serde(flatten)]
    pub calibration: CalibrationSummary,
    #[serde(flatten)]
    pub policy: PolicyResolution,
}

/// Everything one burst run produces.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct BurstResult {
    pub window_tests: BurstWindowTests,
    /// Significant rows ranked by q-value, then rate ratio.
    pub significant_windows: BurstWindowTests,
    pub null_distribution: NullDistribution,
    pub summary: BurstSummary,
}

impl BurstResult {
    fn empty(baseline_rate: f64, baseline_share: f64, policy: PolicyResolution) -> Self {
        BurstResult {
            window_tests: BurstWindowTests::default(),
            significant_windows: BurstWindowTests::default(),
            null_distribution: NullDistribution::new(NullStatistic::MaxWindowCount),
            summary: BurstSummary {
                counts: SignificanceCounts::default(),
                baseline_rate_per_minute: baseline_rate,
                baseline_share,
                max_observed_window_count: 0.0,
                max_abs_delta_share: 0.0,
                max_significant_abs_delta_share: 0.0,
                n_significant_composition_shifts: 0,
                min_q_value: 1.0,
                calibration: CalibrationSummary::inactive(),
                policy,
            },
        }
    }
}

/// Stateless burst detector; [`BurstDetector::run`] is a pure function of
/// the series and the configuration.
#[derive(Debug, Clone, Default)]
pub struct BurstDetector {
    config: BurstConfig,
}

impl BurstDetector {
    pub fn new(config: BurstConfig) -> Self {
        BurstDetector { config }
    }

    pub fn config(&self) -> &BurstConfig {
        &self.config
    }

    pub fn run(&self, series: &TimeBucketSeries) -> BurstResult {
        let windows = self.config.normalized_windows();
        let span = info_span!("bursts.run", n_minutes = series.len(), windows = ?windows);
        let _guard = span.enter();
        info!(event = event_names::BURSTS_STARTED);

        let totals = series.totals_f64();
        let subgroup_a = series.subgroup_a_f64();
        let subgroup_b = series.subgroup_b_f64();
        let rate = baseline_rate(&totals);
        let total_count = series.total_count();
        let baseline_share = if total_count > 0 {
            series.subgroup_a_count() as f64 / total_count as f64
        } else {
            0.0
        };
        let requested = self.config.calibration.significance_policy;

        // An all-zero series has nothing to test against.
        if rate <= 0.0 {
            let policy = PolicyResolution::resolve(requested, false);
            log_policy("bursts", policy);
            return BurstResult::empty(rate, baseline_share, policy);
        }

        let mut tests = BurstWindowTests::default();
        let mut rolling_a = Vec::new();
        let mut rolling_b = Vec::new();
        for &window in &windows {
            if window > series.len() {
                debug!(window_minutes = window, "window longer than series; skipped");
                continue;
            }
            let counts = rolling_sum(&totals, window);
            let expected = rate * window as f64;
            for (start, &observed) in counts.iter().enumerate() {
                let test = count_test(observed, expected);
                tests.window_minutes.push(window);
                tests.start_minute.push(series.minutes()[start]);
                tests.end_minute.push(series.minutes()[start + window - 1]);
                tests.observed_count.push(observed);
                tests.expected_count.push(expected);
                tests.rate_ratio.push(test.rate_ratio);
                tests.p_value.push(test.p_value);
            }
            rolling_a.extend(rolling_sum(&subgroup_a, window));
            rolling_b.extend(rolling_sum(&subgroup_b, window));
            debug!(
                event = event_names::BURSTS_WINDOW_TESTED,
                window_minutes = window,
                n_windows = counts.len(),
                expected_count = expected,
            );
        }

        if tests.is_empty() {
            let policy = PolicyResolution::resolve(requested, false);
            log_policy("bursts", policy);
            return BurstResult::empty(rate, baseline_share, policy);
        }

        tests.composition = ShareColumns::compute(
            &tests.observed_count,
            &rolling_a,
            &rolling_b,
            baseline_share,
            self.config.low_power_min_total,
        );

        let calibration = self.calibrate(series, &tests, rate);
        let policy = PolicyResolution::resolve(requested, calibration.is_some());
        log_policy("bursts", policy);

        let inputs = SignificanceInputs {
            window_minutes: &tests.window_minutes,
            p_values: &tests.p_value,
            fdr_alpha: self.config.fdr_alpha,
            scope: self.config.fdr_scope,
            calibration_alpha: calibration_alpha(
                self.config.fdr_alpha,
                self.config.calibration.support_alpha,
                self.config.calibration.iterations,
            ),
        };
        tests.significance = resolve_significance(&inputs, calibration.as_ref(), policy);

        let ranked = rank_significant(&tests.significance, &tests.rate_ratio);
        let significant = tests.select(&ranked);
        let summary = BurstSummary {
            counts: SignificanceCounts::from_columns(&tests.significance),
            baseline_rate_per_minute: rate,
            baseline_share,
            max_observed_window_count: max_of(tests.observed_count.iter().copied()),
            max_abs_delta_share: max_of(
                tests.composition.abs_delta_share.iter().flatten().copied(),
            ),
            max_significant_abs_delta_share: max_of(
                significant.composition.abs_delta_share.iter().flatten().copied(),
            ),
            n_significant_composition_shifts: composition_shifts(
                &significant.composition.abs_delta_share,
            ),
            min_q_value: tests.significance.min_q_value(),
            calibration: CalibrationSummary::from_run(
                &self.config.calibration,
                calibration.as_ref(),
            ),
            policy,
        };

        info!(
            event = event_names::BURSTS_FINISHED,
            n_tests = summary.counts.n_tests,
            n_significant = summary.counts.n_significant_windows,
            min_q_value = summary.min_q_value,
            policy = %policy.effective,
        );

        BurstResult {
            window_tests: tests,
            significant_windows: significant,
            null_distribution: calibration
                .map(|run| run.null_distribution)
                .unwrap_or_else(|| NullDistribution::new(NullStatistic::MaxWindowCount)),
            summary,
        }
    }

    fn calibrate(
        &self,
        series: &TimeBucketSeries,
        tests: &BurstWindowTests,
        rate: f64,
    ) -> Option<CalibrationRun> {
        let config = &self.config.calibration;
        if !config.is_active() {
            return None;
        }
        let model = match count_model(series, config.mode, rate) {
            Ok(model) => model,
            Err(err) => {
                warn!(
                    event = event_names::CALIBRATION_FAILED,
                    error = %err,
                    code = err.code(),
                    "burst calibration skipped"
                );
                return None;
            }
        };
        let simulator = NullSimulator::new(config.iterations)
            .with_budget(IterationBudget::from_millis(config.max_wall_time_ms));
        let mut rng = StdRng::seed_from_u64(config.seed);
        Some(calibrate_windows(
            &model,
            &tests.window_minutes,
            &simulator,
            &mut rng,
            NullStatistic::MaxWindowCount,
            |_, rows| tests.observed_count[rows].to_vec(),
        ))
    }
}

fn count_model(
    series: &TimeBucketSeries,
    mode: CalibrationMode,
    rate: f64,
) -> Result<CountNullModel, CalibrationError> {
    match mode {
        CalibrationMode::Global => CountNullModel::global(series.len(), rate),
        mode => {
            CountNullModel::new(&StratumTable::mean_totals(series, mode, rate).per_minute(series))
        }
    }
}

fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, f64::max)
}

/// Significant windows whose abs share delta reaches
/// `max(0.10, median significant abs delta)`.
fn composition_shifts(abs_deltas: &[Option<f64>]) -> usize {
    let defined: Vec<f64> = abs_deltas.iter().flatten().copied().collect();
    let Some(mid) = median(&defined) else {
        return 0;
    };
    let threshold = COMPOSITION_SHIFT_FLOOR.max(mid);
    defined.iter().filter(|&&d| d >= threshold).count()
}
