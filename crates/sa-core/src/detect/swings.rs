//! Compositional-swing detector.
//!
//! Tests every sufficiently supported window for a subgroup-a share that
//! departs from the global share, optionally calibrated against Binomial
//! null maxima, and builds the bucketed share profiles and direction runs.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sa_common::{CalibrationMode, Direction, TimeBucketSeries};
use sa_config::SwingConfig;
use sa_math::{low_power, rolling_sum, wilson_interval, DEFAULT_WILSON_Z};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use super::profiles::{BandParams, SwingProfiles, TimeBucketProfile};
use super::runs::{DirectionRunSummary, DirectionRunTracker, DirectionRuns};
use super::{
    calibrate_windows, log_policy, rank_significant, resolve_significance, window_groups,
    CalibrationRun, CalibrationSummary, NullDistribution, NullStatistic, SignificanceCounts,
    SignificanceInputs, WindowSignificance,
};
use crate::calibrate::{
    calibration_alpha, CalibrationError, IterationBudget, NullSimulator, ProportionNullModel,
    StratumTable,
};
use crate::logging::event_names;
use crate::significance::PolicyResolution;
use crate::stats::parametric::pick;
use crate::stats::{clip_baseline_proportion, proportion_test};

/// One row per tested window; windows below the minimum support are not
/// tested and do not appear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct SwingWindowTests {
    pub window_minutes: Vec<usize>,
    pub start_minute: Vec<NaiveDateTime>,
    pub end_minute: Vec<NaiveDateTime>,
    pub n_total: Vec<f64>,
    pub n_subgroup_a: Vec<f64>,
    pub subgroup_a_share: Vec<f64>,
    pub delta_share: Vec<f64>,
    pub abs_delta_share: Vec<f64>,
    pub z_score: Vec<f64>,
    pub p_value: Vec<f64>,
    pub direction: Vec<Direction>,
    /// Share the calibrated statistic is measured from: the global share,
    /// or `sum(n_i * p_i) / sum(n_i)` over the window under a stratified
    /// null.
    pub expected_share: Vec<f64>,
    pub wilson_lower: Vec<f64>,
    pub wilson_upper: Vec<f64>,
    pub wilson_half_width: Vec<f64>,
    pub is_low_power: Vec<bool>,
    #[serde(flatten)]
    pub significance: WindowSignificance,
}

impl SwingWindowTests {
    pub fn len(&self) -> usize {
        self.window_minutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window_minutes.is_empty()
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        SwingWindowTests {
            window_minutes: pick(&self.window_minutes, indices),
            start_minute: pick(&self.start_minute, indices),
            end_minute: pick(&self.end_minute, indices),
            n_total: pick(&self.n_total, indices),
            n_subgroup_a: pick(&self.n_subgroup_a, indices),
            subgroup_a_share: pick(&self.subgroup_a_share, indices),
            delta_share: pick(&self.delta_share, indices),
            abs_delta_share: pick(&self.abs_delta_share, indices),
            z_score: pick(&self.z_score, indices),
            p_value: pick(&self.p_value, indices),
            direction: pick(&self.direction, indices),
            expected_share: pick(&self.expected_share, indices),
            wilson_lower: pick(&self.wilson_lower, indices),
            wilson_upper: pick(&self.wilson_upper, indices),
            wilson_half_width: pick(&self.wilson_half_width, indices),
            is_low_power: pick(&self.is_low_power, indices),
            significance: self.significance.select(indices),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SwingSummary {
    #[serde(flatten)]
    pub counts: SignificanceCounts,
    /// Global subgroup-a share, clipped away from 0 and 1.
    pub baseline_share: f64,
    pub min_q_value: f64,
    pub max_abs_delta_share: f64,
    pub n_direction_runs: usize,
    pub n_long_direction_runs: usize,
    pub max_direction_run_length: usize,
    pub max_direction_run_mean_abs_delta: f64,
    #[serde(flatten)]
    pub calibration: CalibrationSummary,
    #[serde(flatten)]
    pub policy: PolicyResolution,
}

/// Everything one swing run produces.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SwingResult {
    pub window_tests: SwingWindowTests,
    /// Significant rows ranked by q-value, then abs delta.
    pub significant_windows: SwingWindowTests,
    pub null_distribution: NullDistribution,
    pub profiles: SwingProfiles,
    pub direction_runs: DirectionRuns,
    pub direction_run_summary: DirectionRunSummary,
    pub summary: SwingSummary,
}

/// Global subgroup-a share, as observed and as clipped for testing.
#[derive(Debug, Clone, Copy, Default)]
struct GlobalShare {
    observed: f64,
    clipped: f64,
}

impl GlobalShare {
    fn of(series: &TimeBucketSeries) -> Self {
        let total = series.total_count();
        if total == 0 {
            return Self::default();
        }
        let observed = series.subgroup_a_count() as f64 / total as f64;
        Self {
            observed,
            clipped: clip_baseline_proportion(observed),
        }
    }
}

/// Stateless swing detector.
#[derive(Debug, Clone, Default)]
pub struct SwingDetector {
    config: SwingConfig,
}

impl SwingDetector {
    pub fn new(config: SwingConfig) -> Self {
        SwingDetector { config }
    }

    pub fn config(&self) -> &SwingConfig {
        &self.config
    }

    pub fn run(&self, series: &TimeBucketSeries) -> SwingResult {
        let windows = self.config.normalized_windows();
        let span = info_span!("swings.run", n_minutes = series.len(), windows = ?windows);
        let _guard = span.enter();
        info!(event = event_names::SWINGS_STARTED);

        let requested = self.config.calibration.significance_policy;
        let total_count = series.total_count();
        if total_count == 0 {
            let policy = PolicyResolution::resolve(requested, false);
            log_policy("swings", policy);
            return self.assemble(
                series,
                SwingWindowTests::default(),
                GlobalShare::default(),
                None,
                SwingProfiles::default(),
                policy,
            );
        }

        let share = GlobalShare::of(series);
        let baseline = share.clipped;
        let totals = series.totals_f64();
        let subgroup_a = series.subgroup_a_f64();
        let min_total = self.config.min_window_total as f64;

        let mut tests = SwingWindowTests::default();
        // Window start offset of every row, for the expected-rate lookup.
        let mut offsets = Vec::new();
        for &window in &windows {
            if window > series.len() {
                debug!(window_minutes = window, "window longer than series; skipped");
                continue;
            }
            let total_roll = rolling_sum(&totals, window);
            let a_roll = rolling_sum(&subgroup_a, window);
            let before = tests.len();
            for (start, (&n, &a)) in total_roll.iter().zip(&a_roll).enumerate() {
                if n < min_total {
                    continue;
                }
                let (Some(test), Some(wilson)) = (
                    proportion_test(a, n, baseline),
                    wilson_interval(a, n, DEFAULT_WILSON_Z),
                ) else {
                    continue;
                };
                tests.window_minutes.push(window);
                tests.start_minute.push(series.minutes()[start]);
                tests.end_minute.push(series.minutes()[start + window - 1]);
                tests.n_total.push(n);
                tests.n_subgroup_a.push(a);
                tests.subgroup_a_share.push(test.proportion);
                tests.delta_share.push(test.delta);
                tests.abs_delta_share.push(test.abs_delta);
                tests.z_score.push(test.z_score);
                tests.p_value.push(test.p_value);
                tests.direction.push(test.direction);
                tests.expected_share.push(baseline);
                tests.wilson_lower.push(wilson.lower);
                tests.wilson_upper.push(wilson.upper);
                tests.wilson_half_width.push(wilson.half_width());
                tests.is_low_power.push(low_power(n, self.config.low_power_min_total));
                offsets.push(start);
            }
            debug!(
                event = event_names::SWINGS_WINDOW_TESTED,
                window_minutes = window,
                n_windows = tests.len() - before,
            );
        }

        // Profiles and runs compare against the unclipped share so that a
        // one-sided stream reads as neutral.
        let profiles = SwingProfiles::build(
            series,
            &self.config.profiles,
            share.observed,
            self.config.low_power_min_total,
        );
        debug!(
            event = event_names::SWINGS_PROFILES_BUILT,
            n_time_profiles = profiles.time_buckets.len(),
            n_time_of_day_profiles = profiles.time_of_day_buckets.len(),
            n_day_profiles = profiles.day_buckets.len(),
        );

        if tests.is_empty() {
            let policy = PolicyResolution::resolve(requested, false);
            log_policy("swings", policy);
            return self.assemble(series, tests, share, None, profiles, policy);
        }

        let model = self.null_model(series, baseline);
        let stratified = self.config.calibration.mode != CalibrationMode::Global;
        if let Some(model) = model.as_ref().filter(|_| stratified) {
            for (window, rows) in window_groups(&tests.window_minutes) {
                let expected = model.expected_window_rates(window);
                for row in rows {
                    tests.expected_share[row] = expected[offsets[row]];
                }
            }
        }
        let calibration = model.map(|model| self.calibrate(&model, &tests));
        let policy = PolicyResolution::resolve(requested, calibration.is_some());
        log_policy("swings", policy);

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
        self.assemble(series, tests, share, calibration, profiles, policy)
    }

    fn assemble(
        &self,
        series: &TimeBucketSeries,
        tests: SwingWindowTests,
        share: GlobalShare,
        calibration: Option<CalibrationRun>,
        profiles: SwingProfiles,
        policy: PolicyResolution,
    ) -> SwingResult {
        let ranked = rank_significant(&tests.significance, &tests.abs_delta_share);
        let significant = tests.select(&ranked);

        let direction_runs = self.direction_runs(series, share.observed, &profiles);
        let direction_run_summary = DirectionRunSummary::from_runs(&direction_runs);

        let summary = SwingSummary {
            counts: SignificanceCounts::from_columns(&tests.significance),
            baseline_share: share.clipped,
            min_q_value: tests.significance.min_q_value(),
            max_abs_delta_share: tests.abs_delta_share.iter().copied().fold(0.0, f64::max),
            n_direction_runs: direction_runs.len(),
            n_long_direction_runs: direction_runs.n_long_runs(),
            max_direction_run_length: direction_runs.max_run_length(),
            max_direction_run_mean_abs_delta: direction_runs.max_mean_abs_delta(),
            calibration: CalibrationSummary::from_run(
                &self.config.calibration,
                calibration.as_ref(),
            ),
            policy,
        };

        info!(
            event = event_names::SWINGS_FINISHED,
            n_tests = summary.counts.n_tests,
            n_significant = summary.counts.n_significant_windows,
            n_direction_runs = summary.n_direction_runs,
            policy = %policy.effective,
        );

        SwingResult {
            window_tests: tests,
            significant_windows: significant,
            null_distribution: calibration
                .map(|run| run.null_distribution)
                .unwrap_or_else(|| NullDistribution::new(NullStatistic::MaxAbsDeltaShare)),
            profiles,
            direction_runs,
            direction_run_summary,
            summary,
        }
    }

    /// Runs over the chronological profile at the direction granularity,
    /// reusing it when it is also a configured profile size.
    fn direction_runs(
        &self,
        series: &TimeBucketSeries,
        observed_share: f64,
        profiles: &SwingProfiles,
    ) -> DirectionRuns {
        let bucket_minutes = self.config.profiles.direction_bucket_minutes;
        match profiles.time_bucket(bucket_minutes) {
            Some(profile) => DirectionRunTracker::from_config(&self.config.profiles).track(profile),
            None => direction_runs_with_share(series, &self.config, bucket_minutes, observed_share),
        }
    }

    /// Binomial null for the configured mode, or `None` when calibration is
    /// off or the model cannot be built.
    fn null_model(&self, series: &TimeBucketSeries, baseline: f64) -> Option<ProportionNullModel> {
        let config = &self.config.calibration;
        if !config.is_active() {
            return None;
        }
        let min_total = self.config.min_window_total;
        match proportion_model(series, config.mode, baseline, min_total) {
            Ok(model) => Some(model),
            Err(err) => {
                warn!(
                    event = event_names::CALIBRATION_FAILED,
                    error = %err,
                    code = err.code(),
                    "swing calibration skipped"
                );
                None
            }
        }
    }

    fn calibrate(&self, model: &ProportionNullModel, tests: &SwingWindowTests) -> CalibrationRun {
        let config = &self.config.calibration;
        let simulator = NullSimulator::new(config.iterations)
            .with_budget(IterationBudget::from_millis(config.max_wall_time_ms));
        let mut rng = StdRng::seed_from_u64(config.seed);

        calibrate_windows(
            model,
            &tests.window_minutes,
            &simulator,
            &mut rng,
            NullStatistic::MaxAbsDeltaShare,
            |_, rows| {
                rows.map(|row| (tests.subgroup_a_share[row] - tests.expected_share[row]).abs())
                    .collect()
            },
        )
    }
}

fn proportion_model(
    series: &TimeBucketSeries,
    mode: CalibrationMode,
    baseline: f64,
    min_window_total: u64,
) -> Result<ProportionNullModel, CalibrationError> {
    match mode {
        CalibrationMode::Global => {
            ProportionNullModel::global(series.totals(), baseline, min_window_total)
        }
        mode => {
            let probabilities =
                StratumTable::subgroup_shares(series, mode, baseline).per_minute(series);
            ProportionNullModel::new(series.totals(), &probabilities, min_window_total)
        }
    }
}

/// Direction runs over an arbitrary bucket size, for hosts that want runs
/// at a granularity other than the configured one.
pub fn direction_runs_at(
    series: &TimeBucketSeries,
    config: &SwingConfig,
    bucket_minutes: usize,
) -> DirectionRuns {
    let share = GlobalShare::of(series);
    direction_runs_with_share(series, config, bucket_minutes, share.observed)
}

fn direction_runs_with_share(
    series: &TimeBucketSeries,
    config: &SwingConfig,
    bucket_minutes: usize,
    observed_share: f64,
) -> DirectionRuns {
    if series.total_count() == 0 {
        return DirectionRuns {
            bucket_minutes,
            ..DirectionRuns::default()
        };
    }
    let profile = TimeBucketProfile::build(
        series,
        bucket_minutes,
        observed_share,
        config.low_power_min_total,
        BandParams::from(&config.profiles),
    );
    DirectionRunTracker::from_config(&config.profiles).track(&profile)
}
