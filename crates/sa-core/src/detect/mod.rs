//! Burst and swing detectors and the table types they share.
//!
//! Tables are struct-of-arrays: every column of one table has the same
//! length, and rows are stored in (window length, window start) order.

pub mod bursts;
pub mod profiles;
pub mod runs;
pub mod swings;

pub use bursts::{BurstDetector, BurstResult, BurstSummary, BurstWindowTests};
pub use profiles::{
    BandSummary, DayBucketProfile, SwingProfiles, TimeBucketProfile, TimeOfDayProfile,
};
pub use runs::{DirectionRunSummary, DirectionRunTracker, DirectionRuns};
pub use swings::{direction_runs_at, SwingDetector, SwingResult, SwingSummary, SwingWindowTests};

use rand::rngs::StdRng;
use sa_common::{CalibrationMode, FdrScope};
use sa_config::CalibrationConfig;
use schemars::JsonSchema;
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, warn};

use crate::calibrate::{NullModel, NullSample, NullSimulator};
use crate::logging::event_names;
use crate::significance::PolicyResolution;
use crate::stats::empirical_tail_p_values;
use crate::stats::fdr::benjamini_hochberg_scoped;
use crate::stats::parametric::pick;

/// FDR, permutation and final-significance columns of a window table.
///
/// Without active calibration the permutation flags and
/// `is_calibration_supported` are all `true` and the permutation p/q values
/// are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct WindowSignificance {
    pub q_value: Vec<f64>,
    pub is_significant_parametric: Vec<bool>,
    pub permutation_p_value: Vec<Option<f64>>,
    pub permutation_q_value: Vec<Option<f64>>,
    pub is_significant_permutation_raw: Vec<bool>,
    pub is_significant_permutation_fdr: Vec<bool>,
    pub is_significant_permutation: Vec<bool>,
    pub is_calibration_supported: Vec<bool>,
    pub is_significant: Vec<bool>,
}

impl WindowSignificance {
    pub fn len(&self) -> usize {
        self.is_significant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_significant.is_empty()
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        WindowSignificance {
            q_value: pick(&self.q_value, indices),
            is_significant_parametric: pick(&self.is_significant_parametric, indices),
            permutation_p_value: pick(&self.permutation_p_value, indices),
            permutation_q_value: pick(&self.permutation_q_value, indices),
            is_significant_permutation_raw: pick(&self.is_significant_permutation_raw, indices),
            is_significant_permutation_fdr: pick(&self.is_significant_permutation_fdr, indices),
            is_significant_permutation: pick(&self.is_significant_permutation, indices),
            is_calibration_supported: pick(&self.is_calibration_supported, indices),
            is_significant: pick(&self.is_significant, indices),
        }
    }

    /// Smallest q-value, or 1 when there are no tests.
    pub fn min_q_value(&self) -> f64 {
        self.q_value.iter().copied().fold(1.0, f64::min)
    }
}

/// Per-channel significance counts of a detector run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SignificanceCounts {
    pub n_tests: usize,
    pub n_significant_windows: usize,
    pub n_parametric_fdr_significant_windows: usize,
    pub n_permutation_raw_significant_windows: usize,
    pub n_permutation_fdr_significant_windows: usize,
    pub n_permutation_significant_windows: usize,
    pub n_calibration_supported_windows: usize,
}

fn count_true(column: &[bool]) -> usize {
    column.iter().filter(|&&v| v).count()
}

impl SignificanceCounts {
    pub fn from_columns(sig: &WindowSignificance) -> Self {
        SignificanceCounts {
            n_tests: sig.len(),
            n_significant_windows: count_true(&sig.is_significant),
            n_parametric_fdr_significant_windows: count_true(&sig.is_significant_parametric),
            n_permutation_raw_significant_windows: count_true(&sig.is_significant_permutation_raw),
            n_permutation_fdr_significant_windows: count_true(&sig.is_significant_permutation_fdr),
            n_permutation_significant_windows: count_true(&sig.is_significant_permutation),
            n_calibration_supported_windows: count_true(&sig.is_calibration_supported),
        }
    }
}

/// Calibration metadata reported in detector summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CalibrationSummary {
    #[serde(rename = "calibration_enabled")]
    pub enabled: bool,
    /// `None` when calibration did not run.
    #[serde(rename = "calibration_mode")]
    pub mode: Option<CalibrationMode>,
    #[serde(rename = "calibration_iterations")]
    pub iterations: usize,
    #[serde(rename = "calibration_seed")]
    pub seed: Option<u64>,
    /// Some window stopped early on the wall-clock budget.
    #[serde(rename = "calibration_truncated")]
    pub truncated: bool,
}

impl CalibrationSummary {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub(crate) fn from_run(config: &CalibrationConfig, run: Option<&CalibrationRun>) -> Self {
        match run {
            Some(run) => CalibrationSummary {
                enabled: true,
                mode: Some(config.mode),
                iterations: config.iterations,
                seed: Some(config.seed),
                truncated: run.null_distribution.truncated,
            },
            None => Self::inactive(),
        }
    }
}

/// Which maximum statistic a null distribution holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NullStatistic {
    MaxWindowCount,
    MaxAbsDeltaShare,
}

/// Simulated maxima, one row per (window length, iteration). Diagnostic
/// output only; iterations are numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct NullDistribution {
    pub statistic: NullStatistic,
    pub window_minutes: Vec<usize>,
    pub iteration: Vec<usize>,
    pub max_statistic: Vec<f64>,
    pub truncated: bool,
}

impl NullDistribution {
    pub fn new(statistic: NullStatistic) -> Self {
        NullDistribution {
            statistic,
            window_minutes: Vec::new(),
            iteration: Vec::new(),
            max_statistic: Vec::new(),
            truncated: false,
        }
    }

    pub fn push_sample(&mut self, sample: &NullSample) {
        for (i, &value) in sample.maxima.iter().enumerate() {
            self.window_minutes.push(sample.window_minutes);
            self.iteration.push(i + 1);
            self.max_statistic.push(value);
        }
        self.truncated |= sample.truncated;
    }

    pub fn len(&self) -> usize {
        self.max_statistic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_statistic.is_empty()
    }

    /// Maxima simulated for one window length.
    pub fn for_window(&self, window: usize) -> Vec<f64> {
        self.window_minutes
            .iter()
            .zip(&self.max_statistic)
            .filter(|(&w, _)| w == window)
            .map(|(_, &v)| v)
            .collect()
    }
}

/// Contiguous row ranges sharing one window length.
pub(crate) fn window_groups(window_minutes: &[usize]) -> Vec<(usize, Range<usize>)> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=window_minutes.len() {
        if i == window_minutes.len() || window_minutes[i] != window_minutes[start] {
            groups.push((window_minutes[start], start..i));
            start = i;
        }
    }
    groups
}

/// Indices of significant rows ordered by q-value ascending, then effect
/// descending, then table order.
pub(crate) fn rank_significant(sig: &WindowSignificance, effect: &[f64]) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..sig.len()).filter(|&i| sig.is_significant[i]).collect();
    ranked.sort_by(|&a, &b| {
        sig.q_value[a]
            .total_cmp(&sig.q_value[b])
            .then_with(|| effect[b].total_cmp(&effect[a]))
    });
    ranked
}

/// Empirical p-values and null maxima from one calibration pass.
#[derive(Debug, Clone)]
pub(crate) struct CalibrationRun {
    pub permutation_p: Vec<Option<f64>>,
    pub null_distribution: NullDistribution,
}

/// Simulate every window length of a table and score its rows.
///
/// `observed` maps a window length and its row range to the statistic
/// compared against that window's null maxima. The generator is advanced in
/// ascending window order.
pub(crate) fn calibrate_windows<M, F>(
    model: &M,
    window_minutes: &[usize],
    simulator: &NullSimulator,
    rng: &mut StdRng,
    statistic: NullStatistic,
    mut observed: F,
) -> CalibrationRun
where
    M: NullModel,
    F: FnMut(usize, Range<usize>) -> Vec<f64>,
{
    let mut permutation_p = vec![None; window_minutes.len()];
    let mut null_distribution = NullDistribution::new(statistic);

    for (window, rows) in window_groups(window_minutes) {
        let sample = simulator.simulate(model, window, rng);
        let p_values = empirical_tail_p_values(&sample.maxima, &observed(window, rows.clone()));
        for (row, p) in rows.zip(p_values) {
            permutation_p[row] = Some(p);
        }
        if sample.truncated {
            warn!(
                event = event_names::CALIBRATION_TRUNCATED,
                window_minutes = window,
                completed = sample.completed_iterations(),
                requested = sample.requested_iterations,
                "calibration stopped on wall-clock budget"
            );
        }
        debug!(
            event = event_names::CALIBRATION_WINDOW_SIMULATED,
            window_minutes = window,
            iterations = sample.completed_iterations(),
        );
        null_distribution.push_sample(&sample);
    }

    CalibrationRun {
        permutation_p,
        null_distribution,
    }
}

/// Inputs for [`resolve_significance`].
pub(crate) struct SignificanceInputs<'a> {
    pub window_minutes: &'a [usize],
    pub p_values: &'a [f64],
    pub fdr_alpha: f64,
    pub scope: FdrScope,
    /// Calibration threshold for `is_calibration_supported`.
    pub calibration_alpha: f64,
}

/// BH over both channels, then the policy combination.
pub(crate) fn resolve_significance(
    inputs: &SignificanceInputs<'_>,
    calibration: Option<&CalibrationRun>,
    resolution: PolicyResolution,
) -> WindowSignificance {
    let n = inputs.p_values.len();
    let parametric = benjamini_hochberg_scoped(
        inputs.p_values,
        inputs.window_minutes,
        inputs.fdr_alpha,
        inputs.scope,
    );

    let mut sig = WindowSignificance {
        q_value: parametric.q_values,
        is_significant_parametric: parametric.rejected,
        permutation_p_value: vec![None; n],
        permutation_q_value: vec![None; n],
        is_significant_permutation_raw: vec![true; n],
        is_significant_permutation_fdr: vec![true; n],
        is_significant_permutation: vec![true; n],
        is_calibration_supported: vec![true; n],
        is_significant: Vec::new(),
    };

    if let Some(run) = calibration {
        let present: Vec<usize> = (0..n).filter(|&i| run.permutation_p[i].is_some()).collect();
        let present_p: Vec<f64> = present
            .iter()
            .filter_map(|&i| run.permutation_p[i])
            .collect();
        let present_groups: Vec<usize> =
            present.iter().map(|&i| inputs.window_minutes[i]).collect();
        let permutation =
            benjamini_hochberg_scoped(&present_p, &present_groups, inputs.fdr_alpha, inputs.scope);

        sig.permutation_p_value = run.permutation_p.clone();
        sig.is_significant_permutation_fdr = vec![false; n];
        for (k, &i) in present.iter().enumerate() {
            sig.permutation_q_value[i] = Some(permutation.q_values[k]);
            sig.is_significant_permutation_fdr[i] = permutation.rejected[k];
        }
        sig.is_significant_permutation_raw = run
            .permutation_p
            .iter()
            .map(|p| p.is_some_and(|p| p <= inputs.fdr_alpha))
            .collect();
        sig.is_calibration_supported = run
            .permutation_p
            .iter()
            .map(|p| p.is_some_and(|p| p <= inputs.calibration_alpha))
            .collect();
        sig.is_significant_permutation = sig.is_significant_permutation_fdr.clone();
    }

    sig.is_significant = resolution.combine(
        &sig.is_significant_parametric,
        &sig.is_significant_permutation_fdr,
    );
    sig
}

/// Log a policy fallback once per run.
pub(crate) fn log_policy(detector: &'static str, resolution: PolicyResolution) {
    if resolution.fell_back() {
        warn!(
            event = event_names::POLICY_FALLBACK,
            detector,
            requested = %resolution.requested,
            effective = %resolution.effective,
            "calibration inactive; using parametric FDR"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_common::SignificancePolicy;

    #[test]
    fn window_groups_are_contiguous_runs() {
        assert!(window_groups(&[]).is_empty());
        assert_eq!(
            window_groups(&[5, 5, 15, 15, 15, 60]),
            vec![(5, 0..2), (15, 2..5), (60, 5..6)]
        );
    }

    #[test]
    fn ranking_orders_by_q_then_effect() {
        let sig = WindowSignificance {
            q_value: vec![0.01, 0.001, 0.01, 0.5],
            is_significant: vec![true, true, true, false],
            ..WindowSignificance::default()
        };
        let ranked = rank_significant(&sig, &[2.0, 1.0, 5.0, 100.0]);
        assert_eq!(ranked, vec![1, 2, 0]);
    }

    #[test]
    fn inactive_calibration_marks_permutation_vacuously() {
        let inputs = SignificanceInputs {
            window_minutes: &[5, 5],
            p_values: &[0.001, 0.9],
            fdr_alpha: 0.05,
            scope: FdrScope::Combined,
            calibration_alpha: 0.1,
        };
        let resolution = PolicyResolution::resolve(SignificancePolicy::PermutationFdr, false);
        let sig = resolve_significance(&inputs, None, resolution);
        assert_eq!(sig.is_significant, vec![true, false]);
        assert!(sig.is_significant_permutation.iter().all(|&v| v));
        assert!(sig.is_calibration_supported.iter().all(|&v| v));
        assert!(sig.permutation_p_value.iter().all(Option::is_none));

        let counts = SignificanceCounts::from_columns(&sig);
        assert_eq!(counts.n_permutation_significant_windows, 2);
        assert_eq!(counts.n_parametric_fdr_significant_windows, 1);
    }

    #[test]
    fn active_calibration_fills_permutation_columns() {
        let inputs = SignificanceInputs {
            window_minutes: &[5, 5, 5],
            p_values: &[0.001, 0.9, 0.8],
            fdr_alpha: 0.05,
            scope: FdrScope::Combined,
            calibration_alpha: 0.1,
        };
        let run = CalibrationRun {
            permutation_p: vec![Some(0.5), Some(0.01), Some(0.08)],
            null_distribution: NullDistribution::new(NullStatistic::MaxWindowCount),
        };
        let either = PolicyResolution::resolve(SignificancePolicy::EitherFdr, true);
        let sig = resolve_significance(&inputs, Some(&run), either);

        assert_eq!(sig.is_significant_permutation_raw, vec![false, true, false]);
        assert_eq!(sig.is_calibration_supported, vec![false, true, true]);
        // BH over [0.5, 0.01, 0.08]: q = [0.5, 0.03, 0.12]
        assert_eq!(sig.is_significant_permutation_fdr, vec![false, true, false]);
        assert!((sig.permutation_q_value[1].unwrap() - 0.03).abs() < 1e-12);
        assert_eq!(sig.is_significant, vec![true, true, false]);
    }

    #[test]
    fn null_distribution_numbers_iterations_from_one() {
        let mut null = NullDistribution::new(NullStatistic::MaxAbsDeltaShare);
        null.push_sample(&NullSample {
            window_minutes: 15,
            maxima: vec![0.1, 0.2],
            requested_iterations: 4,
            truncated: true,
        });
        assert_eq!(null.iteration, vec![1, 2]);
        assert_eq!(null.for_window(15), vec![0.1, 0.2]);
        assert!(null.for_window(5).is_empty());
        assert!(null.truncated);
    }

    #[test]
    fn min_q_of_empty_table_is_one() {
        assert_eq!(WindowSignificance::default().min_q_value(), 1.0);
    }
}
