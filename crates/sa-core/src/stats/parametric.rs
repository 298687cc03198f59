//! Parametric window tests.
//!
//! - Count test: observed window total against a Poisson baseline.
//! - Proportion test: window subgroup-a share against the global share,
//!   two-sided normal approximation.
//!
//! Both accept rolling sums as `f64`; counts are exact integers well below
//! 2^53 so no precision is lost.

use sa_common::Direction;
use sa_math::{
    low_power, poisson_sf_inclusive, two_sided_normal_p, wilson_interval, DEFAULT_WILSON_Z,
};
use schemars::JsonSchema;
use serde::Serialize;

/// Baseline proportions are clipped to `[floor, 1 - floor]` so the null
/// variance never vanishes.
pub const BASELINE_PROPORTION_FLOOR: f64 = 1e-6;

/// Mean per-minute total, or 0 for an empty series.
pub fn baseline_rate(totals: &[f64]) -> f64 {
    if totals.is_empty() {
        return 0.0;
    }
    totals.iter().sum::<f64>() / totals.len() as f64
}

pub fn clip_baseline_proportion(p: f64) -> f64 {
    if p.is_nan() {
        return 0.5;
    }
    p.clamp(BASELINE_PROPORTION_FLOOR, 1.0 - BASELINE_PROPORTION_FLOOR)
}

/// Result of a count test for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountTest {
    pub p_value: f64,
    pub rate_ratio: f64,
}

/// `P(X >= observed)` for `X ~ Poisson(expected)`.
///
/// A zero expectation is resolved explicitly: any positive observation is
/// infinitely surprising (`p = 0`, ratio `+inf`), an empty window is not
/// (`p = 1`, ratio `0`).
pub fn count_test(observed: f64, expected: f64) -> CountTest {
    if expected > 0.0 {
        CountTest {
            p_value: poisson_sf_inclusive(observed, expected),
            rate_ratio: observed / expected,
        }
    } else if observed > 0.0 {
        CountTest {
            p_value: 0.0,
            rate_ratio: f64::INFINITY,
        }
    } else {
        CountTest {
            p_value: 1.0,
            rate_ratio: 0.0,
        }
    }
}

/// Result of a proportion test for one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionTest {
    pub proportion: f64,
    pub delta: f64,
    pub abs_delta: f64,
    pub z_score: f64,
    pub p_value: f64,
    pub direction: Direction,
}

/// Two-sided z-test of `successes / total` against `baseline`.
///
/// `baseline` should already be clipped with [`clip_baseline_proportion`].
/// Returns `None` for a non-positive total.
pub fn proportion_test(successes: f64, total: f64, baseline: f64) -> Option<ProportionTest> {
    if total.is_nan() || total <= 0.0 {
        return None;
    }
    let proportion = successes / total;
    let delta = proportion - baseline;
    let se = (baseline * (1.0 - baseline) / total).sqrt();
    let z_score = if se > 0.0 { delta / se } else { 0.0 };
    Some(ProportionTest {
        proportion,
        delta,
        abs_delta: delta.abs(),
        z_score,
        p_value: two_sided_normal_p(z_score),
        direction: Direction::from_delta(delta, 0.0),
    })
}

/// Subgroup-share columns shared by burst windows and profile buckets.
///
/// Share-derived values are `None` where the support is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct ShareColumns {
    pub n_subgroup_a: Vec<f64>,
    pub n_subgroup_b: Vec<f64>,
    pub subgroup_a_share: Vec<Option<f64>>,
    pub delta_share: Vec<Option<f64>>,
    pub abs_delta_share: Vec<Option<f64>>,
    pub wilson_lower: Vec<Option<f64>>,
    pub wilson_upper: Vec<Option<f64>>,
    pub wilson_half_width: Vec<Option<f64>>,
    pub is_low_power: Vec<bool>,
}

impl ShareColumns {
    /// Build share columns for parallel total / subgroup vectors.
    pub fn compute(
        totals: &[f64],
        subgroup_a: &[f64],
        subgroup_b: &[f64],
        baseline_share: f64,
        low_power_min_total: u64,
    ) -> Self {
        let mut cols = ShareColumns::with_capacity(totals.len());
        for ((&total, &a), &b) in totals.iter().zip(subgroup_a).zip(subgroup_b) {
            cols.push(total, a, b, baseline_share, low_power_min_total);
        }
        cols
    }

    fn with_capacity(n: usize) -> Self {
        ShareColumns {
            n_subgroup_a: Vec::with_capacity(n),
            n_subgroup_b: Vec::with_capacity(n),
            subgroup_a_share: Vec::with_capacity(n),
            delta_share: Vec::with_capacity(n),
            abs_delta_share: Vec::with_capacity(n),
            wilson_lower: Vec::with_capacity(n),
            wilson_upper: Vec::with_capacity(n),
            wilson_half_width: Vec::with_capacity(n),
            is_low_power: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, total: f64, a: f64, b: f64, baseline_share: f64, min_total: u64) {
        let share = (total > 0.0).then(|| a / total);
        let delta = share.map(|s| s - baseline_share);
        let wilson = wilson_interval(a, total, DEFAULT_WILSON_Z);
        self.n_subgroup_a.push(a);
        self.n_subgroup_b.push(b);
        self.subgroup_a_share.push(share);
        self.delta_share.push(delta);
        self.abs_delta_share.push(delta.map(f64::abs));
        self.wilson_lower.push(wilson.map(|w| w.lower));
        self.wilson_upper.push(wilson.map(|w| w.upper));
        self.wilson_half_width.push(wilson.map(|w| w.half_width()));
        self.is_low_power.push(low_power(total, min_total));
    }

    pub fn len(&self) -> usize {
        self.is_low_power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_low_power.is_empty()
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        ShareColumns {
            n_subgroup_a: pick(&self.n_subgroup_a, indices),
            n_subgroup_b: pick(&self.n_subgroup_b, indices),
            subgroup_a_share: pick(&self.subgroup_a_share, indices),
            delta_share: pick(&self.delta_share, indices),
            abs_delta_share: pick(&self.abs_delta_share, indices),
            wilson_lower: pick(&self.wilson_lower, indices),
            wilson_upper: pick(&self.wilson_upper, indices),
            wilson_half_width: pick(&self.wilson_half_width, indices),
            is_low_power: pick(&self.is_low_power, indices),
        }
    }
}

pub(crate) fn pick<T: Clone>(column: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| column[i].clone()).collect()
}
