//! Property-based tests for multiple-testing control and empirical p-values.

use proptest::prelude::*;
use sa_core::significance::PolicyResolution;
use sa_core::stats::{
    benjamini_hochberg, benjamini_hochberg_scoped, empirical_tail_p_value, empirical_tail_p_values,
};
use sa_core::{FdrScope, SignificancePolicy};

fn p_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..=1.0, 0..120)
}

// ============================================================================
// Benjamini-Hochberg
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// q-values are bounded, never below their p-value, and preserve p order.
    #[test]
    fn bh_q_values_are_monotone(p in p_values(), alpha in 0.001f64..0.5) {
        let out = benjamini_hochberg(&p, alpha);
        prop_assert_eq!(out.q_values.len(), p.len());
        for i in 0..p.len() {
            prop_assert!(out.q_values[i] >= p[i] - 1e-12);
            prop_assert!(out.q_values[i] <= 1.0);
            for j in 0..p.len() {
                if p[i] < p[j] {
                    prop_assert!(out.q_values[i] <= out.q_values[j] + 1e-12);
                }
            }
        }
    }

    /// The rejection set is exactly the step-up set: the k smallest
    /// p-values for the largest k with p_(k) * m / k <= alpha.
    #[test]
    fn bh_rejects_step_up_set(p in p_values(), alpha in 0.001f64..0.5) {
        let out = benjamini_hochberg(&p, alpha);
        let m = p.len();
        let mut sorted = p.clone();
        sorted.sort_by(f64::total_cmp);
        let k = (1..=m)
            .rev()
            .find(|&k| sorted[k - 1] * m as f64 / k as f64 <= alpha)
            .unwrap_or(0);
        prop_assert_eq!(out.n_rejected(), k);
        if k > 0 {
            let cutoff = sorted[k - 1];
            for i in 0..m {
                prop_assert_eq!(out.rejected[i], p[i] <= cutoff);
            }
        }
    }

    /// Per-window scope is BH applied to each group on its own.
    #[test]
    fn bh_per_window_matches_groupwise(
        rows in prop::collection::vec((0.0f64..=1.0, 0usize..3), 0..90),
        alpha in 0.001f64..0.3,
    ) {
        let p: Vec<f64> = rows.iter().map(|r| r.0).collect();
        let groups: Vec<usize> = rows.iter().map(|r| r.1).collect();
        let scoped = benjamini_hochberg_scoped(&p, &groups, alpha, FdrScope::PerWindow);
        for g in 0..3 {
            let idx: Vec<usize> = (0..p.len()).filter(|&i| groups[i] == g).collect();
            let sub: Vec<f64> = idx.iter().map(|&i| p[i]).collect();
            let alone = benjamini_hochberg(&sub, alpha);
            for (k, &i) in idx.iter().enumerate() {
                prop_assert!((scoped.q_values[i] - alone.q_values[k]).abs() < 1e-12);
                prop_assert_eq!(scoped.rejected[i], alone.rejected[k]);
            }
        }
    }

    /// Combined scope ignores grouping.
    #[test]
    fn bh_combined_scope_ignores_groups(p in p_values(), alpha in 0.001f64..0.3) {
        let groups: Vec<usize> = (0..p.len()).map(|i| i % 4).collect();
        let scoped = benjamini_hochberg_scoped(&p, &groups, alpha, FdrScope::Combined);
        prop_assert_eq!(scoped, benjamini_hochberg(&p, alpha));
    }
}

// ============================================================================
// Empirical tail p-values
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Empirical p lies in [1/(N+1), 1] and falls as the observation grows.
    #[test]
    fn empirical_p_is_bounded_and_monotone(
        null in prop::collection::vec(0.0f64..50.0, 1..80),
        a in 0.0f64..60.0,
        b in 0.0f64..60.0,
    ) {
        let mut sorted = null.clone();
        sorted.sort_by(f64::total_cmp);
        let floor = 1.0 / (null.len() as f64 + 1.0);
        let pa = empirical_tail_p_value(&sorted, a);
        let pb = empirical_tail_p_value(&sorted, b);
        prop_assert!(pa >= floor - 1e-15 && pa <= 1.0);
        if a <= b {
            prop_assert!(pa >= pb);
        }
    }

    /// The batch form sorts its null itself.
    #[test]
    fn empirical_batch_matches_single(
        null in prop::collection::vec(0.0f64..50.0, 0..60),
        observed in prop::collection::vec(0.0f64..60.0, 0..20),
    ) {
        let batch = empirical_tail_p_values(&null, &observed);
        let mut sorted = null.clone();
        sorted.sort_by(f64::total_cmp);
        for (o, p) in observed.iter().zip(&batch) {
            prop_assert_eq!(*p, empirical_tail_p_value(&sorted, *o));
        }
    }

    /// Either-FDR rejects a superset of both channels.
    #[test]
    fn either_policy_is_union(
        decisions in prop::collection::vec((any::<bool>(), any::<bool>()), 0..50),
    ) {
        let parametric: Vec<bool> = decisions.iter().map(|d| d.0).collect();
        let permutation: Vec<bool> = decisions.iter().map(|d| d.1).collect();
        let either = PolicyResolution::resolve(SignificancePolicy::EitherFdr, true)
            .combine(&parametric, &permutation);
        for i in 0..either.len() {
            prop_assert!(either[i] >= parametric[i] && either[i] >= permutation[i]);
        }
    }
}

#[test]
fn empirical_p_of_empty_null_is_one() {
    assert_eq!(empirical_tail_p_value(&[], 3.0), 1.0);
}
