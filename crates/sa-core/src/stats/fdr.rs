//! Benjamini-Hochberg step-up FDR control.
//!
//! Pure functions: the same p-values and alpha always give the same
//! q-values and rejection mask.

use sa_common::FdrScope;
use std::collections::BTreeMap;

/// q-values and rejection mask, index-aligned with the input p-values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FdrOutcome {
    pub q_values: Vec<f64>,
    pub rejected: Vec<bool>,
}

impl FdrOutcome {
    pub fn n_rejected(&self) -> usize {
        self.rejected.iter().filter(|&&r| r).count()
    }
}

/// Benjamini-Hochberg adjusted q-values; reject where `q <= alpha`.
///
/// P-values are clipped to [0, 1]; NaN is treated as 1. Empty input yields
/// empty output.
pub fn benjamini_hochberg(p_values: &[f64], alpha: f64) -> FdrOutcome {
    let m = p_values.len();
    if m == 0 {
        return FdrOutcome::default();
    }

    let clipped: Vec<f64> = p_values
        .iter()
        .map(|&p| if p.is_nan() { 1.0 } else { p.clamp(0.0, 1.0) })
        .collect();

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| clipped[a].total_cmp(&clipped[b]));

    // Raw q at each rank, then running minimum from the largest rank down.
    let mut ranked_q: Vec<f64> = order
        .iter()
        .enumerate()
        .map(|(rank, &idx)| clipped[idx] * m as f64 / (rank + 1) as f64)
        .collect();
    for i in (0..m.saturating_sub(1)).rev() {
        ranked_q[i] = ranked_q[i].min(ranked_q[i + 1]);
    }

    let mut q_values = vec![1.0; m];
    for (rank, &idx) in order.iter().enumerate() {
        q_values[idx] = ranked_q[rank].clamp(0.0, 1.0);
    }
    let rejected = q_values.iter().map(|&q| q <= alpha).collect();

    FdrOutcome { q_values, rejected }
}

/// Benjamini-Hochberg over all tests together or per group key.
///
/// `groups` is index-aligned with `p_values` (the window length of each
/// test). With [`FdrScope::PerWindow`] each distinct key is corrected
/// independently.
pub fn benjamini_hochberg_scoped(
    p_values: &[f64],
    groups: &[usize],
    alpha: f64,
    scope: FdrScope,
) -> FdrOutcome {
    debug_assert_eq!(p_values.len(), groups.len());
    match scope {
        FdrScope::Combined => benjamini_hochberg(p_values, alpha),
        FdrScope::PerWindow => {
            let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for (idx, &key) in groups.iter().enumerate() {
                members.entry(key).or_default().push(idx);
            }

            let mut outcome = FdrOutcome {
                q_values: vec![1.0; p_values.len()],
                rejected: vec![false; p_values.len()],
            };
            for indices in members.values() {
                let group_p: Vec<f64> = indices.iter().map(|&i| p_values[i]).collect();
                let group = benjamini_hochberg(&group_p, alpha);
                for (k, &i) in indices.iter().enumerate() {
                    outcome.q_values[i] = group.q_values[k];
                    outcome.rejected[i] = group.rejected[k];
                }
            }
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_empty_output() {
        let out = benjamini_hochberg(&[], 0.05);
        assert!(out.q_values.is_empty());
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn textbook_example() {
        // m = 4: raw q = [0.004, 0.04, 0.0533, 0.2]
        let p = [0.001, 0.02, 0.04, 0.2];
        let out = benjamini_hochberg(&p, 0.05);
        let expected = [0.004, 0.04, 0.04 * 4.0 / 3.0, 0.2];
        for (q, e) in out.q_values.iter().zip(expected) {
            assert!((q - e).abs() < 1e-12, "{q} vs {e}");
        }
        assert_eq!(out.rejected, vec![true, true, false, false]);
        assert_eq!(out.n_rejected(), 2);
    }

    #[test]
    fn step_up_lifts_earlier_ranks() {
        // Raw q for rank 1 (0.03 * 3) exceeds rank 3's (0.03), so the
        // running minimum pulls it down.
        let p = [0.03, 0.03, 0.03];
        let out = benjamini_hochberg(&p, 0.05);
        for q in &out.q_values {
            assert!((q - 0.03).abs() < 1e-12);
        }
        assert!(out.rejected.iter().all(|&r| r));
    }

    #[test]
    fn restores_input_order() {
        let p = [0.5, 0.001, 0.9];
        let out = benjamini_hochberg(&p, 0.01);
        assert!((out.q_values[1] - 0.003).abs() < 1e-12);
        assert_eq!(out.rejected, vec![false, true, false]);
    }

    #[test]
    fn nan_and_out_of_range_are_clipped() {
        let out = benjamini_hochberg(&[f64::NAN, -0.5, 2.0], 0.05);
        assert_eq!(out.q_values[1], 0.0);
        assert_eq!(out.q_values[0], 1.0);
        assert_eq!(out.q_values[2], 1.0);
    }

    #[test]
    fn per_window_scope_corrects_groups_separately() {
        let p = [0.01, 0.5, 0.01, 0.02];
        let groups = [5, 5, 15, 15];
        let combined = benjamini_hochberg_scoped(&p, &groups, 0.05, FdrScope::Combined);
        let split = benjamini_hochberg_scoped(&p, &groups, 0.05, FdrScope::PerWindow);

        // Group 5: [0.01, 0.5] -> q = [0.02, 0.5]
        assert!((split.q_values[0] - 0.02).abs() < 1e-12);
        assert!((split.q_values[1] - 0.5).abs() < 1e-12);
        // Group 15: [0.01, 0.02] -> q = [0.02, 0.02]
        assert!((split.q_values[2] - 0.02).abs() < 1e-12);
        assert!((split.q_values[3] - 0.02).abs() < 1e-12);
        assert_eq!(combined, benjamini_hochberg(&p, 0.05));
    }
}
