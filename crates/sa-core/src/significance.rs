//! Final significance under a configured policy.
//!
//! `either_fdr` is the union of two independently corrected rejection sets.
//! It therefore admits more false positives than either channel alone; it is
//! kept as a documented policy, not treated as FDR-controlled at `alpha`.

use sa_common::SignificancePolicy;
use schemars::JsonSchema;
use serde::Serialize;

/// Requested policy and the policy actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PolicyResolution {
    #[serde(rename = "significance_policy_requested")]
    pub requested: SignificancePolicy,
    #[serde(rename = "significance_policy_effective")]
    pub effective: SignificancePolicy,
}

impl PolicyResolution {
    /// Without active calibration every policy degrades to `parametric_fdr`.
    pub fn resolve(requested: SignificancePolicy, calibration_active: bool) -> Self {
        let effective = if calibration_active {
            requested
        } else {
            SignificancePolicy::ParametricFdr
        };
        PolicyResolution {
            requested,
            effective,
        }
    }

    pub fn fell_back(&self) -> bool {
        self.requested != self.effective
    }

    /// Combine the two corrected decision vectors under the effective policy.
    pub fn combine(&self, parametric_fdr: &[bool], permutation_fdr: &[bool]) -> Vec<bool> {
        debug_assert_eq!(parametric_fdr.len(), permutation_fdr.len());
        match self.effective {
            SignificancePolicy::ParametricFdr => parametric_fdr.to_vec(),
            SignificancePolicy::PermutationFdr => permutation_fdr.to_vec(),
            SignificancePolicy::EitherFdr => parametric_fdr
                .iter()
                .zip(permutation_fdr)
                .map(|(&a, &b)| a || b)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SignificancePolicy; 3] = [
        SignificancePolicy::ParametricFdr,
        SignificancePolicy::PermutationFdr,
        SignificancePolicy::EitherFdr,
    ];

    #[test]
    fn inactive_calibration_always_falls_back() {
        for requested in ALL {
            let r = PolicyResolution::resolve(requested, false);
            assert_eq!(r.effective, SignificancePolicy::ParametricFdr);
            assert_eq!(r.requested, requested);
            assert_eq!(r.fell_back(), requested != SignificancePolicy::ParametricFdr);
        }
    }

    #[test]
    fn active_calibration_keeps_request() {
        for requested in ALL {
            let r = PolicyResolution::resolve(requested, true);
            assert_eq!(r.effective, requested);
            assert!(!r.fell_back());
        }
    }

    #[test]
    fn combine_per_policy() {
        let parametric = [true, false, false, true];
        let permutation = [false, true, false, true];

        let p = PolicyResolution::resolve(SignificancePolicy::ParametricFdr, true);
        assert_eq!(p.combine(&parametric, &permutation), parametric.to_vec());

        let q = PolicyResolution::resolve(SignificancePolicy::PermutationFdr, true);
        assert_eq!(q.combine(&parametric, &permutation), permutation.to_vec());

        let e = PolicyResolution::resolve(SignificancePolicy::EitherFdr, true);
        assert_eq!(
            e.combine(&parametric, &permutation),
            vec![true, true, false, true]
        );
    }

    #[test]
    fn serializes_with_policy_field_names() {
        let r = PolicyResolution::resolve(SignificancePolicy::EitherFdr, false);
        let json = serde_json::to_value(r).unwrap();
        assert_eq!(json["significance_policy_requested"], "either_fdr");
        assert_eq!(json["significance_policy_effective"], "parametric_fdr");
    }
}
