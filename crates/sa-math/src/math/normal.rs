//! Standard normal tail probabilities.
//!
//! Tails are computed through `erfc` rather than `1 - cdf` so that large
//! |z| values keep their relative precision.

use std::f64::consts::FRAC_1_SQRT_2;

/// Survival function of the standard normal: `P(Z > z)`.
#[inline]
pub fn normal_sf(z: f64) -> f64 {
    0.5 * libm::erfc(z * FRAC_1_SQRT_2)
}

/// Two-sided p-value for a z statistic: `2 * Φ(-|z|)`.
///
/// NaN propagates. The result is clamped into `[0, 1]`.
#[inline]
pub fn two_sided_normal_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    (2.0 * normal_sf(z.abs())).clamp(0.0, 1.0)
}
