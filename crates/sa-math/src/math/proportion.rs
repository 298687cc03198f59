//! Binomial proportion helpers: Wilson score intervals and low-power masks.

use serde::{Deserialize, Serialize};

/// Process-wide default for the minimum support below which a proportion is
/// reported as low power.
pub const DEFAULT_LOW_POWER_MIN_TOTAL: u64 = 30;

/// Two-sided 95% normal quantile used for Wilson intervals.
pub const DEFAULT_WILSON_Z: f64 = 1.96;

/// Wilson score interval for a binomial proportion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WilsonInterval {
    pub lower: f64,
    pub upper: f64,
}

impl WilsonInterval {
    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    pub fn contains(&self, p: f64) -> bool {
        self.lower <= p && p <= self.upper
    }
}

/// Wilson score interval for `successes` out of `total`.
///
/// Returns `None` when `total` is not a positive finite number. Successes are
/// clamped into `[0, total]` and both bounds into `[0, 1]`.
pub fn wilson_interval(successes: f64, total: f64, z: f64) -> Option<WilsonInterval> {
    if !total.is_finite() || !successes.is_finite() || total <= 0.0 {
        return None;
    }
    let n = total;
    let p_hat = (successes / n).clamp(0.0, 1.0);
    let z2 = z * z;

    // center = (p + z^2/(2n)) / (1 + z^2/n)
    // radius = z * sqrt((p(1-p) + z^2/(4n)) / n) / (1 + z^2/n)
    let denom = 1.0 + z2 / n;
    let center = (p_hat + z2 / (2.0 * n)) / denom;
    let radius = z * ((p_hat * (1.0 - p_hat) + z2 / (4.0 * n)) / n).sqrt() / denom;

    Some(WilsonInterval {
        lower: (center - radius).clamp(0.0, 1.0),
        upper: (center + radius).clamp(0.0, 1.0),
    })
}

/// Whether a support count is too small to trust its proportion.
///
/// The threshold is floored at 1; non-finite totals are low power.
#[inline]
pub fn low_power(total: f64, min_total: u64) -> bool {
    let threshold = min_total.max(1) as f64;
    !total.is_finite() || total < threshold
}

/// Vectorized [`low_power`].
pub fn low_power_mask(totals: &[f64], min_total: u64) -> Vec<bool> {
    totals.iter().map(|&n| low_power(n, min_total)).collect()
}
