//! Robust location/scale and the median ± k·MAD "stable band".

use serde::{Deserialize, Serialize};

/// Consistency constant making MAD estimate the standard deviation of a
/// normal distribution.
pub const MAD_NORMAL_SCALE: f64 = 1.4826;

/// Median of the finite values; `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Raw (unscaled) median absolute deviation around `center`.
pub fn mad(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v - center).abs())
        .collect();
    median(&deviations)
}

/// Interval `median ± max(k · 1.4826 · MAD, min_half_width)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StableBand {
    pub center: f64,
    pub half_width: f64,
    pub lower: f64,
    pub upper: f64,
}

impl StableBand {
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Build a stable band from `values`, or `None` if no value is finite.
///
/// `k` multiplies the normal-consistent MAD; `min_half_width` keeps the band
/// from collapsing when most values are identical.
pub fn stable_band(values: &[f64], k: f64, min_half_width: f64) -> Option<StableBand> {
    let center = median(values)?;
    let spread = mad(values, center)? * MAD_NORMAL_SCALE;
    let half_width = (k * spread).max(min_half_width);
    Some(StableBand {
        center,
        half_width,
        lower: center - half_width,
        upper: center + half_width,
    })
}
