//! Stance Audit math utilities.

pub mod math;

pub use math::gamma::{gamma_p, gamma_q, poisson_sf_inclusive};
pub use math::normal::{normal_sf, two_sided_normal_p};
pub use math::proportion::{
    low_power, low_power_mask, wilson_interval, WilsonInterval, DEFAULT_LOW_POWER_MIN_TOTAL,
    DEFAULT_WILSON_Z,
};
pub use math::robust::{mad, median, stable_band, StableBand, MAD_NORMAL_SCALE};
pub use math::rolling::{rolling_sum, rolling_sum_into};
pub use math::stable::{log_factorial, log_gamma};
