//! Closed-form window tests, Benjamini-Hochberg control and empirical tail
//! probabilities.

pub mod empirical;
pub mod fdr;
pub mod parametric;

pub use empirical::{empirical_tail_p_value, empirical_tail_p_values};
pub use fdr::{benjamini_hochberg, benjamini_hochberg_scoped, FdrOutcome};
pub use parametric::{
    baseline_rate, clip_baseline_proportion, count_test, proportion_test, CountTest, ProportionTest,
    ShareColumns, BASELINE_PROPORTION_FLOOR,
};
