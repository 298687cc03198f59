//! Errors raised while assembling a [`TimeBucketSeries`](crate::TimeBucketSeries).
//!
//! These indicate a violated input contract (the series must be dense and
//! minute-aligned). The statistical core itself never fails on shape or
//! numerical edge cases.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Series construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("column lengths differ: totals={totals}, subgroup_a={subgroup_a}, subgroup_b={subgroup_b}")]
    LengthMismatch {
        totals: usize,
        subgroup_a: usize,
        subgroup_b: usize,
    },

    #[error("bucket {index} at {minute} is not aligned to a whole minute")]
    Misaligned { index: usize, minute: NaiveDateTime },

    #[error("bucket {index} at {minute} is not after {previous}")]
    Unordered {
        index: usize,
        previous: NaiveDateTime,
        minute: NaiveDateTime,
    },

    #[error("bucket {index} at {minute} leaves a gap after {previous}")]
    NotDense {
        index: usize,
        previous: NaiveDateTime,
        minute: NaiveDateTime,
    },

    #[error("bucket {index}: subgroup counts {subgroup_a}+{subgroup_b} exceed total {total}")]
    SubgroupExceedsTotal {
        index: usize,
        total: u64,
        subgroup_a: u64,
        subgroup_b: u64,
    },

    #[error("series start {0} is out of the representable range")]
    OutOfRange(NaiveDateTime),
}

impl SeriesError {
    /// Stable error code for structured reporting (10-19 block).
    pub fn code(&self) -> u32 {
        match self {
            SeriesError::LengthMismatch { .. } => 10,
            SeriesError::Misaligned { .. } => 11,
            SeriesError::Unordered { .. } => 12,
            SeriesError::NotDense { .. } => 13,
            SeriesError::SubgroupExceedsTotal { .. } => 14,
            SeriesError::OutOfRange(_) => 15,
        }
    }
}
