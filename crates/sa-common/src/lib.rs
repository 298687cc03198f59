//! Stance Audit common types.
//!
//! This crate provides the vocabulary shared by the config and core crates:
//! - The dense per-minute [`TimeBucketSeries`] and its validated constructors
//! - Calibration, significance and FDR policy enums
//! - Compositional direction labels
//! - Series construction errors

pub mod error;
pub mod series;
pub mod types;

pub use error::SeriesError;
pub use series::{MinuteBucket, TimeBucketSeries};
pub use types::{CalibrationMode, Direction, FdrScope, SignificancePolicy};
