//! Stance Audit core library.
//!
//! Window testing and calibration for a minute-bucketed submission series:
//! - Burst detection: rolling-window Poisson count tests
//! - Swing detection: subgroup-share tests, bucketed profiles, direction runs
//! - Multiple testing control (Benjamini-Hochberg) and empirical calibration
//!   against simulated null maxima
//!
//! Detectors are pure functions of their config and input series; the same
//! seed yields the same output.

pub mod calibrate;
pub mod detect;
pub mod logging;
pub mod schema;
pub mod significance;
pub mod stats;

pub use detect::{
    BurstDetector, BurstResult, BurstSummary, BurstWindowTests, DirectionRunSummary,
    DirectionRunTracker, DirectionRuns, NullDistribution, SwingDetector, SwingProfiles,
    SwingResult, SwingSummary, SwingWindowTests,
};
pub use significance::PolicyResolution;

pub use sa_common::{
    CalibrationMode, Direction, FdrScope, MinuteBucket, SeriesError, SignificancePolicy,
    TimeBucketSeries,
};
pub use sa_config::{AuditConfig, BurstConfig, CalibrationConfig, ProfileConfig, SwingConfig};
