//! Fuzz target for both detectors over arbitrary count columns.
//!
//! Every table a detector returns must keep its columns the same length.

#![no_main]

use arbitrary::Arbitrary;
use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;
use sa_common::{CalibrationMode, TimeBucketSeries};
use sa_config::{BurstConfig, CalibrationConfig, SwingConfig};
use sa_core::{BurstDetector, SwingDetector};

#[derive(Debug, Arbitrary)]
struct Input {
    counts: Vec<(u8, u8)>,
    windows: Vec<u8>,
    min_window_total: u8,
    stratified: bool,
    seed: u64,
}

fuzz_target!(|input: Input| {
    let Some(start) = NaiveDate::from_ymd_opt(2026, 3, 2).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return;
    };
    let counts = &input.counts[..input.counts.len().min(600)];
    let subgroup_a: Vec<u64> = counts.iter().map(|c| u64::from(c.0)).collect();
    let subgroup_b: Vec<u64> = counts.iter().map(|c| u64::from(c.1)).collect();
    let totals = subgroup_a.iter().zip(&subgroup_b).map(|(a, b)| a + b).collect();
    let Ok(series) = TimeBucketSeries::from_columns(start, totals, subgroup_a, subgroup_b) else {
        return;
    };

    let windows: Vec<usize> = input.windows.iter().take(4).map(|&w| usize::from(w)).collect();
    let mode = if input.stratified {
        CalibrationMode::HourOfDay
    } else {
        CalibrationMode::Global
    };
    let calibration = CalibrationConfig::default()
        .with_mode(mode)
        .with_iterations(3)
        .with_seed(input.seed);

    let bursts = BurstDetector::new(
        BurstConfig::new(windows.clone(), 0.05).with_calibration(calibration.clone()),
    )
    .run(&series);
    let tests = &bursts.window_tests;
    assert_eq!(tests.start_minute.len(), tests.len());
    assert_eq!(tests.significance.len(), tests.len());
    assert_eq!(tests.composition.len(), tests.len());

    let swings = SwingDetector::new(
        SwingConfig::new(windows, 0.05, u64::from(input.min_window_total).max(1))
            .with_calibration(calibration),
    )
    .run(&series);
    let tests = &swings.window_tests;
    assert_eq!(tests.direction.len(), tests.len());
    assert_eq!(tests.significance.len(), tests.len());
    assert!(swings.summary.min_q_value <= 1.0);
});
