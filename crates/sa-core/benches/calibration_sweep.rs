//! Criterion benchmarks for `sa-core`.
//!
//! Calibration dominates detector cost: one synthetic series per iteration
//! per window length.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sa_core::calibrate::{CountNullModel, NullSimulator, ProportionNullModel};
use sa_core::{
    BurstConfig, BurstDetector, CalibrationConfig, CalibrationMode, SwingConfig, SwingDetector,
    TimeBucketSeries,
};

fn day_series() -> TimeBucketSeries {
    let start = NaiveDate::from_ymd_opt(2026, 2, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let totals: Vec<u64> = (0..1_440).map(|i| 3 + (i % 11) as u64).collect();
    let a: Vec<u64> = totals.iter().map(|t| t / 2).collect();
    let b = totals.iter().zip(&a).map(|(t, a)| t - a).collect();
    TimeBucketSeries::from_columns(start, totals, a, b).unwrap()
}

fn bench_null_draws(c: &mut Criterion) {
    let mut group = c.benchmark_group("null_simulation");
    let trials: Vec<u64> = (0..1_440).map(|i| 3 + (i % 11) as u64).collect();
    let count = CountNullModel::global(1_440, 8.0).unwrap();
    let proportion = ProportionNullModel::global(&trials, 0.5, 25).unwrap();
    let simulator = NullSimulator::new(20);

    for window in [5usize, 60, 240] {
        group.bench_with_input(BenchmarkId::new("poisson", window), &window, |b, &w| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| black_box(simulator.simulate(&count, w, &mut rng)));
        });
        group.bench_with_input(BenchmarkId::new("binomial", window), &window, |b, &w| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| black_box(simulator.simulate(&proportion, w, &mut rng)));
        });
    }

    group.finish();
}

fn bench_detectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector_run");
    group.sample_size(20);
    let series = day_series();
    let calibration = CalibrationConfig::default()
        .with_mode(CalibrationMode::HourOfDay)
        .with_iterations(25);

    group.bench_function("bursts_parametric", |b| {
        let config = BurstConfig::default().with_calibration(CalibrationConfig::disabled());
        let detector = BurstDetector::new(config);
        b.iter(|| black_box(detector.run(black_box(&series))));
    });
    group.bench_function("bursts_calibrated", |b| {
        let config = BurstConfig::default().with_calibration(calibration.clone());
        let detector = BurstDetector::new(config);
        b.iter(|| black_box(detector.run(black_box(&series))));
    });
    group.bench_function("swings_calibrated", |b| {
        let config = SwingConfig::default().with_calibration(calibration.clone());
        let detector = SwingDetector::new(config);
        b.iter(|| black_box(detector.run(black_box(&series))));
    });

    group.finish();
}

criterion_group!(benches, bench_null_draws, bench_detectors);
criterion_main!(benches);
