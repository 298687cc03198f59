//! Direction runs over a chronological share profile.
//!
//! A run is a maximal stretch of consecutive buckets whose share deviates
//! from baseline in the same direction. Neutral buckets (|delta| below the
//! tolerance) and empty buckets end the current run and belong to none.

use chrono::NaiveDateTime;
use sa_common::Direction;
use sa_config::ProfileConfig;
use schemars::JsonSchema;
use serde::Serialize;

use super::profiles::TimeBucketProfile;

/// One row per run, in chronological order. `run_id` counts from 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct DirectionRuns {
    pub bucket_minutes: usize,
    pub run_id: Vec<usize>,
    pub direction: Vec<Direction>,
    pub start_bucket: Vec<NaiveDateTime>,
    pub end_bucket: Vec<NaiveDateTime>,
    pub run_length_buckets: Vec<usize>,
    pub mean_abs_delta: Vec<f64>,
    pub max_abs_delta: Vec<f64>,
    pub total_support: Vec<u64>,
    pub n_flagged_buckets: Vec<usize>,
    pub is_long_run: Vec<bool>,
}

impl DirectionRuns {
    pub fn len(&self) -> usize {
        self.run_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.run_id.is_empty()
    }

    pub fn n_long_runs(&self) -> usize {
        self.is_long_run.iter().filter(|&&l| l).count()
    }

    pub fn max_run_length(&self) -> usize {
        self.run_length_buckets.iter().copied().max().unwrap_or(0)
    }

    pub fn max_mean_abs_delta(&self) -> f64 {
        self.mean_abs_delta.iter().copied().fold(0.0, f64::max)
    }
}

/// Per-direction aggregates over [`DirectionRuns`]; only directions with at
/// least one run appear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct DirectionRunSummary {
    pub direction: Vec<Direction>,
    pub n_runs: Vec<usize>,
    pub n_long_runs: Vec<usize>,
    pub max_run_length: Vec<usize>,
    pub mean_run_length: Vec<f64>,
    pub max_mean_abs_delta: Vec<f64>,
}

impl DirectionRunSummary {
    pub fn from_runs(runs: &DirectionRuns) -> Self {
        let mut summary = DirectionRunSummary::default();
        for direction in [Direction::SubgroupAHeavy, Direction::SubgroupBHeavy] {
            let rows: Vec<usize> = (0..runs.len())
                .filter(|&i| runs.direction[i] == direction)
                .collect();
            if rows.is_empty() {
                continue;
            }
            let lengths: Vec<usize> = rows.iter().map(|&i| runs.run_length_buckets[i]).collect();
            summary.direction.push(direction);
            summary.n_runs.push(rows.len());
            summary
                .n_long_runs
                .push(rows.iter().filter(|&&i| runs.is_long_run[i]).count());
            summary
                .max_run_length
                .push(lengths.iter().copied().max().unwrap_or(0));
            summary
                .mean_run_length
                .push(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64);
            summary.max_mean_abs_delta.push(
                rows.iter()
                    .map(|&i| runs.mean_abs_delta[i])
                    .fold(0.0, f64::max),
            );
        }
        summary
    }
}

#[derive(Debug)]
struct OpenRun {
    direction: Direction,
    start: usize,
    end: usize,
    abs_delta_sum: f64,
    abs_delta_max: f64,
    support: u64,
    flagged: usize,
}

impl OpenRun {
    fn start(
        direction: Direction,
        bucket: usize,
        abs_delta: f64,
        support: u64,
        flagged: bool,
    ) -> Self {
        OpenRun {
            direction,
            start: bucket,
            end: bucket,
            abs_delta_sum: abs_delta,
            abs_delta_max: abs_delta,
            support,
            flagged: usize::from(flagged),
        }
    }

    fn extend(&mut self, bucket: usize, abs_delta: f64, support: u64, flagged: bool) {
        self.end = bucket;
        self.abs_delta_sum += abs_delta;
        self.abs_delta_max = self.abs_delta_max.max(abs_delta);
        self.support += support;
        self.flagged += usize::from(flagged);
    }

    fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Single chronological pass stitching same-direction buckets into runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionRunTracker {
    min_run_length: usize,
    neutral_tolerance: f64,
}

impl DirectionRunTracker {
    pub fn new(min_run_length: usize, neutral_tolerance: f64) -> Self {
        DirectionRunTracker {
            min_run_length: min_run_length.max(1),
            neutral_tolerance: neutral_tolerance.max(0.0),
        }
    }

    pub fn from_config(config: &ProfileConfig) -> Self {
        Self::new(config.min_run_length, config.neutral_tolerance)
    }

    pub fn track(&self, profile: &TimeBucketProfile) -> DirectionRuns {
        let mut runs = DirectionRuns {
            bucket_minutes: profile.bucket_minutes,
            ..DirectionRuns::default()
        };
        let mut open: Option<OpenRun> = None;

        for bucket in 0..profile.len() {
            let direction = profile.shares.delta_share[bucket]
                .map(|d| Direction::from_delta(d, self.neutral_tolerance))
                .unwrap_or(Direction::Neutral);
            if direction == Direction::Neutral {
                if let Some(run) = open.take() {
                    self.emit(&mut runs, profile, run);
                }
                continue;
            }

            let abs_delta = profile.shares.abs_delta_share[bucket].unwrap_or(0.0);
            let support = profile.n_total[bucket];
            let flagged = profile.is_flagged[bucket];
            match open.as_mut() {
                Some(run) if run.direction == direction => {
                    run.extend(bucket, abs_delta, support, flagged)
                }
                _ => {
                    if let Some(run) = open.take() {
                        self.emit(&mut runs, profile, run);
                    }
                    open = Some(OpenRun::start(direction, bucket, abs_delta, support, flagged));
                }
            }
        }
        if let Some(run) = open {
            self.emit(&mut runs, profile, run);
        }
        runs
    }

    fn emit(&self, runs: &mut DirectionRuns, profile: &TimeBucketProfile, run: OpenRun) {
        let length = run.len();
        runs.run_id.push(runs.run_id.len() + 1);
        runs.direction.push(run.direction);
        runs.start_bucket.push(profile.bucket_start[run.start]);
        runs.end_bucket.push(profile.bucket_start[run.end]);
        runs.run_length_buckets.push(length);
        runs.mean_abs_delta.push(run.abs_delta_sum / length as f64);
        runs.max_abs_delta.push(run.abs_delta_max);
        runs.total_support.push(run.support);
        runs.n_flagged_buckets.push(run.flagged);
        runs.is_long_run.push(length >= self.min_run_length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::profiles::BandParams;
    use chrono::{NaiveDate, Timelike};
    use sa_common::TimeBucketSeries;

    /// One-minute buckets with the given subgroup-a counts out of 10.
    fn profile(a: &[u64]) -> TimeBucketProfile {
        let start = NaiveDate::from_ymd_opt(2026, 2, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let totals: Vec<u64> = a.iter().map(|&v| if v == u64::MAX { 0 } else { 10 }).collect();
        let a: Vec<u64> = a.iter().map(|&v| if v == u64::MAX { 0 } else { v }).collect();
        let b: Vec<u64> = totals.iter().zip(&a).map(|(t, a)| t - a).collect();
        let series = TimeBucketSeries::from_columns(start, totals, a, b).unwrap();
        let params = BandParams {
            k: 2.5,
            min_half_width: 0.03,
        };
        TimeBucketProfile::build(&series, 1, 0.5, 1, params)
    }

    const EMPTY: u64 = u64::MAX;

    #[test]
    fn stitches_same_direction_buckets() {
        let p = profile(&[7, 8, 9, 2, 3, 5, 7]);
        let runs = DirectionRunTracker::new(3, 1e-9).track(&p);
        assert_eq!(runs.len(), 3);
        assert_eq!(
            runs.direction,
            vec![
                Direction::SubgroupAHeavy,
                Direction::SubgroupBHeavy,
                Direction::SubgroupAHeavy
            ]
        );
        assert_eq!(runs.run_length_buckets, vec![3, 2, 1]);
        assert_eq!(runs.is_long_run, vec![true, false, false]);
        assert_eq!(runs.run_id, vec![1, 2, 3]);
        assert!((runs.mean_abs_delta[0] - 0.3).abs() < 1e-12);
        assert!((runs.max_abs_delta[0] - 0.4).abs() < 1e-12);
        assert_eq!(runs.total_support[0], 30);
        assert_eq!(runs.end_bucket[0].time().minute(), 2);
    }

    #[test]
    fn neutral_and_empty_buckets_break_runs() {
        let p = profile(&[7, 5, 7, EMPTY, 7, 7]);
        let runs = DirectionRunTracker::new(2, 1e-9).track(&p);
        assert_eq!(runs.run_length_buckets, vec![1, 1, 2]);
        assert!(runs.direction.iter().all(|&d| d == Direction::SubgroupAHeavy));
        assert_eq!(runs.n_long_runs(), 1);
        assert_eq!(runs.max_run_length(), 2);
    }

    #[test]
    fn all_neutral_profile_has_no_runs() {
        let p = profile(&[5, 5, 5]);
        let runs = DirectionRunTracker::new(1, 1e-9).track(&p);
        assert!(runs.is_empty());
        assert_eq!(runs.max_mean_abs_delta(), 0.0);
        assert!(DirectionRunSummary::from_runs(&runs).direction.is_empty());
    }

    #[test]
    fn summary_per_direction() {
        let p = profile(&[7, 7, 7, 3, 8, 8, 2, 2]);
        let runs = DirectionRunTracker::new(2, 1e-9).track(&p);
        let summary = DirectionRunSummary::from_runs(&runs);
        assert_eq!(
            summary.direction,
            vec![Direction::SubgroupAHeavy, Direction::SubgroupBHeavy]
        );
        assert_eq!(summary.n_runs, vec![2, 2]);
        assert_eq!(summary.n_long_runs, vec![2, 1]);
        assert_eq!(summary.max_run_length, vec![3, 2]);
        assert!((summary.mean_run_length[0] - 2.5).abs() < 1e-12);
        assert!((summary.max_mean_abs_delta[0] - 0.3).abs() < 1e-12);
        assert!((summary.max_mean_abs_delta[1] - 0.3).abs() < 1e-12);
    }
}
