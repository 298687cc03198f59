//! Dense per-minute aggregate counts.
//!
//! A [`TimeBucketSeries`] is stored column-wise: every column has the same
//! length and row `i` is the minute `start + i`. Construction enforces the
//! dense invariant (every minute between first and last present, gaps
//! zero-filled) so downstream statistics can index minutes by position.

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// One aggregated minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MinuteBucket {
    /// Start of the minute (seconds and sub-seconds are zero).
    pub minute: NaiveDateTime,
    /// All submissions in the minute.
    pub total: u64,
    /// Submissions tagged with stance A.
    pub subgroup_a: u64,
    /// Submissions tagged with stance B.
    pub subgroup_b: u64,
}

impl MinuteBucket {
    pub fn new(minute: NaiveDateTime, total: u64, subgroup_a: u64, subgroup_b: u64) -> Self {
        Self {
            minute,
            total,
            subgroup_a,
            subgroup_b,
        }
    }

    fn empty(minute: NaiveDateTime) -> Self {
        Self::new(minute, 0, 0, 0)
    }
}

/// Dense, ordered, minute-aligned series of aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeBucketSeries {
    minutes: Vec<NaiveDateTime>,
    totals: Vec<u64>,
    subgroup_a: Vec<u64>,
    subgroup_b: Vec<u64>,
}

fn is_minute_aligned(ts: &NaiveDateTime) -> bool {
    ts.second() == 0 && ts.nanosecond() == 0
}

fn check_counts(index: usize, bucket: &MinuteBucket) -> Result<(), SeriesError> {
    if bucket.subgroup_a.saturating_add(bucket.subgroup_b) > bucket.total {
        return Err(SeriesError::SubgroupExceedsTotal {
            index,
            total: bucket.total,
            subgroup_a: bucket.subgroup_a,
            subgroup_b: bucket.subgroup_b,
        });
    }
    Ok(())
}

impl TimeBucketSeries {
    /// An empty series.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from buckets that already satisfy the dense invariant.
    ///
    /// Rejects misaligned timestamps, out-of-order or duplicate minutes, gaps,
    /// and subgroup counts exceeding the total.
    pub fn from_buckets(buckets: Vec<MinuteBucket>) -> Result<Self, SeriesError> {
        let mut series = Self::with_capacity(buckets.len());
        let mut previous: Option<NaiveDateTime> = None;
        for (index, bucket) in buckets.into_iter().enumerate() {
            if !is_minute_aligned(&bucket.minute) {
                return Err(SeriesError::Misaligned {
                    index,
                    minute: bucket.minute,
                });
            }
            check_counts(index, &bucket)?;
            if let Some(prev) = previous {
                if bucket.minute <= prev {
                    return Err(SeriesError::Unordered {
                        index,
                        previous: prev,
                        minute: bucket.minute,
                    });
                }
                if bucket.minute - prev != Duration::minutes(1) {
                    return Err(SeriesError::NotDense {
                        index,
                        previous: prev,
                        minute: bucket.minute,
                    });
                }
            }
            previous = Some(bucket.minute);
            series.push(bucket);
        }
        Ok(series)
    }

    /// Build from sorted, possibly sparse buckets, zero-filling missing minutes.
    pub fn densify(buckets: Vec<MinuteBucket>) -> Result<Self, SeriesError> {
        let mut series = Self::with_capacity(buckets.len());
        let mut previous: Option<NaiveDateTime> = None;
        for (index, bucket) in buckets.into_iter().enumerate() {
            if !is_minute_aligned(&bucket.minute) {
                return Err(SeriesError::Misaligned {
                    index,
                    minute: bucket.minute,
                });
            }
            check_counts(index, &bucket)?;
            if let Some(prev) = previous {
                if bucket.minute <= prev {
                    return Err(SeriesError::Unordered {
                        index,
                        previous: prev,
                        minute: bucket.minute,
                    });
                }
                let mut fill = prev + Duration::minutes(1);
                while fill < bucket.minute {
                    series.push(MinuteBucket::empty(fill));
                    fill += Duration::minutes(1);
                }
            }
            previous = Some(bucket.minute);
            series.push(bucket);
        }
        Ok(series)
    }

    /// Build from parallel count columns starting at `start`.
    pub fn from_columns(
        start: NaiveDateTime,
        totals: Vec<u64>,
        subgroup_a: Vec<u64>,
        subgroup_b: Vec<u64>,
    ) -> Result<Self, SeriesError> {
        if totals.len() != subgroup_a.len() || totals.len() != subgroup_b.len() {
            return Err(SeriesError::LengthMismatch {
                totals: totals.len(),
                subgroup_a: subgroup_a.len(),
                subgroup_b: subgroup_b.len(),
            });
        }
        if !is_minute_aligned(&start) {
            return Err(SeriesError::Misaligned {
                index: 0,
                minute: start,
            });
        }
        let mut minutes = Vec::with_capacity(totals.len());
        for index in 0..totals.len() {
            let minute = start
                .checked_add_signed(Duration::minutes(index as i64))
                .ok_or(SeriesError::OutOfRange(start))?;
            let bucket =
                MinuteBucket::new(minute, totals[index], subgroup_a[index], subgroup_b[index]);
            check_counts(index, &bucket)?;
            minutes.push(minute);
        }
        Ok(Self {
            minutes,
            totals,
            subgroup_a,
            subgroup_b,
        })
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            minutes: Vec::with_capacity(capacity),
            totals: Vec::with_capacity(capacity),
            subgroup_a: Vec::with_capacity(capacity),
            subgroup_b: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, bucket: MinuteBucket) {
        self.minutes.push(bucket.minute);
        self.totals.push(bucket.total);
        self.subgroup_a.push(bucket.subgroup_a);
        self.subgroup_b.push(bucket.subgroup_b);
    }

    pub fn len(&self) -> usize {
        self.minutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minutes.is_empty()
    }

    pub fn minutes(&self) -> &[NaiveDateTime] {
        &self.minutes
    }

    pub fn totals(&self) -> &[u64] {
        &self.totals
    }

    pub fn subgroup_a(&self) -> &[u64] {
        &self.subgroup_a
    }

    pub fn subgroup_b(&self) -> &[u64] {
        &self.subgroup_b
    }

    pub fn bucket(&self, index: usize) -> Option<MinuteBucket> {
        Some(MinuteBucket::new(
            *self.minutes.get(index)?,
            self.totals[index],
            self.subgroup_a[index],
            self.subgroup_b[index],
        ))
    }

    pub fn totals_f64(&self) -> Vec<f64> {
        self.totals.iter().map(|&v| v as f64).collect()
    }

    pub fn subgroup_a_f64(&self) -> Vec<f64> {
        self.subgroup_a.iter().map(|&v| v as f64).collect()
    }

    pub fn subgroup_b_f64(&self) -> Vec<f64> {
        self.subgroup_b.iter().map(|&v| v as f64).collect()
    }

    pub fn total_count(&self) -> u64 {
        self.totals.iter().sum()
    }

    pub fn subgroup_a_count(&self) -> u64 {
        self.subgroup_a.iter().sum()
    }

    /// Hour of day (0-23) for every minute.
    pub fn hours(&self) -> Vec<usize> {
        self.minutes.iter().map(|m| m.hour() as usize).collect()
    }

    /// Day of week (Monday = 0 .. Sunday = 6) for every minute.
    pub fn weekdays(&self) -> Vec<usize> {
        self.minutes
            .iter()
            .map(|m| m.weekday().num_days_from_monday() as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn from_buckets_accepts_dense_input() {
        let series = TimeBucketSeries::from_buckets(vec![
            MinuteBucket::new(ts(10, 0), 3, 2, 1),
            MinuteBucket::new(ts(10, 1), 0, 0, 0),
            MinuteBucket::new(ts(10, 2), 5, 1, 3),
        ])
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.total_count(), 8);
        assert_eq!(series.subgroup_a_count(), 3);
        assert_eq!(series.hours(), vec![10, 10, 10]);
    }

    #[test]
    fn from_buckets_rejects_gaps_and_disorder() {
        let gap = TimeBucketSeries::from_buckets(vec![
            MinuteBucket::new(ts(10, 0), 1, 1, 0),
            MinuteBucket::new(ts(10, 2), 1, 1, 0),
        ]);
        assert!(matches!(gap, Err(SeriesError::NotDense { index: 1, .. })));

        let disorder = TimeBucketSeries::from_buckets(vec![
            MinuteBucket::new(ts(10, 1), 1, 1, 0),
            MinuteBucket::new(ts(10, 0), 1, 1, 0),
        ]);
        assert!(matches!(disorder, Err(SeriesError::Unordered { .. })));
    }

    #[test]
    fn from_buckets_rejects_misaligned_and_overfull() {
        let misaligned = ts(10, 0) + Duration::seconds(30);
        let err = TimeBucketSeries::from_buckets(vec![MinuteBucket::new(misaligned, 1, 0, 0)])
            .unwrap_err();
        assert_eq!(err.code(), 11);

        let err = TimeBucketSeries::from_buckets(vec![MinuteBucket::new(ts(10, 0), 2, 2, 1)])
            .unwrap_err();
        assert!(matches!(err, SeriesError::SubgroupExceedsTotal { .. }));
    }

    #[test]
    fn densify_zero_fills_missing_minutes() {
        let series = TimeBucketSeries::densify(vec![
            MinuteBucket::new(ts(23, 58), 2, 1, 1),
            MinuteBucket::new(ts(0, 1) + Duration::days(1), 4, 4, 0),
        ])
        .unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.totals(), &[2, 0, 0, 4]);
        assert_eq!(series.hours(), vec![23, 23, 0, 0]);
    }

    #[test]
    fn from_columns_checks_lengths() {
        let err = TimeBucketSeries::from_columns(ts(0, 0), vec![1, 2], vec![1], vec![0, 0])
            .unwrap_err();
        assert!(matches!(err, SeriesError::LengthMismatch { .. }));

        let series =
            TimeBucketSeries::from_columns(ts(0, 0), vec![1, 2], vec![1, 0], vec![0, 2]).unwrap();
        assert_eq!(series.minutes()[1], ts(0, 1));
        assert_eq!(series.bucket(1), Some(MinuteBucket::new(ts(0, 1), 2, 0, 2)));
        assert_eq!(series.bucket(2), None);
    }

    #[test]
    fn weekdays_start_monday_at_zero() {
        // 2026-02-01 is a Sunday.
        let series = TimeBucketSeries::from_columns(ts(0, 0), vec![0], vec![0], vec![0]).unwrap();
        assert_eq!(series.weekdays(), vec![6]);
    }
}
