//! Bucketed subgroup-share profiles with robust stable bands.
//!
//! Unlike window tests, profile buckets are fixed and non-overlapping. Each
//! table gets a band `median ± max(k · 1.4826 · MAD, min_half_width)` over
//! its non-low-power shares; buckets outside the band are flagged whether or
//! not any formal test rejected them.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use sa_common::TimeBucketSeries;
use sa_config::ProfileConfig;
use sa_math::{stable_band, StableBand};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::stats::ShareColumns;

const MINUTES_PER_DAY: usize = 24 * 60;

/// Stable band of one table (or one slot).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct BandSummary {
    pub center: f64,
    pub half_width: f64,
    pub lower: f64,
    pub upper: f64,
}

impl From<StableBand> for BandSummary {
    fn from(band: StableBand) -> Self {
        BandSummary {
            center: band.center,
            half_width: band.half_width,
            lower: band.lower,
            upper: band.upper,
        }
    }
}

impl BandSummary {
    fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Band parameters shared by every profile family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandParams {
    pub k: f64,
    pub min_half_width: f64,
}

impl From<&ProfileConfig> for BandParams {
    fn from(config: &ProfileConfig) -> Self {
        BandParams {
            k: config.stable_band_k,
            min_half_width: config.stable_band_min_half_width,
        }
    }
}

/// Band over the eligible rows in `rows`, and an outside-band flag per row
/// of `rows`. Eligible rows have a share and are not low power.
fn band_and_flags(
    shares: &ShareColumns,
    rows: &[usize],
    params: BandParams,
) -> (Option<BandSummary>, Vec<bool>) {
    let eligible = |i: usize| !shares.is_low_power[i] && shares.subgroup_a_share[i].is_some();
    let values: Vec<f64> = rows
        .iter()
        .filter(|&&i| eligible(i))
        .filter_map(|&i| shares.subgroup_a_share[i])
        .collect();
    let band = stable_band(&values, params.k, params.min_half_width).map(BandSummary::from);
    let flags = rows
        .iter()
        .map(|&i| match (band, shares.subgroup_a_share[i]) {
            (Some(band), Some(share)) if eligible(i) => !band.contains(share),
            _ => false,
        })
        .collect();
    (band, flags)
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    /// Index of the earliest minute in the bucket.
    first: Option<usize>,
    total: u64,
    subgroup_a: u64,
    subgroup_b: u64,
}

/// Sum the series into buckets keyed by `key_of(minute index)`.
fn tally_by<K, F>(series: &TimeBucketSeries, mut key_of: F) -> BTreeMap<K, Tally>
where
    K: Ord,
    F: FnMut(usize) -> K,
{
    let mut buckets: BTreeMap<K, Tally> = BTreeMap::new();
    for i in 0..series.len() {
        let tally = buckets.entry(key_of(i)).or_default();
        tally.first.get_or_insert(i);
        tally.total += series.totals()[i];
        tally.subgroup_a += series.subgroup_a()[i];
        tally.subgroup_b += series.subgroup_b()[i];
    }
    buckets
}

fn share_columns<'a>(
    tallies: impl Iterator<Item = &'a Tally>,
    baseline_share: f64,
    low_power_min_total: u64,
) -> (Vec<u64>, ShareColumns) {
    let mut n_total = Vec::new();
    let mut totals = Vec::new();
    let mut a = Vec::new();
    let mut b = Vec::new();
    for t in tallies {
        n_total.push(t.total);
        totals.push(t.total as f64);
        a.push(t.subgroup_a as f64);
        b.push(t.subgroup_b as f64);
    }
    let shares = ShareColumns::compute(&totals, &a, &b, baseline_share, low_power_min_total);
    (n_total, shares)
}

fn minutes_since_epoch(minute: &NaiveDateTime) -> i64 {
    minute.and_utc().timestamp().div_euclid(60)
}

fn minute_of_day(minute: &NaiveDateTime) -> usize {
    (minute.hour() * 60 + minute.minute()) as usize
}

/// Consecutive buckets aligned to multiples of `bucket_minutes` since the
/// Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TimeBucketProfile {
    pub bucket_minutes: usize,
    pub bucket_start: Vec<NaiveDateTime>,
    pub n_total: Vec<u64>,
    #[serde(flatten)]
    pub shares: ShareColumns,
    pub stable_band: Option<BandSummary>,
    pub is_flagged: Vec<bool>,
}

impl TimeBucketProfile {
    pub fn build(
        series: &TimeBucketSeries,
        bucket_minutes: usize,
        baseline_share: f64,
        low_power_min_total: u64,
        params: BandParams,
    ) -> Self {
        let width = bucket_minutes.max(1) as i64;
        let minutes = series.minutes();
        let tallies = tally_by(series, |i| minutes_since_epoch(&minutes[i]).div_euclid(width));
        let bucket_start = tallies
            .values()
            .filter_map(|t| t.first)
            .map(|i| {
                let minute = minutes[i];
                minute - Duration::minutes(minutes_since_epoch(&minute).rem_euclid(width))
            })
            .collect();
        let (n_total, shares) =
            share_columns(tallies.values(), baseline_share, low_power_min_total);
        let rows: Vec<usize> = (0..shares.len()).collect();
        let (stable_band, is_flagged) = band_and_flags(&shares, &rows, params);
        TimeBucketProfile {
            bucket_minutes,
            bucket_start,
            n_total,
            shares,
            stable_band,
            is_flagged,
        }
    }

    pub fn len(&self) -> usize {
        self.n_total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_total.is_empty()
    }
}

/// Minute-of-day slots pooled across all days.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TimeOfDayProfile {
    pub bucket_minutes: usize,
    pub slot: Vec<usize>,
    pub slot_start_minute_of_day: Vec<usize>,
    pub n_total: Vec<u64>,
    #[serde(flatten)]
    pub shares: ShareColumns,
    pub stable_band: Option<BandSummary>,
    pub is_flagged: Vec<bool>,
}

impl TimeOfDayProfile {
    /// `None` unless `bucket_minutes` divides a day.
    pub fn build(
        series: &TimeBucketSeries,
        bucket_minutes: usize,
        baseline_share: f64,
        low_power_min_total: u64,
        params: BandParams,
    ) -> Option<Self> {
        if bucket_minutes == 0 || !MINUTES_PER_DAY.is_multiple_of(bucket_minutes) {
            return None;
        }
        let minutes = series.minutes();
        let tallies = tally_by(series, |i| minute_of_day(&minutes[i]) / bucket_minutes);
        let slot: Vec<usize> = tallies.keys().copied().collect();
        let slot_start_minute_of_day = slot.iter().map(|s| s * bucket_minutes).collect();
        let (n_total, shares) =
            share_columns(tallies.values(), baseline_share, low_power_min_total);
        let rows: Vec<usize> = (0..shares.len()).collect();
        let (stable_band, is_flagged) = band_and_flags(&shares, &rows, params);
        Some(TimeOfDayProfile {
            bucket_minutes,
            slot,
            slot_start_minute_of_day,
            n_total,
            shares,
            stable_band,
            is_flagged,
        })
    }
}

/// Calendar date × minute-of-day slot. `is_slot_outlier` compares each day
/// with the band of its own slot across days.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct DayBucketProfile {
    pub bucket_minutes: usize,
    pub date: Vec<NaiveDate>,
    pub slot: Vec<usize>,
    pub bucket_start: Vec<NaiveDateTime>,
    pub n_total: Vec<u64>,
    #[serde(flatten)]
    pub shares: ShareColumns,
    pub stable_band: Option<BandSummary>,
    pub is_flagged: Vec<bool>,
    pub slot_band_lower: Vec<Option<f64>>,
    pub slot_band_upper: Vec<Option<f64>>,
    pub is_slot_outlier: Vec<bool>,
}

impl DayBucketProfile {
    /// `None` unless `bucket_minutes` divides a day.
    pub fn build(
        series: &TimeBucketSeries,
        bucket_minutes: usize,
        baseline_share: f64,
        low_power_min_total: u64,
        params: BandParams,
    ) -> Option<Self> {
        if bucket_minutes == 0 || !MINUTES_PER_DAY.is_multiple_of(bucket_minutes) {
            return None;
        }
        let minutes = series.minutes();
        let tallies = tally_by(series, |i| {
            (minutes[i].date(), minute_of_day(&minutes[i]) / bucket_minutes)
        });
        let date: Vec<NaiveDate> = tallies.keys().map(|(d, _)| *d).collect();
        let slot: Vec<usize> = tallies.keys().map(|(_, s)| *s).collect();
        let bucket_start = tallies
            .values()
            .filter_map(|t| t.first)
            .map(|i| {
                let minute = minutes[i];
                let into_slot = minute_of_day(&minute) % bucket_minutes;
                minute - Duration::minutes(into_slot as i64)
            })
            .collect();
        let (n_total, shares) =
            share_columns(tallies.values(), baseline_share, low_power_min_total);
        let all_rows: Vec<usize> = (0..shares.len()).collect();
        let (stable_band, is_flagged) = band_and_flags(&shares, &all_rows, params);

        let n = shares.len();
        let mut slot_band_lower = vec![None; n];
        let mut slot_band_upper = vec![None; n];
        let mut is_slot_outlier = vec![false; n];
        let mut by_slot: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &s) in slot.iter().enumerate() {
            by_slot.entry(s).or_default().push(row);
        }
        for rows in by_slot.values() {
            let (band, flags) = band_and_flags(&shares, rows, params);
            for (&row, flag) in rows.iter().zip(flags) {
                slot_band_lower[row] = band.map(|b| b.lower);
                slot_band_upper[row] = band.map(|b| b.upper);
                is_slot_outlier[row] = flag;
            }
        }

        Some(DayBucketProfile {
            bucket_minutes,
            date,
            slot,
            bucket_start,
            n_total,
            shares,
            stable_band,
            is_flagged,
            slot_band_lower,
            slot_band_upper,
            is_slot_outlier,
        })
    }
}

/// All profile tables of one swing run, in ascending bucket size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct SwingProfiles {
    pub time_buckets: Vec<TimeBucketProfile>,
    pub time_of_day_buckets: Vec<TimeOfDayProfile>,
    pub day_buckets: Vec<DayBucketProfile>,
}

impl SwingProfiles {
    pub fn build(
        series: &TimeBucketSeries,
        config: &ProfileConfig,
        baseline_share: f64,
        low_power_min_total: u64,
    ) -> Self {
        let mut profiles = SwingProfiles::default();
        if series.is_empty() {
            return profiles;
        }
        let params = BandParams::from(config);
        for bucket in config.normalized_buckets() {
            profiles.time_buckets.push(TimeBucketProfile::build(
                series,
                bucket,
                baseline_share,
                low_power_min_total,
                params,
            ));
            if let Some(p) =
                TimeOfDayProfile::build(series, bucket, baseline_share, low_power_min_total, params)
            {
                profiles.time_of_day_buckets.push(p);
            }
            if let Some(p) =
                DayBucketProfile::build(series, bucket, baseline_share, low_power_min_total, params)
            {
                profiles.day_buckets.push(p);
            }
        }
        profiles
    }

    pub fn time_bucket(&self, bucket_minutes: usize) -> Option<&TimeBucketProfile> {
        self.time_buckets
            .iter()
            .find(|p| p.bucket_minutes == bucket_minutes)
    }
}
