//! Fuzz target for series construction from sparse buckets.
//!
//! Unsorted, duplicated or inconsistent buckets must be rejected with an
//! error; accepted series must be dense.

#![no_main]

use arbitrary::Arbitrary;
use chrono::{Duration, NaiveDate};
use libfuzzer_sys::fuzz_target;
use sa_common::{MinuteBucket, TimeBucketSeries};

#[derive(Debug, Arbitrary)]
struct RawBucket {
    offset_minutes: u16,
    total: u8,
    subgroup_a: u8,
    subgroup_b: u8,
}

fuzz_target!(|raw: Vec<RawBucket>| {
    let Some(origin) = NaiveDate::from_ymd_opt(2026, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return;
    };
    let buckets: Vec<MinuteBucket> = raw
        .iter()
        .map(|b| {
            MinuteBucket::new(
                origin + Duration::minutes(i64::from(b.offset_minutes)),
                u64::from(b.total),
                u64::from(b.subgroup_a),
                u64::from(b.subgroup_b),
            )
        })
        .collect();
    if let Ok(series) = TimeBucketSeries::densify(buckets) {
        let minutes = series.minutes();
        assert!(minutes.windows(2).all(|w| w[1] - w[0] == Duration::minutes(1)));
    }
});
