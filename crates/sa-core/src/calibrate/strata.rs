//! Per-stratum baseline rates for stratified null simulation.

use sa_common::{CalibrationMode, TimeBucketSeries};

pub const N_HOUR_STRATA: usize = 24;
pub const N_DAY_HOUR_STRATA: usize = 7 * 24;

fn n_strata(mode: CalibrationMode) -> usize {
    match mode {
        CalibrationMode::Global => 1,
        CalibrationMode::HourOfDay => N_HOUR_STRATA,
        CalibrationMode::DayOfWeekHour => N_DAY_HOUR_STRATA,
    }
}

/// Stratum index of every minute in `series`.
pub fn stratum_keys(series: &TimeBucketSeries, mode: CalibrationMode) -> Vec<usize> {
    match mode {
        CalibrationMode::Global => vec![0; series.len()],
        CalibrationMode::HourOfDay => series.hours(),
        CalibrationMode::DayOfWeekHour => series
            .weekdays()
            .into_iter()
            .zip(series.hours())
            .map(|(day, hour)| day.min(6) * N_HOUR_STRATA + hour.min(23))
            .collect(),
    }
}

/// One baseline value per stratum; strata the series never visits hold the
/// global fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct StratumTable {
    mode: CalibrationMode,
    values: Vec<f64>,
}

impl StratumTable {
    /// Mean per-minute total within each stratum.
    pub fn mean_totals(series: &TimeBucketSeries, mode: CalibrationMode, fallback: f64) -> Self {
        let keys = stratum_keys(series, mode);
        let n = n_strata(mode);
        let mut sums = vec![0.0; n];
        let mut minutes = vec![0usize; n];
        for (&key, &total) in keys.iter().zip(series.totals()) {
            sums[key] += total as f64;
            minutes[key] += 1;
        }
        let values = sums
            .iter()
            .zip(&minutes)
            .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { fallback })
            .collect();
        StratumTable { mode, values }
    }

    /// Pooled subgroup-a share within each stratum; strata with no
    /// submissions hold the fallback.
    pub fn subgroup_shares(
        series: &TimeBucketSeries,
        mode: CalibrationMode,
        fallback: f64,
    ) -> Self {
        let keys = stratum_keys(series, mode);
        let n = n_strata(mode);
        let mut successes = vec![0u64; n];
        let mut totals = vec![0u64; n];
        for ((&key, &total), &a) in keys.iter().zip(series.totals()).zip(series.subgroup_a()) {
            successes[key] += a;
            totals[key] += total;
        }
        let values = successes
            .iter()
            .zip(&totals)
            .map(|(&a, &total)| {
                if total > 0 {
                    a as f64 / total as f64
                } else {
                    fallback
                }
            })
            .collect();
        StratumTable { mode, values }
    }

    pub fn mode(&self) -> CalibrationMode {
        self.mode
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Expand to one value per minute of `series`.
    pub fn per_minute(&self, series: &TimeBucketSeries) -> Vec<f64> {
        stratum_keys(series, self.mode)
            .into_iter()
            .map(|key| self.values[key])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2026-02-02 is a Monday.
    fn series_from(hour: u32, totals: Vec<u64>, a: Vec<u64>) -> TimeBucketSeries {
        let start = NaiveDate::from_ymd_opt(2026, 2, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        let b = totals.iter().zip(&a).map(|(t, a)| t - a).collect();
        TimeBucketSeries::from_columns(start, totals, a, b).unwrap()
    }

    #[test]
    fn hourly_means_with_fallback() {
        // 60 minutes at hour 10 with total 2, then 60 at hour 11 with total 4.
        let mut totals = vec![2; 60];
        totals.extend(vec![4; 60]);
        let series = series_from(10, totals, vec![0; 120]);
        let table = StratumTable::mean_totals(&series, CalibrationMode::HourOfDay, 3.0);
        assert_eq!(table.values().len(), N_HOUR_STRATA);
        assert_eq!(table.values()[10], 2.0);
        assert_eq!(table.values()[11], 4.0);
        assert_eq!(table.values()[0], 3.0);

        let per_minute = table.per_minute(&series);
        assert_eq!(per_minute[0], 2.0);
        assert_eq!(per_minute[119], 4.0);
    }

    #[test]
    fn day_hour_keys_use_weekday() {
        let series = series_from(23, vec![1; 120], vec![0; 120]);
        let keys = stratum_keys(&series, CalibrationMode::DayOfWeekHour);
        // Monday 23:00 then Tuesday 00:00
        assert_eq!(keys[0], 23);
        assert_eq!(keys[60], N_HOUR_STRATA);
    }

    #[test]
    fn shares_pool_counts_and_fall_back_on_silence() {
        let series = series_from(10, vec![10, 0, 30], vec![10, 0, 0]);
        let table = StratumTable::subgroup_shares(&series, CalibrationMode::HourOfDay, 0.5);
        assert_eq!(table.values()[10], 0.25);
        assert_eq!(table.values()[3], 0.5);

        let silent = series_from(10, vec![0, 0], vec![0, 0]);
        let table = StratumTable::subgroup_shares(&silent, CalibrationMode::HourOfDay, 0.4);
        assert_eq!(table.values()[10], 0.4);
    }

    #[test]
    fn global_mode_has_single_stratum() {
        let series = series_from(10, vec![1, 3], vec![0, 0]);
        let table = StratumTable::mean_totals(&series, CalibrationMode::Global, 9.0);
        assert_eq!(table.values(), &[2.0]);
        assert_eq!(table.per_minute(&series), vec![2.0, 2.0]);
    }
}
