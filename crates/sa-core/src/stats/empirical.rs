//! Smoothed empirical tail probabilities against a simulated null.

/// `(count(null >= observed) + 1) / (N + 1)`.
///
/// `sorted_null` must be ascending. An empty null, or a NaN observation,
/// gives `p = 1`.
pub fn empirical_tail_p_value(sorted_null: &[f64], observed: f64) -> f64 {
    if sorted_null.is_empty() || observed.is_nan() {
        return 1.0;
    }
    let below = sorted_null.partition_point(|&v| v < observed);
    let at_or_above = sorted_null.len() - below;
    (at_or_above as f64 + 1.0) / (sorted_null.len() as f64 + 1.0)
}

/// One-sided empirical p-values for every observation against one null
/// sample. NaN draws in the null are ignored.
pub fn empirical_tail_p_values(null: &[f64], observed: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = null.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    observed
        .iter()
        .map(|&o| empirical_tail_p_value(&sorted, o))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_never_reaches_zero() {
        let null = [1.0, 2.0, 3.0, 4.0];
        let p = empirical_tail_p_values(&null, &[100.0]);
        assert!((p[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn ties_count_as_at_least_as_extreme() {
        let null = [1.0, 2.0, 2.0, 3.0];
        // null >= 2: three draws
        let p = empirical_tail_p_values(&null, &[2.0, 0.0]);
        assert!((p[0] - 0.8).abs() < 1e-12);
        assert_eq!(p[1], 1.0);
    }

    #[test]
    fn unsorted_null_is_sorted_first() {
        let p = empirical_tail_p_values(&[3.0, 1.0, 2.0], &[2.5]);
        assert!((p[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_null_is_uninformative() {
        assert_eq!(empirical_tail_p_values(&[], &[5.0]), vec![1.0]);
        assert_eq!(empirical_tail_p_value(&[1.0], f64::NAN), 1.0);
    }
}
