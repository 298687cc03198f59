//! Sliding-window sums via prefix-sum differences.
//!
//! This runs once per window length per calibration iteration, so it is
//! O(n) regardless of window length and can write into a reused buffer.

/// Sums of every `window` consecutive values; `values.len() - window + 1`
/// outputs, or none when the window is longer than the input.
///
/// # Panics
///
/// Panics if `window` is 0.
pub fn rolling_sum(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::new();
    rolling_sum_into(values, window, &mut out);
    out
}

/// Same as [`rolling_sum`] but writes into `out`, clearing it first.
///
/// # Panics
///
/// Panics if `window` is 0.
pub fn rolling_sum_into(values: &[f64], window: usize, out: &mut Vec<f64>) {
    assert!(window >= 1, "window must be >= 1");
    out.clear();
    let n = values.len();
    if window > n {
        return;
    }
    out.reserve(n - window + 1);

    // prefix[i] = sum(values[..i]); out[j] = prefix[j + window] - prefix[j]
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in values {
        acc += v;
        prefix.push(acc);
    }
    for start in 0..=(n - window) {
        out.push(prefix[start + window] - prefix[start]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_sum_basic() {
        let out = rolling_sum(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn rolling_sum_full_and_unit_window() {
        let values = [4.0, 0.0, 2.5];
        assert_eq!(rolling_sum(&values, 3), vec![6.5]);
        assert_eq!(rolling_sum(&values, 1), values.to_vec());
    }

    #[test]
    fn rolling_sum_window_longer_than_input_is_empty() {
        assert!(rolling_sum(&[1.0, 2.0], 5).is_empty());
        assert!(rolling_sum(&[], 1).is_empty());
    }

    #[test]
    #[should_panic(expected = "window must be >= 1")]
    fn rolling_sum_zero_window_panics() {
        let _ = rolling_sum(&[1.0, 2.0], 0);
    }

    #[test]
    fn rolling_sum_into_reuses_buffer() {
        let mut buf = vec![99.0; 10];
        rolling_sum_into(&[1.0, 1.0, 1.0], 2, &mut buf);
        assert_eq!(buf, vec![2.0, 2.0]);
    }
}
