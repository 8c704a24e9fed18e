//! Series primitives used by the feature builder
//!
//! All functions return a vector aligned index-for-index with the input.
//! Undefined positions (first difference, under-filled windows) are NaN;
//! filling is the caller's decision.

use statrs::statistics::Statistics;

/// Trailing window statistic.
///
/// Position `i` covers `values[i + 1 - window ..= i]` (clamped at 0) and is
/// NaN while fewer than `min_periods` values are available.
fn rolling<F>(values: &[f64], window: usize, min_periods: usize, stat: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            if slice.len() < min_periods {
                f64::NAN
            } else {
                stat(slice)
            }
        })
        .collect()
}

pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, |w| w.iter().mean())
}

/// Sample standard deviation (n - 1). Single-value windows are NaN.
pub fn rolling_std(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, |w| {
        if w.len() < 2 {
            f64::NAN
        } else {
            w.iter().std_dev()
        }
    })
}

pub fn rolling_min(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, |w| {
        w.iter().copied().fold(f64::INFINITY, f64::min)
    })
}

pub fn rolling_max(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling(values, window, min_periods, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// First difference; position 0 is NaN.
pub fn diff(values: &[f64]) -> Vec<f64> {
    std::iter::once(f64::NAN)
        .chain(values.windows(2).map(|pair| pair[1] - pair[0]))
        .take(values.len())
        .collect()
}

/// Relative change `x[i] / x[i-1] - 1`, raw (may hold NaN or ±inf).
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    std::iter::once(f64::NAN)
        .chain(values.windows(2).map(|pair| pair[1] / pair[0] - 1.0))
        .take(values.len())
        .collect()
}

/// Replace ±inf and NaN with 0.
pub fn finite_or_zero(values: &mut [f64]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

/// Element-wise `num / den` with zero denominators treated as undefined.
pub fn safe_ratio(num: &[f64], den: &[f64]) -> Vec<f64> {
    num.iter()
        .zip(den)
        .map(|(&n, &d)| if d == 0.0 { f64::NAN } else { n / d })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rolling_mean_min_periods_one() {
        let out = rolling_mean(&[1.0, 3.0, 5.0, 7.0], 3, 1);
        assert!(close(out[0], 1.0));
        assert!(close(out[1], 2.0));
        assert!(close(out[2], 3.0));
        assert!(close(out[3], 5.0));
    }

    #[test]
    fn test_rolling_std_sample_and_nan_start() {
        let out = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0], 5, 1);
        assert!(out[0].is_nan());
        // std of [2, 4] with ddof = 1
        assert!(close(out[1], 2.0_f64.sqrt()));

        let strict = rolling_std(&[1.0, 2.0, 3.0, 4.0], 3, 3);
        assert!(strict[0].is_nan() && strict[1].is_nan());
        assert!(close(strict[2], 1.0));
        assert!(close(strict[3], 1.0));
    }

    #[test]
    fn test_rolling_extrema() {
        let values = [5.0, 1.0, 4.0, 2.0];
        assert_eq!(rolling_min(&values, 2, 1), vec![5.0, 1.0, 1.0, 2.0]);
        assert_eq!(rolling_max(&values, 2, 1), vec![5.0, 5.0, 4.0, 4.0]);
    }

    #[test]
    fn test_diff_and_pct_change() {
        let d = diff(&[1.0, 4.0, 2.0]);
        assert!(d[0].is_nan());
        assert_eq!(&d[1..], &[3.0, -2.0]);

        let mut p = pct_change(&[0.0, 2.0, 1.0, 0.0, 0.0]);
        assert!(p[0].is_nan());
        assert!(p[1].is_infinite());
        assert!(p[4].is_nan()); // 0 / 0
        finite_or_zero(&mut p);
        assert_eq!(p, vec![0.0, 0.0, -0.5, -1.0, 0.0]);
    }

    #[test]
    fn test_short_inputs() {
        assert!(diff(&[]).is_empty());
        assert_eq!(diff(&[1.0]).len(), 1);
        assert!(rolling_mean(&[], 3, 1).is_empty());
    }

    #[test]
    fn test_safe_ratio_zero_denominator() {
        let r = safe_ratio(&[1.0, 2.0], &[0.0, 4.0]);
        assert!(r[0].is_nan());
        assert!(close(r[1], 0.5));
    }
}
