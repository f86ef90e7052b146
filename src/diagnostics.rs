use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::chart::SeriesRenderer;
use crate::error::AppError;

/// Minimum residual count after cleaning for any diagnostic to run.
const MIN_RESIDUALS: usize = 5;

/// One row of the Ljung-Box result table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LjungBoxRow {
    pub lag: usize,
    pub statistic: f64,
    pub p_value: f64,
}

/// Drop non-finite residuals (the missing-value markers) and require at
/// least [`MIN_RESIDUALS`] valid points. Every diagnostic calls this first.
pub fn prepare_residuals(residuals: &[f64]) -> Result<Vec<f64>, AppError> {
    let cleaned: Vec<f64> = residuals.iter().copied().filter(|v| v.is_finite()).collect();
    if cleaned.len() < MIN_RESIDUALS {
        return Err(AppError::InsufficientData {
            what: "residual diagnostics",
            needed: MIN_RESIDUALS,
            got: cleaned.len(),
        });
    }
    Ok(cleaned)
}

/// Sample autocorrelation function, lags `0..=max_lag`.
///
/// Standard biased estimator: deviations from the sample mean, normalized by
/// the lag-0 sum of squares. A near-constant series returns zero
/// coefficients past lag 0 instead of dividing by zero.
pub fn acf(values: &[f64], max_lag: usize) -> Vec<f64> {
    let n = values.len();
    let max_lag = max_lag.min(n.saturating_sub(1));
    let mean = values.iter().sum::<f64>() / n as f64;
    let denom: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();

    let mut coefficients = Vec::with_capacity(max_lag + 1);
    coefficients.push(1.0);
    for lag in 1..=max_lag {
        if denom.abs() < 1e-12 {
            coefficients.push(0.0);
            continue;
        }
        let cov: f64 = (lag..n)
            .map(|t| (values[t] - mean) * (values[t - lag] - mean))
            .sum();
        coefficients.push(cov / denom);
    }
    coefficients
}

/// Ljung-Box portmanteau test for remaining autocorrelation.
///
/// For each requested lag h: `Q = n(n+2) * sum_{k=1..h} r_k^2 / (n-k)`,
/// with the p-value taken from a chi-squared distribution with h degrees of
/// freedom. Requires strictly more residuals than the largest requested lag.
pub fn ljung_box_test(residuals: &[f64], lags: &[usize]) -> Result<Vec<LjungBoxRow>, AppError> {
    let res = prepare_residuals(residuals)?;

    let Some(&max_lag) = lags.iter().max() else {
        return Ok(Vec::new());
    };
    if lags.contains(&0) {
        return Err(AppError::Series(
            "Ljung-Box lags must be >= 1".to_string(),
        ));
    }
    let n = res.len();
    if n <= max_lag {
        return Err(AppError::InsufficientData {
            what: "Ljung-Box test",
            needed: max_lag + 1,
            got: n,
        });
    }

    let coefficients = acf(&res, max_lag);
    let n_f = n as f64;

    let mut rows = Vec::with_capacity(lags.len());
    for &lag in lags {
        let q = n_f
            * (n_f + 2.0)
            * (1..=lag)
                .map(|k| coefficients[k].powi(2) / (n_f - k as f64))
                .sum::<f64>();
        let dist = ChiSquared::new(lag as f64)
            .map_err(|e| AppError::Series(format!("chi-squared(df={lag}): {e}")))?;
        rows.push(LjungBoxRow {
            lag,
            statistic: q,
            p_value: 1.0 - dist.cdf(q),
        });
    }
    Ok(rows)
}

/// Render the cleaned residual series as a line chart.
pub fn plot_residuals<R: SeriesRenderer>(
    renderer: &mut R,
    residuals: &[f64],
    title: &str,
) -> Result<(), AppError> {
    let res = prepare_residuals(residuals)?;
    renderer.render_values(title, &res)
}

/// Render the residual ACF as a stem chart, computing at most
/// `min(nlags, n - 1)` coefficients so the sample is never asked for more
/// lags than it supports.
pub fn plot_residual_acf<R: SeriesRenderer>(
    renderer: &mut R,
    residuals: &[f64],
    nlags: usize,
    title: &str,
) -> Result<(), AppError> {
    let res = prepare_residuals(residuals)?;
    let max_lag = nlags.min(res.len() - 1);
    renderer.render_stems(title, &acf(&res, max_lag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_drops_missing_markers() {
        let res = prepare_residuals(&[1.0, f64::NAN, 2.0, 3.0, f64::INFINITY, 4.0, 5.0]).unwrap();
        assert_eq!(res, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn prepare_rejects_short_series() {
        let result = prepare_residuals(&[1.0, 2.0, f64::NAN, 3.0, 4.0]);
        assert!(matches!(
            result,
            Err(AppError::InsufficientData { needed: 5, got: 4, .. })
        ));
    }

    #[test]
    fn acf_lag_zero_is_one() {
        let coeffs = acf(&[1.0, 2.0, 1.5, 3.0, 2.5], 3);
        assert!((coeffs[0] - 1.0).abs() < f64::EPSILON);
        assert_eq!(coeffs.len(), 4);
    }

    #[test]
    fn acf_caps_at_sample_size() {
        let coeffs = acf(&[1.0, 2.0, 3.0], 10);
        assert_eq!(coeffs.len(), 3);
    }

    #[test]
    fn acf_of_constant_series_is_zero_past_lag_zero() {
        let coeffs = acf(&[2.0; 10], 3);
        assert!((coeffs[0] - 1.0).abs() < f64::EPSILON);
        assert!(coeffs[1..].iter().all(|c| c.abs() < f64::EPSILON));
    }

    #[test]
    fn ljung_box_requires_more_points_than_max_lag() {
        let res: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let result = ljung_box_test(&res, &[10, 20]);
        assert!(matches!(
            result,
            Err(AppError::InsufficientData { needed: 21, got: 20, .. })
        ));
    }

    #[test]
    fn ljung_box_flags_alternating_series() {
        // A strictly alternating series has strong negative lag-1
        // autocorrelation, so the null must be rejected at lag 1.
        let res: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let rows = ljung_box_test(&res, &[1]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lag, 1);
        assert!(rows[0].statistic > 0.0);
        assert!(rows[0].p_value < 0.01);
    }

    #[test]
    fn ljung_box_rows_follow_requested_lags() {
        let res: Vec<f64> = (0..30).map(|i| ((i * 37) % 11) as f64).collect();
        let rows = ljung_box_test(&res, &[5, 10]).unwrap();
        assert_eq!(rows.iter().map(|r| r.lag).collect::<Vec<_>>(), vec![5, 10]);
        for row in &rows {
            assert!(row.p_value >= 0.0 && row.p_value <= 1.0);
        }
    }

    #[test]
    fn ljung_box_rejects_lag_zero() {
        let res: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(ljung_box_test(&res, &[0, 1]).is_err());
    }
}
