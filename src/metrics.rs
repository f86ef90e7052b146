use crate::error::AppError;
use crate::series::TimeSeries;

/// Forecast-accuracy summary over the inner join of a true/predicted pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub n_obs: usize,
}

/// MAE and RMSE between a true and a predicted series.
///
/// The two series are inner-joined on date first; unmatched points are
/// discarded silently. An empty join is an error rather than a NaN result.
pub fn regression_metrics(
    y_true: &TimeSeries,
    y_pred: &TimeSeries,
) -> Result<RegressionMetrics, AppError> {
    let joined = y_true.inner_join(y_pred);
    if joined.is_empty() {
        return Err(AppError::EmptyOverlap("regression metrics"));
    }

    let n = joined.len() as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    for (_, t, p) in &joined {
        let err = t - p;
        abs_sum += err.abs();
        sq_sum += err * err;
    }

    Ok(RegressionMetrics {
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        n_obs: joined.len(),
    })
}

/// Score the naive persistence baseline: the forecast for each observation
/// is the previous observation's realised value. The first observation has
/// no lagged predecessor and is dropped from both sides.
pub fn naive_volatility_metrics(realised_vol: &TimeSeries) -> Result<RegressionMetrics, AppError> {
    let points: Vec<_> = realised_vol.iter().copied().collect();
    if points.len() < 2 {
        return Err(AppError::InsufficientData {
            what: "naive volatility baseline",
            needed: 2,
            got: points.len(),
        });
    }

    let y_true = TimeSeries::from_pairs(points[1..].to_vec())?;
    let y_pred = TimeSeries::from_pairs(
        points
            .windows(2)
            .map(|w| (w[1].0, w[0].1))
            .collect(),
    )?;

    regression_metrics(&y_true, &y_pred)
}
