use crate::error::AppError;
use crate::regime::classify_regimes;
use crate::series::TimeSeries;
use crate::store::{
    upsert_forecast, upsert_model_performance, upsert_regime, ForecastRow, ModelPerformanceRow,
    TableCounts, VolatilityStore,
};

/// What to do when a single row upsert fails mid-batch.
///
/// `Abort` rolls back the in-flight transaction and surfaces the failing
/// key; `Continue` commits the healthy subset and reports the failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

impl FailurePolicy {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "abort" => Some(FailurePolicy::Abort),
            "continue" => Some(FailurePolicy::Continue),
            _ => None,
        }
    }
}

/// A row that failed to persist, with the key that identifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub key: String,
    pub message: String,
}

/// Per-batch outcome of one load operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub upserted: usize,
    pub failures: Vec<RowFailure>,
}

/// Read-only verification summary: row counts plus samples.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub counts: TableCounts,
    pub recent_forecasts: Vec<ForecastRow>,
    pub performance_by_mae: Vec<ModelPerformanceRow>,
}

/// Merge daily forecasts with realised volatility (inner join) and the
/// smoothed forecast (left join), deriving the error fields.
///
/// Dates with no realised counterpart are dropped. Dates outside the
/// smoothed series (its warm-up window) keep the row with the smoothed
/// fields absent.
pub fn merge_forecasts(
    daily: &TimeSeries,
    realised: &TimeSeries,
    smoothed: &TimeSeries,
) -> Vec<ForecastRow> {
    let joined = daily.inner_join(realised);
    if joined.is_empty() {
        tracing::warn!(
            daily_len = daily.len(),
            realised_len = realised.len(),
            "no matching dates between daily forecasts and realised volatility"
        );
        return Vec::new();
    }

    joined
        .into_iter()
        .map(|(date, forecast, realised_vol)| {
            let error = forecast - realised_vol;
            let smoothed_val = smoothed.value_at(date);
            let smoothed_error = smoothed_val.map(|s| s - realised_vol);
            ForecastRow {
                date,
                garch_forecast: forecast,
                realised_volatility: realised_vol,
                forecast_error: error,
                abs_error: error.abs(),
                garch_21d_smoothed: smoothed_val,
                smoothed_error,
                smoothed_abs_error: smoothed_error.map(f64::abs),
            }
        })
        .collect()
}

fn run_batch<T>(
    store: &mut VolatilityStore,
    rows: &[T],
    policy: FailurePolicy,
    upsert: impl Fn(&rusqlite::Connection, &T) -> Result<(), AppError>,
    key: impl Fn(&T) -> String,
) -> Result<BatchReport, AppError> {
    let tx = store.transaction()?;
    let mut report = BatchReport {
        attempted: rows.len(),
        ..BatchReport::default()
    };

    for row in rows {
        match upsert(&tx, row) {
            Ok(()) => report.upserted += 1,
            Err(e) => match policy {
                FailurePolicy::Abort => {
                    tracing::error!(key = %key(row), error = %e, "row upsert failed, aborting batch");
                    tx.rollback()?;
                    return Err(e);
                }
                FailurePolicy::Continue => {
                    tracing::warn!(key = %key(row), error = %e, "row upsert failed, continuing");
                    report.failures.push(RowFailure {
                        key: key(row),
                        message: e.to_string(),
                    });
                }
            },
        }
    }

    tx.commit()?;
    Ok(report)
}

/// Merge the forecast inputs and upsert one row per date.
pub fn load_volatility_forecasts(
    store: &mut VolatilityStore,
    daily: &TimeSeries,
    realised: &TimeSeries,
    smoothed: &TimeSeries,
    policy: FailurePolicy,
) -> Result<BatchReport, AppError> {
    let rows = merge_forecasts(daily, realised, smoothed);
    tracing::info!(
        daily_len = daily.len(),
        realised_len = realised.len(),
        smoothed_len = smoothed.len(),
        merged = rows.len(),
        "loading volatility forecasts"
    );
    let report = run_batch(store, &rows, policy, upsert_forecast, |r| {
        r.date.to_string()
    })?;
    tracing::info!(upserted = report.upserted, "loaded volatility_forecasts");
    Ok(report)
}

/// Upsert the supplied (not recomputed) model-performance table.
pub fn load_model_performance(
    store: &mut VolatilityStore,
    rows: &[ModelPerformanceRow],
    policy: FailurePolicy,
) -> Result<BatchReport, AppError> {
    tracing::info!(models = rows.len(), "loading model performance");
    let report = run_batch(store, rows, policy, upsert_model_performance, |r| {
        r.model_name.clone()
    })?;
    tracing::info!(upserted = report.upserted, "loaded model_performance");
    Ok(report)
}

/// Classify the realised-volatility series into regimes and upsert one row
/// per date.
pub fn load_volatility_regimes(
    store: &mut VolatilityStore,
    realised: &TimeSeries,
    policy: FailurePolicy,
) -> Result<BatchReport, AppError> {
    let rows = classify_regimes(realised);
    tracing::info!(rows = rows.len(), "loading volatility regimes");
    let report = run_batch(store, &rows, policy, upsert_regime, |r| r.date.to_string())?;
    tracing::info!(upserted = report.upserted, "loaded volatility_regimes");
    Ok(report)
}

/// Read-only smoke check: row counts, the most recent forecast rows, and
/// the performance table ranked by MAE.
pub fn verify_data(store: &VolatilityStore) -> Result<VerificationReport, AppError> {
    let counts = store.counts()?;
    let recent_forecasts = store.recent_forecasts(3)?;
    let performance_by_mae = store.performance_by_mae()?;

    tracing::info!(
        forecasts = counts.forecasts,
        performance = counts.performance,
        regimes = counts.regimes,
        "verified table counts"
    );
    for row in &performance_by_mae {
        tracing::info!(model = %row.model_name, mae = row.mae, rmse = row.rmse, "model performance");
    }

    Ok(VerificationReport {
        counts,
        recent_forecasts,
        performance_by_mae,
    })
}

/// Run the three load operations then verification, in that fixed order.
///
/// Each load is its own transaction; there is no cross-operation atomicity,
/// and a failure in one operation stops the run before the next.
pub fn run(
    store: &mut VolatilityStore,
    daily: &TimeSeries,
    realised: &TimeSeries,
    smoothed: &TimeSeries,
    performance: &[ModelPerformanceRow],
    policy: FailurePolicy,
) -> Result<VerificationReport, AppError> {
    load_volatility_forecasts(store, daily, realised, smoothed, policy)?;
    load_model_performance(store, performance, policy)?;
    load_volatility_regimes(store, realised, policy)?;
    verify_data(store)
}

/// The comparison table from the prior offline evaluation run. Values are
/// supplied as-is; nothing here recomputes them.
pub fn reference_model_performance() -> Vec<ModelPerformanceRow> {
    let rows = [
        ("Naive Persistence", 0.000351, 0.000592),
        ("ETS", 0.000351, 0.000592),
        ("GARCH Daily", 0.001444, 0.001963),
        ("GARCH 21d Smoothed", 0.000974, 0.001222),
    ];
    rows.into_iter()
        .map(|(name, mae, rmse)| ModelPerformanceRow {
            model_name: name.to_string(),
            evaluation_period: "2022-2024".to_string(),
            mae,
            rmse,
            observation_count: 753,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn series(days: &[(u32, f64)]) -> TimeSeries {
        TimeSeries::from_pairs(days.iter().map(|&(day, v)| (d(day), v)).collect()).unwrap()
    }

    #[test]
    fn merge_drops_dates_without_realised_values() {
        let daily = series(&[(1, 0.010), (2, 0.011), (3, 0.012)]);
        let realised = series(&[(2, 0.009), (3, 0.013)]);
        let smoothed = TimeSeries::new();

        let rows = merge_forecasts(&daily, &realised, &smoothed);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2));
        assert!((rows[0].forecast_error - 0.002).abs() < 1e-12);
        assert!((rows[0].abs_error - 0.002).abs() < 1e-12);
        assert!(rows[0].garch_21d_smoothed.is_none());
    }

    #[test]
    fn merge_keeps_rows_through_smoothing_warmup() {
        let daily = series(&[(1, 0.010), (2, 0.011), (3, 0.012)]);
        let realised = series(&[(1, 0.010), (2, 0.010), (3, 0.010)]);
        // Smoothed output only exists from day 3 (warm-up window).
        let smoothed = series(&[(3, 0.011)]);

        let rows = merge_forecasts(&daily, &realised, &smoothed);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].garch_21d_smoothed.is_none());
        assert!(rows[0].smoothed_error.is_none());
        assert!(rows[1].garch_21d_smoothed.is_none());
        let last = &rows[2];
        assert_eq!(last.garch_21d_smoothed, Some(0.011));
        assert!((last.smoothed_error.unwrap() - 0.001).abs() < 1e-12);
        assert!((last.smoothed_abs_error.unwrap() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn merge_with_no_overlap_is_empty() {
        let daily = series(&[(1, 0.010)]);
        let realised = series(&[(2, 0.009)]);
        let rows = merge_forecasts(&daily, &realised, &TimeSeries::new());
        assert!(rows.is_empty());
    }

    #[test]
    fn failure_policy_parses_known_labels() {
        assert_eq!(FailurePolicy::parse("abort"), Some(FailurePolicy::Abort));
        assert_eq!(
            FailurePolicy::parse("continue"),
            Some(FailurePolicy::Continue)
        );
        assert_eq!(FailurePolicy::parse("retry"), None);
    }
}
