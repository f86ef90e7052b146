use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;
use crate::regime::{Regime, RegimeRow};

/// One evaluated forecast observation. Smoothed fields are absent for the
/// warm-up window of the 21-day smoother.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub garch_forecast: f64,
    pub realised_volatility: f64,
    pub forecast_error: f64,
    pub abs_error: f64,
    pub garch_21d_smoothed: Option<f64>,
    pub smoothed_error: Option<f64>,
    pub smoothed_abs_error: Option<f64>,
}

/// Precomputed evaluation summary for one model, keyed by model name.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPerformanceRow {
    pub model_name: String,
    pub evaluation_period: String,
    pub mae: f64,
    pub rmse: f64,
    pub observation_count: i64,
}

/// Row counts per persisted table, for the verification smoke check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub forecasts: usize,
    pub performance: usize,
    pub regimes: usize,
}

/// Exclusively-owned handle to the SQLite store. Opened once per run and
/// released on every exit path when dropped.
pub struct VolatilityStore {
    conn: Connection,
}

const DATE_FMT: &str = "%Y-%m-%d";

impl VolatilityStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Start a transaction spanning one batch of upserts.
    pub fn transaction(&mut self) -> Result<rusqlite::Transaction<'_>, AppError> {
        Ok(self.conn.transaction()?)
    }

    pub fn counts(&self) -> Result<TableCounts, AppError> {
        let count = |table: &str| -> Result<usize, rusqlite::Error> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|n| n as usize)
        };
        Ok(TableCounts {
            forecasts: count("volatility_forecasts")?,
            performance: count("model_performance")?,
            regimes: count("volatility_regimes")?,
        })
    }

    pub fn forecast(&self, date: NaiveDate) -> Result<Option<ForecastRow>, AppError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, garch_forecast, realised_volatility, forecast_error,
                   abs_error, garch_21d_smoothed, smoothed_error, smoothed_abs_error
            FROM volatility_forecasts
            WHERE date = ?1
            "#,
        )?;
        Ok(stmt
            .query_row([date.format(DATE_FMT).to_string()], forecast_from_row)
            .optional()?)
    }

    /// The most recent forecast rows, newest first.
    pub fn recent_forecasts(&self, limit: usize) -> Result<Vec<ForecastRow>, AppError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, garch_forecast, realised_volatility, forecast_error,
                   abs_error, garch_21d_smoothed, smoothed_error, smoothed_abs_error
            FROM volatility_forecasts
            ORDER BY date DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], forecast_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The performance table ordered by MAE ascending (best model first).
    pub fn performance_by_mae(&self) -> Result<Vec<ModelPerformanceRow>, AppError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT model_name, evaluation_period, mae, rmse, observation_count
            FROM model_performance
            ORDER BY mae ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ModelPerformanceRow {
                model_name: row.get(0)?,
                evaluation_period: row.get(1)?,
                mae: row.get(2)?,
                rmse: row.get(3)?,
                observation_count: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn regime(&self, date: NaiveDate) -> Result<Option<RegimeRow>, AppError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT date, realised_volatility, regime, percentile_rank
            FROM volatility_regimes
            WHERE date = ?1
            "#,
        )?;
        Ok(stmt
            .query_row([date.format(DATE_FMT).to_string()], regime_from_row)
            .optional()?)
    }
}

fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS volatility_forecasts (
            date TEXT PRIMARY KEY,
            garch_forecast REAL NOT NULL,
            realised_volatility REAL NOT NULL,
            forecast_error REAL NOT NULL,
            abs_error REAL NOT NULL,
            garch_21d_smoothed REAL,
            smoothed_error REAL,
            smoothed_abs_error REAL
        );

        CREATE TABLE IF NOT EXISTS model_performance (
            model_name TEXT PRIMARY KEY,
            evaluation_period TEXT NOT NULL,
            mae REAL NOT NULL,
            rmse REAL NOT NULL,
            observation_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS volatility_regimes (
            date TEXT PRIMARY KEY,
            realised_volatility REAL NOT NULL,
            regime TEXT NOT NULL,
            percentile_rank REAL NOT NULL
        );
        "#,
    )
}

/// Insert-or-overwrite one forecast row, keyed by date.
pub fn upsert_forecast(conn: &Connection, row: &ForecastRow) -> Result<(), AppError> {
    conn.execute(
        r#"
        INSERT INTO volatility_forecasts (
            date, garch_forecast, realised_volatility, forecast_error,
            abs_error, garch_21d_smoothed, smoothed_error, smoothed_abs_error
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(date) DO UPDATE SET
            garch_forecast = excluded.garch_forecast,
            realised_volatility = excluded.realised_volatility,
            forecast_error = excluded.forecast_error,
            abs_error = excluded.abs_error,
            garch_21d_smoothed = excluded.garch_21d_smoothed,
            smoothed_error = excluded.smoothed_error,
            smoothed_abs_error = excluded.smoothed_abs_error
        "#,
        params![
            row.date.format(DATE_FMT).to_string(),
            row.garch_forecast,
            row.realised_volatility,
            row.forecast_error,
            row.abs_error,
            row.garch_21d_smoothed,
            row.smoothed_error,
            row.smoothed_abs_error,
        ],
    )
    .map_err(|e| AppError::persistence(row.date.format(DATE_FMT).to_string(), e))?;
    Ok(())
}

/// Insert-or-overwrite one model-performance row, keyed by model name.
pub fn upsert_model_performance(
    conn: &Connection,
    row: &ModelPerformanceRow,
) -> Result<(), AppError> {
    conn.execute(
        r#"
        INSERT INTO model_performance (
            model_name, evaluation_period, mae, rmse, observation_count
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(model_name) DO UPDATE SET
            evaluation_period = excluded.evaluation_period,
            mae = excluded.mae,
            rmse = excluded.rmse,
            observation_count = excluded.observation_count
        "#,
        params![
            row.model_name,
            row.evaluation_period,
            row.mae,
            row.rmse,
            row.observation_count,
        ],
    )
    .map_err(|e| AppError::persistence(row.model_name.clone(), e))?;
    Ok(())
}

/// Insert-or-overwrite one regime row, keyed by date.
pub fn upsert_regime(conn: &Connection, row: &RegimeRow) -> Result<(), AppError> {
    conn.execute(
        r#"
        INSERT INTO volatility_regimes (
            date, realised_volatility, regime, percentile_rank
        ) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(date) DO UPDATE SET
            realised_volatility = excluded.realised_volatility,
            regime = excluded.regime,
            percentile_rank = excluded.percentile_rank
        "#,
        params![
            row.date.format(DATE_FMT).to_string(),
            row.realised_volatility,
            row.regime.as_str(),
            row.percentile_rank,
        ],
    )
    .map_err(|e| AppError::persistence(row.date.format(DATE_FMT).to_string(), e))?;
    Ok(())
}

fn parse_date(column: usize, raw: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(raw, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn forecast_from_row(row: &rusqlite::Row<'_>) -> Result<ForecastRow, rusqlite::Error> {
    let date: String = row.get(0)?;
    Ok(ForecastRow {
        date: parse_date(0, &date)?,
        garch_forecast: row.get(1)?,
        realised_volatility: row.get(2)?,
        forecast_error: row.get(3)?,
        abs_error: row.get(4)?,
        garch_21d_smoothed: row.get(5)?,
        smoothed_error: row.get(6)?,
        smoothed_abs_error: row.get(7)?,
    })
}

fn regime_from_row(row: &rusqlite::Row<'_>) -> Result<RegimeRow, rusqlite::Error> {
    let date: String = row.get(0)?;
    let label: String = row.get(2)?;
    let regime = Regime::parse(&label).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown regime label '{label}'").into(),
        )
    })?;
    Ok(RegimeRow {
        date: parse_date(0, &date)?,
        realised_volatility: row.get(1)?,
        regime,
        percentile_rank: row.get(3)?,
    })
}
