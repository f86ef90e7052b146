//! CSV boundary: turn source-specific tabular files into clean `TimeSeries`.
//!
//! Input files carry a date column plus one or more numeric columns with
//! source-specific names; normalization to the canonical model happens here
//! and nowhere else.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::AppError;
use crate::series::TimeSeries;

const DATE_FMT: &str = "%Y-%m-%d";

fn csv_err(path: &Path, message: impl Into<String>) -> AppError {
    AppError::Csv {
        path: path.display().to_string(),
        message: message.into(),
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path).map_err(|e| csv_err(path, format!("failed to open: {e}")))?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file))
}

/// Read a two-column file: the first column is the date, the second the
/// value. Rows with an empty or non-numeric value are skipped as missing.
pub fn read_series(path: &Path) -> Result<TimeSeries, AppError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| csv_err(path, format!("failed to read headers: {e}")))?;
    if headers.len() < 2 {
        return Err(csv_err(
            path,
            format!("expected a date column and a value column, got {} columns", headers.len()),
        ));
    }
    read_columns(path, &mut reader, 0, 1)
}

/// Read a named date/value column pair from a file carrying several columns.
pub fn read_series_column(
    path: &Path,
    date_col: &str,
    value_col: &str,
) -> Result<TimeSeries, AppError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|e| csv_err(path, format!("failed to read headers: {e}")))?
        .clone();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| csv_err(path, format!("missing column '{name}'")))
    };
    let date_idx = find(date_col)?;
    let value_idx = find(value_col)?;
    read_columns(path, &mut reader, date_idx, value_idx)
}

fn read_columns(
    path: &Path,
    reader: &mut csv::Reader<File>,
    date_idx: usize,
    value_idx: usize,
) -> Result<TimeSeries, AppError> {
    let mut pairs: Vec<(NaiveDate, f64)> = Vec::new();

    for (row_num, record) in reader.records().enumerate() {
        let line = row_num + 2; // 1-based, after the header row
        let record = record.map_err(|e| csv_err(path, format!("line {line}: {e}")))?;

        let raw_date = record
            .get(date_idx)
            .ok_or_else(|| csv_err(path, format!("line {line}: missing date field")))?;
        let date = NaiveDate::parse_from_str(raw_date, DATE_FMT)
            .map_err(|e| csv_err(path, format!("line {line}: bad date '{raw_date}': {e}")))?;

        let raw_value = record
            .get(value_idx)
            .ok_or_else(|| csv_err(path, format!("line {line}: missing value field")))?;
        if raw_value.is_empty() {
            continue;
        }
        let value: f64 = raw_value
            .parse()
            .map_err(|_| csv_err(path, format!("line {line}: bad value '{raw_value}'")))?;
        if !value.is_finite() {
            continue;
        }

        pairs.push((date, value));
    }

    TimeSeries::from_pairs(pairs)
}
