//! Column conversions applied to merged tables: epoch dates and billable hours

use chrono::{DateTime, NaiveDate};
use thiserror::Error;
use tracing::warn;

use crate::table::Table;

#[derive(Debug, Error, PartialEq)]
pub enum ConvertError {
    #[error("value '{0}' is not a Unix timestamp")]
    NotATimestamp(String),
    #[error("timestamp {0} is out of range")]
    OutOfRange(String),
    #[error("value '{0}' is not a number of seconds")]
    NotSeconds(String),
}

/// Convert every column whose name contains "date" from epoch seconds to
/// `YYYY-MM-DD`. A column with any unconvertible value is left untouched.
/// Returns the names of the columns that were converted.
pub fn convert_date_columns(table: &mut Table) -> Vec<String> {
    convert_columns(table, "date", epoch_to_date, "date")
}

/// Convert every column whose name contains "billable" from seconds to hours
pub fn convert_hour_columns(table: &mut Table) -> Vec<String> {
    convert_columns(table, "billable", seconds_to_hours, "hours")
}

fn convert_columns(
    table: &mut Table,
    needle: &str,
    convert: fn(&str) -> Result<String, ConvertError>,
    target: &str,
) -> Vec<String> {
    let mut converted = Vec::new();
    for idx in 0..table.columns.len() {
        let column = &table.columns[idx];
        if !column.to_lowercase().contains(needle) {
            continue;
        }

        let values: Result<Vec<Option<String>>, ConvertError> = table
            .column_values(idx)
            .map(|cell| cell.map(convert).transpose())
            .collect();

        match values {
            Ok(values) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
                converted.push(column.clone());
            }
            Err(e) => warn!("Error converting column {} to {}: {}", column, target, e),
        }
    }
    converted
}

/// Epoch seconds (integer or decimal text) to `YYYY-MM-DD` in UTC.
/// Values already in `YYYY-MM-DD` form pass through unchanged.
pub fn epoch_to_date(value: &str) -> Result<String, ConvertError> {
    let value = value.trim();
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return Ok(value.to_string());
    }

    let seconds = match value.parse::<i64>() {
        Ok(s) => s,
        Err(_) => {
            let f: f64 = value
                .parse()
                .map_err(|_| ConvertError::NotATimestamp(value.to_string()))?;
            if !f.is_finite() {
                return Err(ConvertError::NotATimestamp(value.to_string()));
            }
            f.floor() as i64
        }
    };

    let datetime = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| ConvertError::OutOfRange(value.to_string()))?;
    Ok(datetime.format("%Y-%m-%d").to_string())
}

pub fn seconds_to_hours(value: &str) -> Result<String, ConvertError> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| ConvertError::NotSeconds(value.to_string()))?;
    Ok((seconds / 3600.0).to_string())
}
