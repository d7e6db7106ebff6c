//! Shared helpers for moving values between Rust and DuckDB rows.
//!
//! Decimals travel as text (`CAST(? AS DECIMAL(18, 2))` on the way in,
//! `CAST(col AS VARCHAR)` on the way out) and so do timestamps, which keeps
//! the driver's type mapping out of the picture.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Current time, truncated to the microsecond precision DuckDB stores.
pub(crate) fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    let micros = now.timestamp_micros();
    DateTime::from_timestamp_micros(micros).unwrap_or(now)
}

/// Format a timestamp for binding with `CAST(? AS TIMESTAMP)`.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp read back with `CAST(col AS VARCHAR)`.
pub(crate) fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::InvalidData(format!("timestamp '{s}': {e}")))
}

pub(crate) fn parse_optional_timestamp(s: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

/// Parse a decimal read back with `CAST(col AS VARCHAR)`.
pub(crate) fn parse_decimal(s: &str) -> StoreResult<Decimal> {
    Decimal::from_str(s.trim())
        .map_err(|e| StoreError::InvalidData(format!("decimal '{s}': {e}")))
}

pub(crate) fn parse_optional_decimal(s: Option<String>) -> StoreResult<Option<Decimal>> {
    s.as_deref().map(parse_decimal).transpose()
}

/// Read a column value as a String, trying multiple DuckDB types.
///
/// DuckDB integer columns return `None` for `Option<String>`, so we try
/// String -> i64 -> f64 -> bool -> "null".
pub(crate) fn get_column_as_string(row: &duckdb::Row<'_>, idx: usize) -> String {
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return s;
    }
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return n.to_string();
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return f.to_string();
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return b.to_string();
    }
    "null".to_string()
}

/// Clamp an unsigned counter into a BIGINT column.
pub(crate) fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Read a non-negative BIGINT counter.
pub(crate) fn to_u64(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

#[cfg(test)]
#[path = "row_helpers_test.rs"]
mod tests;
