//! Per-record validation errors of a run. Append-only.

use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::row_helpers::{format_timestamp, now_utc, parse_timestamp, to_u64};
use cf_core::{ErrorKind, RecordError};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde::Serialize;

/// A stored validation error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredValidationError {
    pub error_id: i64,
    pub import_id: i64,
    /// Zero-based position of the record in its batch
    pub record_index: u64,
    pub error: RecordError,
    pub raw_record: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Error count per (kind, field) for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSummaryRow {
    pub kind: ErrorKind,
    pub field: String,
    pub count: u64,
}

/// Append one validation error.
pub fn append(
    conn: &Connection,
    import_id: i64,
    record_index: u64,
    error: &RecordError,
    raw_record: &serde_json::Value,
) -> StoreResult<i64> {
    let id: i64 = conn
        .query_row(
            "INSERT INTO cf.validation_errors
                 (import_id, record_index, field_name, error_type, message, raw_value, raw_record, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))
             RETURNING error_id",
            duckdb::params![
                import_id,
                crate::row_helpers::to_i64(record_index),
                error.field,
                error.kind.as_str(),
                error.message,
                error.raw_value,
                raw_record.to_string(),
                format_timestamp(&now_utc())
            ],
            |row| row.get(0),
        )
        .query_context("insert validation_errors")?;
    Ok(id)
}

/// All errors of a run, in record order.
pub fn by_import(conn: &Connection, import_id: i64) -> StoreResult<Vec<StoredValidationError>> {
    let mut stmt = conn
        .prepare(
            "SELECT error_id, import_id, record_index, field_name, error_type, message,
                    raw_value, raw_record, CAST(created_at AS VARCHAR)
             FROM cf.validation_errors
             WHERE import_id = ?
             ORDER BY record_index, error_id",
        )
        .query_context("prepare validation_errors")?;
    type Row = (i64, i64, i64, String, String, String, Option<String>, String, String);
    let rows: Vec<Row> = stmt
        .query_map(duckdb::params![import_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })
        .query_context("query validation_errors")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect validation_errors")?;

    rows.into_iter()
        .map(
            |(error_id, import_id, index, field, kind, message, raw_value, raw_record, created)| {
                Ok(StoredValidationError {
                    error_id,
                    import_id,
                    record_index: to_u64(index),
                    error: RecordError {
                        kind: parse_kind(&kind)?,
                        field,
                        message,
                        raw_value,
                    },
                    raw_record: serde_json::from_str(&raw_record).map_err(|e| {
                        StoreError::InvalidData(format!("raw record of error {error_id}: {e}"))
                    })?,
                    created_at: parse_timestamp(&created)?,
                })
            },
        )
        .collect()
}

/// Errors of a run grouped by kind and field, most frequent first.
pub fn summary(conn: &Connection, import_id: i64) -> StoreResult<Vec<ErrorSummaryRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT error_type, field_name, COUNT(*) AS n
             FROM cf.validation_errors
             WHERE import_id = ?
             GROUP BY error_type, field_name
             ORDER BY n DESC, error_type, field_name",
        )
        .query_context("prepare error summary")?;
    let rows: Vec<(String, String, i64)> = stmt
        .query_map(duckdb::params![import_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .query_context("query error summary")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect error summary")?;

    rows.into_iter()
        .map(|(kind, field, count)| {
            Ok(ErrorSummaryRow {
                kind: parse_kind(&kind)?,
                field,
                count: to_u64(count),
            })
        })
        .collect()
}

fn parse_kind(raw: &str) -> StoreResult<ErrorKind> {
    raw.parse()
        .map_err(|e| StoreError::InvalidData(format!("{e}")))
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod tests;
