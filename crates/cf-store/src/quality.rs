//! Stored quality reports, one per finished run. Immutable once written.

use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::row_helpers::{format_timestamp, now_utc, parse_optional_decimal, to_i64, to_u64};
use cf_core::{DistributionStats, QualityIssue, QualityReport};
use duckdb::Connection;

/// Write the report of a run.
pub fn insert_report(conn: &Connection, import_id: i64, report: &QualityReport) -> StoreResult<i64> {
    let dist = report.distribution.as_ref();
    let issues = serde_json::to_string(&report.issues)
        .map_err(|e| StoreError::InvalidData(format!("quality issues: {e}")))?;
    let id: i64 = conn
        .query_row(
            "INSERT INTO cf.quality_reports (
                 import_id, total_rows, null_count, null_percentage, duplicate_count,
                 outlier_count, negative_count, domain_violation_count,
                 min_value, max_value, mean_value, median_value, stddev_value,
                 outlier_rule, validation_passed, issues, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                     CAST(? AS DECIMAL(18, 2)), CAST(? AS DECIMAL(18, 2)), ?, ?, ?,
                     ?, ?, ?, CAST(? AS TIMESTAMP))
             RETURNING report_id",
            duckdb::params![
                import_id,
                to_i64(report.total_rows),
                to_i64(report.null_count),
                report.null_percentage,
                to_i64(report.duplicate_count),
                to_i64(report.outlier_count),
                to_i64(report.negative_count),
                to_i64(report.domain_violation_count),
                dist.map(|d| d.min.to_string()),
                dist.map(|d| d.max.to_string()),
                dist.map(|d| d.mean),
                dist.map(|d| d.median),
                dist.map(|d| d.stddev),
                report.outlier_rule,
                report.validation_passed,
                issues,
                format_timestamp(&now_utc())
            ],
            |row| row.get(0),
        )
        .query_context("insert quality_reports")?;
    Ok(id)
}

/// The report of a run, if one was written.
pub fn get_report(conn: &Connection, import_id: i64) -> StoreResult<Option<QualityReport>> {
    let result = conn.query_row(
        "SELECT total_rows, null_count, null_percentage, duplicate_count, outlier_count,
                negative_count, domain_violation_count,
                CAST(min_value AS VARCHAR), CAST(max_value AS VARCHAR),
                mean_value, median_value, stddev_value,
                outlier_rule, validation_passed, issues
         FROM cf.quality_reports WHERE import_id = ?",
        duckdb::params![import_id],
        |row| {
            Ok(RawReport {
                counts: [
                    row.get(0)?,
                    row.get(1)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ],
                null_percentage: row.get(2)?,
                min: row.get(7)?,
                max: row.get(8)?,
                mean: row.get(9)?,
                median: row.get(10)?,
                stddev: row.get(11)?,
                outlier_rule: row.get(12)?,
                validation_passed: row.get(13)?,
                issues: row.get(14)?,
            })
        },
    );
    match result {
        Ok(raw) => raw.into_report().map(Some),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::QueryError(format!("read quality_reports: {e}"))),
    }
}

struct RawReport {
    counts: [i64; 6],
    null_percentage: f64,
    min: Option<String>,
    max: Option<String>,
    mean: Option<f64>,
    median: Option<f64>,
    stddev: Option<f64>,
    outlier_rule: String,
    validation_passed: bool,
    issues: String,
}

impl RawReport {
    fn into_report(self) -> StoreResult<QualityReport> {
        let [total_rows, null_count, duplicate_count, outlier_count, negative_count, domain_violation_count] =
            self.counts.map(to_u64);
        let min = parse_optional_decimal(self.min)?;
        let max = parse_optional_decimal(self.max)?;
        let distribution = match (min, max) {
            (Some(min), Some(max)) => Some(DistributionStats {
                min,
                max,
                mean: self.mean.unwrap_or_default(),
                median: self.median.unwrap_or_default(),
                stddev: self.stddev.unwrap_or_default(),
            }),
            _ => None,
        };
        let issues: Vec<QualityIssue> = serde_json::from_str(&self.issues)
            .map_err(|e| StoreError::InvalidData(format!("quality issues: {e}")))?;
        Ok(QualityReport {
            total_rows,
            null_count,
            null_percentage: self.null_percentage,
            duplicate_count,
            outlier_count,
            negative_count,
            domain_violation_count,
            distribution,
            outlier_rule: self.outlier_rule,
            validation_passed: self.validation_passed,
            issues,
        })
    }
}

#[cfg(test)]
#[path = "quality_test.rs"]
mod tests;
