//! Typed accessors for the read-model views.
//!
//! Every accessor is a pure read of the `cf.v_*` views, so facts of a run
//! that is still RUNNING never show up here.

use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::row_helpers::{
    parse_decimal, parse_optional_decimal, parse_optional_timestamp, parse_timestamp, to_u64,
};
use cf_core::{CostCategory, RunCounts, RunStatus, UnitLevel};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

fn query_rows<T, F>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn duckdb::ToSql],
    context: &str,
    f: F,
) -> StoreResult<Vec<T>>
where
    F: FnMut(&duckdb::Row<'_>) -> duckdb::Result<T>,
{
    let mut stmt = conn.prepare(sql).query_context(context)?;
    let rows = stmt
        .query_map(params, f)
        .query_context(context)?
        .collect::<Result<Vec<_>, _>>()
        .query_context(context)?;
    Ok(rows)
}

fn parse_label<T>(raw: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| StoreError::InvalidData(e.to_string()))
}

/// One row of `cf.v_costs_full`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostRow {
    pub unit_code: String,
    pub unit_name: String,
    pub unit_level: UnitLevel,
    pub cost_type_code: String,
    pub cost_type_name: String,
    pub category: CostCategory,
    pub year: i32,
    pub value: Decimal,
    /// Presentation scaling of `value` (thousands of PLN to PLN)
    pub value_x1000: Decimal,
    pub import_id: i64,
}

/// Fact listing with dimension labels, optionally filtered by year and level.
pub fn costs_full(
    conn: &Connection,
    year: Option<i32>,
    level: Option<UnitLevel>,
) -> StoreResult<Vec<CostRow>> {
    let level = level.map(|l| l.as_str());
    type Raw = (String, String, String, String, String, String, i32, String, String, i64);
    let rows: Vec<Raw> = query_rows(
        conn,
        "SELECT unit_code, unit_name, unit_level, cost_type_code, cost_type_name, category, year,
                CAST(value AS VARCHAR), CAST(value_x1000 AS VARCHAR), import_id
         FROM cf.v_costs_full
         WHERE (CAST(? AS INTEGER) IS NULL OR year = CAST(? AS INTEGER))
           AND (CAST(? AS VARCHAR) IS NULL OR unit_level = CAST(? AS VARCHAR))
         ORDER BY year, unit_code, cost_type_code",
        &[&year, &year, &level, &level],
        "v_costs_full",
        |row| {
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
                row.get(9)?,
            ))
        },
    )?;

    rows.into_iter()
        .map(|(unit_code, unit_name, level, cost_type_code, cost_type_name, category, year, value, scaled, import_id)| {
            Ok(CostRow {
                unit_code,
                unit_name,
                unit_level: parse_label(&level)?,
                cost_type_code,
                cost_type_name,
                category: parse_label(&category)?,
                year,
                value: parse_decimal(&value)?,
                value_x1000: parse_decimal(&scaled)?,
                import_id,
            })
        })
        .collect()
}

/// One row of `cf.v_province_costs`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvinceCostRow {
    pub province_code: String,
    pub province_name: String,
    pub year: i32,
    pub district_count: u64,
    /// Sum over the province's districts
    pub district_total: Decimal,
    /// Sum of the values reported for the province itself
    pub province_total: Decimal,
}

/// Province-level aggregation, optionally for one year.
pub fn province_costs(conn: &Connection, year: Option<i32>) -> StoreResult<Vec<ProvinceCostRow>> {
    let rows: Vec<(String, String, i32, i64, String, String)> = query_rows(
        conn,
        "SELECT province_code, province_name, year, district_count,
                CAST(district_total AS VARCHAR), CAST(province_total AS VARCHAR)
         FROM cf.v_province_costs
         WHERE CAST(? AS INTEGER) IS NULL OR year = CAST(? AS INTEGER)
         ORDER BY year, province_code",
        &[&year, &year],
        "v_province_costs",
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        },
    )?;

    rows.into_iter()
        .map(|(code, name, year, districts, district_total, province_total)| {
            Ok(ProvinceCostRow {
                province_code: code,
                province_name: name,
                year,
                district_count: to_u64(districts),
                district_total: parse_decimal(&district_total)?,
                province_total: parse_decimal(&province_total)?,
            })
        })
        .collect()
}

/// One row of `cf.v_yearly_trend`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub unit_level: UnitLevel,
    pub category: CostCategory,
    pub year: i32,
    pub total_value: Decimal,
    pub previous_value: Option<Decimal>,
    /// Percent change against the previous year; `None` for the first year
    /// or when the previous total is zero
    pub pct_change: Option<f64>,
}

/// Year-over-year totals per level and category.
pub fn yearly_trend(conn: &Connection) -> StoreResult<Vec<TrendRow>> {
    let rows: Vec<(String, String, i32, String, Option<String>, Option<f64>)> = query_rows(
        conn,
        "SELECT unit_level, category, year, CAST(total_value AS VARCHAR),
                CAST(previous_value AS VARCHAR), pct_change
         FROM cf.v_yearly_trend
         ORDER BY unit_level, category, year",
        &[],
        "v_yearly_trend",
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        },
    )?;

    rows.into_iter()
        .map(|(level, category, year, total, previous, pct_change)| {
            Ok(TrendRow {
                unit_level: parse_label(&level)?,
                category: parse_label(&category)?,
                year,
                total_value: parse_decimal(&total)?,
                previous_value: parse_optional_decimal(previous)?,
                pct_change,
            })
        })
        .collect()
}

/// One row of `cf.v_cost_structure`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureRow {
    pub year: i32,
    pub category: CostCategory,
    pub total_value: Decimal,
    pub share_pct: Option<f64>,
}

/// Share of each category in the yearly total.
pub fn cost_structure(conn: &Connection, year: Option<i32>) -> StoreResult<Vec<StructureRow>> {
    let rows: Vec<(i32, String, String, Option<f64>)> = query_rows(
        conn,
        "SELECT year, category, CAST(total_value AS VARCHAR), share_pct
         FROM cf.v_cost_structure
         WHERE CAST(? AS INTEGER) IS NULL OR year = CAST(? AS INTEGER)
         ORDER BY year, category",
        &[&year, &year],
        "v_cost_structure",
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    rows.into_iter()
        .map(|(year, category, total, share_pct)| {
            Ok(StructureRow {
                year,
                category: parse_label(&category)?,
                total_value: parse_decimal(&total)?,
                share_pct,
            })
        })
        .collect()
}

/// A fact whose value moved between two reference years
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoverRow {
    pub unit_code: String,
    pub unit_name: String,
    pub cost_type_code: String,
    pub from_value: Decimal,
    pub to_value: Decimal,
    pub change: Decimal,
    pub pct_change: Option<f64>,
}

/// Largest absolute changes between `from_year` and `to_year`.
pub fn top_movers(
    conn: &Connection,
    from_year: i32,
    to_year: i32,
    limit: usize,
) -> StoreResult<Vec<MoverRow>> {
    let limit = crate::row_helpers::to_i64(limit as u64);
    type Raw = (String, String, String, String, String, String, Option<f64>);
    let rows: Vec<Raw> = query_rows(
        conn,
        "WITH base AS (
             SELECT unit_code, unit_name, cost_type_code, value
             FROM cf.v_costs_full WHERE year = ?
         ),
         cmp AS (
             SELECT unit_code, cost_type_code, value
             FROM cf.v_costs_full WHERE year = ?
         )
         SELECT b.unit_code, b.unit_name, b.cost_type_code,
                CAST(b.value AS VARCHAR), CAST(c.value AS VARCHAR),
                CAST(c.value - b.value AS VARCHAR),
                CASE WHEN b.value = 0 THEN NULL
                     ELSE ROUND(CAST(c.value - b.value AS DOUBLE) * 100.0 / CAST(b.value AS DOUBLE), 2)
                END
         FROM base b
         JOIN cmp c ON c.unit_code = b.unit_code AND c.cost_type_code = b.cost_type_code
         ORDER BY ABS(c.value - b.value) DESC, b.unit_code, b.cost_type_code
         LIMIT ?",
        &[&from_year, &to_year, &limit],
        "top movers",
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        },
    )?;

    rows.into_iter()
        .map(|(unit_code, unit_name, cost_type_code, from, to, change, pct_change)| {
            Ok(MoverRow {
                unit_code,
                unit_name,
                cost_type_code,
                from_value: parse_decimal(&from)?,
                to_value: parse_decimal(&to)?,
                change: parse_decimal(&change)?,
                pct_change,
            })
        })
        .collect()
}

/// First-to-last-year change of one province's own reported total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvinceChangeRow {
    pub province_code: String,
    pub province_name: String,
    pub from_total: Decimal,
    pub to_total: Decimal,
    pub change: Decimal,
    /// Percent change rounded to one decimal; `None` for a zero base
    pub pct_change: Option<f64>,
    /// True when `pct_change` lies more than `sigma` standard deviations
    /// from the mean change across provinces
    pub is_outlier: bool,
}

/// Province changes between the first and the last year with province data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvinceAnomalies {
    pub from_year: i32,
    pub to_year: i32,
    pub sigma: f64,
    pub mean_pct_change: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two provinces
    pub stddev_pct_change: Option<f64>,
    /// Largest percent increase first
    pub rows: Vec<ProvinceChangeRow>,
}

/// Compare each province's total in the earliest and the latest year and
/// flag changes outside `mean ± sigma * stddev`.
///
/// Returns `None` when province facts cover fewer than two years. Provinces
/// missing either end year are left out.
pub fn province_anomalies(
    conn: &Connection,
    sigma: f64,
) -> StoreResult<Option<ProvinceAnomalies>> {
    type Raw = (
        String,
        String,
        i32,
        i32,
        String,
        String,
        String,
        Option<f64>,
        Option<f64>,
        Option<f64>,
    );
    let rows: Vec<Raw> = query_rows(
        conn,
        "WITH totals AS (
             SELECT unit_code, unit_name, year, SUM(value) AS total
             FROM cf.v_costs_full
             WHERE unit_level = 'PROVINCE'
             GROUP BY unit_code, unit_name, year
         ),
         span AS (
             SELECT MIN(year) AS first_year, MAX(year) AS last_year FROM totals
         ),
         changes AS (
             SELECT f.unit_code, f.unit_name, s.first_year, s.last_year,
                    f.total AS from_total, l.total AS to_total,
                    CASE WHEN f.total = 0 THEN NULL
                         ELSE ROUND(CAST(l.total - f.total AS DOUBLE) * 100.0 / CAST(f.total AS DOUBLE), 1)
                    END AS pct_change
             FROM span s
             JOIN totals f ON f.year = s.first_year
             JOIN totals l ON l.unit_code = f.unit_code AND l.year = s.last_year
             WHERE s.first_year < s.last_year
         )
         SELECT unit_code, unit_name, first_year, last_year,
                CAST(from_total AS VARCHAR), CAST(to_total AS VARCHAR),
                CAST(to_total - from_total AS VARCHAR), pct_change,
                AVG(pct_change) OVER (), STDDEV_SAMP(pct_change) OVER ()
         FROM changes
         ORDER BY pct_change DESC NULLS LAST, unit_code",
        &[],
        "province anomalies",
        |row| {
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
                row.get(9)?,
            ))
        },
    )?;

    // Window aggregates repeat on every row.
    let Some(&(_, _, from_year, to_year, _, _, _, _, mean, stddev)) = rows.first() else {
        return Ok(None);
    };
    let is_outlier = |pct: Option<f64>| match (pct, mean, stddev) {
        (Some(pct), Some(mean), Some(stddev)) => (pct - mean).abs() > sigma * stddev,
        _ => false,
    };

    let rows = rows
        .into_iter()
        .map(|(code, name, _, _, from, to, change, pct_change, _, _)| {
            Ok(ProvinceChangeRow {
                province_code: code,
                province_name: name,
                from_total: parse_decimal(&from)?,
                to_total: parse_decimal(&to)?,
                change: parse_decimal(&change)?,
                pct_change,
                is_outlier: is_outlier(pct_change),
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Some(ProvinceAnomalies {
        from_year,
        to_year,
        sigma,
        mean_pct_change: mean,
        stddev_pct_change: stddev,
        rows,
    }))
}

/// Headline figures over all visible facts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_records: u64,
    pub years: Vec<i32>,
    /// Provinces with at least one fact
    pub province_count: u64,
    pub categories: Vec<CostCategory>,
    /// Sum and mean of province-level values
    pub province_total: Decimal,
    pub province_avg: Option<Decimal>,
    /// Extremes over every level
    pub min_value: Option<Decimal>,
    pub max_value: Option<Decimal>,
}

/// Record count, covered years and categories, province totals, and the
/// value range of the read model.
pub fn summary_stats(conn: &Connection) -> StoreResult<SummaryStats> {
    let (total_records, province_count, province_total, province_avg, min_value, max_value) = conn
        .query_row(
            "SELECT COUNT(*),
                    COUNT(DISTINCT province_code),
                    CAST(COALESCE(SUM(province_value), 0) AS VARCHAR),
                    CAST(CAST(AVG(province_value) AS DECIMAL(18, 2)) AS VARCHAR),
                    CAST(MIN(value) AS VARCHAR),
                    CAST(MAX(value) AS VARCHAR)
             FROM (
                 SELECT value,
                        CASE WHEN unit_level = 'PROVINCE' THEN unit_code END AS province_code,
                        CASE WHEN unit_level = 'PROVINCE' THEN value END AS province_value
                 FROM cf.v_costs_full
             )",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        )
        .query_context("summary stats")?;

    let years: Vec<i32> = query_rows(
        conn,
        "SELECT DISTINCT year FROM cf.v_costs_full ORDER BY year",
        &[],
        "summary years",
        |row| row.get(0),
    )?;
    let categories: Vec<String> = query_rows(
        conn,
        "SELECT DISTINCT category FROM cf.v_costs_full ORDER BY category",
        &[],
        "summary categories",
        |row| row.get(0),
    )?;

    Ok(SummaryStats {
        total_records: to_u64(total_records),
        years,
        province_count: to_u64(province_count),
        categories: categories
            .iter()
            .map(|c| parse_label(c))
            .collect::<StoreResult<_>>()?,
        province_total: parse_decimal(&province_total)?,
        province_avg: parse_optional_decimal(province_avg)?,
        min_value: parse_optional_decimal(min_value)?,
        max_value: parse_optional_decimal(max_value)?,
    })
}

/// `cf.v_latest_import`: the most recently finished run and its quality summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestImport {
    pub import_id: i64,
    pub source: String,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_rows: Option<u64>,
    pub null_percentage: Option<f64>,
    pub duplicate_count: Option<u64>,
    pub outlier_count: Option<u64>,
    pub validation_passed: Option<bool>,
}

/// The latest finished import, if any run has finished.
pub fn latest_import(conn: &Connection) -> StoreResult<Option<LatestImport>> {
    let result = conn.query_row(
        "SELECT import_id, source, status,
                rows_processed, rows_inserted, rows_updated, rows_unchanged, rows_failed,
                CAST(started_at AS VARCHAR), CAST(finished_at AS VARCHAR),
                total_rows, null_percentage, duplicate_count, outlier_count, validation_passed
         FROM cf.v_latest_import",
        [],
        |row| {
            Ok((
                (
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ),
                [
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ],
                (
                    row.get::<_, String>(8)?,
                    row.get::<_, Option<String>>(9)?,
                ),
                (
                    row.get::<_, Option<i64>>(10)?,
                    row.get::<_, Option<f64>>(11)?,
                    row.get::<_, Option<i64>>(12)?,
                    row.get::<_, Option<i64>>(13)?,
                    row.get::<_, Option<bool>>(14)?,
                ),
            ))
        },
    );
    let ((import_id, source, status), counts, (started, finished), quality) = match result {
        Ok(row) => row,
        Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(StoreError::QueryError(format!("v_latest_import: {e}"))),
    };
    let [processed, inserted, updated, unchanged, failed] = counts.map(to_u64);
    let (total_rows, null_percentage, duplicate_count, outlier_count, validation_passed) = quality;

    Ok(Some(LatestImport {
        import_id,
        source,
        status: parse_label(&status)?,
        counts: RunCounts {
            processed,
            inserted,
            updated,
            unchanged,
            failed,
        },
        started_at: parse_timestamp(&started)?,
        finished_at: parse_optional_timestamp(finished)?,
        total_rows: total_rows.map(to_u64),
        null_percentage,
        duplicate_count: duplicate_count.map(to_u64),
        outlier_count: outlier_count.map(to_u64),
        validation_passed,
    }))
}

#[cfg(test)]
#[path = "reports_test.rs"]
mod tests;
