//! Dimension registry: administrative units, cost types and periods.
//!
//! Dimension rows are created on first sight with
//! `INSERT ... ON CONFLICT DO NOTHING` followed by a key lookup. When two
//! transactions create the same code concurrently, the loser fails with a
//! duplicate-key conflict and aborts; callers resolve inside
//! [`StatsDb::transaction_with_retry`](crate::StatsDb::transaction_with_retry)
//! so the retry sees the winner's row. Reference loads use [`register_unit`] and
//! [`register_cost_type`], which refresh descriptive attributes but never the
//! code or the surrogate id.

use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::row_helpers::{format_timestamp, now_utc, parse_optional_timestamp};
use cf_core::{
    AdministrativeUnit, CostCategory, CostType, CostTypeCode, FactCandidate, NewCostType, NewUnit,
    Period, ReferenceSnapshot, UnitCode, UnitLevel,
};
use chrono::{DateTime, Utc};
use duckdb::Connection;

/// Surrogate ids of the three dimensions a fact is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionIds {
    pub unit_id: i64,
    pub cost_type_id: i64,
    pub period_id: i64,
}

fn lookup_id<K: duckdb::ToSql>(conn: &Connection, sql: &str, key: K) -> StoreResult<Option<i64>> {
    match conn.query_row(sql, duckdb::params![key], |row| row.get::<_, i64>(0)) {
        Ok(id) => Ok(Some(id)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::QueryError(format!("lookup id: {e}"))),
    }
}

/// Run `insert`, then look the key up.
///
/// Insert errors propagate unchanged. A failed statement aborts the
/// enclosing DuckDB transaction, so a lookup after a lost race would only
/// report the abort; the conflict has to reach the retry loop instead.
fn insert_then_lookup(
    insert: impl FnOnce() -> StoreResult<usize>,
    lookup: impl Fn() -> StoreResult<Option<i64>>,
    entity: &'static str,
    key: &str,
) -> StoreResult<i64> {
    if let Err(e) = insert() {
        if e.is_conflict() {
            log::debug!("{entity} '{key}' is being created concurrently: {e}");
        }
        return Err(e);
    }
    lookup()?.ok_or_else(|| StoreError::NotFound {
        entity,
        key: key.to_string(),
    })
}

// ── Administrative units ───────────────────────────────────────────────

const UNIT_ID_BY_CODE: &str = "SELECT unit_id FROM cf.admin_units WHERE code = ?";

/// Surrogate id of a registered unit.
pub fn unit_id(conn: &Connection, code: &str) -> StoreResult<Option<i64>> {
    lookup_id(conn, UNIT_ID_BY_CODE, code)
}

/// Resolve a unit code to its id.
///
/// An unregistered unit is created from `draft` when one is given (lenient
/// mode); without a draft it is an unknown reference.
pub fn resolve_unit(conn: &Connection, code: &UnitCode, draft: Option<&NewUnit>) -> StoreResult<i64> {
    if let Some(id) = unit_id(conn, code)? {
        return Ok(id);
    }
    let Some(draft) = draft else {
        return Err(StoreError::UnknownReference {
            entity: "unit",
            code: code.to_string(),
        });
    };

    let now = format_timestamp(&now_utc());
    insert_then_lookup(
        || {
            conn.execute(
                "INSERT INTO cf.admin_units (code, name, level, parent_code, created_at, updated_at)
                 VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
                 ON CONFLICT (code) DO NOTHING",
                duckdb::params![
                    draft.code.as_str(),
                    draft.name,
                    draft.level.as_str(),
                    draft.parent_code.as_deref(),
                    now,
                    now
                ],
            )
            .query_context("insert admin_units")
        },
        || unit_id(conn, code),
        "unit",
        code,
    )
}

/// Insert a unit or refresh the attributes of an existing one.
pub fn register_unit(conn: &Connection, unit: &NewUnit) -> StoreResult<i64> {
    let now = format_timestamp(&now_utc());
    conn.execute(
        "INSERT INTO cf.admin_units (code, name, level, parent_code, created_at, updated_at)
         VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
         ON CONFLICT (code) DO UPDATE SET
             name = excluded.name,
             level = excluded.level,
             parent_code = excluded.parent_code,
             updated_at = excluded.updated_at",
        duckdb::params![
            unit.code.as_str(),
            unit.name,
            unit.level.as_str(),
            unit.parent_code.as_deref(),
            now,
            now
        ],
    )
    .query_context("register admin_units")?;
    unit_id(conn, &unit.code)?.ok_or_else(|| StoreError::NotFound {
        entity: "unit",
        key: unit.code.to_string(),
    })
}

/// Registered units, optionally restricted to one level, ordered by code.
pub fn list_units(conn: &Connection, level: Option<UnitLevel>) -> StoreResult<Vec<AdministrativeUnit>> {
    let mut stmt = conn
        .prepare(
            "SELECT unit_id, code, name, level, parent_code
             FROM cf.admin_units
             WHERE CAST(? AS VARCHAR) IS NULL OR level = CAST(? AS VARCHAR)
             ORDER BY code",
        )
        .query_context("prepare list_units")?;
    let level = level.map(|l| l.as_str());
    let rows: Vec<(i64, String, String, String, Option<String>)> = stmt
        .query_map(duckdb::params![level, level], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .query_context("query list_units")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect list_units")?;

    rows.into_iter()
        .map(|(id, code, name, level, parent)| {
            Ok(AdministrativeUnit {
                id,
                code: parse_code(UnitCode::try_new(&code), &code)?,
                name,
                level: level
                    .parse()
                    .map_err(|e| StoreError::InvalidData(format!("{e}")))?,
                parent_code: parent.as_deref().and_then(UnitCode::try_new),
            })
        })
        .collect()
}

// ── Cost types ─────────────────────────────────────────────────────────

const COST_TYPE_ID_BY_CODE: &str = "SELECT cost_type_id FROM cf.cost_types WHERE code = ?";

/// Surrogate id of a registered cost type.
pub fn cost_type_id(conn: &Connection, code: &str) -> StoreResult<Option<i64>> {
    lookup_id(conn, COST_TYPE_ID_BY_CODE, code)
}

/// Resolve a cost-type code to its id, creating it from `draft` if needed.
pub fn resolve_cost_type(
    conn: &Connection,
    code: &CostTypeCode,
    draft: Option<&NewCostType>,
) -> StoreResult<i64> {
    if let Some(id) = cost_type_id(conn, code)? {
        return Ok(id);
    }
    let Some(draft) = draft else {
        return Err(StoreError::UnknownReference {
            entity: "cost type",
            code: code.to_string(),
        });
    };

    let now = format_timestamp(&now_utc());
    insert_then_lookup(
        || {
            conn.execute(
                "INSERT INTO cf.cost_types (code, name, category, description, created_at, updated_at)
                 VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
                 ON CONFLICT (code) DO NOTHING",
                duckdb::params![
                    draft.code.as_str(),
                    draft.name,
                    draft.category.as_str(),
                    draft.description,
                    now,
                    now
                ],
            )
            .query_context("insert cost_types")
        },
        || cost_type_id(conn, code),
        "cost type",
        code,
    )
}

/// Insert a cost type or refresh the attributes of an existing one.
pub fn register_cost_type(conn: &Connection, cost_type: &NewCostType) -> StoreResult<i64> {
    let now = format_timestamp(&now_utc());
    conn.execute(
        "INSERT INTO cf.cost_types (code, name, category, description, created_at, updated_at)
         VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
         ON CONFLICT (code) DO UPDATE SET
             name = excluded.name,
             category = excluded.category,
             description = excluded.description,
             updated_at = excluded.updated_at",
        duckdb::params![
            cost_type.code.as_str(),
            cost_type.name,
            cost_type.category.as_str(),
            cost_type.description,
            now,
            now
        ],
    )
    .query_context("register cost_types")?;
    cost_type_id(conn, &cost_type.code)?.ok_or_else(|| StoreError::NotFound {
        entity: "cost type",
        key: cost_type.code.to_string(),
    })
}

/// Registered cost types, optionally restricted to one category.
pub fn list_cost_types(
    conn: &Connection,
    category: Option<CostCategory>,
) -> StoreResult<Vec<CostType>> {
    let mut stmt = conn
        .prepare(
            "SELECT cost_type_id, code, name, category, description
             FROM cf.cost_types
             WHERE CAST(? AS VARCHAR) IS NULL OR category = CAST(? AS VARCHAR)
             ORDER BY category, code",
        )
        .query_context("prepare list_cost_types")?;
    let category = category.map(|c| c.as_str());
    let rows: Vec<(i64, String, String, String, Option<String>)> = stmt
        .query_map(duckdb::params![category, category], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .query_context("query list_cost_types")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect list_cost_types")?;

    rows.into_iter()
        .map(|(id, code, name, category, description)| {
            Ok(CostType {
                id,
                code: parse_code(CostTypeCode::try_new(&code), &code)?,
                name,
                category: category
                    .parse()
                    .map_err(|e| StoreError::InvalidData(format!("{e}")))?,
                description,
            })
        })
        .collect()
}

// ── Periods ────────────────────────────────────────────────────────────

const PERIOD_ID_BY_YEAR: &str = "SELECT period_id FROM cf.periods WHERE year = ?";

/// Resolve a year to its period id, creating the period on first sight.
pub fn resolve_period(conn: &Connection, year: i32) -> StoreResult<i64> {
    if let Some(id) = lookup_id(conn, PERIOD_ID_BY_YEAR, year)? {
        return Ok(id);
    }
    let now = format_timestamp(&now_utc());
    insert_then_lookup(
        || {
            conn.execute(
                "INSERT INTO cf.periods (year, created_at) VALUES (?, CAST(? AS TIMESTAMP))
                 ON CONFLICT (year) DO NOTHING",
                duckdb::params![year, now],
            )
            .query_context("insert periods")
        },
        || lookup_id(conn, PERIOD_ID_BY_YEAR, year),
        "period",
        &year.to_string(),
    )
}

/// Record when a period's figures were published.
pub fn set_period_published(
    conn: &Connection,
    year: i32,
    published_at: DateTime<Utc>,
) -> StoreResult<()> {
    let changed = conn
        .execute(
            "UPDATE cf.periods SET published_at = CAST(? AS TIMESTAMP) WHERE year = ?",
            duckdb::params![format_timestamp(&published_at), year],
        )
        .query_context("update periods")?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity: "period",
            key: year.to_string(),
        });
    }
    Ok(())
}

/// All periods, oldest first.
pub fn list_periods(conn: &Connection) -> StoreResult<Vec<Period>> {
    let mut stmt = conn
        .prepare(
            "SELECT period_id, year, CAST(published_at AS VARCHAR)
             FROM cf.periods ORDER BY year",
        )
        .query_context("prepare list_periods")?;
    let rows: Vec<(i64, i32, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .query_context("query list_periods")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect list_periods")?;

    rows.into_iter()
        .map(|(id, year, published)| {
            Ok(Period {
                id,
                year,
                published_at: parse_optional_timestamp(published)?,
            })
        })
        .collect()
}

// ── Snapshot and candidate resolution ──────────────────────────────────

/// Snapshot of every registered unit and cost-type code, for validation.
pub fn known_codes(conn: &Connection) -> StoreResult<ReferenceSnapshot> {
    let units = collect_strings(conn, "SELECT code FROM cf.admin_units")?;
    let cost_types = collect_strings(conn, "SELECT code FROM cf.cost_types")?;
    Ok(ReferenceSnapshot::new(units, cost_types))
}

/// Resolve all three dimensions of a validated candidate.
pub fn resolve_candidate(conn: &Connection, candidate: &FactCandidate) -> StoreResult<DimensionIds> {
    Ok(DimensionIds {
        unit_id: resolve_unit(conn, &candidate.key.unit_code, candidate.unit_draft.as_ref())?,
        cost_type_id: resolve_cost_type(
            conn,
            &candidate.key.cost_type_code,
            candidate.cost_type_draft.as_ref(),
        )?,
        period_id: resolve_period(conn, candidate.key.year)?,
    })
}

fn collect_strings(conn: &Connection, sql: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(sql).query_context("prepare codes")?;
    let codes = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .query_context("query codes")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect codes")?;
    Ok(codes)
}

fn parse_code<T>(code: Option<T>, raw: &str) -> StoreResult<T> {
    code.ok_or_else(|| StoreError::InvalidData(format!("blank code '{raw}'")))
}

#[cfg(test)]
#[path = "dimensions_test.rs"]
mod tests;
