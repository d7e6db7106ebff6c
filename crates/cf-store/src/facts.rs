//! Fact store: one value per (unit, cost type, period).
//!
//! Writes go through a single `INSERT ... ON CONFLICT ... DO UPDATE ... WHERE
//! value IS DISTINCT FROM excluded.value` statement inside a short
//! transaction that also appends the audit entry. Concurrent writers of the
//! same key serialize on the UNIQUE constraint; a lost write-write conflict
//! rolls the whole transaction back and is retried.

use crate::audit::{self, AuditOperation};
use crate::connection::StatsDb;
use crate::dimensions::{self, DimensionIds};
use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::row_helpers::{format_timestamp, now_utc, parse_decimal, parse_timestamp};
use cf_core::{FactCandidate, FactKey};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

/// Table name used for fact audit entries.
pub const FACT_TABLE: &str = "cost_facts";

/// What an upsert did to the fact row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteOutcome {
    Inserted,
    Updated,
    /// The stored value already matched; the row was left untouched
    Unchanged,
}

/// Result of one fact write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactWrite {
    pub fact_id: i64,
    pub outcome: WriteOutcome,
}

/// Audit snapshot of a fact row: identity and value columns only.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct FactSnapshot {
    fact_id: i64,
    unit_id: i64,
    cost_type_id: i64,
    period_id: i64,
    value: String,
    import_id: i64,
}

impl FactSnapshot {
    fn to_json(&self) -> StoreResult<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| StoreError::InvalidData(format!("fact snapshot: {e}")))
    }
}

fn snapshot_by_key(conn: &Connection, ids: &DimensionIds) -> StoreResult<Option<FactSnapshot>> {
    let result = conn.query_row(
        "SELECT fact_id, unit_id, cost_type_id, period_id, CAST(value AS VARCHAR), import_id
         FROM cf.cost_facts
         WHERE unit_id = ? AND cost_type_id = ? AND period_id = ?",
        duckdb::params![ids.unit_id, ids.cost_type_id, ids.period_id],
        |row| {
            Ok(FactSnapshot {
                fact_id: row.get(0)?,
                unit_id: row.get(1)?,
                cost_type_id: row.get(2)?,
                period_id: row.get(3)?,
                value: row.get(4)?,
                import_id: row.get(5)?,
            })
        },
    );
    match result {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::QueryError(format!("read cost_facts: {e}"))),
    }
}

/// Write a fact and its audit entry in one transaction, retrying conflicts.
pub fn upsert(
    db: &StatsDb,
    ids: &DimensionIds,
    value: Decimal,
    import_id: i64,
    actor: &str,
    retries: u32,
) -> StoreResult<FactWrite> {
    db.transaction_with_retry(retries, |conn| {
        upsert_in_transaction(conn, ids, value, import_id, actor)
    })
}

/// Resolve a candidate's dimensions and write its fact in one transaction.
///
/// Dimension rows created on first sight commit or roll back together with
/// the fact, and a lost race on either is retried as a whole.
pub fn write_candidate(
    db: &StatsDb,
    candidate: &FactCandidate,
    import_id: i64,
    actor: &str,
    retries: u32,
) -> StoreResult<FactWrite> {
    db.transaction_with_retry(retries, |conn| {
        let ids = dimensions::resolve_candidate(conn, candidate)?;
        upsert_in_transaction(conn, &ids, candidate.value, import_id, actor)
    })
}

/// Write a fact and its audit entry on a connection that is already inside a
/// transaction.
pub fn upsert_in_transaction(
    conn: &Connection,
    ids: &DimensionIds,
    value: Decimal,
    import_id: i64,
    actor: &str,
) -> StoreResult<FactWrite> {
    let before = snapshot_by_key(conn, ids)?;
    let now = format_timestamp(&now_utc());

    conn.execute(
        "INSERT INTO cf.cost_facts (unit_id, cost_type_id, period_id, value, import_id, created_at, updated_at)
         VALUES (?, ?, ?, CAST(? AS DECIMAL(18, 2)), ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))
         ON CONFLICT (unit_id, cost_type_id, period_id) DO UPDATE SET
             value = excluded.value,
             import_id = excluded.import_id,
             updated_at = excluded.updated_at
         WHERE cost_facts.value IS DISTINCT FROM excluded.value",
        duckdb::params![
            ids.unit_id,
            ids.cost_type_id,
            ids.period_id,
            value.to_string(),
            import_id,
            now,
            now
        ],
    )
    .query_context("upsert cost_facts")?;

    let after = snapshot_by_key(conn, ids)?.ok_or_else(|| StoreError::NotFound {
        entity: "fact",
        key: format!("{}/{}/{}", ids.unit_id, ids.cost_type_id, ids.period_id),
    })?;

    let (operation, before_json) = match &before {
        None => (AuditOperation::Insert, None),
        Some(prev) if prev.value == after.value => {
            return Ok(FactWrite {
                fact_id: after.fact_id,
                outcome: WriteOutcome::Unchanged,
            });
        }
        Some(prev) => (AuditOperation::Update, Some(prev.to_json()?)),
    };

    audit::record(
        conn,
        FACT_TABLE,
        after.fact_id,
        operation,
        before_json.as_ref(),
        Some(&after.to_json()?),
        actor,
    )?;

    Ok(FactWrite {
        fact_id: after.fact_id,
        outcome: match operation {
            AuditOperation::Insert => WriteOutcome::Inserted,
            _ => WriteOutcome::Updated,
        },
    })
}

/// Delete the fact for `key`, recording a DELETE audit entry.
///
/// Returns false when no such fact exists.
pub fn delete(db: &StatsDb, key: &FactKey, actor: &str) -> StoreResult<bool> {
    db.transaction(|conn| {
        let snapshot = conn.query_row(
            "SELECT f.fact_id, f.unit_id, f.cost_type_id, f.period_id, CAST(f.value AS VARCHAR), f.import_id
             FROM cf.cost_facts f
             JOIN cf.admin_units u ON u.unit_id = f.unit_id
             JOIN cf.cost_types t ON t.cost_type_id = f.cost_type_id
             JOIN cf.periods p ON p.period_id = f.period_id
             WHERE u.code = ? AND t.code = ? AND p.year = ?",
            duckdb::params![key.unit_code.as_str(), key.cost_type_code.as_str(), key.year],
            |row| {
                Ok(FactSnapshot {
                    fact_id: row.get(0)?,
                    unit_id: row.get(1)?,
                    cost_type_id: row.get(2)?,
                    period_id: row.get(3)?,
                    value: row.get(4)?,
                    import_id: row.get(5)?,
                })
            },
        );
        let snapshot = match snapshot {
            Ok(s) => s,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(false),
            Err(e) => return Err(StoreError::QueryError(format!("read cost_facts: {e}"))),
        };

        conn.execute(
            "DELETE FROM cf.cost_facts WHERE fact_id = ?",
            duckdb::params![snapshot.fact_id],
        )
        .query_context("delete cost_facts")?;
        audit::record(
            conn,
            FACT_TABLE,
            snapshot.fact_id,
            AuditOperation::Delete,
            Some(&snapshot.to_json()?),
            None,
            actor,
        )?;
        log::info!("Deleted fact {key} (id {})", snapshot.fact_id);
        Ok(true)
    })
}

/// A stored fact with its dimension codes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFact {
    pub fact_id: i64,
    pub key: FactKey,
    pub value: Decimal,
    pub import_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Look up the fact for `key`.
pub fn get(conn: &Connection, key: &FactKey) -> StoreResult<Option<StoredFact>> {
    let result = conn.query_row(
        "SELECT f.fact_id, CAST(f.value AS VARCHAR), f.import_id,
                CAST(f.created_at AS VARCHAR), CAST(f.updated_at AS VARCHAR)
         FROM cf.cost_facts f
         JOIN cf.admin_units u ON u.unit_id = f.unit_id
         JOIN cf.cost_types t ON t.cost_type_id = f.cost_type_id
         JOIN cf.periods p ON p.period_id = f.period_id
         WHERE u.code = ? AND t.code = ? AND p.year = ?",
        duckdb::params![key.unit_code.as_str(), key.cost_type_code.as_str(), key.year],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );
    let (fact_id, value, import_id, created_at, updated_at) = match result {
        Ok(row) => row,
        Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(StoreError::QueryError(format!("read cost_facts: {e}"))),
    };
    Ok(Some(StoredFact {
        fact_id,
        key: key.clone(),
        value: parse_decimal(&value)?,
        import_id,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    }))
}

/// Number of stored facts.
pub fn count(conn: &Connection) -> StoreResult<u64> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM cf.cost_facts", [], |row| row.get(0))
        .query_context("count cost_facts")?;
    Ok(crate::row_helpers::to_u64(n))
}

#[cfg(test)]
#[path = "facts_test.rs"]
mod tests;
