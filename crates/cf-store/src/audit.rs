//! Append-only audit log of fact mutations.
//!
//! Every entry carries full JSON snapshots of the row before and after the
//! change. Snapshots hold identity and value columns only, so two snapshots
//! of an unchanged row compare equal.

use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::row_helpers::{format_timestamp, now_utc, parse_timestamp};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of change recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::Insert => "INSERT",
            AuditOperation::Update => "UPDATE",
            AuditOperation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditOperation {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(AuditOperation::Insert),
            "UPDATE" => Ok(AuditOperation::Update),
            "DELETE" => Ok(AuditOperation::Delete),
            other => Err(StoreError::InvalidData(format!(
                "unknown audit operation '{other}'"
            ))),
        }
    }
}

/// One row of `cf.audit_log`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub audit_id: i64,
    pub table_name: String,
    pub record_id: i64,
    pub operation: AuditOperation,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
    pub actor: String,
}

/// Append an audit entry.
///
/// Returns the new entry id, or `None` when an UPDATE's snapshots are equal
/// and nothing was written. Snapshot presence must match the operation:
/// INSERT has only `after`, DELETE only `before`, UPDATE both.
pub fn record(
    conn: &Connection,
    table_name: &str,
    record_id: i64,
    operation: AuditOperation,
    before: Option<&serde_json::Value>,
    after: Option<&serde_json::Value>,
    actor: &str,
) -> StoreResult<Option<i64>> {
    let shape_ok = match operation {
        AuditOperation::Insert => before.is_none() && after.is_some(),
        AuditOperation::Update => before.is_some() && after.is_some(),
        AuditOperation::Delete => before.is_some() && after.is_none(),
    };
    if !shape_ok {
        return Err(StoreError::ConstraintViolation(format!(
            "{operation} audit entry for {table_name}#{record_id} has the wrong snapshots"
        )));
    }
    if operation == AuditOperation::Update && before == after {
        log::debug!("Skipping no-op audit UPDATE for {table_name}#{record_id}");
        return Ok(None);
    }

    let before = before.map(serde_json::Value::to_string);
    let after = after.map(serde_json::Value::to_string);
    let audit_id: i64 = conn
        .query_row(
            "INSERT INTO cf.audit_log (table_name, record_id, operation, before_data, after_data, changed_at, actor)
             VALUES (?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), ?)
             RETURNING audit_id",
            duckdb::params![
                table_name,
                record_id,
                operation.as_str(),
                before,
                after,
                format_timestamp(&now_utc()),
                actor
            ],
            |row| row.get(0),
        )
        .query_context("insert audit_log")?;
    Ok(Some(audit_id))
}

const SELECT_ENTRIES: &str = "SELECT audit_id, table_name, record_id, operation, before_data, after_data,
            CAST(changed_at AS VARCHAR), actor
     FROM cf.audit_log";

type AuditRow = (
    i64,
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
);

fn read_entries(
    conn: &Connection,
    sql: &str,
    params: &[&dyn duckdb::ToSql],
) -> StoreResult<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(sql).query_context("prepare audit_log")?;
    let rows: Vec<AuditRow> = stmt
        .query_map(params, |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })
        .query_context("query audit_log")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect audit_log")?;

    rows.into_iter()
        .map(
            |(audit_id, table_name, record_id, operation, before, after, changed_at, actor)| {
                Ok(AuditEntry {
                    audit_id,
                    table_name,
                    record_id,
                    operation: operation.parse()?,
                    before: parse_snapshot(before)?,
                    after: parse_snapshot(after)?,
                    changed_at: parse_timestamp(&changed_at)?,
                    actor,
                })
            },
        )
        .collect()
}

fn parse_snapshot(raw: Option<String>) -> StoreResult<Option<serde_json::Value>> {
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| StoreError::InvalidData(format!("audit snapshot: {e}")))
    })
    .transpose()
}

/// Full history of one record, oldest first.
pub fn entries_for_record(
    conn: &Connection,
    table_name: &str,
    record_id: i64,
) -> StoreResult<Vec<AuditEntry>> {
    read_entries(
        conn,
        &format!("{SELECT_ENTRIES} WHERE table_name = ? AND record_id = ? ORDER BY audit_id"),
        &[&table_name, &record_id],
    )
}

/// Most recent entries, newest first, optionally for one table.
pub fn recent(
    conn: &Connection,
    table_name: Option<&str>,
    limit: usize,
) -> StoreResult<Vec<AuditEntry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    match table_name {
        Some(table) => read_entries(
            conn,
            &format!("{SELECT_ENTRIES} WHERE table_name = ? ORDER BY audit_id DESC LIMIT ?"),
            &[&table, &limit],
        ),
        None => read_entries(
            conn,
            &format!("{SELECT_ENTRIES} ORDER BY audit_id DESC LIMIT ?"),
            &[&limit],
        ),
    }
}

#[cfg(test)]
#[path = "audit_test.rs"]
mod tests;
