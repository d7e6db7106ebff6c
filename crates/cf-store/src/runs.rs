//! Import run lifecycle rows.
//!
//! A run is inserted as RUNNING before its first record is processed and
//! moves exactly once to a terminal status. Every terminal transition is an
//! `UPDATE ... WHERE status = 'RUNNING'`, so a finished run can never be
//! rewritten.

use crate::error::{StoreError, StoreResult, StoreResultExt};
use crate::row_helpers::{format_timestamp, parse_optional_timestamp, parse_timestamp, to_i64, to_u64};
use cf_core::{RunCounts, RunStatus};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde::Serialize;

/// One row of `cf.import_runs`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRun {
    pub id: i64,
    pub source: String,
    pub source_hash: String,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Open a new RUNNING run and return its id.
pub fn begin_run(
    conn: &Connection,
    source: &str,
    source_hash: &str,
    started_at: DateTime<Utc>,
) -> StoreResult<i64> {
    let id: i64 = conn
        .query_row(
            "INSERT INTO cf.import_runs (source, source_hash, status, started_at)
             VALUES (?, ?, 'RUNNING', CAST(? AS TIMESTAMP))
             RETURNING import_id",
            duckdb::params![source, source_hash, format_timestamp(&started_at)],
            |row| row.get(0),
        )
        .query_context("insert import_runs")?;
    log::info!("Started import run {id} for {source}");
    Ok(id)
}

/// Move a RUNNING run to a terminal status.
///
/// Fails with [`StoreError::RunFinalized`] when the run already left RUNNING
/// and with [`StoreError::NotFound`] when it does not exist.
pub fn finalize_run(
    conn: &Connection,
    run_id: i64,
    status: RunStatus,
    counts: &RunCounts,
    error_message: Option<&str>,
    finished_at: DateTime<Utc>,
) -> StoreResult<()> {
    if !status.is_terminal() {
        return Err(StoreError::ConstraintViolation(format!(
            "run {run_id} cannot be finalized as {status}"
        )));
    }
    let changed = conn
        .execute(
            "UPDATE cf.import_runs SET
                 status = ?,
                 rows_processed = ?,
                 rows_inserted = ?,
                 rows_updated = ?,
                 rows_unchanged = ?,
                 rows_failed = ?,
                 error_message = ?,
                 finished_at = CAST(? AS TIMESTAMP)
             WHERE import_id = ? AND status = 'RUNNING'",
            duckdb::params![
                status.as_str(),
                to_i64(counts.processed),
                to_i64(counts.inserted),
                to_i64(counts.updated),
                to_i64(counts.unchanged),
                to_i64(counts.failed),
                error_message,
                format_timestamp(&finished_at),
                run_id
            ],
        )
        .query_context("finalize import_runs")?;

    if changed == 0 {
        return match get_run(conn, run_id)? {
            Some(_) => Err(StoreError::RunFinalized { run_id }),
            None => Err(StoreError::NotFound {
                entity: "import run",
                key: run_id.to_string(),
            }),
        };
    }
    log::info!("Import run {run_id} finished with status {status}");
    Ok(())
}

const SELECT_RUNS: &str = "SELECT import_id, source, source_hash, status,
            rows_processed, rows_inserted, rows_updated, rows_unchanged, rows_failed,
            error_message, CAST(started_at AS VARCHAR), CAST(finished_at AS VARCHAR)
     FROM cf.import_runs";

fn read_runs(
    conn: &Connection,
    sql: &str,
    params: &[&dyn duckdb::ToSql],
) -> StoreResult<Vec<ImportRun>> {
    let mut stmt = conn.prepare(sql).query_context("prepare import_runs")?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(RawRun {
                id: row.get(0)?,
                source: row.get(1)?,
                source_hash: row.get(2)?,
                status: row.get(3)?,
                counts: [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?],
                error_message: row.get(9)?,
                started_at: row.get(10)?,
                finished_at: row.get(11)?,
            })
        })
        .query_context("query import_runs")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("collect import_runs")?;
    rows.into_iter().map(RawRun::into_run).collect()
}

struct RawRun {
    id: i64,
    source: String,
    source_hash: String,
    status: String,
    counts: [i64; 5],
    error_message: Option<String>,
    started_at: String,
    finished_at: Option<String>,
}

impl RawRun {
    fn into_run(self) -> StoreResult<ImportRun> {
        let [processed, inserted, updated, unchanged, failed] = self.counts.map(to_u64);
        Ok(ImportRun {
            id: self.id,
            source: self.source,
            source_hash: self.source_hash,
            status: self
                .status
                .parse()
                .map_err(|e| StoreError::InvalidData(format!("{e}")))?,
            counts: RunCounts {
                processed,
                inserted,
                updated,
                unchanged,
                failed,
            },
            error_message: self.error_message,
            started_at: parse_timestamp(&self.started_at)?,
            finished_at: parse_optional_timestamp(self.finished_at)?,
        })
    }
}

/// Fetch one run.
pub fn get_run(conn: &Connection, run_id: i64) -> StoreResult<Option<ImportRun>> {
    Ok(read_runs(conn, &format!("{SELECT_RUNS} WHERE import_id = ?"), &[&run_id])?
        .into_iter()
        .next())
}

/// Most recent runs, newest first.
pub fn list_runs(conn: &Connection, limit: usize) -> StoreResult<Vec<ImportRun>> {
    let limit = to_i64(limit as u64);
    read_runs(
        conn,
        &format!("{SELECT_RUNS} ORDER BY import_id DESC LIMIT ?"),
        &[&limit],
    )
}

/// Latest SUCCESS run with the given content hash.
pub fn find_successful_by_hash(conn: &Connection, source_hash: &str) -> StoreResult<Option<ImportRun>> {
    Ok(read_runs(
        conn,
        &format!("{SELECT_RUNS} WHERE source_hash = ? AND status = 'SUCCESS' ORDER BY import_id DESC LIMIT 1"),
        &[&source_hash],
    )?
    .into_iter()
    .next())
}

/// Fail every RUNNING run started before `cutoff`.
///
/// Returns the ids of the runs that were recovered. Facts are not touched.
pub fn recover_stale_runs(
    conn: &Connection,
    cutoff: DateTime<Utc>,
    message: &str,
    now: DateTime<Utc>,
) -> StoreResult<Vec<i64>> {
    let stale: Vec<i64> = {
        let mut stmt = conn
            .prepare(
                "SELECT import_id FROM cf.import_runs
                 WHERE status = 'RUNNING' AND started_at < CAST(? AS TIMESTAMP)
                 ORDER BY import_id",
            )
            .query_context("prepare stale runs")?;
        let ids = stmt
            .query_map(duckdb::params![format_timestamp(&cutoff)], |row| row.get(0))
            .query_context("query stale runs")?
            .collect::<Result<Vec<_>, _>>()
            .query_context("collect stale runs")?;
        ids
    };

    let mut recovered = Vec::with_capacity(stale.len());
    for run_id in stale {
        let changed = conn
            .execute(
                "UPDATE cf.import_runs
                 SET status = 'FAILED', error_message = ?, finished_at = CAST(? AS TIMESTAMP)
                 WHERE import_id = ? AND status = 'RUNNING'",
                duckdb::params![message, format_timestamp(&now), run_id],
            )
            .query_context("recover import_runs")?;
        if changed > 0 {
            log::warn!("Marked stale import run {run_id} as FAILED");
            recovered.push(run_id);
        }
    }
    Ok(recovered)
}

#[cfg(test)]
#[path = "runs_test.rs"]
mod tests;
