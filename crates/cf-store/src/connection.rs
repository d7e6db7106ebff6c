//! Database connection wrapper.
//!
//! [`StatsDb`] owns a DuckDB [`Connection`] and provides helpers for opening,
//! migrating, cloning and transacting against the statistics database.

use crate::error::{StoreError, StoreResult};
use crate::migration::run_migrations;
use duckdb::Connection;
use std::path::Path;
use std::time::Duration;

/// Wrapper around a DuckDB connection to `target/costflow.duckdb`.
///
/// A connection is used by one thread at a time. Concurrent imports each take
/// their own handle from [`StatsDb::try_clone`].
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionError(format!("{e}: {}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::ConnectionError(format!("{e}: {}", path.display())))?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database with all migrations applied.
    ///
    /// Useful for tests that don't need persistence. Clones share the same
    /// in-memory database.
    pub fn open_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open another connection to the same database.
    pub fn try_clone(&self) -> StoreResult<Self> {
        let conn = self
            .conn
            .try_clone()
            .map_err(|e| StoreError::ConnectionError(format!("clone failed: {e}")))?;
        Ok(Self { conn })
    }

    /// Borrow the underlying DuckDB connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute `body` within a `BEGIN` / `COMMIT` transaction, rolling back on
    /// error.
    pub fn transaction<F, T>(&self, body: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| StoreError::TransactionError(format!("BEGIN failed: {e}")))?;

        let result = body(&self.conn);

        match &result {
            Ok(_) => {
                if let Err(commit_err) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(StoreError::TransactionError(format!(
                        "COMMIT failed: {commit_err}"
                    )));
                }
            }
            Err(_) => {
                let _ = self.conn.execute_batch("ROLLBACK");
            }
        }
        result
    }

    /// Like [`StatsDb::transaction`], retrying up to `retries` extra times
    /// when the transaction loses a write-write conflict.
    pub fn transaction_with_retry<F, T>(&self, retries: u32, mut body: F) -> StoreResult<T>
    where
        F: FnMut(&Connection) -> StoreResult<T>,
    {
        let mut attempt = 0;
        loop {
            match self.transaction(&mut body) {
                Err(e) if e.is_conflict() && attempt < retries => {
                    attempt += 1;
                    log::warn!("Transaction conflict, retrying ({attempt}/{retries}): {e}");
                    std::thread::sleep(retry_backoff(attempt));
                }
                other => return other,
            }
        }
    }
}

/// Exponential backoff between conflict retries (10ms, 20ms, 40ms, capped at
/// 640ms) plus up to the same amount again as jitter, so writers that lost
/// the same race do not retry in lockstep.
pub(crate) fn retry_backoff(attempt: u32) -> Duration {
    let base = 10u64 << attempt.saturating_sub(1).min(6);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    Duration::from_millis(base + base * u64::from(nanos % 1000) / 1000)
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
