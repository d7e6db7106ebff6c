//! Error types for the Costflow store.

use thiserror::Error;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open or create the database (S001).
    #[error("[S001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Schema migration failed (S002).
    #[error("[S002] Database migration failed: {0}")]
    MigrationError(String),

    /// SQL execution error (S003).
    #[error("[S003] Database query failed: {0}")]
    QueryError(String),

    /// Transaction management error (S004).
    #[error("[S004] Database transaction failed: {0}")]
    TransactionError(String),

    /// A row was rejected by a table constraint (S005).
    #[error("[S005] Constraint violated: {0}")]
    ConstraintViolation(String),

    /// Lookup by natural key or id found nothing (S006).
    #[error("[S006] {entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Attempt to finalize a run that already left RUNNING (S007).
    #[error("[S007] Import run {run_id} is already finalized")]
    RunFinalized { run_id: i64 },

    /// Strict registry lookup of an unregistered code (S008).
    #[error("[S008] Unknown {entity} '{code}'")]
    UnknownReference { entity: &'static str, code: String },

    /// A stored value could not be read back (S009).
    #[error("[S009] Invalid stored value: {0}")]
    InvalidData(String),

    /// DuckDB driver error with preserved source chain (S010).
    #[error("[S010] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

/// Result type alias for [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::DuckDb(err)
    }
}

impl StoreError {
    fn detail(&self) -> String {
        match self {
            StoreError::DuckDb(e) => e.to_string(),
            other => other.to_string(),
        }
    }

    /// True for write-write conflicts between concurrent transactions.
    ///
    /// Two transactions inserting the same key both succeed locally and the
    /// loser fails with a duplicate key, at commit or on the next statement.
    /// Retrying sees the winner's row through `ON CONFLICT`.
    pub fn is_conflict(&self) -> bool {
        let detail = self.detail().to_ascii_lowercase();
        detail.contains("conflict") || detail.contains("duplicate key")
    }

    /// True when a constraint rejected the statement.
    pub fn is_constraint(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation(_))
            || self.detail().contains("Constraint Error")
    }

    /// True when the store itself is unusable and the caller should stop.
    ///
    /// Record-scoped failures (constraints, conflicts, missing rows) are not
    /// fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            StoreError::ConnectionError(_)
            | StoreError::MigrationError(_)
            | StoreError::InvalidData(_) => true,
            StoreError::ConstraintViolation(_)
            | StoreError::NotFound { .. }
            | StoreError::RunFinalized { .. }
            | StoreError::UnknownReference { .. } => false,
            StoreError::QueryError(_) | StoreError::TransactionError(_) | StoreError::DuckDb(_) => {
                !self.is_conflict() && !self.is_constraint()
            }
        }
    }
}

/// Attach a short context label to a DuckDB result.
pub(crate) trait StoreResultExt<T> {
    fn query_context(self, context: &str) -> StoreResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, duckdb::Error> {
    fn query_context(self, context: &str) -> StoreResult<T> {
        self.map_err(|e| {
            let message = format!("{context}: {e}");
            if message.contains("Constraint Error") {
                StoreError::ConstraintViolation(message)
            } else {
                StoreError::QueryError(message)
            }
        })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
