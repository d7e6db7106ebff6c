//! Untyped read-model listing.
//!
//! Returns plain Rust types so callers don't need a direct `duckdb` dependency.

use crate::error::{StoreError, StoreResult};
use crate::row_helpers::get_column_as_string;
use duckdb::Connection;

/// Views that may be listed with [`read_model`].
pub const READ_MODELS: &[&str] = &[
    "v_costs_full",
    "v_province_costs",
    "v_yearly_trend",
    "v_cost_structure",
    "v_latest_import",
];

/// Result of listing a read model.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column names from the result set.
    pub columns: Vec<String>,
    /// Rows of string-coerced values.
    pub rows: Vec<Vec<String>>,
}

/// List up to `limit` rows of a read model, every column as text.
///
/// Column names come from `DESCRIBE`, and each column is cast to VARCHAR so
/// decimals and timestamps print as DuckDB renders them.
pub fn read_model(conn: &Connection, view: &str, limit: usize) -> StoreResult<QueryResult> {
    if !READ_MODELS.contains(&view) {
        return Err(StoreError::NotFound {
            entity: "read model",
            key: view.to_string(),
        });
    }

    let columns: Vec<String> = {
        let mut stmt = conn
            .prepare(&format!("DESCRIBE cf.{view}"))
            .map_err(|e| StoreError::QueryError(format!("describe {view}: {e}")))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::QueryError(format!("describe {view}: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::QueryError(format!("describe {view}: {e}")))?;
        names
    };

    let select = columns
        .iter()
        .map(|c| format!("CAST(\"{c}\" AS VARCHAR)"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("SELECT {select} FROM cf.{view} LIMIT ?");
    let limit = crate::row_helpers::to_i64(limit as u64);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StoreError::QueryError(format!("prepare {view}: {e}")))?;
    let rows: Vec<Vec<String>> = stmt
        .query_map(duckdb::params![limit], |row| {
            Ok((0..columns.len())
                .map(|i| get_column_as_string(row, i))
                .collect())
        })
        .map_err(|e| StoreError::QueryError(format!("query {view}: {e}")))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::QueryError(format!("row error: {e}")))?;

    Ok(QueryResult { columns, rows })
}

#[cfg(test)]
#[path = "adhoc_test.rs"]
mod tests;
