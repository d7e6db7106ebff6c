//! CSV input through DuckDB's `read_csv`.
//!
//! Every column is read as text so that malformed cells reach the validation
//! engine as data instead of failing the whole file.

use crate::error::{StoreError, StoreResult};
use cf_core::RawRecord;
use duckdb::Connection;
use std::path::Path;

/// Read a headered CSV file into raw records, in file order.
///
/// Column names are matched case-insensitively against the record fields;
/// unknown columns end up in [`RawRecord::extra`]. Empty cells are absent
/// values.
pub fn read_csv_records(conn: &Connection, path: &Path) -> StoreResult<Vec<RawRecord>> {
    if !path.is_file() {
        return Err(StoreError::NotFound {
            entity: "input file",
            key: path.display().to_string(),
        });
    }
    let literal = path.display().to_string().replace('\'', "''");
    let sql = format!(
        "SELECT * FROM read_csv('{literal}', header = true, all_varchar = true, auto_detect = true)"
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| StoreError::QueryError(format!("read_csv {}: {e}", path.display())))?;
    let rows: Vec<Vec<Option<String>>> = stmt
        .query_map([], |row| {
            let col_count = row.as_ref().column_count();
            (0..col_count)
                .map(|i| row.get::<_, Option<String>>(i))
                .collect()
        })
        .map_err(|e| StoreError::QueryError(format!("read_csv {}: {e}", path.display())))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::QueryError(format!("read_csv row: {e}")))?;

    let columns: Vec<String> = (0..stmt.column_count())
        .map(|i| {
            stmt.column_name(i)
                .map_or(format!("column{i}"), |name| name.trim().to_ascii_lowercase())
        })
        .collect();

    rows.into_iter()
        .enumerate()
        .map(|(index, cells)| {
            let object: serde_json::Map<String, serde_json::Value> = columns
                .iter()
                .cloned()
                .zip(cells)
                .map(|(column, cell)| {
                    let value = cell
                        .filter(|c| !c.trim().is_empty())
                        .map_or(serde_json::Value::Null, serde_json::Value::String);
                    (column, value)
                })
                .collect();
            serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
                StoreError::InvalidData(format!("{} row {}: {e}", path.display(), index + 1))
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "input_test.rs"]
mod tests;
