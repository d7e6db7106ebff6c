//! Input files to raw record batches.
//!
//! Three shapes are accepted: a JSON array of raw records, a headered CSV
//! file (read through DuckDB so every cell stays text), and the GUS
//! statistics API payload, which goes through the variable-mapping
//! transform first.

use crate::error::{ImportError, ImportResult};
use cf_core::transform::parse_payload;
use cf_core::{transform_payload, RawRecord};
use cf_store::input::read_csv_records;
use cf_store::StatsDb;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Layout of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// JSON array of raw records
    Json,
    /// Headered CSV, one raw record per row
    Csv,
    /// GUS statistics API payload
    Gus,
}

impl InputFormat {
    /// Guess the format from a file extension. `.csv` is CSV, anything else
    /// is a JSON record array.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => InputFormat::Csv,
            _ => InputFormat::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Json => "json",
            InputFormat::Csv => "csv",
            InputFormat::Gus => "gus",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(InputFormat::Json),
            "csv" => Ok(InputFormat::Csv),
            "gus" => Ok(InputFormat::Gus),
            other => Err(ImportError::UnknownFormat(other.to_string())),
        }
    }
}

/// A named batch of raw records ready for import
#[derive(Debug, Clone)]
pub struct ImportSource {
    /// Source identifier recorded on the run
    pub name: String,
    pub records: Vec<RawRecord>,
}

/// Read `path` in the given format.
///
/// `api_level` is the GUS `unit-level` the payload was requested with and is
/// only used for [`InputFormat::Gus`].
pub fn load_source(
    db: &StatsDb,
    path: &Path,
    format: InputFormat,
    api_level: u8,
) -> ImportResult<ImportSource> {
    let name = path.display().to_string();
    let records = match format {
        InputFormat::Csv => read_csv_records(db.conn(), path)?,
        InputFormat::Json => parse_json_records(&read_text(path)?, &name)?,
        InputFormat::Gus => {
            let series = parse_payload(&read_text(path)?).map_err(|e| ImportError::InputParse {
                source_name: name.clone(),
                message: e.to_string(),
            })?;
            let output = transform_payload(&series, api_level);
            log::info!(
                "Transformed {} GUS series into {} records ({} null values, {} unmapped skipped)",
                series.len(),
                output.records.len(),
                output.skipped_null_values,
                output.skipped_unmapped
            );
            output.records
        }
    };
    log::debug!("Loaded {} records from {name} as {format}", records.len());
    Ok(ImportSource { name, records })
}

/// Parse a JSON array of raw records.
pub fn parse_json_records(content: &str, source_name: &str) -> ImportResult<Vec<RawRecord>> {
    serde_json::from_str(content).map_err(|e| ImportError::InputParse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

fn read_text(path: &Path) -> ImportResult<String> {
    std::fs::read_to_string(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
