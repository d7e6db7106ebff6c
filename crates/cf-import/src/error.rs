//! Error types for cf-import

use thiserror::Error;

/// Import errors
#[derive(Error, Debug)]
pub enum ImportError {
    /// I001: Configuration rejected before any run was opened
    #[error("[I001] Invalid import configuration: {0}")]
    Config(#[source] cf_core::CoreError),

    /// I002: Store failure outside a run, or while opening one
    #[error("[I002] Store error: {0}")]
    Store(#[from] cf_store::StoreError),

    /// I003: Input file could not be turned into records
    #[error("[I003] Failed to parse input '{source_name}': {message}")]
    InputParse {
        source_name: String,
        message: String,
    },

    /// I004: Input file could not be read
    #[error("[I004] Failed to read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// I005: Input format name not recognised
    #[error("[I005] Unknown input format '{0}' (expected json, csv or gus)")]
    UnknownFormat(String),
}

/// Result type alias for ImportError
pub type ImportResult<T> = Result<T, ImportError>;
