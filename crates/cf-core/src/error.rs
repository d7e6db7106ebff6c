//! Error types for cf-core

use thiserror::Error;

/// Core error type for Costflow
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Reference data file could not be interpreted
    #[error("[E004] Invalid reference data in {path}: {message}")]
    ReferenceInvalid { path: String, message: String },

    /// E005: Administrative unit breaks the level/parent invariant
    #[error("[E005] Inconsistent unit '{code}': {reason}")]
    InconsistentUnit { code: String, reason: String },

    /// E006: Unknown enumeration value (level, category, status, ...)
    #[error("[E006] Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    /// E007: IO error with file path context
    #[error("[E007] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E008: YAML parse error
    #[error("[E008] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
