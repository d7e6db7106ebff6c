//! Raw input records, normalized fact candidates and per-record errors.

use crate::dimension::{CostTypeCode, NewCostType, NewUnit, UnitCode};
use crate::serde_helpers::{lenient_bool, lenient_string};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One record as it arrives from an input file, before validation.
///
/// Every field is kept as text: a value that cannot be parsed is a
/// validation error to be recorded, not a reason to reject the whole file.
/// Fields the pipeline does not know are preserved in `extra` so the raw
/// payload stored with a validation error is complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_code: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_name: Option<String>,

    /// COUNTRY / PROVINCE / DISTRICT (or the Polish labels)
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_level: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub parent_code: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub cost_type_code: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub cost_type_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub value: Option<String>,

    /// Marks a correction entry, which may carry a negative value
    #[serde(default, deserialize_with = "lenient_bool")]
    pub adjustment: bool,

    /// Any other columns present in the input
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RawRecord {
    /// Convenience constructor for the four key fields.
    pub fn new(
        unit_code: impl Into<String>,
        cost_type_code: impl Into<String>,
        year: impl ToString,
        value: impl ToString,
    ) -> Self {
        Self {
            unit_code: Some(unit_code.into()),
            cost_type_code: Some(cost_type_code.into()),
            year: Some(year.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    /// True when the value field is absent or blank.
    pub fn value_is_null(&self) -> bool {
        self.value.as_deref().map_or(true, |v| v.trim().is_empty())
    }

    /// The record as a JSON object, for error payloads.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Natural key of a fact, in terms of dimension codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactKey {
    pub unit_code: UnitCode,
    pub cost_type_code: CostTypeCode,
    pub year: i32,
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.unit_code, self.cost_type_code, self.year)
    }
}

/// A record that passed validation, normalized and ready for the fact store.
#[derive(Debug, Clone, PartialEq)]
pub struct FactCandidate {
    pub key: FactKey,
    pub value: Decimal,
    pub adjustment: bool,

    /// Present when the unit is unknown and may be created on first sight.
    pub unit_draft: Option<NewUnit>,

    /// Present when the cost type is unknown and may be created on first sight.
    pub cost_type_draft: Option<NewCostType>,
}

/// Classification of a rejected record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A required field is absent or blank
    MissingField,
    /// A field could not be parsed into its type
    ParseError,
    /// A unit or cost type code is not registered
    UnknownReference,
    /// A business rule was broken (negative value, year out of range)
    DomainViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingField => "MISSING_FIELD",
            ErrorKind::ParseError => "PARSE_ERROR",
            ErrorKind::UnknownReference => "UNKNOWN_REFERENCE",
            ErrorKind::DomainViolation => "DOMAIN_VIOLATION",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MISSING_FIELD" => Ok(ErrorKind::MissingField),
            "PARSE_ERROR" => Ok(ErrorKind::ParseError),
            "UNKNOWN_REFERENCE" => Ok(ErrorKind::UnknownReference),
            "DOMAIN_VIOLATION" => Ok(ErrorKind::DomainViolation),
            _ => Err(crate::error::CoreError::UnknownVariant {
                kind: "error kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Why a single record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub kind: ErrorKind,
    /// Name of the offending field
    pub field: String,
    pub message: String,
    /// The offending value as it appeared in the input
    pub raw_value: Option<String>,
}

impl RecordError {
    pub fn new(
        kind: ErrorKind,
        field: &str,
        message: impl Into<String>,
        raw_value: Option<&str>,
    ) -> Self {
        Self {
            kind,
            field: field.to_string(),
            message: message.into(),
            raw_value: raw_value.map(str::to_string),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.field, self.message)
    }
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;
