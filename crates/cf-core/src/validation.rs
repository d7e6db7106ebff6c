//! Record validation engine.
//!
//! Each raw record goes through four stages, stopping at the first failure:
//!
//! 1. required fields present ([`ErrorKind::MissingField`])
//! 2. fields parse into their types ([`ErrorKind::ParseError`])
//! 3. unit and cost-type codes resolve ([`ErrorKind::UnknownReference`])
//! 4. business rules hold ([`ErrorKind::DomainViolation`])
//!
//! A failure is returned as data. Validation reads only the record and an
//! immutable [`ReferenceLookup`], so records can be checked in any order or
//! in parallel.

use crate::config::ValidationConfig;
use crate::dimension::{CostTypeCode, NewCostType, NewUnit, UnitCode, UnitLevel};
use crate::error::{CoreError, CoreResult};
use crate::record::{ErrorKind, FactCandidate, FactKey, RawRecord, RecordError};
use crate::transform::map_variable;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;

/// Most fractional digits a value may carry (values are currency amounts).
pub const MAX_VALUE_SCALE: u32 = 2;

/// Values must stay strictly below this magnitude (`DECIMAL(18,2)`).
pub fn max_abs_value() -> Decimal {
    Decimal::new(10_000_000_000_000_000, 0)
}

/// Read-only view of the registered reference codes.
pub trait ReferenceLookup {
    fn has_unit(&self, code: &str) -> bool;
    fn has_cost_type(&self, code: &str) -> bool;
}

/// In-memory set of known codes, loaded once before a run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    units: HashSet<String>,
    cost_types: HashSet<String>,
}

impl ReferenceSnapshot {
    pub fn new<U, C>(units: U, cost_types: C) -> Self
    where
        U: IntoIterator,
        U::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            units: units.into_iter().map(Into::into).collect(),
            cost_types: cost_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn cost_type_count(&self) -> usize {
        self.cost_types.len()
    }
}

impl ReferenceLookup for ReferenceSnapshot {
    fn has_unit(&self, code: &str) -> bool {
        self.units.contains(code)
    }

    fn has_cost_type(&self, code: &str) -> bool {
        self.cost_types.contains(code)
    }
}

/// Result of validating one record
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(FactCandidate),
    Rejected(RecordError),
}

impl ValidationOutcome {
    pub fn candidate(&self) -> Option<&FactCandidate> {
        match self {
            ValidationOutcome::Accepted(c) => Some(c),
            ValidationOutcome::Rejected(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RecordError> {
        match self {
            ValidationOutcome::Accepted(_) => None,
            ValidationOutcome::Rejected(e) => Some(e),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(|e| e.kind)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }
}

/// Compiled validation rules
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub min_year: i32,
    pub max_year: i32,
    pub strict_references: bool,
    unit_code_pattern: Option<Regex>,
}

impl ValidationRules {
    /// Compile the rules from configuration.
    pub fn from_config(config: &ValidationConfig) -> CoreResult<Self> {
        let unit_code_pattern = match &config.unit_code_pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| CoreError::ConfigInvalid {
                message: format!("validation.unit_code_pattern: {e}"),
            })?),
            None => None,
        };
        Ok(Self {
            min_year: config.min_year,
            max_year: config.max_year,
            strict_references: config.strict_references,
            unit_code_pattern,
        })
    }
}

/// Validates raw records against [`ValidationRules`] and a reference snapshot.
pub struct Validator<'a> {
    rules: &'a ValidationRules,
    refs: &'a dyn ReferenceLookup,
}

impl<'a> Validator<'a> {
    pub fn new(rules: &'a ValidationRules, refs: &'a dyn ReferenceLookup) -> Self {
        Self { rules, refs }
    }

    /// Validate one record.
    pub fn validate(&self, record: &RawRecord) -> ValidationOutcome {
        match self.check(record) {
            Ok(candidate) => ValidationOutcome::Accepted(candidate),
            Err(error) => ValidationOutcome::Rejected(error),
        }
    }

    /// Validate a batch, one outcome per record in input order.
    pub fn validate_batch(&self, records: &[RawRecord]) -> Vec<ValidationOutcome> {
        records.iter().map(|r| self.validate(r)).collect()
    }

    fn check(&self, record: &RawRecord) -> Result<FactCandidate, RecordError> {
        let unit_raw = required(&record.unit_code, "unit_code")?;
        let cost_type_raw = required(&record.cost_type_code, "cost_type_code")?;
        let year_raw = required(&record.year, "year")?;
        let value_raw = required(&record.value, "value")?;

        let unit_code = self.parse_unit_code(unit_raw)?;
        let cost_type_code = CostTypeCode::try_new(cost_type_raw).ok_or_else(|| {
            RecordError::new(
                ErrorKind::MissingField,
                "cost_type_code",
                "field is blank",
                Some(cost_type_raw),
            )
        })?;
        let year = year_raw.parse::<i32>().map_err(|_| {
            RecordError::new(
                ErrorKind::ParseError,
                "year",
                "year must be an integer",
                Some(year_raw),
            )
        })?;
        let value = parse_value(value_raw)
            .map_err(|msg| RecordError::new(ErrorKind::ParseError, "value", msg, Some(value_raw)))?;

        let unit_draft = self.unit_reference(&unit_code, record)?;
        let cost_type_draft = self.cost_type_reference(&cost_type_code, record)?;

        if year < self.rules.min_year || year > self.rules.max_year {
            return Err(RecordError::new(
                ErrorKind::DomainViolation,
                "year",
                format!(
                    "year outside accepted range {}-{}",
                    self.rules.min_year, self.rules.max_year
                ),
                Some(year_raw),
            ));
        }
        if value < Decimal::ZERO && !record.adjustment {
            return Err(RecordError::new(
                ErrorKind::DomainViolation,
                "value",
                "negative value on a record not flagged as an adjustment",
                Some(value_raw),
            ));
        }

        Ok(FactCandidate {
            key: FactKey {
                unit_code,
                cost_type_code,
                year,
            },
            value,
            adjustment: record.adjustment,
            unit_draft,
            cost_type_draft,
        })
    }

    fn parse_unit_code(&self, raw: &str) -> Result<UnitCode, RecordError> {
        if let Some(pattern) = &self.rules.unit_code_pattern {
            if !pattern.is_match(raw) {
                return Err(RecordError::new(
                    ErrorKind::ParseError,
                    "unit_code",
                    format!("unit code does not match {}", pattern.as_str()),
                    Some(raw),
                ));
            }
        }
        UnitCode::try_new(raw).ok_or_else(|| {
            RecordError::new(ErrorKind::MissingField, "unit_code", "field is blank", Some(raw))
        })
    }

    fn unit_reference(
        &self,
        code: &UnitCode,
        record: &RawRecord,
    ) -> Result<Option<NewUnit>, RecordError> {
        if self.refs.has_unit(code) {
            return Ok(None);
        }
        let unknown = |field: &str, message: String, raw: &str| {
            RecordError::new(ErrorKind::UnknownReference, field, message, Some(raw))
        };
        if self.rules.strict_references {
            return Err(unknown(
                "unit_code",
                format!("unit '{code}' is not registered"),
                code.as_str(),
            ));
        }

        let level = match non_blank(&record.unit_level) {
            Some(raw) => Some(
                UnitLevel::from_str(raw).map_err(|e| unknown("unit_level", e.to_string(), raw))?,
            ),
            None => None,
        };
        let parent = non_blank(&record.parent_code).and_then(UnitCode::try_new);
        NewUnit::derive(code.clone(), non_blank(&record.unit_name), level, parent)
            .map(Some)
            .map_err(|e| unknown("unit_code", e.to_string(), code.as_str()))
    }

    fn cost_type_reference(
        &self,
        code: &CostTypeCode,
        record: &RawRecord,
    ) -> Result<Option<NewCostType>, RecordError> {
        if self.refs.has_cost_type(code) {
            return Ok(None);
        }
        let unknown = |field: &str, message: String, raw: &str| {
            RecordError::new(ErrorKind::UnknownReference, field, message, Some(raw))
        };
        if self.rules.strict_references {
            return Err(unknown(
                "cost_type_code",
                format!("cost type '{code}' is not registered"),
                code.as_str(),
            ));
        }

        let name = non_blank(&record.cost_type_name);
        let category = match non_blank(&record.category) {
            Some(raw) => raw
                .parse()
                .map_err(|e: CoreError| unknown("category", e.to_string(), raw))?,
            None => match name.and_then(map_variable) {
                Some(mapping) => mapping.category,
                None => {
                    return Err(unknown(
                        "cost_type_code",
                        format!("cost type '{code}' is not registered and has no category"),
                        code.as_str(),
                    ))
                }
            },
        };

        Ok(Some(NewCostType {
            code: code.clone(),
            name: name.unwrap_or(code.as_str()).to_string(),
            category,
            description: None,
        }))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'r>(value: &'r Option<String>, field: &str) -> Result<&'r str, RecordError> {
    non_blank(value).ok_or_else(|| {
        RecordError::new(
            ErrorKind::MissingField,
            field,
            format!("required field '{field}' is missing or blank"),
            value.as_deref(),
        )
    })
}

/// Parse a currency amount.
///
/// Amounts follow Polish notation: a comma is the decimal separator when no
/// decimal point is present, and spaces (not commas) group thousands. So
/// `"1,5"` is 1.5, `"1 234,50"` is 1234.5 and `"1,000"` is 1, never one
/// thousand. Several commas (`"1,000,000"`) are rejected. The result carries
/// at most [`MAX_VALUE_SCALE`] fractional digits and stays below
/// [`max_abs_value`].
pub fn parse_value(raw: &str) -> Result<Decimal, String> {
    let mut text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if text.contains(',') && !text.contains('.') {
        text = text.replace(',', ".");
    }
    let value = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| "value is not a decimal number".to_string())?
        .normalize();
    if value.scale() > MAX_VALUE_SCALE {
        return Err(format!(
            "value has more than {MAX_VALUE_SCALE} fractional digits"
        ));
    }
    if value.abs() >= max_abs_value() {
        return Err("value exceeds the supported magnitude".to_string());
    }
    Ok(value)
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
