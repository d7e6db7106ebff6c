use super::*;
use crate::dimension::CostCategory;

fn rules() -> ValidationRules {
    ValidationRules::from_config(&ValidationConfig::default()).unwrap()
}

fn lenient_rules() -> ValidationRules {
    let config = ValidationConfig {
        strict_references: false,
        ..Default::default()
    };
    ValidationRules::from_config(&config).unwrap()
}

fn snapshot() -> ReferenceSnapshot {
    ReferenceSnapshot::new(["1400000", "1465011"], ["MUNICIPAL"])
}

fn reject(outcome: ValidationOutcome) -> RecordError {
    match outcome {
        ValidationOutcome::Rejected(e) => e,
        ValidationOutcome::Accepted(c) => panic!("expected rejection, got {c:?}"),
    }
}

#[test]
fn test_valid_record_is_normalised() {
    let rules = rules();
    let refs = snapshot();
    let validator = Validator::new(&rules, &refs);

    let outcome = validator.validate(&RawRecord::new(" 1465011 ", "MUNICIPAL", "2023", "150.50"));
    let candidate = outcome.candidate().unwrap();
    assert_eq!(candidate.key.unit_code, "1465011");
    assert_eq!(candidate.key.cost_type_code, "MUNICIPAL");
    assert_eq!(candidate.key.year, 2023);
    assert_eq!(candidate.value, Decimal::new(15050, 2));
    assert!(candidate.unit_draft.is_none());
    assert!(candidate.cost_type_draft.is_none());
}

#[test]
fn test_missing_field_checked_first() {
    let rules = rules();
    let refs = snapshot();
    let validator = Validator::new(&rules, &refs);

    // the year is also out of range, but absence wins
    let mut record = RawRecord::new("9999999", "MUNICIPAL", "1800", "");
    record.value = Some("   ".to_string());
    let err = reject(validator.validate(&record));
    assert_eq!(err.kind, ErrorKind::MissingField);
    assert_eq!(err.field, "value");

    let mut record = RawRecord::new("1465011", "MUNICIPAL", "2023", "1");
    record.unit_code = None;
    let err = reject(validator.validate(&record));
    assert_eq!(err.kind, ErrorKind::MissingField);
    assert_eq!(err.field, "unit_code");
}

#[test]
fn test_parse_errors() {
    let rules = rules();
    let refs = snapshot();
    let validator = Validator::new(&rules, &refs);

    let err = reject(validator.validate(&RawRecord::new("14650", "MUNICIPAL", "2023", "1")));
    assert_eq!((err.kind, err.field.as_str()), (ErrorKind::ParseError, "unit_code"));

    let err = reject(validator.validate(&RawRecord::new("1465011", "MUNICIPAL", "20x3", "1")));
    assert_eq!((err.kind, err.field.as_str()), (ErrorKind::ParseError, "year"));

    let err = reject(validator.validate(&RawRecord::new("1465011", "MUNICIPAL", "2023", "abc")));
    assert_eq!((err.kind, err.field.as_str()), (ErrorKind::ParseError, "value"));
    assert_eq!(err.raw_value.as_deref(), Some("abc"));
}

#[test]
fn test_parse_runs_before_reference_check() {
    let rules = rules();
    let refs = snapshot();
    let validator = Validator::new(&rules, &refs);

    let err = reject(validator.validate(&RawRecord::new("1465011", "UNKNOWN", "2023", "x")));
    assert_eq!(err.kind, ErrorKind::ParseError);
}

#[test]
fn test_comma_is_a_decimal_separator() {
    assert_eq!(parse_value("1,5").unwrap(), Decimal::new(15, 1));
    assert_eq!(parse_value("1 234,50").unwrap(), Decimal::new(12345, 1));
    assert_eq!(parse_value("1,000").unwrap(), Decimal::ONE);
    assert_eq!(parse_value("-0,25").unwrap(), Decimal::new(-25, 2));
    assert!(parse_value("1,000,000").is_err());
    assert!(parse_value("1,000.50").unwrap_err().contains("not a decimal"));
}

#[test]
fn test_value_precision_and_magnitude() {
    assert_eq!(parse_value("1234,5").unwrap(), Decimal::new(12345, 1));
    assert_eq!(parse_value("1 234.50").unwrap(), Decimal::new(123450, 2));
    assert_eq!(parse_value("100.000").unwrap(), Decimal::new(100, 0));
    assert!(parse_value("1.005").is_err());
    assert!(parse_value("10000000000000000").is_err());
    assert!(parse_value("9999999999999999.99").is_ok());
    assert!(parse_value("-10000000000000000").is_err());
}

#[test]
fn test_unknown_reference_in_strict_mode() {
    let rules = rules();
    let refs = snapshot();
    let validator = Validator::new(&rules, &refs);

    let err = reject(validator.validate(&RawRecord::new("9999999", "MUNICIPAL", "2023", "1")));
    assert_eq!((err.kind, err.field.as_str()), (ErrorKind::UnknownReference, "unit_code"));

    let err = reject(validator.validate(&RawRecord::new("1465011", "NOPE", "2023", "1")));
    assert_eq!(
        (err.kind, err.field.as_str()),
        (ErrorKind::UnknownReference, "cost_type_code")
    );
}

#[test]
fn test_lenient_mode_drafts_missing_dimensions() {
    let rules = lenient_rules();
    let refs = ReferenceSnapshot::default();
    let validator = Validator::new(&rules, &refs);

    let mut record = RawRecord::new("1465011", "COOP", "2023", "10");
    record.category = Some("SPOLDZIELCZE".to_string());
    let outcome = validator.validate(&record);
    let candidate = outcome.candidate().unwrap();

    let unit = candidate.unit_draft.as_ref().unwrap();
    assert_eq!(unit.level, UnitLevel::District);
    assert_eq!(unit.parent_code.as_deref(), Some("1400000"));
    assert_eq!(unit.name, "1465011");

    let cost_type = candidate.cost_type_draft.as_ref().unwrap();
    assert_eq!(cost_type.category, CostCategory::Cooperative);
    assert_eq!(cost_type.name, "COOP");
}

#[test]
fn test_lenient_mode_maps_gus_variable_name() {
    let rules = lenient_rules();
    let refs = ReferenceSnapshot::default();
    let validator = Validator::new(&rules, &refs);

    let mut record = RawRecord::new("1400000", "STATE_TREASURY", "2023", "10");
    record.cost_type_name = Some("zasoby Skarbu Państwa".to_string());
    let outcome = validator.validate(&record);
    let draft = outcome.candidate().unwrap().cost_type_draft.clone().unwrap();
    assert_eq!(draft.category, CostCategory::Public);
}

#[test]
fn test_lenient_mode_without_category_is_unknown() {
    let rules = lenient_rules();
    let refs = ReferenceSnapshot::default();
    let validator = Validator::new(&rules, &refs);

    let err = reject(validator.validate(&RawRecord::new("1400000", "MYSTERY", "2023", "1")));
    assert_eq!(err.kind, ErrorKind::UnknownReference);
}

#[test]
fn test_domain_rules() {
    let rules = rules();
    let refs = snapshot();
    let validator = Validator::new(&rules, &refs);

    let err = reject(validator.validate(&RawRecord::new("1465011", "MUNICIPAL", "1999", "1")));
    assert_eq!((err.kind, err.field.as_str()), (ErrorKind::DomainViolation, "year"));

    let err = reject(validator.validate(&RawRecord::new("1465011", "MUNICIPAL", "2023", "-5")));
    assert_eq!((err.kind, err.field.as_str()), (ErrorKind::DomainViolation, "value"));

    let mut adjustment = RawRecord::new("1465011", "MUNICIPAL", "2023", "-5");
    adjustment.adjustment = true;
    let outcome = validator.validate(&adjustment);
    assert_eq!(outcome.candidate().unwrap().value, Decimal::new(-5, 0));
}

#[test]
fn test_pattern_can_be_disabled() {
    let config = ValidationConfig {
        unit_code_pattern: None,
        ..Default::default()
    };
    let rules = ValidationRules::from_config(&config).unwrap();
    let refs = ReferenceSnapshot::new(["X1"], ["MUNICIPAL"]);
    let validator = Validator::new(&rules, &refs);

    assert!(validator
        .validate(&RawRecord::new("X1", "MUNICIPAL", "2023", "1"))
        .is_accepted());
}

#[test]
fn test_validate_batch_preserves_order() {
    let rules = rules();
    let refs = snapshot();
    let validator = Validator::new(&rules, &refs);

    let records = vec![
        RawRecord::new("1465011", "MUNICIPAL", "2023", "1"),
        RawRecord::new("1465011", "MUNICIPAL", "2023", "bad"),
        RawRecord::new("1400000", "MUNICIPAL", "2022", "3"),
    ];
    let outcomes = validator.validate_batch(&records);
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_accepted());
    assert_eq!(outcomes[1].error_kind(), Some(ErrorKind::ParseError));
    assert_eq!(outcomes[2].candidate().unwrap().key.year, 2022);
}
