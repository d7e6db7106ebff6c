use super::*;
use crate::StatsDb;
use chrono::TimeZone;

fn unit(code: &str, name: &str, level: UnitLevel, parent: Option<&str>) -> NewUnit {
    NewUnit::new(
        UnitCode::try_new(code).unwrap(),
        name,
        level,
        parent.map(|p| UnitCode::try_new(p).unwrap()),
    )
    .unwrap()
}

fn cost_type(code: &str, category: CostCategory) -> NewCostType {
    NewCostType {
        code: CostTypeCode::try_new(code).unwrap(),
        name: format!("{code} housing"),
        category,
        description: None,
    }
}

#[test]
fn strict_resolution_of_unknown_unit_fails() {
    let db = StatsDb::open_memory().unwrap();
    let code = UnitCode::try_new("1465011").unwrap();
    let err = resolve_unit(db.conn(), &code, None).unwrap_err();
    assert!(matches!(err, StoreError::UnknownReference { entity: "unit", .. }));
}

#[test]
fn unit_is_created_once_from_draft() {
    let db = StatsDb::open_memory().unwrap();
    let draft = unit("1465011", "Warszawa", UnitLevel::District, Some("1400000"));
    let first = resolve_unit(db.conn(), &draft.code, Some(&draft)).unwrap();

    let renamed = unit("1465011", "Other name", UnitLevel::District, Some("1400000"));
    let second = resolve_unit(db.conn(), &renamed.code, Some(&renamed)).unwrap();
    assert_eq!(first, second);

    let units = list_units(db.conn(), None).unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, "Warszawa", "first writer wins");
    assert_eq!(units[0].parent_code.as_ref().unwrap().as_str(), "1400000");
}

#[test]
fn register_unit_refreshes_attributes_and_keeps_id() {
    let db = StatsDb::open_memory().unwrap();
    let id = register_unit(
        db.conn(),
        &unit("1400000", "MAZOWIECKIE", UnitLevel::Province, None),
    )
    .unwrap();
    let again = register_unit(
        db.conn(),
        &unit("1400000", "Mazowieckie", UnitLevel::Province, None),
    )
    .unwrap();
    assert_eq!(id, again);
    let units = list_units(db.conn(), Some(UnitLevel::Province)).unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, "Mazowieckie");
}

#[test]
fn list_units_filters_by_level() {
    let db = StatsDb::open_memory().unwrap();
    register_unit(db.conn(), &unit("0000000", "Polska", UnitLevel::Country, None)).unwrap();
    register_unit(
        db.conn(),
        &unit("1400000", "Mazowieckie", UnitLevel::Province, None),
    )
    .unwrap();
    register_unit(
        db.conn(),
        &unit("1465011", "Warszawa", UnitLevel::District, Some("1400000")),
    )
    .unwrap();

    assert_eq!(list_units(db.conn(), None).unwrap().len(), 3);
    let districts = list_units(db.conn(), Some(UnitLevel::District)).unwrap();
    assert_eq!(districts.len(), 1);
    assert_eq!(districts[0].code.as_str(), "1465011");
}

#[test]
fn cost_type_resolution_and_filtering() {
    let db = StatsDb::open_memory().unwrap();
    let municipal = cost_type("MUNICIPAL", CostCategory::Public);
    let code = municipal.code.clone();

    assert!(matches!(
        resolve_cost_type(db.conn(), &code, None),
        Err(StoreError::UnknownReference { .. })
    ));
    let id = resolve_cost_type(db.conn(), &code, Some(&municipal)).unwrap();
    assert_eq!(resolve_cost_type(db.conn(), &code, None).unwrap(), id);

    register_cost_type(db.conn(), &cost_type("COOPERATIVE", CostCategory::Cooperative)).unwrap();
    let public = list_cost_types(db.conn(), Some(CostCategory::Public)).unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].code.as_str(), "MUNICIPAL");
    assert_eq!(list_cost_types(db.conn(), None).unwrap().len(), 2);
}

#[test]
fn periods_are_created_on_first_sight() {
    let db = StatsDb::open_memory().unwrap();
    let a = resolve_period(db.conn(), 2023).unwrap();
    let b = resolve_period(db.conn(), 2023).unwrap();
    let c = resolve_period(db.conn(), 2022).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);

    let periods = list_periods(db.conn()).unwrap();
    assert_eq!(
        periods.iter().map(|p| p.year).collect::<Vec<_>>(),
        vec![2022, 2023]
    );
    assert!(periods.iter().all(|p| p.published_at.is_none()));
}

#[test]
fn period_publication_timestamp() {
    let db = StatsDb::open_memory().unwrap();
    resolve_period(db.conn(), 2023).unwrap();
    let published = Utc.with_ymd_and_hms(2024, 6, 30, 10, 0, 0).unwrap();
    set_period_published(db.conn(), 2023, published).unwrap();
    let periods = list_periods(db.conn()).unwrap();
    assert_eq!(periods[0].published_at, Some(published));

    let err = set_period_published(db.conn(), 1999, published).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "period", .. }));
}

#[test]
fn known_codes_snapshot() {
    use cf_core::ReferenceLookup;

    let db = StatsDb::open_memory().unwrap();
    register_unit(
        db.conn(),
        &unit("1400000", "Mazowieckie", UnitLevel::Province, None),
    )
    .unwrap();
    register_cost_type(db.conn(), &cost_type("MUNICIPAL", CostCategory::Public)).unwrap();

    let snapshot = known_codes(db.conn()).unwrap();
    assert!(snapshot.has_unit("1400000"));
    assert!(!snapshot.has_unit("1465011"));
    assert!(snapshot.has_cost_type("MUNICIPAL"));
    assert_eq!(snapshot.unit_count(), 1);
}

#[test]
fn resolve_candidate_resolves_all_dimensions() {
    use cf_core::FactKey;
    use rust_decimal::Decimal;

    let db = StatsDb::open_memory().unwrap();
    let draft_unit = unit("1465011", "Warszawa", UnitLevel::District, Some("1400000"));
    let draft_type = cost_type("MUNICIPAL", CostCategory::Public);
    let candidate = FactCandidate {
        key: FactKey {
            unit_code: draft_unit.code.clone(),
            cost_type_code: draft_type.code.clone(),
            year: 2023,
        },
        value: Decimal::new(15000, 2),
        adjustment: false,
        unit_draft: Some(draft_unit),
        cost_type_draft: Some(draft_type),
    };

    let ids = resolve_candidate(db.conn(), &candidate).unwrap();
    assert_eq!(ids, resolve_candidate(db.conn(), &candidate).unwrap());
    assert_eq!(unit_id(db.conn(), "1465011").unwrap(), Some(ids.unit_id));
    assert_eq!(cost_type_id(db.conn(), "MUNICIPAL").unwrap(), Some(ids.cost_type_id));
}

#[test]
fn failed_period_insert_is_returned() {
    let db = StatsDb::open_memory().unwrap();
    let err = resolve_period(db.conn(), 2500).unwrap_err();
    assert!(err.is_constraint(), "{err}");
    assert!(!err.is_conflict(), "{err}");
    assert!(list_periods(db.conn()).unwrap().is_empty());
}
