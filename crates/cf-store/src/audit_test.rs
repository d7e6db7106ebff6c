use super::*;
use crate::StatsDb;
use serde_json::json;

#[test]
fn insert_entry_round_trips() {
    let db = StatsDb::open_memory().unwrap();
    let after = json!({"fact_id": 1, "value": "150.00"});
    let id = record(
        db.conn(),
        "cost_facts",
        1,
        AuditOperation::Insert,
        None,
        Some(&after),
        "tester",
    )
    .unwrap();
    assert!(id.is_some());

    let entries = entries_for_record(db.conn(), "cost_facts", 1).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, AuditOperation::Insert);
    assert_eq!(entries[0].before, None);
    assert_eq!(entries[0].after, Some(after));
    assert_eq!(entries[0].actor, "tester");
}

#[test]
fn equal_update_snapshots_are_skipped() {
    let db = StatsDb::open_memory().unwrap();
    let snapshot = json!({"fact_id": 1, "value": "150.00"});
    let id = record(
        db.conn(),
        "cost_facts",
        1,
        AuditOperation::Update,
        Some(&snapshot),
        Some(&snapshot),
        "tester",
    )
    .unwrap();
    assert_eq!(id, None);
    assert!(recent(db.conn(), None, 10).unwrap().is_empty());
}

#[test]
fn wrong_snapshot_shape_is_rejected() {
    let db = StatsDb::open_memory().unwrap();
    let snapshot = json!({"fact_id": 1});
    for (op, before, after) in [
        (AuditOperation::Insert, Some(&snapshot), Some(&snapshot)),
        (AuditOperation::Update, None, Some(&snapshot)),
        (AuditOperation::Delete, None, None),
    ] {
        let err = record(db.conn(), "cost_facts", 1, op, before, after, "t").unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)), "{op}");
    }
}

#[test]
fn history_is_oldest_first_and_recent_is_newest_first() {
    let db = StatsDb::open_memory().unwrap();
    let v1 = json!({"fact_id": 7, "value": "1.00"});
    let v2 = json!({"fact_id": 7, "value": "2.00"});
    record(db.conn(), "cost_facts", 7, AuditOperation::Insert, None, Some(&v1), "a").unwrap();
    record(db.conn(), "cost_facts", 7, AuditOperation::Update, Some(&v1), Some(&v2), "a").unwrap();
    record(db.conn(), "cost_facts", 7, AuditOperation::Delete, Some(&v2), None, "a").unwrap();
    record(db.conn(), "other_table", 1, AuditOperation::Insert, None, Some(&v1), "a").unwrap();

    let history = entries_for_record(db.conn(), "cost_facts", 7).unwrap();
    let ops: Vec<_> = history.iter().map(|e| e.operation).collect();
    assert_eq!(
        ops,
        vec![
            AuditOperation::Insert,
            AuditOperation::Update,
            AuditOperation::Delete
        ]
    );

    let latest = recent(db.conn(), Some("cost_facts"), 2).unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].operation, AuditOperation::Delete);
    assert_eq!(latest[1].operation, AuditOperation::Update);

    assert_eq!(recent(db.conn(), None, 10).unwrap().len(), 4);
}

#[test]
fn operation_labels_parse() {
    assert_eq!("UPDATE".parse::<AuditOperation>().unwrap(), AuditOperation::Update);
    assert!("MERGE".parse::<AuditOperation>().is_err());
    assert_eq!(AuditOperation::Delete.to_string(), "DELETE");
}
