//! Integration tests for the store: dimension registry, fact writes and the
//! audit trail working together, including concurrent writers on cloned
//! connections to one database file.

use cf_core::{
    CostCategory, CostTypeCode, FactCandidate, FactKey, NewCostType, NewUnit, RunCounts,
    RunStatus, UnitCode, UnitLevel,
};
use cf_store::audit;
use cf_store::dimensions::{self, DimensionIds};
use cf_store::facts::{self, FACT_TABLE};
use cf_store::query::costs_full;
use cf_store::runs;
use cf_store::{AuditOperation, StatsDb, WriteOutcome};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::{Arc, Barrier};
use std::thread;

// ── Helpers ────────────────────────────────────────────────────────────

fn district(code: &str) -> NewUnit {
    NewUnit::derive(UnitCode::try_new(code).unwrap(), None, None, None).unwrap()
}

fn municipal() -> NewCostType {
    NewCostType {
        code: CostTypeCode::try_new("MUNICIPAL").unwrap(),
        name: "Municipal housing".into(),
        category: CostCategory::Public,
        description: None,
    }
}

fn resolve(db: &StatsDb, unit: &NewUnit, year: i32) -> DimensionIds {
    DimensionIds {
        unit_id: dimensions::resolve_unit(db.conn(), &unit.code, Some(unit)).unwrap(),
        cost_type_id: dimensions::resolve_cost_type(db.conn(), &municipal().code, Some(&municipal()))
            .unwrap(),
        period_id: dimensions::resolve_period(db.conn(), year).unwrap(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[test]
fn derived_district_gets_province_parent() {
    let db = StatsDb::open_memory().unwrap();
    let unit = district("1465011");
    assert_eq!(unit.level, UnitLevel::District);
    resolve(&db, &unit, 2023);

    let stored = dimensions::list_units(db.conn(), None).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "1465011");
    assert_eq!(stored[0].parent_code.as_ref().unwrap().as_str(), "1400000");
}

#[test]
fn audit_trail_replays_fact_history() {
    let db = StatsDb::open_memory().unwrap();
    let unit = district("1465011");
    let ids = resolve(&db, &unit, 2023);

    let mut fact_id = 0;
    for (run, value) in [(1, 100), (2, 100), (3, 120), (4, 90)] {
        let write = facts::upsert(&db, &ids, Decimal::from(value), run, "it", 3).unwrap();
        fact_id = write.fact_id;
    }

    let history = audit::entries_for_record(db.conn(), FACT_TABLE, fact_id).unwrap();
    let ops: Vec<_> = history.iter().map(|e| e.operation).collect();
    assert_eq!(
        ops,
        vec![
            AuditOperation::Insert,
            AuditOperation::Update,
            AuditOperation::Update
        ]
    );
    for pair in history.windows(2) {
        assert_eq!(pair[0].after, pair[1].before, "snapshots chain");
    }
    let last = history.last().unwrap().after.as_ref().unwrap();
    assert_eq!(last["value"], "90.00");
}

#[test]
fn concurrent_writers_leave_one_fact_per_key() {
    let dir = tempfile::tempdir().unwrap();
    let db = StatsDb::open(&dir.path().join("costflow.duckdb")).unwrap();
    let unit = district("1465011");
    let ids = resolve(&db, &unit, 2023);

    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let conn = db.try_clone().unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                facts::upsert(&conn, &ids, Decimal::from(100 + i as i64), i as i64 + 1, "it", 20)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap().outcome)
        .collect();
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == WriteOutcome::Inserted)
            .count(),
        1,
        "exactly one writer inserts"
    );
    assert_eq!(facts::count(db.conn()).unwrap(), 1);

    let key = FactKey {
        unit_code: unit.code.clone(),
        cost_type_code: municipal().code,
        year: 2023,
    };
    let stored = facts::get(db.conn(), &key).unwrap().unwrap();
    let history = audit::entries_for_record(db.conn(), FACT_TABLE, stored.fact_id).unwrap();
    let last_value = history.last().unwrap().after.as_ref().unwrap()["value"]
        .as_str()
        .unwrap()
        .parse::<Decimal>()
        .unwrap();
    assert_eq!(last_value, stored.value, "audit trail ends at the stored value");
}

#[test]
fn concurrent_dimension_resolution_creates_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let db = StatsDb::open(&dir.path().join("costflow.duckdb")).unwrap();

    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|_| {
            let conn = db.try_clone().unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                conn.transaction_with_retry(5, |c| dimensions::resolve_period(c, 2024))
            })
        })
        .collect();

    let ids: Vec<i64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(dimensions::list_periods(db.conn()).unwrap().len(), 1);
}

#[test]
fn racing_period_creation_surfaces_as_retryable_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let db = StatsDb::open(&dir.path().join("costflow.duckdb")).unwrap();
    let other = db.try_clone().unwrap();

    db.conn().execute_batch("BEGIN TRANSACTION").unwrap();
    let winner = dimensions::resolve_period(db.conn(), 2031).unwrap();

    other.conn().execute_batch("BEGIN TRANSACTION").unwrap();
    let racing = dimensions::resolve_period(other.conn(), 2031);
    db.conn().execute_batch("COMMIT").unwrap();

    // The loser fails either on its insert or when it commits.
    let lost = match racing {
        Err(e) => e,
        Ok(_) => match other.conn().execute_batch("COMMIT") {
            Err(e) => cf_store::StoreError::from(e),
            Ok(()) => panic!("both transactions created period 2031"),
        },
    };
    assert!(lost.is_conflict(), "unexpected error: {lost}");
    let _ = other.conn().execute_batch("ROLLBACK");

    let retried = other
        .transaction_with_retry(3, |c| dimensions::resolve_period(c, 2031))
        .unwrap();
    assert_eq!(retried, winner);
    assert_eq!(dimensions::list_periods(db.conn()).unwrap().len(), 1);
}

#[test]
fn concurrent_first_sight_writes_share_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let db = StatsDb::open(&dir.path().join("costflow.duckdb")).unwrap();
    let run_id = runs::begin_run(db.conn(), "race.json", "hash", Utc::now()).unwrap();

    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let conn = db.try_clone().unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let unit = district("1465011");
                barrier.wait();
                (2018..2024)
                    .map(|year| {
                        let candidate = FactCandidate {
                            key: FactKey {
                                unit_code: unit.code.clone(),
                                cost_type_code: municipal().code,
                                year,
                            },
                            value: Decimal::from(100 + i),
                            adjustment: false,
                            unit_draft: Some(unit.clone()),
                            cost_type_draft: Some(municipal()),
                        };
                        facts::write_candidate(&conn, &candidate, run_id, "it", 3)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for write in handle.join().unwrap() {
            write.unwrap();
        }
    }
    let conn = db.conn();
    assert_eq!(dimensions::list_units(conn, None).unwrap().len(), 1);
    assert_eq!(dimensions::list_cost_types(conn, None).unwrap().len(), 1);
    assert_eq!(dimensions::list_periods(conn).unwrap().len(), 6);
    assert_eq!(facts::count(conn).unwrap(), 6);
}

#[test]
fn finished_run_exposes_its_facts() {
    let db = StatsDb::open_memory().unwrap();
    let run_id = runs::begin_run(db.conn(), "it.json", "hash", Utc::now()).unwrap();
    let ids = resolve(&db, &district("1465011"), 2023);
    facts::upsert(&db, &ids, Decimal::from(5), run_id, "it", 3).unwrap();
    assert!(costs_full(db.conn(), None, None).unwrap().is_empty());

    let counts = RunCounts {
        processed: 1,
        inserted: 1,
        ..RunCounts::default()
    };
    runs::finalize_run(db.conn(), run_id, counts.decide(), &counts, None, Utc::now()).unwrap();
    assert_eq!(counts.decide(), RunStatus::Success);
    assert_eq!(costs_full(db.conn(), Some(2023), None).unwrap().len(), 1);
}
