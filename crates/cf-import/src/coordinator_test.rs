use super::*;
use cf_core::{ErrorKind, NewUnit, ReferenceData, UnitCode, UnitLevel};
use cf_store::audit;
use cf_store::facts::FACT_TABLE;
use std::str::FromStr;

// ── Helpers ────────────────────────────────────────────────────────────

fn seeded_db() -> StatsDb {
    let db = StatsDb::open_memory().unwrap();
    let conn = db.conn();
    dimensions::register_unit(
        conn,
        &NewUnit::new(
            UnitCode::try_new("1400000").unwrap(),
            "Mazowieckie",
            UnitLevel::Province,
            None,
        )
        .unwrap(),
    )
    .unwrap();
    dimensions::register_unit(
        conn,
        &NewUnit::new(
            UnitCode::try_new("1465011").unwrap(),
            "Warszawa",
            UnitLevel::District,
            UnitCode::try_new("1400000"),
        )
        .unwrap(),
    )
    .unwrap();
    for cost_type in ReferenceData::standard_cost_types() {
        dimensions::register_cost_type(conn, &cost_type).unwrap();
    }
    db
}

fn coordinator(config: &Config) -> ImportCoordinator {
    ImportCoordinator::new(seeded_db(), config).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn key(unit: &str, cost_type: &str, year: i32) -> FactKey {
    FactKey {
        unit_code: UnitCode::try_new(unit).unwrap(),
        cost_type_code: cf_core::CostTypeCode::try_new(cost_type).unwrap(),
        year,
    }
}

fn three_rows() -> Vec<RawRecord> {
    vec![
        RawRecord::new("1465011", "MUNICIPAL", 2024, "100"),
        RawRecord::new("1465011", "MUNICIPAL", 2024, "150"),
        RawRecord::new("1400000", "BAD_TYPE", 2024, "50"),
    ]
}

// ── Run lifecycle ──────────────────────────────────────────────────────

#[test]
fn duplicate_keys_collapse_and_unknown_reference_makes_partial() {
    let coord = coordinator(&Config::default());
    let summary = coord.import("batch.json", &three_rows()).unwrap();

    let run = &summary.run;
    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.counts.processed, 3);
    assert_eq!(run.counts.inserted, 1);
    assert_eq!(run.counts.updated, 1);
    assert_eq!(run.counts.failed, 1);
    assert!(run.finished_at.is_some());

    let conn = coord.db().conn();
    assert_eq!(facts::count(conn).unwrap(), 1);
    let fact = facts::get(conn, &key("1465011", "MUNICIPAL", 2024))
        .unwrap()
        .unwrap();
    assert_eq!(fact.value, dec("150"));
    assert_eq!(fact.import_id, run.id);

    let errors = errors::by_import(conn, run.id).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error.kind, ErrorKind::UnknownReference);
    assert_eq!(errors[0].record_index, 2);
    assert_eq!(errors[0].raw_record["cost_type_code"], "BAD_TYPE");

    let report = summary.report.unwrap();
    assert_eq!(report.duplicate_count, 1);
    assert_eq!(report.total_rows, 3);
    assert!(!report.validation_passed);
    let dist = report.distribution.unwrap();
    assert_eq!(dist.min, dec("150"));
    assert_eq!(dist.max, dec("150"));
    assert_eq!(quality::get_report(conn, run.id).unwrap().unwrap().duplicate_count, 1);
}

#[test]
fn every_write_has_exactly_one_audit_entry() {
    let coord = coordinator(&Config::default());
    let summary = coord.import("batch.json", &three_rows()).unwrap();
    let conn = coord.db().conn();
    let fact = facts::get(conn, &key("1465011", "MUNICIPAL", 2024))
        .unwrap()
        .unwrap();
    let history = audit::entries_for_record(conn, FACT_TABLE, fact.fact_id).unwrap();
    assert_eq!(
        history.len() as u64,
        summary.run.counts.inserted + summary.run.counts.updated
    );
    assert!(history.iter().all(|e| e.actor == "costflow"));
}

#[test]
fn clean_batch_succeeds_and_passes_quality_gate() {
    let coord = coordinator(&Config::default());
    let records = vec![
        RawRecord::new("1465011", "MUNICIPAL", 2023, "100.50"),
        RawRecord::new("1465011", "COOPERATIVE", 2023, "80"),
        RawRecord::new("1400000", "MUNICIPAL", 2023, "1 200,25"),
    ];
    let summary = coord.import("clean.json", &records).unwrap();
    assert_eq!(summary.run.status, RunStatus::Success);
    assert_eq!(summary.run.counts.inserted, 3);
    assert!(summary.run.error_message.is_none());
    let report = summary.report.unwrap();
    assert!(report.validation_passed);
    assert!(report.issues.is_empty());
    assert_eq!(report.distribution.unwrap().max, dec("1200.25"));
}

#[test]
fn all_records_failing_is_failed() {
    let coord = coordinator(&Config::default());
    let records = vec![
        RawRecord::new("9999999", "MUNICIPAL", 2023, "1"),
        RawRecord::new("1465011", "MUNICIPAL", 1850, "1"),
    ];
    let summary = coord.import("bad.json", &records).unwrap();
    assert_eq!(summary.run.status, RunStatus::Failed);
    assert_eq!(summary.run.counts.failed, 2);
    let report = summary.report.unwrap();
    assert_eq!(report.domain_violation_count, 1);
    assert!(!report.validation_passed);
    assert!(report.distribution.is_none());
}

#[test]
fn empty_batch_succeeds() {
    let coord = coordinator(&Config::default());
    let summary = coord.import("empty.json", &[]).unwrap();
    assert_eq!(summary.run.status, RunStatus::Success);
    assert_eq!(summary.run.counts, RunCounts::default());
    assert_eq!(summary.report.unwrap().total_rows, 0);
}

#[test]
fn fatal_store_error_aborts_run_without_report() {
    let coord = coordinator(&Config::default());
    coord
        .db()
        .conn()
        .execute_batch("DROP TABLE cf.cost_facts")
        .unwrap();

    let records = vec![RawRecord::new("1465011", "MUNICIPAL", 2023, "100")];
    let summary = coord.import("broken.json", &records).unwrap();

    assert_eq!(summary.run.status, RunStatus::Failed);
    let message = summary.run.error_message.as_deref().unwrap();
    assert!(message.starts_with("aborted:"), "{message}");
    assert!(message.contains("cost_facts"), "{message}");
    assert!(summary.run.finished_at.is_some());
    assert!(summary.report.is_none());
    assert!(!summary.reused);

    let stored = runs::get_run(coord.db().conn(), summary.run.id).unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(
        quality::get_report(coord.db().conn(), summary.run.id)
            .unwrap()
            .is_none(),
        "aborted runs carry no quality report"
    );
}

// ── Idempotent re-submission ───────────────────────────────────────────

#[test]
fn resubmitted_batch_returns_prior_run_and_report() {
    let coord = coordinator(&Config::default());
    let records = vec![RawRecord::new("1465011", "MUNICIPAL", 2023, "10")];
    let first = coord.import("a.json", &records).unwrap();
    assert_eq!(first.run.status, RunStatus::Success);

    let second = coord.import("a-again.json", &records).unwrap();
    assert!(second.reused);
    assert_eq!(second.run, first.run);
    assert_eq!(second.report, first.report);
    assert_eq!(runs::list_runs(coord.db().conn(), 10).unwrap().len(), 1);
}

#[test]
fn partial_runs_are_not_reused() {
    let coord = coordinator(&Config::default());
    let first = coord.import("batch.json", &three_rows()).unwrap();
    let second = coord.import("batch.json", &three_rows()).unwrap();
    assert!(!second.reused);
    assert_ne!(second.run.id, first.run.id);
    // 100 overwrites the stored 150, then 150 overwrites 100 again
    assert_eq!(second.run.counts.updated, 2);
    assert_eq!(second.run.counts.failed, 1);
}

#[test]
fn reimport_without_dedup_reports_unchanged() {
    let mut config = Config::default();
    config.import.skip_duplicate_sources = false;
    let coord = coordinator(&config);
    let records = vec![RawRecord::new("1465011", "MUNICIPAL", 2023, "10")];
    let first = coord.import("a.json", &records).unwrap();
    let second = coord.import("a.json", &records).unwrap();

    assert!(!second.reused);
    assert_eq!(second.run.status, RunStatus::Success);
    assert_eq!(second.run.counts.unchanged, 1);
    assert_eq!(second.run.counts.written(), 1);

    let conn = coord.db().conn();
    let fact = facts::get(conn, &key("1465011", "MUNICIPAL", 2023))
        .unwrap()
        .unwrap();
    assert_eq!(fact.import_id, first.run.id, "unchanged fact keeps its owner");
    assert_eq!(
        audit::entries_for_record(conn, FACT_TABLE, fact.fact_id)
            .unwrap()
            .len(),
        1
    );
}

// ── Configuration, cancellation, recovery ──────────────────────────────

#[test]
fn invalid_config_is_rejected_before_any_run() {
    let mut config = Config::default();
    config.validation.min_year = 2030;
    config.validation.max_year = 2020;
    let db = seeded_db();
    let reader = db.try_clone().unwrap();
    let result = ImportCoordinator::new(db, &config);
    assert!(matches!(result, Err(ImportError::Config(_))));
    assert!(runs::list_runs(reader.conn(), 10).unwrap().is_empty());
}

#[test]
fn cancelled_run_finalizes_as_partial() {
    let flag = Arc::new(AtomicBool::new(true));
    let coord = coordinator(&Config::default()).with_cancel_flag(Arc::clone(&flag));
    let summary = coord.import("batch.json", &three_rows()).unwrap();
    assert_eq!(summary.run.status, RunStatus::Partial);
    assert_eq!(summary.run.counts.processed, 0);
    assert!(summary
        .run
        .error_message
        .as_deref()
        .unwrap()
        .contains("cancelled after 0 of 3"));
    assert_eq!(summary.report.unwrap().total_rows, 0);
}

#[test]
fn stale_runs_fail_without_touching_facts() {
    let coord = coordinator(&Config::default());
    let conn = coord.db().conn();
    let crashed = runs::begin_run(conn, "crashed.json", "h", Utc::now() - Duration::hours(2)).unwrap();
    let ids = dimensions::resolve_candidate(
        conn,
        &FactCandidate {
            key: key("1465011", "MUNICIPAL", 2023),
            value: dec("42"),
            adjustment: false,
            unit_draft: None,
            cost_type_draft: None,
        },
    )
    .unwrap();
    facts::upsert(coord.db(), &ids, dec("42"), crashed, "costflow", 0).unwrap();
    let fresh = runs::begin_run(conn, "fresh.json", "h2", Utc::now()).unwrap();

    let recovered = coord.recover_stale_runs().unwrap();
    assert_eq!(recovered, vec![crashed]);

    let run = runs::get_run(conn, crashed).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.unwrap().contains("stale timeout"));
    assert_eq!(
        runs::get_run(conn, fresh).unwrap().unwrap().status,
        RunStatus::Running
    );

    let fact = facts::get(conn, &key("1465011", "MUNICIPAL", 2023))
        .unwrap()
        .unwrap();
    assert_eq!(fact.value, dec("42"));
    assert_eq!(fact.import_id, crashed);
    assert!(coord.recover_stale_runs().unwrap().is_empty());
}

#[test]
fn lenient_mode_creates_missing_dimensions() {
    let mut config = Config::default();
    config.validation.strict_references = false;
    let coord = coordinator(&config);
    let mut record = RawRecord::new("0201011", "NEW_TYPE", 2023, "5");
    record.unit_name = Some("Bolesławiecki".into());
    record.category = Some("private".into());

    let summary = coord.import("lenient.json", &[record]).unwrap();
    assert_eq!(summary.run.status, RunStatus::Success);

    let conn = coord.db().conn();
    let districts = dimensions::list_units(conn, Some(UnitLevel::District)).unwrap();
    let created = districts
        .iter()
        .find(|u| u.code.as_str() == "0201011")
        .unwrap();
    assert_eq!(created.name, "Bolesławiecki");
    assert_eq!(created.parent_code.as_ref().unwrap().as_str(), "0200000");
    assert!(dimensions::cost_type_id(conn, "NEW_TYPE").unwrap().is_some());
}
