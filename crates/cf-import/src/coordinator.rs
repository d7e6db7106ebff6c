//! Import run orchestration.
//!
//! One [`ImportCoordinator::import`] call is one run:
//!
//! 1. hash the batch and, if enabled, return an earlier SUCCESS run with the
//!    same hash instead of importing again
//! 2. open the run as RUNNING
//! 3. validate each record; rejected records become validation errors
//! 4. resolve dimensions and upsert each accepted fact (with its audit entry)
//! 5. assess batch quality over the final fact values
//! 6. finalize the run and store the quality report in one transaction
//!
//! A record-scoped store failure fails only that record. A fatal store
//! failure aborts the run as FAILED without a quality report.

use crate::error::{ImportError, ImportResult};
use cf_core::config::ImportConfig;
use cf_core::{
    records_checksum, Config, FactCandidate, FactKey, QualityAssessor, QualityReport,
    QualityThresholds, RawRecord, RunCounts, RunStatus, ValidationOutcome, ValidationRules,
    Validator,
};
use cf_store::{dimensions, errors, facts, quality, runs};
use cf_store::{FactWrite, ImportRun, StatsDb, StoreError, WriteOutcome};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Record-level failure messages kept in a run's `error_message`
const MAX_REPORTED_FAILURES: usize = 10;

/// What an import call produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run: ImportRun,
    /// `None` when the run was aborted by an infrastructure failure
    pub report: Option<QualityReport>,
    /// True when an earlier run with the same content hash was returned
    pub reused: bool,
}

/// Orchestrates import runs against one database connection.
pub struct ImportCoordinator {
    db: StatsDb,
    rules: ValidationRules,
    thresholds: QualityThresholds,
    settings: ImportConfig,
    cancel: Arc<AtomicBool>,
}

impl ImportCoordinator {
    /// Build a coordinator, rejecting invalid configuration up front.
    pub fn new(db: StatsDb, config: &Config) -> ImportResult<Self> {
        config.validate().map_err(ImportError::Config)?;
        let rules = ValidationRules::from_config(&config.validation).map_err(ImportError::Config)?;
        Ok(Self {
            db,
            rules,
            thresholds: config.quality.clone(),
            settings: config.import.clone(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share a cancellation flag. Setting it stops the current run between
    /// records; the run finalizes as PARTIAL.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn db(&self) -> &StatsDb {
        &self.db
    }

    /// Import one batch of raw records from `source`.
    pub fn import(&self, source: &str, records: &[RawRecord]) -> ImportResult<RunSummary> {
        let hash = records_checksum(records).map_err(|e| ImportError::InputParse {
            source_name: source.to_string(),
            message: e.to_string(),
        })?;
        let conn = self.db.conn();

        if self.settings.skip_duplicate_sources {
            if let Some(previous) = runs::find_successful_by_hash(conn, &hash)? {
                log::info!(
                    "Batch from {source} matches successful run {} (hash {}), skipping",
                    previous.id,
                    &hash[..12]
                );
                let report = quality::get_report(conn, previous.id)?;
                return Ok(RunSummary {
                    run: previous,
                    report,
                    reused: true,
                });
            }
        }

        let snapshot = dimensions::known_codes(conn)?;
        let validator = Validator::new(&self.rules, &snapshot);
        let run_id = runs::begin_run(conn, source, &hash, Utc::now())?;

        let mut run = RunState::default();
        for (index, record) in records.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                run.cancelled = true;
                break;
            }
            let outcome = validator.validate(record);
            run.counts.processed += 1;

            match &outcome {
                ValidationOutcome::Rejected(error) => {
                    log::warn!(
                        "Run {run_id} record {index} rejected: {} on {}: {}",
                        error.kind,
                        error.field,
                        error.message
                    );
                    run.counts.failed += 1;
                    if let Err(e) = errors::append(conn, run_id, index as u64, error, &record.to_json()) {
                        if e.is_fatal() {
                            return self.abort(run_id, &run.counts, &e);
                        }
                        run.note_failure(index, &e);
                    }
                }
                ValidationOutcome::Accepted(candidate) => match self.write(candidate, run_id) {
                    Ok(write) => {
                        log::debug!("Run {run_id} record {index}: {:?} {}", write.outcome, candidate.key);
                        run.record_write(write.outcome, candidate);
                    }
                    Err(e) if e.is_fatal() => return self.abort(run_id, &run.counts, &e),
                    Err(e) => {
                        log::warn!("Run {run_id} record {index} failed: {e}");
                        run.counts.failed += 1;
                        run.note_failure(index, &e);
                    }
                },
            }
            run.outcomes.push(outcome);
        }

        let processed = run.outcomes.len();
        let status = if run.cancelled {
            log::warn!(
                "Run {run_id} cancelled after {processed} of {} records",
                records.len()
            );
            RunStatus::Partial
        } else {
            run.counts.decide()
        };
        let message = run.error_message(records.len());

        let values: Vec<Decimal> = run.final_values.values().copied().collect();
        let report = QualityAssessor::new(&self.thresholds).assess(
            &records[..processed],
            &run.outcomes,
            &values,
        );

        let finished = self.db.transaction(|conn| {
            runs::finalize_run(conn, run_id, status, &run.counts, message.as_deref(), Utc::now())?;
            quality::insert_report(conn, run_id, &report)?;
            Ok(())
        });
        if let Err(e) = finished {
            return self.abort(run_id, &run.counts, &e);
        }

        if !report.validation_passed {
            log::warn!("Run {run_id} failed the quality gate with {} issue(s)", report.issues.len());
        }
        Ok(RunSummary {
            run: self.load_run(run_id)?,
            report: Some(report),
            reused: false,
        })
    }

    /// Fail every RUNNING run older than the configured stale timeout.
    pub fn recover_stale_runs(&self) -> ImportResult<Vec<i64>> {
        let timeout = self.settings.stale_run_timeout_secs;
        let now = Utc::now();
        let cutoff = now - Duration::seconds(i64::try_from(timeout).unwrap_or(i64::MAX));
        let message = format!("run still RUNNING after the {timeout}s stale timeout");
        let recovered = runs::recover_stale_runs(self.db.conn(), cutoff, &message, now)?;
        if !recovered.is_empty() {
            log::info!("Recovered {} stale run(s)", recovered.len());
        }
        Ok(recovered)
    }

    fn write(&self, candidate: &FactCandidate, run_id: i64) -> Result<FactWrite, StoreError> {
        facts::write_candidate(
            &self.db,
            candidate,
            run_id,
            &self.settings.actor,
            self.settings.conflict_retries,
        )
    }

    /// Finalize `run_id` as FAILED after a fatal store error.
    fn abort(&self, run_id: i64, counts: &RunCounts, cause: &StoreError) -> ImportResult<RunSummary> {
        log::error!("Run {run_id} aborted: {cause}");
        let message = format!("aborted: {cause}");
        if let Err(e) = runs::finalize_run(
            self.db.conn(),
            run_id,
            RunStatus::Failed,
            counts,
            Some(&message),
            Utc::now(),
        ) {
            log::error!("Could not mark run {run_id} as FAILED: {e}");
            return Err(ImportError::Store(e));
        }
        Ok(RunSummary {
            run: self.load_run(run_id)?,
            report: None,
            reused: false,
        })
    }

    fn load_run(&self, run_id: i64) -> ImportResult<ImportRun> {
        runs::get_run(self.db.conn(), run_id)?.ok_or_else(|| {
            ImportError::Store(StoreError::NotFound {
                entity: "import run",
                key: run_id.to_string(),
            })
        })
    }
}

/// Mutable bookkeeping of one run in progress
#[derive(Default)]
struct RunState {
    counts: RunCounts,
    outcomes: Vec<ValidationOutcome>,
    /// Last value written or confirmed per fact key
    final_values: BTreeMap<FactKey, Decimal>,
    failures: Vec<String>,
    failure_total: usize,
    cancelled: bool,
}

impl RunState {
    fn record_write(&mut self, outcome: WriteOutcome, candidate: &FactCandidate) {
        match outcome {
            WriteOutcome::Inserted => self.counts.inserted += 1,
            WriteOutcome::Updated => self.counts.updated += 1,
            WriteOutcome::Unchanged => self.counts.unchanged += 1,
        }
        self.final_values
            .insert(candidate.key.clone(), candidate.value);
    }

    fn note_failure(&mut self, index: usize, error: &StoreError) {
        self.failure_total += 1;
        if self.failures.len() < MAX_REPORTED_FAILURES {
            self.failures.push(format!("record {index}: {error}"));
        }
    }

    fn error_message(&self, total_records: usize) -> Option<String> {
        let mut parts = self.failures.clone();
        if self.failure_total > self.failures.len() {
            parts.push(format!(
                "... and {} more store failures",
                self.failure_total - self.failures.len()
            ));
        }
        if self.cancelled {
            parts.push(format!(
                "cancelled after {} of {total_records} records",
                self.outcomes.len()
            ));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
