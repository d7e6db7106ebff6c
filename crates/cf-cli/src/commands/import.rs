//! Import command implementation

use anyhow::{Context, Result};
use cf_core::{Config, RunStatus};
use cf_import::{load_source, ImportCoordinator, InputFormat, RunSummary};
use cf_store::StatsDb;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::{FormatArg, GlobalArgs, ImportArgs, OutputFormat};
use crate::commands::common::{self, ExitCode};
use crate::context::RuntimeContext;

/// Execute the import command.
///
/// Every file becomes its own run on a cloned connection; the files are
/// imported concurrently. Ctrl-C stops every run after its current record;
/// interrupted runs finish as PARTIAL. Exits with code 1 when a file could
/// not be imported or a run ended FAILED.
pub(crate) async fn execute(args: &ImportArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let interrupt = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, stopping imports after the current record");
                cancel.store(true, Ordering::Relaxed);
            }
        })
    };

    let mut tasks = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let db = ctx
            .db
            .try_clone()
            .context("Failed to open a connection for the import")?;
        let config = ctx.config.clone();
        let path = path.clone();
        let format = args
            .format
            .map(input_format)
            .unwrap_or_else(|| InputFormat::from_path(&path));
        let api_level = args.api_level;
        let cancel = Arc::clone(&cancel);
        tasks.push(tokio::task::spawn_blocking(move || {
            import_file(db, &config, &path, format, api_level, cancel)
        }));
    }

    let mut summaries: Vec<RunSummary> = Vec::new();
    let mut file_errors: Vec<(PathBuf, String)> = Vec::new();
    for (path, task) in args.files.iter().zip(tasks) {
        match task.await.context("Import task panicked")? {
            Ok(summary) => summaries.push(summary),
            Err(e) => file_errors.push((path.clone(), format!("{e:#}"))),
        }
    }
    interrupt.abort();

    match args.output {
        OutputFormat::Json => common::print_json(&summaries)?,
        OutputFormat::Table => print_summaries(&summaries),
    }
    for (path, message) in &file_errors {
        eprintln!("Error importing {}: {message}", path.display());
    }

    let failed_runs = summaries
        .iter()
        .filter(|s| s.run.status == RunStatus::Failed)
        .count();
    if failed_runs > 0 || !file_errors.is_empty() {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

fn input_format(arg: FormatArg) -> InputFormat {
    match arg {
        FormatArg::Json => InputFormat::Json,
        FormatArg::Csv => InputFormat::Csv,
        FormatArg::Gus => InputFormat::Gus,
    }
}

fn import_file(
    db: StatsDb,
    config: &Config,
    path: &Path,
    format: InputFormat,
    api_level: u8,
    cancel: Arc<AtomicBool>,
) -> Result<RunSummary> {
    let coordinator = ImportCoordinator::new(db, config)?.with_cancel_flag(cancel);
    let source = load_source(coordinator.db(), path, format, api_level)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    coordinator
        .import(&source.name, &source.records)
        .with_context(|| format!("Import of {} failed", path.display()))
}

fn print_summaries(summaries: &[RunSummary]) {
    let rows: Vec<Vec<String>> = summaries.iter().map(summary_row).collect();
    common::print_table(
        &[
            "RUN", "SOURCE", "STATUS", "PROCESSED", "INSERTED", "UPDATED", "UNCHANGED", "FAILED",
            "QUALITY", "NOTE",
        ],
        &rows,
    );
}

fn summary_row(summary: &RunSummary) -> Vec<String> {
    let run = &summary.run;
    let quality = match &summary.report {
        Some(report) if report.validation_passed => "passed",
        Some(_) => "failed",
        None => "-",
    };
    let note = if summary.reused {
        "unchanged source, previous run reused".to_string()
    } else {
        run.error_message
            .as_deref()
            .map(|m| common::truncate(m, 60))
            .unwrap_or_default()
    };
    vec![
        run.id.to_string(),
        run.source.clone(),
        run.status.to_string(),
        run.counts.processed.to_string(),
        run.counts.inserted.to_string(),
        run.counts.updated.to_string(),
        run.counts.unchanged.to_string(),
        run.counts.failed.to_string(),
        quality.to_string(),
        note,
    ]
}
