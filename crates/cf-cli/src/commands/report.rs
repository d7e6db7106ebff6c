//! Report command implementation - quality report of one run

use anyhow::{Context, Result};
use cf_core::QualityReport;
use cf_store::{quality, runs, ImportRun};
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputFormat, ReportArgs};
use crate::commands::common;
use crate::context::RuntimeContext;

#[derive(Serialize)]
struct RunReport {
    run: ImportRun,
    report: Option<QualityReport>,
}

/// Execute the report command
pub(crate) async fn execute(args: &ReportArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let conn = ctx.db.conn();
    let Some(run) = runs::get_run(conn, args.run_id).context("Failed to load import run")? else {
        anyhow::bail!("Import run {} not found. Use `cf runs` to list runs.", args.run_id);
    };
    let report = quality::get_report(conn, run.id).context("Failed to load quality report")?;

    match args.output {
        OutputFormat::Json => common::print_json(&RunReport { run, report }),
        OutputFormat::Table => {
            println!("Run {} ({}) from {}", run.id, run.status, run.source);
            if let Some(message) = &run.error_message {
                println!("  {message}");
            }
            println!();
            match &report {
                Some(report) => print_report(report),
                None => println!("No quality report for this run."),
            }
            Ok(())
        }
    }
}

fn print_report(report: &QualityReport) {
    common::print_table(&["METRIC", "VALUE"], &report_rows(report));

    if report.issues.is_empty() {
        println!("\nQuality gate passed.");
        return;
    }
    println!("\nQuality gate failed:");
    for issue in &report.issues {
        println!("  {}: observed {}, expected {}", issue.check, issue.observed, issue.expected);
    }
}

fn report_rows(report: &QualityReport) -> Vec<Vec<String>> {
    let mut rows = vec![
        metric("total_rows", report.total_rows),
        metric("null_count", report.null_count),
        metric("null_percentage", format!("{:.2}", report.null_percentage)),
        metric("duplicate_count", report.duplicate_count),
        metric("outlier_count", report.outlier_count),
        metric("outlier_rule", &report.outlier_rule),
        metric("negative_count", report.negative_count),
        metric("domain_violation_count", report.domain_violation_count),
    ];
    if let Some(stats) = &report.distribution {
        rows.extend([
            metric("min", stats.min),
            metric("max", stats.max),
            metric("mean", format!("{:.2}", stats.mean)),
            metric("median", format!("{:.2}", stats.median)),
            metric("stddev", format!("{:.2}", stats.stddev)),
        ]);
    }
    rows
}

fn metric(name: &str, value: impl ToString) -> Vec<String> {
    vec![name.to_string(), value.to_string()]
}
