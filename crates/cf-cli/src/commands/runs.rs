//! Runs command implementation

use anyhow::{Context, Result};
use cf_store::{runs, ImportRun};

use crate::cli::{GlobalArgs, OutputFormat, RunsArgs};
use crate::commands::common;
use crate::context::RuntimeContext;

/// Execute the runs command
pub(crate) async fn execute(args: &RunsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let runs = runs::list_runs(ctx.db.conn(), args.limit).context("Failed to list import runs")?;

    match args.output {
        OutputFormat::Json => common::print_json(&runs),
        OutputFormat::Table => {
            if runs.is_empty() {
                println!("No import runs yet.");
            } else {
                let rows: Vec<Vec<String>> = runs.iter().map(run_row).collect();
                common::print_table(
                    &[
                        "ID", "SOURCE", "STATUS", "PROCESSED", "INSERTED", "UPDATED", "UNCHANGED",
                        "FAILED", "STARTED", "FINISHED",
                    ],
                    &rows,
                );
            }
            Ok(())
        }
    }
}

fn run_row(run: &ImportRun) -> Vec<String> {
    vec![
        run.id.to_string(),
        run.source.clone(),
        run.status.to_string(),
        run.counts.processed.to_string(),
        run.counts.inserted.to_string(),
        run.counts.updated.to_string(),
        run.counts.unchanged.to_string(),
        run.counts.failed.to_string(),
        common::format_time(&run.started_at),
        common::or_dash(run.finished_at.as_ref().map(common::format_time)),
    ]
}
