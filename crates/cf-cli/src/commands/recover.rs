//! Recover command implementation - fails runs left RUNNING by a crash

use anyhow::{Context, Result};
use cf_import::ImportCoordinator;

use crate::cli::GlobalArgs;
use crate::context::RuntimeContext;

/// Execute the recover command
pub(crate) async fn execute(global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let timeout = ctx.config.import.stale_run_timeout_secs;
    let coordinator =
        ImportCoordinator::new(ctx.db, &ctx.config).context("Invalid import configuration")?;
    let recovered = coordinator
        .recover_stale_runs()
        .context("Failed to recover stale runs")?;

    if recovered.is_empty() {
        println!("No runs older than {timeout}s are still RUNNING.");
    } else {
        let ids: Vec<String> = recovered.iter().map(i64::to_string).collect();
        println!("Marked {} stale run(s) as FAILED: {}", ids.len(), ids.join(", "));
    }
    Ok(())
}
