//! Audit command implementation

use anyhow::{Context, Result};
use cf_store::{audit, AuditEntry};

use crate::cli::{AuditArgs, GlobalArgs, OutputFormat};
use crate::commands::common;
use crate::context::RuntimeContext;

/// Execute the audit command
pub(crate) async fn execute(args: &AuditArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let entries = audit::recent(ctx.db.conn(), args.table.as_deref(), args.limit)
        .context("Failed to read the audit log")?;

    match args.output {
        OutputFormat::Json => common::print_json(&entries),
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = entries.iter().map(entry_row).collect();
            common::print_table(
                &["ID", "TABLE", "RECORD", "OP", "CHANGE", "ACTOR", "CHANGED_AT"],
                &rows,
            );
            Ok(())
        }
    }
}

fn entry_row(entry: &AuditEntry) -> Vec<String> {
    vec![
        entry.audit_id.to_string(),
        entry.table_name.clone(),
        entry.record_id.to_string(),
        entry.operation.to_string(),
        describe_change(entry),
        entry.actor.clone(),
        common::format_time(&entry.changed_at),
    ]
}

/// `value` before and after the change, e.g. `100.00 -> 150.00`.
fn describe_change(entry: &AuditEntry) -> String {
    let value = |snapshot: Option<&serde_json::Value>| {
        snapshot
            .and_then(|s| s.get("value"))
            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
    };
    match (value(entry.before.as_ref()), value(entry.after.as_ref())) {
        (Some(before), Some(after)) => format!("{before} -> {after}"),
        (None, Some(after)) => format!("+ {after}"),
        (Some(before), None) => format!("- {before}"),
        (None, None) => "-".to_string(),
    }
}

#[cfg(test)]
#[path = "audit_test.rs"]
mod tests;
