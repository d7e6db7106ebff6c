//! Errors command implementation - validation errors of one run

use anyhow::{Context, Result};
use cf_store::errors;

use crate::cli::{ErrorsArgs, GlobalArgs, OutputFormat};
use crate::commands::common;
use crate::context::RuntimeContext;

/// Execute the errors command
pub(crate) async fn execute(args: &ErrorsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let conn = ctx.db.conn();

    if args.summary {
        let summary =
            errors::summary(conn, args.run_id).context("Failed to summarize validation errors")?;
        return match args.output {
            OutputFormat::Json => common::print_json(&summary),
            OutputFormat::Table => {
                let rows: Vec<Vec<String>> = summary
                    .iter()
                    .map(|row| vec![row.kind.to_string(), row.field.clone(), row.count.to_string()])
                    .collect();
                common::print_table(&["TYPE", "FIELD", "COUNT"], &rows);
                Ok(())
            }
        };
    }

    let stored = errors::by_import(conn, args.run_id).context("Failed to load validation errors")?;
    match args.output {
        OutputFormat::Json => common::print_json(&stored),
        OutputFormat::Table => {
            if stored.is_empty() {
                println!("No validation errors for run {}.", args.run_id);
                return Ok(());
            }
            let rows: Vec<Vec<String>> = stored
                .iter()
                .map(|e| {
                    vec![
                        e.record_index.to_string(),
                        e.error.kind.to_string(),
                        e.error.field.clone(),
                        common::or_dash(e.error.raw_value.as_deref()),
                        common::truncate(&e.error.message, 80),
                    ]
                })
                .collect();
            common::print_table(&["RECORD", "TYPE", "FIELD", "VALUE", "MESSAGE"], &rows);
            Ok(())
        }
    }
}
