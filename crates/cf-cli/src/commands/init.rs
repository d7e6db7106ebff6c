//! Init command implementation - prepares a Costflow project directory

use anyhow::{Context, Result};
use cf_core::config::CONFIG_FILE_NAMES;
use cf_core::ReferenceData;
use cf_store::dimensions;
use std::fs;
use std::path::Path;

use crate::cli::{GlobalArgs, InitArgs};
use crate::context::RuntimeContext;

const DEFAULT_CONFIG: &str = r#"# Costflow project configuration

database:
  path: target/costflow.duckdb

validation:
  min_year: 2000
  max_year: 2100
  # Unknown units and cost types are rejected instead of drafted
  strict_references: true
  unit_code_pattern: '^\d{7}$'

quality:
  null_threshold_pct: 5.0
  outlier:
    rule: stddev
    k: 3.0
  require_zero_duplicates: true

import:
  skip_duplicate_sources: true
  stale_run_timeout_secs: 3600
  actor: costflow
  conflict_retries: 3

reporting:
  from_year: 2022
  to_year: 2023
  top_movers_limit: 10
  anomaly_sigma: 2.0
"#;

/// Execute the init command
pub(crate) async fn execute(args: &InitArgs, global: &GlobalArgs) -> Result<()> {
    let project_dir = Path::new(&global.project_dir);
    fs::create_dir_all(project_dir)
        .with_context(|| format!("Failed to create directory: {}", project_dir.display()))?;

    let existing = CONFIG_FILE_NAMES
        .iter()
        .map(|name| project_dir.join(name))
        .find(|path| path.exists());
    match existing {
        Some(path) => println!("Keeping existing {}", path.display()),
        None if global.config.is_some() => {}
        None => {
            let path = project_dir.join(CONFIG_FILE_NAMES[0]);
            fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Created {}", path.display());
        }
    }

    let ctx = RuntimeContext::new(global)?;
    if !args.no_seed {
        let cost_types = ReferenceData::standard_cost_types();
        ctx.db
            .transaction(|conn| {
                for cost_type in &cost_types {
                    dimensions::register_cost_type(conn, cost_type)?;
                }
                Ok(())
            })
            .context("Failed to register standard cost types")?;
        println!("Registered {} standard cost types", cost_types.len());
    }

    match ctx.config.database_path_absolute(&ctx.root) {
        Some(path) if global.database.is_none() => println!("Database ready at {}", path.display()),
        _ => println!("Database ready"),
    }
    Ok(())
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
