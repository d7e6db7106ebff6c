//! Reference data commands

use anyhow::{Context, Result};
use cf_core::ReferenceData;
use cf_store::dimensions;

use crate::cli::{GlobalArgs, ReferenceArgs, ReferenceCommands, ReferenceLoadArgs};
use crate::context::RuntimeContext;

/// Execute the reference command.
pub(crate) async fn execute(args: &ReferenceArgs, global: &GlobalArgs) -> Result<()> {
    match &args.command {
        ReferenceCommands::Load(load_args) => execute_load(load_args, global).await,
    }
}

async fn execute_load(args: &ReferenceLoadArgs, global: &GlobalArgs) -> Result<()> {
    let reference = ReferenceData::load(&args.file)
        .with_context(|| format!("Failed to load reference data from {}", args.file.display()))?;
    if reference.is_empty() {
        println!("{} contains no units or cost types", args.file.display());
        return Ok(());
    }

    let ctx = RuntimeContext::new(global)?;
    ctx.db
        .transaction(|conn| {
            for unit in &reference.units {
                dimensions::register_unit(conn, unit)?;
            }
            for cost_type in &reference.cost_types {
                dimensions::register_cost_type(conn, cost_type)?;
            }
            Ok(())
        })
        .context("Failed to register reference data")?;

    log::info!("Loaded reference data from {}", args.file.display());
    println!(
        "Registered {} units and {} cost types",
        reference.units.len(),
        reference.cost_types.len()
    );
    Ok(())
}
