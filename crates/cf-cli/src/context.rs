//! Runtime context for CLI commands

use anyhow::{Context, Result};
use cf_core::Config;
use cf_store::StatsDb;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Runtime context containing the loaded configuration and database
pub struct RuntimeContext {
    /// Project directory
    pub root: PathBuf,

    /// Validated project configuration
    pub config: Config,

    /// Open, migrated database
    pub db: StatsDb,
}

impl RuntimeContext {
    /// Create a new runtime context from global arguments
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&args.project_dir);
        let config = load_config(args)?;
        let path = database_path(&root, &config, args.database.as_deref());
        let db = open_database(path.as_deref())?;
        Ok(Self { root, config, db })
    }
}

/// Load config from `--config` or the project directory.
pub fn load_config(args: &GlobalArgs) -> Result<Config> {
    if let Some(config_path) = &args.config {
        Config::load(Path::new(config_path)).context("Failed to load configuration file")
    } else {
        Config::load_from_dir(Path::new(&args.project_dir))
            .context("Failed to load project configuration")
    }
}

/// Database file to open, `None` for in-memory.
///
/// A `--database` override is taken as given; the configured path is
/// resolved against the project directory.
pub fn database_path(root: &Path, config: &Config, override_path: Option<&str>) -> Option<PathBuf> {
    match override_path {
        Some(":memory:") => None,
        Some(path) => Some(PathBuf::from(path)),
        None => config.database_path_absolute(root),
    }
}

/// Open (and migrate) the database, creating parent directories as needed.
pub fn open_database(path: Option<&Path>) -> Result<StatsDb> {
    let Some(path) = path else {
        log::warn!("Using an in-memory database; nothing will be persisted");
        return StatsDb::open_memory().context("Failed to open in-memory database");
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    StatsDb::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
