//! Configuration types and parsing for costflow.yml

use crate::dimension::STORABLE_YEARS;
use crate::error::{CoreError, CoreResult};
use crate::quality::{OutlierConfig, QualityThresholds};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file names tried by [`Config::load_from_dir`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["costflow.yml", "costflow.yaml"];

/// Main project configuration from costflow.yml
///
/// Every section is optional; an empty file (or no file at all) yields a
/// working configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Record validation rules
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Batch quality gate
    #[serde(default)]
    pub quality: QualityThresholds,

    /// Import run behaviour
    #[serde(default)]
    pub import: ImportConfig,

    /// Read-model defaults
    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file path, relative to the project directory, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "target/costflow.duckdb".to_string()
}

/// Record validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    /// Earliest accepted reporting year
    #[serde(default = "default_min_year")]
    pub min_year: i32,

    /// Latest accepted reporting year
    #[serde(default = "default_max_year")]
    pub max_year: i32,

    /// Reject unit and cost-type codes that are not already registered.
    /// When false they are created on first sight.
    #[serde(default = "default_strict_references")]
    pub strict_references: bool,

    /// Regex a unit code must match. `None` disables the format check.
    #[serde(default = "default_unit_code_pattern")]
    pub unit_code_pattern: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_year: default_min_year(),
            max_year: default_max_year(),
            strict_references: default_strict_references(),
            unit_code_pattern: default_unit_code_pattern(),
        }
    }
}

fn default_min_year() -> i32 {
    2000
}

fn default_max_year() -> i32 {
    2100
}

fn default_strict_references() -> bool {
    true
}

fn default_unit_code_pattern() -> Option<String> {
    Some(r"^\d{7}$".to_string())
}

/// Import run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Return the previous run instead of re-importing a batch whose content
    /// hash matches an earlier successful run
    #[serde(default = "default_skip_duplicate_sources")]
    pub skip_duplicate_sources: bool,

    /// Age after which a run still marked RUNNING is considered crashed
    #[serde(default = "default_stale_run_timeout_secs")]
    pub stale_run_timeout_secs: u64,

    /// Name recorded as the author of audit entries
    #[serde(default = "default_actor")]
    pub actor: String,

    /// How often a fact write is retried after a transaction conflict
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            skip_duplicate_sources: default_skip_duplicate_sources(),
            stale_run_timeout_secs: default_stale_run_timeout_secs(),
            actor: default_actor(),
            conflict_retries: default_conflict_retries(),
        }
    }
}

fn default_skip_duplicate_sources() -> bool {
    true
}

fn default_stale_run_timeout_secs() -> u64 {
    3600
}

fn default_actor() -> String {
    "costflow".to_string()
}

fn default_conflict_retries() -> u32 {
    3
}

/// Read-model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportingConfig {
    /// Base year of the top-movers comparison
    #[serde(default = "default_from_year")]
    pub from_year: i32,

    /// Comparison year of the top-movers comparison
    #[serde(default = "default_to_year")]
    pub to_year: i32,

    /// Number of rows returned by the top-movers query
    #[serde(default = "default_top_movers_limit")]
    pub top_movers_limit: usize,

    /// Provinces whose first-to-last-year change lies more than this many
    /// standard deviations from the mean change are flagged as anomalies
    #[serde(default = "default_anomaly_sigma")]
    pub anomaly_sigma: f64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            from_year: default_from_year(),
            to_year: default_to_year(),
            top_movers_limit: default_top_movers_limit(),
            anomaly_sigma: default_anomaly_sigma(),
        }
    }
}

fn default_from_year() -> i32 {
    2022
}

fn default_to_year() -> i32 {
    2023
}

fn default_top_movers_limit() -> usize {
    10
}

fn default_anomaly_sigma() -> f64 {
    2.0
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::parse(&content)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a project directory.
    ///
    /// Falls back to the default configuration when the directory has no
    /// config file.
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }
        log::debug!(
            "No config file in {}, using defaults",
            dir.display()
        );
        Ok(Self::default())
    }

    /// Parse and validate configuration from YAML text.
    pub fn parse(content: &str) -> CoreResult<Self> {
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                message: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but make no sense together.
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |message: String| Err(CoreError::ConfigInvalid { message });

        for (field, year) in [
            ("min_year", self.validation.min_year),
            ("max_year", self.validation.max_year),
        ] {
            if !STORABLE_YEARS.contains(&year) {
                return invalid(format!(
                    "validation.{field} ({year}) is outside the storable years {}..={}",
                    STORABLE_YEARS.start(),
                    STORABLE_YEARS.end()
                ));
            }
        }
        if self.validation.min_year > self.validation.max_year {
            return invalid(format!(
                "validation.min_year ({}) is after validation.max_year ({})",
                self.validation.min_year, self.validation.max_year
            ));
        }
        if let Some(pattern) = &self.validation.unit_code_pattern {
            if let Err(e) = Regex::new(pattern) {
                return invalid(format!("validation.unit_code_pattern: {e}"));
            }
        }

        let null_pct = self.quality.null_threshold_pct;
        if !(0.0..=100.0).contains(&null_pct) {
            return invalid(format!(
                "quality.null_threshold_pct must be between 0 and 100, got {null_pct}"
            ));
        }
        match self.quality.outlier {
            OutlierConfig::StdDev { k } if !(k > 0.0 && k.is_finite()) => {
                return invalid(format!("quality.outlier.k must be positive, got {k}"));
            }
            OutlierConfig::Iqr { multiplier } if !(multiplier > 0.0 && multiplier.is_finite()) => {
                return invalid(format!(
                    "quality.outlier.multiplier must be positive, got {multiplier}"
                ));
            }
            _ => {}
        }

        if self.import.stale_run_timeout_secs == 0 {
            return invalid("import.stale_run_timeout_secs must be greater than 0".to_string());
        }
        if self.import.actor.trim().is_empty() {
            return invalid("import.actor must not be empty".to_string());
        }
        if self.reporting.from_year >= self.reporting.to_year {
            return invalid(format!(
                "reporting.from_year ({}) must be before reporting.to_year ({})",
                self.reporting.from_year, self.reporting.to_year
            ));
        }
        let sigma = self.reporting.anomaly_sigma;
        if !(sigma > 0.0 && sigma.is_finite()) {
            return invalid(format!("reporting.anomaly_sigma must be positive, got {sigma}"));
        }
        Ok(())
    }

    /// Absolute database path for a project rooted at `root`.
    ///
    /// Returns `None` for an in-memory database.
    pub fn database_path_absolute(&self, root: &Path) -> Option<PathBuf> {
        if self.database.path == ":memory:" {
            return None;
        }
        let path = Path::new(&self.database.path);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
