//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Costflow - import and inspect municipal housing cost statistics
#[derive(Parser, Debug)]
#[command(name = "cf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override database path (`:memory:` for a throwaway database)
    #[arg(short, long, global = true, env = "COSTFLOW_DATABASE")]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default costflow.yml and create the database
    Init(InitArgs),

    /// Manage reference data (units and cost types)
    Reference(ReferenceArgs),

    /// Import one or more files of cost records
    Import(ImportArgs),

    /// List recent import runs
    Runs(RunsArgs),

    /// Show the quality report of a run
    Report(ReportArgs),

    /// Show the validation errors of a run
    Errors(ErrorsArgs),

    /// Show recent audit log entries
    Audit(AuditArgs),

    /// Print a read model
    View(ViewArgs),

    /// Mark runs stuck in RUNNING as FAILED
    Recover,
}

/// Output formats shared by listing commands
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table
    Table,
    /// Pretty-printed JSON
    Json,
}

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Skip registering the standard GUS cost types
    #[arg(long)]
    pub no_seed: bool,
}

/// Arguments for the reference command
#[derive(Args, Debug)]
pub struct ReferenceArgs {
    #[command(subcommand)]
    pub command: ReferenceCommands,
}

/// Reference data subcommands
#[derive(Subcommand, Debug)]
pub enum ReferenceCommands {
    /// Register units and cost types from a YAML file
    Load(ReferenceLoadArgs),
}

/// Arguments for `reference load`
#[derive(Args, Debug)]
pub struct ReferenceLoadArgs {
    /// Reference YAML file with `units:` and `cost_types:`
    pub file: PathBuf,
}

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Input files, imported concurrently as separate runs
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Input format (default: from the file extension)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// GUS `unit-level` the payload was requested with
    #[arg(long, default_value_t = 5)]
    pub api_level: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Input formats accepted by `import`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    /// JSON array of raw records
    Json,
    /// CSV with a header row
    Csv,
    /// GUS statistics API payload
    Gus,
}

/// Arguments for the runs command
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Maximum number of runs to list
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the report command
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Import run id
    pub run_id: i64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the errors command
#[derive(Args, Debug)]
pub struct ErrorsArgs {
    /// Import run id
    pub run_id: i64,

    /// Group errors by type and field instead of listing them
    #[arg(short, long)]
    pub summary: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the audit command
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Only entries for this table (e.g. `cost_facts`)
    #[arg(long)]
    pub table: Option<String>,

    /// Maximum number of entries
    #[arg(short, long, default_value_t = 50)]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the view command
#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Read model to print
    #[arg(value_enum)]
    pub name: ReadModel,

    /// Maximum number of rows (default: 100, top movers: reporting.top_movers_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Top movers base year (default: reporting.from_year)
    #[arg(long)]
    pub from_year: Option<i32>,

    /// Top movers comparison year (default: reporting.to_year)
    #[arg(long)]
    pub to_year: Option<i32>,

    /// Province anomaly threshold in standard deviations
    /// (default: reporting.anomaly_sigma)
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Read models printable with `view`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadModel {
    /// Facts joined with their dimension labels
    CostsFull,
    /// Province totals with district counts
    ProvinceCosts,
    /// Year-over-year trend per level and category
    YearlyTrend,
    /// Category share of each year's total
    CostStructure,
    /// Largest changes between two reference years
    TopMovers,
    /// Province changes from the first to the last year, outliers flagged
    ProvinceAnomalies,
    /// Record count, years, categories and value range
    SummaryStats,
    /// Latest finished import with its quality summary
    LatestImport,
}

impl ReadModel {
    /// View name in the `cf` schema. `None` for parameterised queries.
    pub fn view_name(self) -> Option<&'static str> {
        match self {
            ReadModel::CostsFull => Some("v_costs_full"),
            ReadModel::ProvinceCosts => Some("v_province_costs"),
            ReadModel::YearlyTrend => Some("v_yearly_trend"),
            ReadModel::CostStructure => Some("v_cost_structure"),
            ReadModel::LatestImport => Some("v_latest_import"),
            ReadModel::TopMovers | ReadModel::ProvinceAnomalies | ReadModel::SummaryStats => None,
        }
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
