use super::*;
use clap::{CommandFactory, Parser};

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn import_takes_several_files() {
    let cli = Cli::try_parse_from(["cf", "import", "a.json", "b.csv", "--format", "csv"]).unwrap();
    match cli.command {
        Commands::Import(args) => {
            assert_eq!(args.files.len(), 2);
            assert_eq!(args.format, Some(FormatArg::Csv));
            assert_eq!(args.api_level, 5);
            assert_eq!(args.output, OutputFormat::Table);
        }
        other => panic!("expected import, got {other:?}"),
    }
}

#[test]
fn import_requires_a_file() {
    assert!(Cli::try_parse_from(["cf", "import"]).is_err());
}

#[test]
fn global_args_after_subcommand() {
    let cli = Cli::try_parse_from(["cf", "runs", "-v", "-p", "proj", "--database", ":memory:"]).unwrap();
    assert!(cli.global.verbose);
    assert_eq!(cli.global.project_dir, "proj");
    assert_eq!(cli.global.database.as_deref(), Some(":memory:"));
}

#[test]
fn view_names_map_to_views() {
    let cli = Cli::try_parse_from(["cf", "view", "province-costs", "--limit", "5"]).unwrap();
    let Commands::View(args) = cli.command else {
        panic!("expected view");
    };
    assert_eq!(args.name.view_name(), Some("v_province_costs"));
    assert_eq!(args.limit, Some(5));
    assert_eq!(ReadModel::TopMovers.view_name(), None);
}

#[test]
fn analysis_read_models_parse() {
    let cli = Cli::try_parse_from(["cf", "view", "province-anomalies", "--sigma", "1.5"]).unwrap();
    let Commands::View(args) = cli.command else {
        panic!("expected view");
    };
    assert_eq!(args.name, ReadModel::ProvinceAnomalies);
    assert_eq!(args.sigma, Some(1.5));
    assert_eq!(args.name.view_name(), None);

    let cli = Cli::try_parse_from(["cf", "view", "summary-stats"]).unwrap();
    let Commands::View(args) = cli.command else {
        panic!("expected view");
    };
    assert_eq!(args.name, ReadModel::SummaryStats);
    assert_eq!(args.sigma, None);
}

#[test]
fn reference_load_parses() {
    let cli = Cli::try_parse_from(["cf", "reference", "load", "units.yml"]).unwrap();
    let Commands::Reference(args) = cli.command else {
        panic!("expected reference");
    };
    let ReferenceCommands::Load(load) = args.command;
    assert_eq!(load.file, PathBuf::from("units.yml"));
}
