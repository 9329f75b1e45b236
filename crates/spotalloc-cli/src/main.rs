use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spotalloc_engine::{
    ConfigError, DataError, EngineConfig, EngineError, EpsilonConstraintEngine, InstanceLoader, MilpSolver,
};

mod report;

#[derive(Parser)]
#[command(name = "spotalloc")]
#[command(about = "Allocate commercial breaks to brands along the revenue/reach frontier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log solver progress at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace the revenue/reach frontier
    Solve {
        #[command(flatten)]
        input: InputArgs,
        /// TOML file with engine settings
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Wall-clock limit per sub-problem, in seconds
        #[arg(long)]
        time_limit: Option<f64>,
        /// Write one .lp file per solved sub-problem into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
        /// Maximum number of scan iterations
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
    /// Load and validate the input files without solving
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(clap::Args)]
struct InputArgs {
    /// JSON file with the commercial breaks
    #[arg(long)]
    breaks: PathBuf,
    /// JSON file with the brands
    #[arg(long)]
    brands: PathBuf,
    /// Break slot whose price is charged
    #[arg(long)]
    price_slot: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Cannot encode result: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cannot write output: {0}")]
    Io(#[from] io::Error),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(io::stderr)
        .init();

    info!("spotalloc v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli.command) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Solve {
            input,
            config,
            time_limit,
            export_dir,
            max_iterations,
            format,
        } => {
            let mut config = match config {
                Some(path) => EngineConfig::load(path)?,
                None => EngineConfig::default(),
            };
            if let Some(secs) = time_limit {
                config.time_limit_secs = secs;
            }
            if let Some(dir) = export_dir {
                config.export_dir = Some(dir);
            }
            if let Some(max) = max_iterations {
                config.max_scan_iterations = max;
            }
            if let Some(slot) = &input.price_slot {
                config.price_slot = slot.clone();
            }
            config.validate()?;

            let instance = InstanceLoader::new()
                .with_price_slot(config.price_slot.as_str())
                .load_files(&input.breaks, &input.brands)?;

            let solver = MilpSolver::from_config(&config);
            let outcome = EpsilonConstraintEngine::new(&instance, solver, &config).run()?;

            let mut out = io::stdout().lock();
            match format {
                Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?,
                Format::Pretty => report::write_outcome(&mut out, &instance, &outcome)?,
            }
            Ok(())
        }
        Commands::Check { input } => {
            let mut loader = InstanceLoader::new();
            if let Some(slot) = input.price_slot {
                loader = loader.with_price_slot(slot);
            }
            let instance = loader.load_files(&input.breaks, &input.brands)?;
            report::write_check(&mut io::stdout().lock(), &instance)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BREAKS: &str = r#"{
        "0": {"remaining_time": 30, "prime": "1", "slots": {"normal_1": {"price": 5}}, "grp": {"adults": 10.0, "men": 1.0}},
        "1": {"remaining_time": 20, "prime": "0", "slots": {"normal_1": {"price": 4}}, "grp": {"adults": 10.0, "men": 1.0}}
    }"#;
    const BRANDS: &str = r#"[
        {"type": "soda", "audience": "adults", "format": 10, "cost_grp": 0, "budget": 1000, "ratio_prime": 0.5},
        {"type": "cars", "audience": "men", "format": 15, "cost_grp": 0, "budget": 1000, "ratio_prime": 0.5}
    ]"#;

    fn write_inputs(dir: &std::path::Path) -> (PathBuf, PathBuf) {
        let breaks = dir.join("breaks.json");
        let brands = dir.join("brands.json");
        std::fs::write(&breaks, BREAKS).unwrap();
        std::fs::write(&brands, BRANDS).unwrap();
        (breaks, brands)
    }

    #[test]
    fn test_parse_solve_arguments() {
        let cli = Cli::try_parse_from([
            "spotalloc",
            "solve",
            "--breaks",
            "b.json",
            "--brands",
            "r.json",
            "--time-limit",
            "30",
            "--format",
            "json",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Solve { input, time_limit, format, .. } => {
                assert_eq!(input.breaks, PathBuf::from("b.json"));
                assert_eq!(time_limit, Some(30.0));
                assert_eq!(format, Format::Json);
            }
            Commands::Check { .. } => panic!("expected solve"),
        }
    }

    #[test]
    fn test_solve_exports_models() {
        let dir = tempfile::tempdir().unwrap();
        let (breaks, brands) = write_inputs(dir.path());
        let models = dir.path().join("models");

        run(Commands::Solve {
            input: InputArgs {
                breaks,
                brands,
                price_slot: None,
            },
            config: None,
            time_limit: Some(60.0),
            export_dir: Some(models.clone()),
            max_iterations: None,
            format: Format::Json,
        })
        .unwrap();

        for name in ["bound-revenue.lp", "bound-reach.lp", "scan-0001.lp"] {
            assert!(models.join(name).exists(), "{} missing", name);
        }
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (breaks, brands) = write_inputs(dir.path());

        let err = run(Commands::Solve {
            input: InputArgs {
                breaks,
                brands,
                price_slot: None,
            },
            config: None,
            time_limit: Some(-1.0),
            export_dir: None,
            max_iterations: None,
            format: Format::Pretty,
        })
        .unwrap_err();

        assert!(matches!(err, CliError::Config(ConfigError::Invalid { field: "time_limit_secs", .. })));
    }

    #[test]
    fn test_check_reports_missing_price_slot() {
        let dir = tempfile::tempdir().unwrap();
        let (breaks, brands) = write_inputs(dir.path());

        let err = run(Commands::Check {
            input: InputArgs {
                breaks,
                brands,
                price_slot: Some("premium".to_string()),
            },
        })
        .unwrap_err();

        assert!(matches!(err, CliError::Data(DataError::MissingPriceSlot { break_id: 0, .. })));
    }
}
