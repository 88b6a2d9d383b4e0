//! CLI for the mutation testing engine

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use mutation_engine::codegen::expr_to_source;
use mutation_engine::{
    build_catalog, CancellationToken, CargoProject, Config, Engine, EngineOptions, MutatorRegistry,
};

#[derive(Parser)]
#[command(name = "mutation-engine")]
#[command(author, version, about = "Mutant-schemata mutation testing for Rust", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mutation tests
    Run {
        /// Path to the mutations config file
        #[arg(short, long, default_value = "mutations.yaml")]
        config: PathBuf,

        /// Project directory (defaults to current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Also write the report as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// List the mutants that would be tested, without building anything
    List {
        /// Path to the mutations config file
        #[arg(short, long, default_value = "mutations.yaml")]
        config: PathBuf,

        /// Project directory (defaults to current directory)
        #[arg(short, long)]
        project: Option<PathBuf>,
    },

    /// Show example configuration
    Example,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_logging(verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            project,
            verbose: _,
            json,
        } => run_mutations(&config, project, json.as_deref()),
        Commands::List { config, project } => list_mutants(&config, project),
        Commands::Example => {
            print_example();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(config_path)?;
    config.validate()?;
    Ok(config)
}

fn run_mutations(config_path: &Path, project: Option<PathBuf>, json: Option<&Path>) -> anyhow::Result<ExitCode> {
    let project_dir = project.unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(config_path)?;

    let catalog = build_catalog(&config, &project_dir, &MutatorRegistry::standard())?;
    if catalog.mutants.is_empty() {
        println!("{}", "No mutants found.".yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("received interrupt, cancelling run");
        handler_token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    let cargo = CargoProject::prepare(&project_dir)?;
    let engine = Engine::new(&cargo, &cargo, EngineOptions::from_config(&config, &project_dir), cancel);
    let report = engine.run(catalog)?;

    report.print();
    if let Some(path) = json {
        report
            .write_json(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if report.survived() > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn list_mutants(config_path: &Path, project: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let project_dir = project.unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(config_path)?;
    let catalog = build_catalog(&config, &project_dir, &MutatorRegistry::standard())?;

    for mutant in &catalog.mutants {
        println!(
            "{} {}:{} {} -> {} ({})",
            format!("#{}", mutant.id).dimmed(),
            mutant.file.display(),
            mutant.mutation.span,
            expr_to_source(&mutant.mutation.original),
            expr_to_source(&mutant.mutation.replacement),
            mutant.mutation.display_name
        );
    }
    println!();
    println!("{} mutant(s)", catalog.mutants.len());
    Ok(ExitCode::SUCCESS)
}

const EXAMPLE_CONFIG: &str = r#"# Example mutations.yaml configuration file
version: "1.0"

# Library root; src/main.rs and src/bin/ roots are found automatically
crate_root: src/lib.rs

# Files to mutate; every .rs file under src/ when omitted
files:
  - src/calculator.rs
  - src/validator.rs

settings:
  # basic, standard, advanced or complete
  level: standard

  # Restrict or disable mutation kinds
  # kinds: [arithmetic, equality, logical, boolean]
  disabled_kinds: [string]

  # Regions that are never mutated
  exclude:
    - file: src/calculator.rs
      lines: [40, 55]
    - file: src/generated.rs

  # Worker threads (defaults to the number of CPUs)
  concurrency: 4

  # Deadline = baseline time * multiplier + margin
  timeout:
    multiplier: 1.5
    margin_ms: 5000

  # Run only the tests that reach each mutant
  coverage_analysis: true
  # Reuse a saved coverage map instead of capturing one
  # coverage_file: target/mutation-coverage.json

  # Count these statuses as undetected in the score
  score:
    include_no_coverage: false
    include_compile_errors: false
    include_ignored: false
"#;

fn print_example() {
    println!("{}", EXAMPLE_CONFIG);
}
