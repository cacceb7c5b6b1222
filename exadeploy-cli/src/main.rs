//! CLI entry point for the exadeploy deployment tool.
//! Runs the full deploy sequence by default, with `plan` and `preflight`
//! subcommands. Exits 1 on any error.

mod output;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

use exadeploy_core::commands::deploy::submitted_units;
use exadeploy_core::config::{CliOverrides, DeployConfig};
use exadeploy_core::error::DeployError;
use exadeploy_core::report::write_json;
use exadeploy_core::source::SourceFile;
use exadeploy_core::{CancellationToken, Deployer, NullCommandSink};

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "exadeploy",
    about = "Deploy SQL schemas and LUA UDF scripts to an analytical database",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_HASH"), " ", env!("BUILD_TIME"), ")"
    ),
    propagate_version = true
)]
struct Cli {
    /// Config file path (default: exadeploy.toml if present)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// Target host (overrides config)
    #[arg(long, value_name = "HOST", global = true)]
    host: Option<String>,

    /// Target port (overrides config)
    #[arg(long, value_name = "PORT", global = true)]
    port: Option<u16>,

    /// Directory containing the source files (overrides config)
    #[arg(long, value_name = "DIR", global = true)]
    base_dir: Option<PathBuf>,

    /// Source files in deployment order, comma-separated, each `path[:kind]`
    #[arg(long, value_name = "FILES", global = true)]
    files: Option<String>,

    /// Summary file path, relative to the base directory
    #[arg(long, value_name = "PATH", global = true)]
    summary_file: Option<PathBuf>,

    /// Per-request timeout in seconds (0 = no timeout)
    #[arg(long, value_name = "SECS", global = true)]
    request_timeout: Option<u32>,

    /// Stop at the first failed unit
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Skip the connectivity probe before deploying
    #[arg(long, global = true)]
    skip_connectivity: bool,

    /// Accept every unit without contacting the target
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append log output to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// All available exadeploy subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Deploy every configured file (default)
    Deploy,

    /// Split and classify the sources without deploying
    Plan {
        /// Also write the plan manifest as JSON to this path
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Run pre-flight checks only
    Preflight,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging (suppress when JSON output is requested)
    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    if let Err(e) = init_logging(filter, cli.log_file.as_deref()) {
        print_error(&e);
        process::exit(exit_code(&e));
    }

    if let Err(e) = run(cli).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Configure env_logger, optionally writing to an append-only log file.
fn init_logging(filter: &str, log_file: Option<&Path>) -> Result<(), DeployError> {
    let mut builder = env_logger::Builder::new();
    builder
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.format_timestamp(None);
        }
    }

    builder.init();
    Ok(())
}

/// Every error maps to the same exit code.
fn exit_code(_error: &DeployError) -> i32 {
    1
}

/// Build configuration and dispatch the chosen subcommand.
async fn run(cli: Cli) -> Result<(), DeployError> {
    let json_output = cli.json;
    let dry_run = cli.dry_run;

    let files = cli
        .files
        .as_deref()
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(SourceFile::parse)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let overrides = CliOverrides {
        host: cli.host,
        port: cli.port,
        base_dir: cli.base_dir,
        files,
        fail_fast: cli.fail_fast.then_some(true),
        summary_file: cli.summary_file,
        request_timeout: cli.request_timeout,
        check_connectivity: cli.skip_connectivity.then_some(false),
    };

    let config = DeployConfig::load(cli.config.as_deref(), &overrides)?;
    log::debug!("Resolved configuration: {:?}", config);

    match cli.command.unwrap_or(Commands::Deploy) {
        Commands::Plan { output: manifest } => {
            let report = Deployer::plan(&config)?;
            if let Some(path) = manifest {
                write_json(&path, &report)?;
                log::info!("Plan manifest written; path={}", path.display());
            }
            if json_output {
                println!("{}", to_json(&report)?);
            } else {
                output::print_plan_report(&report);
            }
            if !report.missing_files.is_empty() {
                return Err(DeployError::PrerequisiteMissing {
                    files: report.missing_files.join(", "),
                });
            }
        }
        Commands::Preflight => {
            let mut deployer = build_deployer(config, dry_run)?;
            let report = deployer.preflight();
            if json_output {
                println!("{}", to_json(&report)?);
            } else {
                output::print_preflight_report(&report);
            }
            if !report.passed {
                return Err(DeployError::PreflightFailed {
                    checks: report.failures().join("; "),
                });
            }
        }
        Commands::Deploy => {
            let mut deployer = build_deployer(config, dry_run)?;
            let cancel = CancellationToken::new();

            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupt received, stopping after the current unit");
                    signal_token.cancel();
                }
            });

            let summary = tokio::task::spawn_blocking(move || deployer.deploy(&cancel))
                .await
                .map_err(|e| DeployError::TaskFailed(e.to_string()))??;

            if json_output {
                println!("{}", to_json(&summary)?);
            } else {
                output::print_deploy_report(&summary);
            }

            if summary.cancelled {
                return Err(DeployError::Cancelled {
                    submitted: submitted_units(&summary),
                });
            }
            if !summary.succeeded() {
                return Err(DeployError::DeploymentFailed {
                    errors: summary.stats.errors,
                    warnings: summary.stats.warnings,
                });
            }
        }
    }

    Ok(())
}

/// Create a deployer for the REST target, or a null sink for dry runs.
fn build_deployer(config: DeployConfig, dry_run: bool) -> Result<Deployer, DeployError> {
    if dry_run {
        log::info!("Dry run: units are accepted without contacting the target");
        return Ok(Deployer::with_sink(config, Box::new(NullCommandSink::new())));
    }
    Deployer::new(config)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DeployError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &DeployError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    // Provide actionable guidance
    match error {
        DeployError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Check your exadeploy.toml or set EXADEPLOY_HOST and EXADEPLOY_PASSWORD."
                    .dimmed()
            );
        }
        DeployError::PrerequisiteMissing { .. } => {
            eprintln!(
                "{}",
                "Hint: Check --base-dir and the configured file list. Nothing was deployed."
                    .dimmed()
            );
        }
        DeployError::PreflightFailed { .. } => {
            eprintln!(
                "{}",
                "Hint: Verify the target is reachable, or pass --skip-connectivity.".dimmed()
            );
        }
        DeployError::DeploymentFailed { .. } => {
            eprintln!(
                "{}",
                "Hint: The deployment summary lists every failed unit with its error.".dimmed()
            );
        }
        DeployError::Cancelled { .. } => {
            eprintln!(
                "{}",
                "Hint: The deployment summary lists the files that were skipped.".dimmed()
            );
        }
        _ => {}
    }
}
