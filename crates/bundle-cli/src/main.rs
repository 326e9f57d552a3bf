//! Bundle deployer CLI
//!
//! Drives the reconciliation engine from deployment descriptor files.

mod cli;
mod commands;
mod descriptor;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use commands::DeployMode;
use commands::snapshot::SnapshotArgs;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute_command(cli.command)
}

/// Log to stderr so JSON output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let result = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    if let Err(e) = result {
        eprintln!("{}: cannot install logger: {e}", "warning".yellow());
    }
    tracing::debug!("Verbose mode enabled");
}

fn execute_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Deploy {
            descriptor,
            clean,
            dry_run,
            json,
            destination,
        } => commands::run_deploy(&descriptor, destination.as_deref(), DeployMode::Deploy, clean, dry_run, json),
        Commands::DryRun {
            descriptor,
            json,
            destination,
        } => commands::run_deploy(&descriptor, destination.as_deref(), DeployMode::Deploy, false, true, json),
        Commands::Revert {
            descriptor,
            clean,
            dry_run,
            json,
            destination,
        } => commands::run_deploy(&descriptor, destination.as_deref(), DeployMode::Revert, clean, dry_run, json),
        Commands::Status { destination, json } => commands::run_status(&destination, json),
        Commands::Estimate {
            descriptor,
            json,
            destination,
        } => commands::run_estimate(&descriptor, destination.as_deref(), json),
        Commands::Snapshot {
            destination,
            id,
            name,
            version,
            description,
            compliance,
            ignore,
        } => commands::run_snapshot(
            &destination,
            SnapshotArgs {
                id,
                name: &name,
                version: &version,
                description: description.as_deref(),
                compliance,
                ignore: ignore.as_deref(),
            },
        ),
    }
}
