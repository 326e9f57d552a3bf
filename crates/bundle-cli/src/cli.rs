//! CLI argument parsing using clap derive

use std::path::PathBuf;

use bundle_core::DestinationComplianceMode;
use clap::{Parser, Subcommand};

/// Bundle deployer - Lay bundles into destination directories without losing local changes
#[derive(Parser, Debug)]
#[command(name = "bundle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Deploy the bundle described by a descriptor file
    ///
    /// Examples:
    ///   bundle deploy bundle.toml
    ///   bundle deploy bundle.toml --clean
    ///   bundle deploy bundle.toml --destination /srv/app --json
    Deploy {
        /// Deployment descriptor (.toml, .json, .yaml)
        descriptor: PathBuf,

        /// Wipe the destination before laying the bundle down
        #[arg(long)]
        clean: bool,

        /// Report what would change without touching the destination
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Override the descriptor's destination directory
        #[arg(short, long, env = "BUNDLE_DESTINATION")]
        destination: Option<PathBuf>,
    },

    /// Report what a deployment would change
    DryRun {
        /// Deployment descriptor (.toml, .json, .yaml)
        descriptor: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Override the descriptor's destination directory
        #[arg(short, long, env = "BUNDLE_DESTINATION")]
        destination: Option<PathBuf>,
    },

    /// Redeploy a bundle and restore the files the current deployment backed up
    Revert {
        /// Deployment descriptor of the revision to go back to
        descriptor: PathBuf,

        /// Wipe the destination before laying the bundle down
        #[arg(long)]
        clean: bool,

        /// Report what would change without touching the destination
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Override the descriptor's destination directory
        #[arg(short, long, env = "BUNDLE_DESTINATION")]
        destination: Option<PathBuf>,
    },

    /// Show the current deployment of a destination and how it drifted
    Status {
        /// Destination directory
        destination: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Estimate the disk space a deployment needs
    Estimate {
        /// Deployment descriptor (.toml, .json, .yaml)
        descriptor: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,

        /// Override the descriptor's destination directory
        #[arg(short, long, env = "BUNDLE_DESTINATION")]
        destination: Option<PathBuf>,
    },

    /// Adopt the live content of a directory as its current deployment
    Snapshot {
        /// Destination directory
        destination: PathBuf,

        /// Deployment id to record
        #[arg(long)]
        id: i32,

        /// Bundle name
        #[arg(long)]
        name: String,

        /// Bundle version
        #[arg(long)]
        version: String,

        /// Free-form description
        #[arg(long)]
        description: Option<String>,

        /// Destination compliance mode (full or filesAndDirectories)
        #[arg(long, default_value = "full")]
        compliance: DestinationComplianceMode,

        /// Regex of paths to leave out of the snapshot
        #[arg(long)]
        ignore: Option<String>,
    },
}
