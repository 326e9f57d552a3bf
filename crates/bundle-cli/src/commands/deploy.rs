//! Deploy, dry-run and revert commands

use std::path::Path;

use bundle_core::{DeployDifferences, Deployer};
use colored::Colorize;
use serde::Serialize;

use super::print_json;
use crate::descriptor::Descriptor;
use crate::error::{CliError, Result};

/// Which deployer entry point to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    Deploy,
    Revert,
}

#[derive(Serialize)]
struct DeployReport<'a> {
    deployment_id: i32,
    bundle_name: &'a str,
    bundle_version: &'a str,
    dry_run: bool,
    files: usize,
    differences: &'a DeployDifferences,
}

/// Run a deployment described by `descriptor`.
///
/// Per-path errors do not stop the deployment, but they make the command
/// fail once everything has been reported.
pub fn run_deploy(
    descriptor: &Path,
    destination: Option<&Path>,
    mode: DeployMode,
    clean: bool,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let descriptor = Descriptor::load(descriptor)?;
    let data = descriptor.to_deployment_data(destination)?;
    let clean = clean || data.clean();
    let deployer = Deployer::new(data)?;

    let mut diff = DeployDifferences::new();
    let map = match mode {
        DeployMode::Deploy => deployer.deploy_with(&mut diff, clean, dry_run)?,
        DeployMode::Revert => deployer.redeploy_and_restore_backup_files(&mut diff, clean, dry_run)?,
    };

    let properties = deployer.deployment_data().properties();
    if json {
        print_json(&DeployReport {
            deployment_id: properties.deployment_id,
            bundle_name: &properties.bundle_name,
            bundle_version: &properties.bundle_version,
            dry_run,
            files: map.len(),
            differences: &diff,
        })?;
    } else {
        let verb = match (mode, dry_run) {
            (DeployMode::Deploy, false) => "Deployed",
            (DeployMode::Deploy, true) => "Would deploy",
            (DeployMode::Revert, false) => "Reverted to",
            (DeployMode::Revert, true) => "Would revert to",
        };
        println!(
            "{} {} {} (deployment {}) into {}",
            verb.green().bold(),
            properties.bundle_name.cyan(),
            properties.bundle_version,
            properties.deployment_id,
            deployer.destination_directory().display()
        );
        println!();
        print!("{diff}");
        println!();
        println!("{} managed files", map.len());
    }

    if diff.errors().is_empty() {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} path(s) could not be deployed; see the errors above",
            diff.errors().len()
        )))
    }
}
