//! Status command implementation

use std::collections::BTreeMap;
use std::path::Path;

use bundle_core::{DeploymentProperties, DeploymentsMetadata, DestinationComplianceMode};
use bundle_fs::canonicalize_path;
use colored::Colorize;
use serde::Serialize;

use super::print_json;
use crate::error::Result;

#[derive(Debug, Default, Serialize)]
struct StatusReport {
    managed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment: Option<DeploymentProperties>,
    files: usize,
    added: Vec<String>,
    changed: Vec<String>,
    deleted: Vec<String>,
}

impl StatusReport {
    fn in_sync(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Run the status command
pub fn run_status(destination: &Path, json: bool) -> Result<()> {
    let destination = canonicalize_path(destination)?;
    let report = build_report(&destination)?;

    if json {
        return print_json(&report);
    }

    let Some(deployment) = &report.deployment else {
        println!("{}", "Not managed".red().bold());
        println!();
        println!("Run {} to deploy into it.", "bundle deploy".cyan());
        return Ok(());
    };

    println!("{}", "Deployment Status".bold());
    println!();
    println!("{}:  {}", "Destination".dimmed(), destination.display());
    println!("{}:       {}", "Bundle".dimmed(), deployment.bundle_name.cyan());
    println!("{}:      {}", "Version".dimmed(), deployment.bundle_version);
    println!("{}:   {}", "Deployment".dimmed(), deployment.deployment_id);
    println!("{}:   {}", "Compliance".dimmed(), deployment.destination_compliance);
    println!("{}:        {}", "Files".dimmed(), report.files);
    println!();

    if report.in_sync() {
        println!("{}", "No drift from the deployed content".green());
        return Ok(());
    }
    println!("{}:", "Drift".bold());
    for path in &report.added {
        println!("  {} {}", "+".green(), path);
    }
    for path in &report.changed {
        println!("  {} {}", "~".yellow(), path);
    }
    for path in &report.deleted {
        println!("  {} {}", "-".red(), path);
    }
    Ok(())
}

fn build_report(destination: &Path) -> Result<StatusReport> {
    let metadata = DeploymentsMetadata::new(destination);
    if !metadata.is_managed() {
        return Ok(StatusReport::default());
    }

    let deployment = metadata.current_deployment_properties()?;
    let map = metadata.current_deployment_file_hashcodes()?;
    let report_new = deployment.destination_compliance == DestinationComplianceMode::Full;
    let current = map.rescan(destination, None, report_new)?;

    let keys = |entries: &BTreeMap<String, String>| -> Vec<String> { entries.keys().cloned().collect() };
    Ok(StatusReport {
        managed: true,
        files: map.len(),
        added: keys(current.additions()),
        changed: keys(current.changes()),
        deleted: keys(current.deletions()),
        deployment: Some(deployment),
    })
}
