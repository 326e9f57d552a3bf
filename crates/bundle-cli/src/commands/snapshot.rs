//! Snapshot command implementation

use std::collections::BTreeSet;
use std::path::Path;

use bundle_core::{DeploymentProperties, DeploymentsMetadata, DestinationComplianceMode, PathPattern};
use bundle_fs::canonicalize_path;
use colored::Colorize;

use crate::error::{CliError, Result};

/// Identity recorded for an adopted directory.
#[derive(Debug, Clone)]
pub struct SnapshotArgs<'a> {
    pub id: i32,
    pub name: &'a str,
    pub version: &'a str,
    pub description: Option<&'a str>,
    pub compliance: DestinationComplianceMode,
    pub ignore: Option<&'a str>,
}

/// Record whatever is live in `destination` as its current deployment.
pub fn run_snapshot(destination: &Path, args: SnapshotArgs<'_>) -> Result<()> {
    let destination = canonicalize_path(destination)?;
    if !destination.is_dir() {
        return Err(CliError::user(format!("{} is not a directory", destination.display())));
    }

    let mut properties = DeploymentProperties::new(args.id, args.name, args.version).with_compliance(args.compliance);
    if let Some(description) = args.description {
        properties = properties.with_description(description);
    }
    let ignore = args.ignore.map(PathPattern::new).transpose()?;

    let metadata = DeploymentsMetadata::new(&destination);
    let mut ignored = BTreeSet::new();
    let map = metadata.snapshot_live_deployment(&properties, ignore.as_ref(), &mut ignored)?;

    println!(
        "{} {} files in {} as {} {} (deployment {})",
        "Adopted".green().bold(),
        map.len(),
        destination.display(),
        properties.bundle_name.cyan(),
        properties.bundle_version,
        properties.deployment_id
    );
    for path in &ignored {
        println!("  {} {}", "ignored".dimmed(), path);
    }
    Ok(())
}
