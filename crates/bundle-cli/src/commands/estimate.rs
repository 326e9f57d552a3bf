//! Estimate command implementation

use std::path::Path;

use bundle_core::Deployer;
use colored::Colorize;

use super::print_json;
use crate::descriptor::Descriptor;
use crate::error::Result;

/// Run the estimate command
pub fn run_estimate(descriptor: &Path, destination: Option<&Path>, json: bool) -> Result<()> {
    let data = Descriptor::load(descriptor)?.to_deployment_data(destination)?;
    let deployer = Deployer::new(data)?;
    let usage = deployer.estimate_disk_usage()?;

    if json {
        return print_json(&usage);
    }

    println!("{}", "Disk Usage Estimate".bold());
    println!();
    println!("{}:  {}", "Destination".dimmed(), deployer.destination_directory().display());
    println!("{}:        {}", "Files".dimmed(), usage.file_count);
    println!("{}:     {} bytes", "Required".dimmed(), usage.disk_usage);
    println!("{}:       {} bytes", "Usable".dimmed(), usage.max_disk_usable);
    println!();
    if usage.fits() {
        println!("{}", "The deployment fits".green());
    } else {
        println!("{}", "Not enough disk space for this deployment".red().bold());
    }
    Ok(())
}
