use std::fs;

use bundle_fs::io;
use serde::Serialize;

use super::Deployer;
use crate::visitor::{DiskUsageVisitor, walk_zip};
use crate::{Error, Result};

/// Estimated footprint of a deployment against the space left on its partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentDiskUsage {
    /// Bytes usable on the destination partition
    pub max_disk_usable: u64,
    /// Bytes the deployment content adds up to
    pub disk_usage: u64,
    pub file_count: u64,
}

impl DeploymentDiskUsage {
    pub fn fits(&self) -> bool {
        self.disk_usage <= self.max_disk_usable
    }
}

impl Deployer {
    /// Total uncompressed size of all archive entries and raw files.
    pub fn estimate_disk_usage(&self) -> Result<DeploymentDiskUsage> {
        let mut usage = DeploymentDiskUsage {
            max_disk_usable: io::usable_space(&self.destination)?,
            ..Default::default()
        };

        for archive in self.data.archives() {
            let mut visitor = DiskUsageVisitor::default();
            walk_zip(&archive.path, &mut visitor)?;
            usage.disk_usage += visitor.total_size;
            usage.file_count += visitor.file_count;
        }

        for raw in self.data.raw_files() {
            let metadata = fs::metadata(&raw.source).map_err(|e| bundle_fs::Error::io(&raw.source, e))?;
            usage.disk_usage += metadata.len();
            usage.file_count += 1;
        }

        Ok(usage)
    }

    /// Fail fast when the deployment clearly does not fit.
    ///
    /// If the estimate itself cannot be made, the deployment goes ahead.
    pub fn check_disk_usage(&self) -> Result<()> {
        let usage = match self.estimate_disk_usage() {
            Ok(usage) => usage,
            Err(e) => {
                tracing::debug!(error = %e, "Cannot estimate disk usage, assuming there is enough space");
                return Ok(());
            }
        };

        tracing::debug!(
            disk_usage = usage.disk_usage,
            file_count = usage.file_count,
            max_disk_usable = usage.max_disk_usable,
            "Estimated disk usage"
        );

        if !usage.fits() {
            return Err(Error::InsufficientDiskSpace {
                required: usage.disk_usage,
                usable: usage.max_disk_usable,
            });
        }
        Ok(())
    }
}
