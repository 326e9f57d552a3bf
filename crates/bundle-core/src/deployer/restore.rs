//! Redeploying a revision and laying its backed up files back over it

use std::path::{Path, PathBuf};

use bundle_fs::{checksum, io};
use walkdir::WalkDir;

use super::{Deployer, record_error};
use crate::Result;
use crate::differences::DeployDifferences;
use crate::hashcode::{FileHashcodeMap, relative_key, walk_error};
use crate::metadata::DeploymentsMetadata;

impl Deployer {
    /// Deploy, then restore the files the current deployment backed up.
    ///
    /// This reverts a destination to how it looked before the current
    /// deployment, manual changes included: deploy the earlier revision's
    /// content with this deployer, and the files the current revision
    /// backed up when it went in are copied back over it. An unmanaged
    /// destination just gets an initial deployment.
    pub fn redeploy_and_restore_backup_files(
        &self,
        diff: &mut DeployDifferences,
        clean: bool,
        dry_run: bool,
    ) -> Result<FileHashcodeMap> {
        let span = self.span();
        let _enter = span.enter();

        self.check_disk_usage()?;

        if !self.metadata.is_managed() {
            return self.initial_deployment(diff, dry_run);
        }

        let previous_id = self.metadata.current_deployment_properties()?.deployment_id;
        let mut map = self.update_deployment(diff, clean, dry_run)?;
        self.restore_backup_files(previous_id, &mut map, diff, dry_run)?;

        if !dry_run && !diff.restored().is_empty() {
            self.metadata
                .set_current_deployment(self.data.properties(), &map, false)?;
        }
        Ok(map)
    }

    fn restore_backup_files(
        &self,
        deployment_id: i32,
        map: &mut FileHashcodeMap,
        diff: &mut DeployDifferences,
        dry_run: bool,
    ) -> Result<()> {
        let backup_directory = self.metadata.deployment_backup_directory(deployment_id);
        for (relative, backup) in backup_files(&backup_directory)? {
            let target = self.destination.join(&relative);
            restore_file(&relative, &backup, &target, map, diff, dry_run);
        }

        let external_directory = self.metadata.deployment_external_backup_directory(deployment_id);
        for (relative, backup) in backup_files(&external_directory)? {
            let key = DeploymentsMetadata::external_key_from_backup(&relative);
            let target = PathBuf::from(&key);
            restore_file(&key, &backup, &target, map, diff, dry_run);
        }
        Ok(())
    }
}

/// Every file below `directory`, keyed by its `/`-separated relative path.
fn backup_files(directory: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(directory, e))?;
        if entry.file_type().is_file() {
            files.push((relative_key(directory, entry.path()), entry.into_path()));
        }
    }
    Ok(files)
}

fn restore_file(
    key: &str,
    backup: &Path,
    target: &Path,
    map: &mut FileHashcodeMap,
    diff: &mut DeployDifferences,
    dry_run: bool,
) {
    tracing::debug!(?backup, ?target, dry_run, "Restoring backup file");
    let hashcode = if dry_run {
        checksum::compute_file_checksum(backup).map_err(|e| bundle_fs::Error::io(backup, e))
    } else {
        io::copy_with_checksum(backup, target)
    };

    match hashcode {
        Ok(hashcode) => {
            map.insert(key, hashcode);
            diff.add_restored_file(key, &backup.to_string_lossy());
        }
        Err(e) => record_error(diff, key, e),
    }
}
