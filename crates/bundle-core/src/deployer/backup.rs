//! Backing up and removing live files

use std::fs;
use std::path::{Path, PathBuf};

use bundle_fs::{DeployPath, io};

use super::{Deployer, record_error};
use crate::differences::DeployDifferences;

impl Deployer {
    /// Backup location of a map key under the new deployment's revision.
    fn backup_location(&self, key: &str) -> PathBuf {
        let id = self.data.properties().deployment_id;
        match DeployPath::from_key(key) {
            DeployPath::Relative(relative) => self.metadata.deployment_backup_directory(id).join(relative),
            DeployPath::External(_) => self.metadata.external_backup_file(id, key),
        }
    }

    /// Copy the live file at `key` into the backup area, or move it there
    /// when `remove` is set.
    ///
    /// Directories are recreated in the backup area rather than copied.
    pub(super) fn backup_file(&self, key: &str, remove: bool, dry_run: bool, diff: &mut DeployDifferences) {
        let source = DeployPath::from_key(key).to_native(&self.destination);
        let backup = self.backup_location(key);

        if !dry_run && let Err(e) = move_or_copy(&source, &backup, remove) {
            record_error(diff, key, e);
            return;
        }

        tracing::debug!(?source, ?backup, removed = remove, dry_run, "Backed up file");
        diff.add_backed_up_file(key, &backup.to_string_lossy());
        if remove {
            diff.add_deleted_file(key);
        }
    }

    /// Remove the live file or empty directory at `key`.
    pub(super) fn delete_file(&self, key: &str, dry_run: bool, diff: &mut DeployDifferences) {
        let doomed = DeployPath::from_key(key).to_native(&self.destination);
        if !dry_run {
            let result = if doomed.is_dir() {
                fs::remove_dir(&doomed)
            } else {
                fs::remove_file(&doomed)
            };
            if let Err(e) = result {
                record_error(diff, key, format!("{} did not delete: {e}", doomed.display()));
                return;
            }
        }
        tracing::debug!(path = ?doomed, dry_run, "Deleted obsolete file");
    }
}

fn move_or_copy(source: &Path, backup: &Path, remove: bool) -> bundle_fs::Result<()> {
    io::ensure_parent_dir(backup)?;

    // A rename is cheap but cannot cross filesystems
    if remove && fs::rename(source, backup).is_ok() {
        return Ok(());
    }

    if source.is_dir() {
        fs::create_dir_all(backup).map_err(|e| bundle_fs::Error::io(backup, e))?;
        if remove {
            fs::remove_dir(source).map_err(|e| bundle_fs::Error::io(source, e))?;
        }
    } else {
        io::copy_with_checksum(source, backup)?;
        if remove {
            fs::remove_file(source).map_err(|e| bundle_fs::Error::io(source, e))?;
        }
    }
    Ok(())
}
