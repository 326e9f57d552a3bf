//! First deployment into an unmanaged destination

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use bundle_fs::{DeployPath, MetadataPath, NormalizedPath, io};
use walkdir::WalkDir;

use super::{Deployer, record_error};
use crate::Result;
use crate::differences::DeployDifferences;
use crate::hashcode::{FileHashcodeMap, relative_key, walk_error};
use crate::properties::DestinationComplianceMode;
use crate::visitor::{TopLevelDirVisitor, walk_zip};

impl Deployer {
    pub(super) fn initial_deployment(&self, diff: &mut DeployDifferences, dry_run: bool) -> Result<FileHashcodeMap> {
        match self.data.properties().destination_compliance {
            DestinationComplianceMode::Full => {
                self.backup_and_purge_directory(&self.destination, "", diff, dry_run);
            }
            DestinationComplianceMode::FilesAndDirectories => {
                for subdirectory in self.managed_subdirectories()? {
                    let directory = self.destination.join(&subdirectory);
                    self.backup_and_purge_directory(&directory, &format!("{subdirectory}/"), diff, dry_run);
                }
            }
        }

        if !dry_run {
            fs::create_dir_all(&self.destination).map_err(|e| bundle_fs::Error::io(&self.destination, e))?;
        }

        let map = self.extract_all(diff, dry_run, &BTreeMap::new())?;
        for key in map.keys() {
            diff.add_added_file(key);
        }

        if !dry_run {
            self.metadata
                .set_current_deployment(self.data.properties(), &map, true)?;
        }
        tracing::debug!(dry_run, files = map.len(), "Initial deployment finished");
        Ok(map)
    }

    /// Top-level directories the deployment writes into.
    ///
    /// Raw files placed in a subdirectory contribute their first path
    /// component, as do nested entries of exploded archives. Compressed
    /// archives are not looked into.
    pub(super) fn managed_subdirectories(&self) -> Result<BTreeSet<String>> {
        let mut directories = BTreeSet::new();

        for target in &self.raw_targets {
            if let DeployPath::Relative(relative) = target {
                let path = NormalizedPath::new(relative);
                if path.parent().is_some() {
                    directories.insert(path.first_component().to_string());
                }
            }
        }

        for archive in self.data.archives().iter().filter(|a| a.exploded) {
            let mut visitor = TopLevelDirVisitor::default();
            walk_zip(&archive.path, &mut visitor)?;
            directories.extend(visitor.directories);
        }

        Ok(directories)
    }

    /// Back up every file below `directory` with removal, then purge what is left.
    ///
    /// `prefix` turns paths relative to `directory` into destination-relative
    /// keys. The metadata directory is never touched. Failures are recorded
    /// per path and the rest of the directory is still processed.
    fn backup_and_purge_directory(&self, directory: &Path, prefix: &str, diff: &mut DeployDifferences, dry_run: bool) {
        if !directory.is_dir() {
            return;
        }
        tracing::info!(
            ?directory,
            "Managing directory; backing up and purging any obsolete content in it"
        );

        let mut walker = WalkDir::new(directory).min_depth(1).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let key = match e.path() {
                        Some(path) => format!("{prefix}{}", relative_key(directory, path)),
                        None => prefix.trim_end_matches('/').to_string(),
                    };
                    record_error(diff, &key, walk_error(directory, e));
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                if entry.file_name() == MetadataPath::MetadataDir.as_str() {
                    walker.skip_current_dir();
                }
                continue;
            }
            let key = format!("{prefix}{}", relative_key(directory, entry.path()));
            self.backup_file(&key, true, dry_run, diff);
        }

        if dry_run {
            return;
        }
        let children = match fs::read_dir(directory) {
            Ok(children) => children,
            Err(e) => {
                record_error(diff, &directory.to_string_lossy(), bundle_fs::Error::io(directory, e));
                return;
            }
        };
        for child in children.flatten() {
            let name = child.file_name().to_string_lossy().into_owned();
            if name == MetadataPath::MetadataDir.as_str() {
                continue;
            }
            if let Err(e) = io::purge(&child.path()) {
                record_error(diff, &format!("{prefix}{name}"), e);
            }
        }
    }
}
