//! Deployment over an existing managed deployment

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use bundle_fs::{DeployPath, MetadataPath, io};

use super::{Deployer, record_error};
use crate::differences::DeployDifferences;
use crate::hashcode::{DELETED_FILE_HASHCODE, FileHashcodeMap};
use crate::plan::{Action, Current, classify};
use crate::properties::DestinationComplianceMode;
use crate::{Error, Result};

impl Deployer {
    pub(super) fn update_deployment(
        &self,
        diff: &mut DeployDifferences,
        clean: bool,
        dry_run: bool,
    ) -> Result<FileHashcodeMap> {
        tracing::debug!(clean, dry_run, "Analyzing original, current and new files");

        // Directory entries let the plan see directories come and go; they
        // are never persisted
        let mut original = self.metadata.current_deployment_file_hashcodes()?;
        original.add_directory_entries();

        let report_new_root_files =
            self.data.properties().destination_compliance == DestinationComplianceMode::Full;
        let current = original.rescan(&self.destination, self.data.ignore_pattern(), report_new_root_files)?;

        let mut new = self.new_file_hashcode_map()?;
        new.add_directory_entries();

        if let Some(unknown) = current.unknown_content() {
            return Err(Error::UnknownContent {
                paths: unknown.into_keys().collect(),
            });
        }

        diff.add_ignored_files(current.ignored());

        let paths: BTreeSet<&str> = current.keys().chain(new.keys()).collect();
        let mut plan = BTreeMap::new();
        for path in paths {
            let state = match current.get(path) {
                Some(DELETED_FILE_HASHCODE) => Current::Deleted,
                Some(hashcode) => Current::Present(hashcode),
                None => {
                    let target = DeployPath::from_key(path);
                    if target.is_external() && target.to_native(&self.destination).exists() {
                        Current::Unscanned
                    } else {
                        Current::Missing
                    }
                }
            };
            let action = classify(original.get(path), state, new.get(path), clean);
            record_marks(diff, path, &action);
            plan.insert(path.to_string(), action);
        }

        let backups = plan.iter().rev().filter(|(_, action)| action.needs_backup());
        for (path, action) in backups {
            self.backup_file(path, action.deletes(), dry_run, diff);
        }

        let deletions = plan.iter().rev().filter(|(_, action)| **action == Action::Delete);
        for (path, _) in deletions {
            self.delete_file(path, dry_run, diff);
        }

        if clean && !dry_run {
            let mut keep: BTreeSet<String> = current.skipped().union(current.ignored()).cloned().collect();
            keep.insert(MetadataPath::MetadataDir.as_str().to_string());
            tracing::info!(destination = ?self.destination, "Cleaning the destination directory");
            self.purge_children(&self.destination, "", &keep, diff);
        }
        diff.set_cleaned(clean);

        let leave_alone: BTreeMap<String, String> = plan
            .into_iter()
            .filter_map(|(path, action)| match action {
                Action::Preserve { original } => Some((path, original)),
                _ => None,
            })
            .collect();

        let map = self.extract_all(diff, dry_run, &leave_alone)?;

        if !dry_run {
            self.metadata
                .set_current_deployment(self.data.properties(), &map, true)?;
        }
        tracing::debug!(dry_run, files = map.len(), "Update deployment finished");
        Ok(map)
    }

    /// Remove everything below `directory` except the keys in `keep`.
    ///
    /// `prefix` is the destination-relative key of `directory` plus a
    /// trailing `/`. A directory holding a kept path is emptied around it
    /// instead of removed. Failures are recorded per path.
    fn purge_children(&self, directory: &Path, prefix: &str, keep: &BTreeSet<String>, diff: &mut DeployDifferences) {
        let children = match fs::read_dir(directory) {
            Ok(children) => children,
            Err(e) => {
                record_error(diff, &directory.to_string_lossy(), bundle_fs::Error::io(directory, e));
                return;
            }
        };
        for child in children {
            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    record_error(diff, &directory.to_string_lossy(), bundle_fs::Error::io(directory, e));
                    continue;
                }
            };
            let key = format!("{prefix}{}", child.file_name().to_string_lossy());
            if keep.contains(&key) {
                continue;
            }
            let nested = format!("{key}/");
            if keep.iter().any(|kept| kept.starts_with(&nested)) {
                self.purge_children(&child.path(), &nested, keep, diff);
            } else if let Err(e) = io::purge(&child.path()) {
                record_error(diff, &key, e);
            }
        }
    }
}

fn record_marks(diff: &mut DeployDifferences, path: &str, action: &Action) {
    match action {
        Action::Install => diff.add_added_file(path),
        Action::Update | Action::Backup { changed: true } => diff.add_changed_file(path),
        Action::Delete | Action::BackupAndDelete => diff.add_deleted_file(path),
        Action::Unchanged | Action::Preserve { .. } | Action::Backup { changed: false } | Action::Gone => {}
    }
}
