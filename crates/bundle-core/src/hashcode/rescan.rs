//! Rescanning a destination against a previously recorded map

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use bundle_fs::{DeployPath, MetadataPath, NormalizedPath, checksum};
use walkdir::WalkDir;

use super::{
    DELETED_FILE_HASHCODE, DIRECTORY_HASHCODE, FileHashcodeMap, UNKNOWN_DIR_HASHCODE, UNKNOWN_FILE_HASHCODE,
    ensure_directory, relative_key, walk_error,
};
use crate::Result;
use crate::pattern::PathPattern;

/// The live state of a destination plus how it differs from a recorded map.
///
/// Dereferences to the current [`FileHashcodeMap`]. Deleted paths appear in
/// it with [`DELETED_FILE_HASHCODE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesFileHashcodeMap {
    current: FileHashcodeMap,
    additions: BTreeMap<String, String>,
    deletions: BTreeMap<String, String>,
    changes: BTreeMap<String, String>,
    ignored: BTreeSet<String>,
    skipped: BTreeSet<String>,
}

impl ChangesFileHashcodeMap {
    /// Paths present now but absent from the recorded map, with their hashcode.
    pub fn additions(&self) -> &BTreeMap<String, String> {
        &self.additions
    }

    /// Recorded paths that are gone, with their recorded hashcode.
    pub fn deletions(&self) -> &BTreeMap<String, String> {
        &self.deletions
    }

    /// Recorded paths whose content differs, with their current hashcode.
    pub fn changes(&self) -> &BTreeMap<String, String> {
        &self.changes
    }

    /// Paths matched by the ignore pattern.
    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    /// Top-level names left alone because no recorded path lives under them.
    pub fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }

    pub fn into_map(self) -> FileHashcodeMap {
        self.current
    }

    fn record(&mut self, key: String, original: Option<&str>, current: Option<String>) {
        match (original, current) {
            (Some(original), None) => {
                self.deletions.insert(key.clone(), original.to_string());
                self.current.insert(key, DELETED_FILE_HASHCODE);
            }
            (None, None) => {}
            (original, Some(hashcode)) => {
                let unknown = hashcode == UNKNOWN_FILE_HASHCODE || hashcode == UNKNOWN_DIR_HASHCODE;
                match original {
                    None if !unknown => {
                        self.additions.insert(key.clone(), hashcode.clone());
                    }
                    Some(original) if !unknown && original != hashcode => {
                        self.changes.insert(key.clone(), hashcode.clone());
                    }
                    _ => {}
                }
                self.current.insert(key, hashcode);
            }
        }
    }
}

impl Deref for ChangesFileHashcodeMap {
    type Target = FileHashcodeMap;

    fn deref(&self) -> &Self::Target {
        &self.current
    }
}

impl FileHashcodeMap {
    /// Rescan `root` and compare what is there with this map.
    ///
    /// External keys are checked in place. The walk under `root` skips the
    /// metadata directory and, unless `report_new_root_files_as_new` is set,
    /// every top-level name that no recorded relative path lives under.
    /// Ignored paths are reported but never descended into. Files that
    /// cannot be read and directories that cannot be listed are recorded
    /// with the unknown sentinels instead of failing the scan.
    pub fn rescan(
        &self,
        root: &Path,
        ignore: Option<&PathPattern>,
        report_new_root_files_as_new: bool,
    ) -> Result<ChangesFileHashcodeMap> {
        ensure_directory(root)?;

        let mut result = ChangesFileHashcodeMap::default();
        let mut known_roots = BTreeSet::new();

        for (key, original) in self.iter() {
            match DeployPath::from_key(key) {
                DeployPath::External(location) => {
                    let current = scan_single(&PathBuf::from(location));
                    result.record(key.to_string(), Some(original), current);
                }
                DeployPath::Relative(relative) => {
                    known_roots.insert(NormalizedPath::new(&relative).first_component().to_string());
                }
            }
        }

        let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let is_dir = entry.file_type().is_dir();

            if entry.depth() == 1 {
                let name = entry.file_name().to_string_lossy();
                if name == MetadataPath::MetadataDir.as_str() {
                    if is_dir {
                        walker.skip_current_dir();
                    }
                    continue;
                }
                if !report_new_root_files_as_new && !known_roots.contains(&*name) {
                    result.skipped.insert(name.into_owned());
                    if is_dir {
                        walker.skip_current_dir();
                    }
                    continue;
                }
            }

            let relative = relative_key(root, entry.path());
            if ignore.is_some_and(|p| p.matches(&relative)) {
                result.ignored.insert(relative);
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            let original = self.get(&relative);
            if is_dir {
                match fs::read_dir(entry.path()) {
                    Err(_) => {
                        walker.skip_current_dir();
                        result.record(relative, original, Some(UNKNOWN_DIR_HASHCODE.to_string()));
                    }
                    Ok(mut children) => {
                        if original.is_some() || children.next().is_none() {
                            result.record(relative, original, Some(DIRECTORY_HASHCODE.to_string()));
                        }
                    }
                }
            } else if entry.path().is_file() {
                let hashcode = checksum::compute_file_checksum(entry.path())
                    .unwrap_or_else(|_| UNKNOWN_FILE_HASHCODE.to_string());
                result.record(relative, original, Some(hashcode));
            }
        }

        // Recorded relative paths the walk never reached
        for (key, original) in self.iter() {
            if DeployPath::from_key(key).is_external() || result.current.contains_key(key) {
                continue;
            }
            if fs::symlink_metadata(root.join(key)).is_err() {
                result.record(key.to_string(), Some(original), None);
            }
        }

        Ok(result)
    }
}

fn scan_single(path: &Path) -> Option<String> {
    if path.is_dir() {
        Some(match fs::read_dir(path) {
            Ok(_) => DIRECTORY_HASHCODE.to_string(),
            Err(_) => UNKNOWN_DIR_HASHCODE.to_string(),
        })
    } else if path.is_file() {
        Some(checksum::compute_file_checksum(path).unwrap_or_else(|_| UNKNOWN_FILE_HASHCODE.to_string()))
    } else {
        None
    }
}
