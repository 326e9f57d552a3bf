//! Path-to-hashcode snapshots
//!
//! A [`FileHashcodeMap`] records the digest of every file a deployment laid
//! down. Keys are `/`-separated paths relative to the destination root, or
//! canonical absolute paths for files deployed outside of it. The map is
//! persisted as one `path\thash` line per entry.

mod rescan;

pub use rescan::ChangesFileHashcodeMap;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use bundle_fs::{MetadataPath, NormalizedPath, checksum, io};
use walkdir::WalkDir;

use crate::pattern::PathPattern;
use crate::{Error, Result};

/// Marks a path that was known to the original map but is gone now.
pub const DELETED_FILE_HASHCODE: &str = "DELETED";
/// Marks a directory entry.
pub const DIRECTORY_HASHCODE: &str = "DIRECTORY";
/// Marks a file whose content could not be read.
pub const UNKNOWN_FILE_HASHCODE: &str = "UNKNOWN_FILE";
/// Marks a directory whose children could not be listed.
pub const UNKNOWN_DIR_HASHCODE: &str = "UNKNOWN_DIR";

/// Ordered mapping of deployment paths to content hashcodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHashcodeMap {
    entries: BTreeMap<String, String>,
}

impl FileHashcodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a path into map-key form by turning `\` into `/`.
    ///
    /// Keys are stored verbatim by [`insert`](Self::insert); callers that
    /// build keys from native paths pass them through here first.
    pub fn convert_path(path: impl AsRef<Path>) -> String {
        NormalizedPath::new(path).into_string()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn insert(&mut self, path: impl Into<String>, hashcode: impl Into<String>) -> Option<String> {
        self.entries.insert(path.into(), hashcode.into())
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    pub fn contains_key(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Copy every entry of `other` into this map, overwriting duplicates.
    pub fn extend(&mut self, other: &FileHashcodeMap) {
        self.entries
            .extend(other.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Entries whose hashcode is one of the unknown sentinels, if any.
    pub fn unknown_content(&self) -> Option<BTreeMap<String, String>> {
        let unknown: BTreeMap<String, String> = self
            .entries
            .iter()
            .filter(|(_, v)| v.as_str() == UNKNOWN_FILE_HASHCODE || v.as_str() == UNKNOWN_DIR_HASHCODE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if unknown.is_empty() { None } else { Some(unknown) }
    }

    /// Add a [`DIRECTORY_HASHCODE`] entry for every parent of every relative key.
    ///
    /// Directory entries let a deployment notice directories it created or
    /// abandoned. They are never written to disk.
    pub fn add_directory_entries(&mut self) {
        let mut directories = BTreeSet::new();
        for key in self.entries.keys() {
            let path = NormalizedPath::new(key);
            if path.is_absolute() {
                continue;
            }
            directories.extend(path.ancestors().into_iter().map(NormalizedPath::into_string));
        }
        for directory in directories {
            self.entries.insert(directory, DIRECTORY_HASHCODE.to_string());
        }
    }

    /// Hash every file under `root`.
    ///
    /// The metadata directory is never included. Paths fully matching
    /// `ignore` are added to `ignored` instead; an ignored directory is
    /// reported by its own path and not descended into.
    pub fn generate_file_hashcode_map(
        root: &Path,
        ignore: Option<&PathPattern>,
        ignored: &mut BTreeSet<String>,
    ) -> Result<Self> {
        ensure_directory(root)?;

        let mut map = Self::new();
        let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let is_dir = entry.file_type().is_dir();

            if entry.depth() == 1 && entry.file_name() == MetadataPath::MetadataDir.as_str() {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            let relative = relative_key(root, entry.path());
            if ignore.is_some_and(|p| p.matches(&relative)) {
                ignored.insert(relative);
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            if !is_dir && entry.path().is_file() {
                let hashcode = checksum::compute_file_checksum(entry.path())
                    .map_err(|e| bundle_fs::Error::io(entry.path(), e))?;
                map.insert(relative, hashcode);
            }
        }

        Ok(map)
    }

    /// Load a map written by [`store_to_file`](Self::store_to_file).
    ///
    /// Keys are kept byte-identical; a `\`-separated key stays that way.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = io::read_text(path)?;
        let mut map = Self::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            let (key, hashcode) = line.rsplit_once('\t').ok_or_else(|| Error::HashcodeParse {
                path: path.to_path_buf(),
                line: index + 1,
            })?;
            map.insert(key, hashcode);
        }
        Ok(map)
    }

    /// Persist the map as tab-separated lines, atomically.
    pub fn store_to_file(&self, path: &Path) -> Result<()> {
        let mut content = String::new();
        for (key, hashcode) in &self.entries {
            content.push_str(key);
            content.push('\t');
            content.push_str(hashcode);
            content.push('\n');
        }
        io::write_text(path, &content)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a FileHashcodeMap {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, String)> for FileHashcodeMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for FileHashcodeMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (key, hashcode) in &self.entries {
            writeln!(f, "{key}\t{hashcode}")?;
        }
        Ok(())
    }
}

pub(crate) fn ensure_directory(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(bundle_fs::Error::InvalidPath {
            path: root.to_path_buf(),
            reason: "not an existing directory".into(),
        }
        .into())
    }
}

pub(crate) fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    FileHashcodeMap::convert_path(relative)
}

pub(crate) fn walk_error(root: &Path, error: walkdir::Error) -> Error {
    let path = error.path().unwrap_or(root).to_path_buf();
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    bundle_fs::Error::io(path, source).into()
}
