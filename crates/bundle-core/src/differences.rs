//! What a deployment did, path by path

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::hashcode::FileHashcodeMap;

/// Record of every filesystem effect of one deployment run.
///
/// Paths are normalized through [`FileHashcodeMap::convert_path`] on the
/// way in. Backup and restore values are absolute paths of backup files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeployDifferences {
    added: BTreeSet<String>,
    deleted: BTreeSet<String>,
    changed: BTreeSet<String>,
    ignored: BTreeSet<String>,
    backed_up: BTreeMap<String, String>,
    restored: BTreeMap<String, String>,
    realized: BTreeMap<String, String>,
    cleaned: bool,
    errors: BTreeMap<String, String>,
}

impl DeployDifferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_added_file(&mut self, path: &str) {
        self.added.insert(convert(path));
    }

    pub fn remove_added_file(&mut self, path: &str) -> bool {
        self.added.remove(&convert(path))
    }

    pub fn add_deleted_file(&mut self, path: &str) {
        self.deleted.insert(convert(path));
    }

    pub fn add_changed_file(&mut self, path: &str) {
        self.changed.insert(convert(path));
    }

    pub fn add_ignored_file(&mut self, path: &str) {
        self.ignored.insert(convert(path));
    }

    pub fn add_ignored_files<'a>(&mut self, paths: impl IntoIterator<Item = &'a String>) {
        for path in paths {
            self.add_ignored_file(path);
        }
    }

    pub fn add_backed_up_file(&mut self, path: &str, backup: &str) {
        self.backed_up.insert(convert(path), convert(backup));
    }

    pub fn add_restored_file(&mut self, path: &str, backup: &str) {
        self.restored.insert(convert(path), convert(backup));
    }

    /// Remember the content a templated file was realized to.
    ///
    /// A realized compressed archive is recorded under its own path with
    /// the names of its realized entries, one per line.
    pub fn add_realized_file(&mut self, path: &str, content: impl Into<String>) {
        self.realized.insert(convert(path), content.into());
    }

    /// Record a failure for `path`. Later failures for the same path are
    /// appended on a new line rather than replacing earlier ones.
    pub fn add_error(&mut self, path: &str, message: impl Into<String>) {
        let message = message.into();
        match self.errors.entry(convert(path)) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.push('\n');
                existing.push_str(&message);
            }
            Entry::Vacant(slot) => {
                slot.insert(message);
            }
        }
    }

    pub fn set_cleaned(&mut self, cleaned: bool) {
        self.cleaned = cleaned;
    }

    pub fn added(&self) -> &BTreeSet<String> {
        &self.added
    }

    pub fn deleted(&self) -> &BTreeSet<String> {
        &self.deleted
    }

    pub fn changed(&self) -> &BTreeSet<String> {
        &self.changed
    }

    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    pub fn backed_up(&self) -> &BTreeMap<String, String> {
        &self.backed_up
    }

    pub fn restored(&self) -> &BTreeMap<String, String> {
        &self.restored
    }

    pub fn realized(&self) -> &BTreeMap<String, String> {
        &self.realized
    }

    pub fn was_cleaned(&self) -> bool {
        self.cleaned
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// True when nothing was recorded. The cleaned flag does not count.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.deleted.is_empty()
            && self.changed.is_empty()
            && self.ignored.is_empty()
            && self.backed_up.is_empty()
            && self.restored.is_empty()
            && self.realized.is_empty()
            && self.errors.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn convert(path: &str) -> String {
    FileHashcodeMap::convert_path(path)
}

impl fmt::Display for DeployDifferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn section(f: &mut fmt::Formatter<'_>, title: &str, paths: &BTreeSet<String>) -> fmt::Result {
            if paths.is_empty() {
                return Ok(());
            }
            writeln!(f, "{title} ({}):", paths.len())?;
            for path in paths {
                writeln!(f, "  {path}")?;
            }
            Ok(())
        }

        fn mapped(f: &mut fmt::Formatter<'_>, title: &str, paths: &BTreeMap<String, String>) -> fmt::Result {
            if paths.is_empty() {
                return Ok(());
            }
            writeln!(f, "{title} ({}):", paths.len())?;
            for (path, value) in paths {
                writeln!(f, "  {path} -> {value}")?;
            }
            Ok(())
        }

        section(f, "added", &self.added)?;
        section(f, "changed", &self.changed)?;
        section(f, "deleted", &self.deleted)?;
        section(f, "ignored", &self.ignored)?;
        mapped(f, "backed up", &self.backed_up)?;
        mapped(f, "restored", &self.restored)?;

        let realized: BTreeSet<String> = self.realized.keys().cloned().collect();
        section(f, "realized", &realized)?;
        mapped(f, "errors", &self.errors)?;

        if self.cleaned {
            writeln!(f, "destination was cleaned")?;
        }
        if self.is_empty() && !self.cleaned {
            writeln!(f, "no differences")?;
        }
        Ok(())
    }
}
