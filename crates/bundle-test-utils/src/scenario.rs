//! Source and destination directories for deployment tests

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::archive::create_zip;

/// A scratch directory holding a bundle `source/` tree and a `destination/`.
///
/// Both directories exist from construction. The temp directory is removed
/// when the value is dropped.
pub struct TestDeployment {
    temp_dir: TempDir,
}

impl Default for TestDeployment {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDeployment {
    /// Create the scratch directory with empty `source/` and `destination/`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(temp_dir.path().join("source")).expect("Failed to create source dir");
        fs::create_dir_all(temp_dir.path().join("destination")).expect("Failed to create destination dir");
        Self { temp_dir }
    }

    /// Root of the scratch directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn source(&self) -> PathBuf {
        self.root().join("source")
    }

    pub fn destination(&self) -> PathBuf {
        self.root().join("destination")
    }

    /// Path of `relative` inside the destination.
    pub fn dest_path(&self, relative: &str) -> PathBuf {
        self.destination().join(relative)
    }

    /// Build a zip named `name` in the source directory and return its path.
    pub fn zip(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = self.source().join(name);
        create_zip(&path, entries);
        path
    }

    /// Write a file below the source directory, creating parents.
    pub fn write_source(&self, relative: &str, content: &str) -> PathBuf {
        write(&self.source().join(relative), content)
    }

    /// Write a file below the destination directory, creating parents.
    pub fn write_dest(&self, relative: &str, content: &str) -> PathBuf {
        write(&self.dest_path(relative), content)
    }

    /// Write a file anywhere below the scratch root, creating parents.
    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        write(&self.root().join(relative), content)
    }

    /// Read a destination file as a string.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read_dest(&self, relative: &str) -> String {
        let path = self.dest_path(relative);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("Cannot read {}: {e}", path.display()))
    }

    /// Assert that a path exists relative to the destination.
    ///
    /// # Panics
    /// Panics if the path does not exist.
    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.dest_path(relative);
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    /// Assert that a path does not exist relative to the destination.
    ///
    /// # Panics
    /// Panics if the path exists.
    pub fn assert_file_not_exists(&self, relative: &str) {
        let path = self.dest_path(relative);
        assert!(!path.exists(), "Expected file to not exist: {}", path.display());
    }

    /// Assert that a destination file holds exactly `expected`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or its content differs.
    pub fn assert_file_content(&self, relative: &str, expected: &str) {
        let content = self.read_dest(relative);
        assert_eq!(
            content, expected,
            "Unexpected content in {}",
            self.dest_path(relative).display()
        );
    }

    /// Every file and directory below the scratch root as `/`-separated
    /// relative paths, sorted. Used to prove a dry run touched nothing.
    pub fn tree(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect(self.root(), self.root(), &mut paths);
        paths.sort();
        paths
    }
}

fn write(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).unwrap_or_else(|e| panic!("Cannot write {}: {e}", path.display()));
    path.to_path_buf()
}

fn collect(root: &Path, dir: &Path, paths: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        if path.is_dir() {
            paths.push(format!("{relative}/"));
            collect(root, &path, paths);
        } else {
            let content = fs::read(&path).unwrap_or_default();
            paths.push(format!("{relative} ({} bytes)", content.len()));
        }
    }
}
