//! Atomic writes, hashed copies and directory purging

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::checksum::ChecksumWriter;
use crate::{Error, Result};

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;

    // Temp file in the same directory keeps the rename on one filesystem
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed { path: path.to_path_buf() })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .unlock()
        .map_err(|_| Error::LockFailed { path: path.to_path_buf() })?;

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.is_dir()
    {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

/// Copy `src` to `dest`, returning the digest of the copied bytes.
///
/// Parent directories of `dest` are created as needed.
pub fn copy_with_checksum(src: &Path, dest: &Path) -> Result<String> {
    ensure_parent_dir(dest)?;
    let input = File::open(src).map_err(|e| Error::io(src, e))?;
    let output = File::create(dest).map_err(|e| Error::io(dest, e))?;

    let mut writer = ChecksumWriter::new(BufWriter::new(output));
    std::io::copy(&mut BufReader::new(input), &mut writer).map_err(|e| Error::io(dest, e))?;
    let (mut output, digest) = writer.finish();
    output.flush().map_err(|e| Error::io(dest, e))?;
    Ok(digest)
}

/// Write `content` to `dest`, creating parent directories as needed.
pub fn write_bytes(dest: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(dest)?;
    fs::write(dest, content).map_err(|e| Error::io(dest, e))
}

/// Remove a file or a whole directory tree.
///
/// Missing paths are not an error.
pub fn purge(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    };
    tracing::debug!(?path, directory = metadata.is_dir(), "Purging");
    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::io(path, e))
    } else {
        fs::remove_file(path).map_err(|e| Error::io(path, e))
    }
}

/// Bytes available to the current user on the partition holding `path`.
///
/// Walks up to the nearest existing ancestor when `path` does not exist yet.
pub fn usable_space(path: &Path) -> Result<u64> {
    let existing = path
        .ancestors()
        .find(|p| p.exists())
        .ok_or_else(|| Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "no existing ancestor".into(),
        })?;
    fs2::available_space(existing).map_err(|e| Error::io(existing, e))
}
