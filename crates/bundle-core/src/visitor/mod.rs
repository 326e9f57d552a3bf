//! Streaming walks over zip archives
//!
//! [`walk_zip`] hands every entry of an archive to a [`ZipEntryVisitor`]:
//!
//! - [`ExtractorVisitor`] writes entries under a destination and records their hashcodes
//! - [`InMemoryVisitor`] computes the same hashcodes without touching disk
//! - [`DiskUsageVisitor`] totals uncompressed sizes
//! - [`TopLevelDirVisitor`] collects the top-level directories entries live in
//!
//! [`realize_archive`] rebuilds an archive with its templated entries realized.

mod extract;
mod realize;
mod scan;

pub use extract::{ExtractorVisitor, InMemoryVisitor};
pub use realize::{RealizedArchive, realize_archive};
pub use scan::{DiskUsageVisitor, TopLevelDirVisitor};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bundle_fs::NormalizedPath;
use zip::ZipArchive;

use crate::hashcode::FileHashcodeMap;
use crate::{Error, Result};

/// Metadata of one archive entry.
#[derive(Debug, Clone, Copy)]
pub struct ZipEntry<'a> {
    /// Entry name as stored in the archive
    pub name: &'a str,
    pub is_dir: bool,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// Receives archive entries in archive order.
pub trait ZipEntryVisitor {
    /// Visit one entry. Returning `false` stops the walk.
    fn visit(&mut self, entry: &ZipEntry<'_>, reader: &mut dyn Read) -> Result<bool>;
}

/// Stream every entry of the archive at `path` through `visitor`.
///
/// An archive that cannot be opened or whose directory is corrupt is an
/// [`Error::Archive`].
pub fn walk_zip(path: &Path, visitor: &mut dyn ZipEntryVisitor) -> Result<()> {
    let file = File::open(path).map_err(|e| Error::archive(path, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| Error::archive(path, e))?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|e| Error::archive(path, e))?;
        let name = file.name().to_string();
        let entry = ZipEntry {
            name: &name,
            is_dir: file.is_dir(),
            size: file.size(),
        };
        if !visitor.visit(&entry, &mut file)? {
            break;
        }
    }
    Ok(())
}

/// Map key for an entry name, or `None` if the name would land outside the
/// destination.
pub(crate) fn entry_key(name: &str) -> Option<String> {
    let converted = FileHashcodeMap::convert_path(name);
    let key = converted.trim_end_matches('/');
    if key.is_empty() || NormalizedPath::new(key).is_absolute() || key.split('/').any(|part| part == "..") {
        return None;
    }
    Some(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_keys_must_stay_inside_the_destination() {
        assert_eq!(entry_key("dir/file.txt").as_deref(), Some("dir/file.txt"));
        assert_eq!(entry_key("dir\\sub\\").as_deref(), Some("dir/sub"));
        assert_eq!(entry_key("../evil.txt"), None);
        assert_eq!(entry_key("dir/../../evil.txt"), None);
        assert_eq!(entry_key("/etc/passwd"), None);
        assert_eq!(entry_key("/"), None);
    }
}
