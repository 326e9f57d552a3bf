use std::collections::BTreeSet;
use std::io::Read;

use bundle_fs::NormalizedPath;

use super::{ZipEntry, ZipEntryVisitor, entry_key};
use crate::Result;

/// Totals the uncompressed size of file entries.
#[derive(Debug, Default)]
pub struct DiskUsageVisitor {
    pub total_size: u64,
    pub file_count: u64,
}

impl ZipEntryVisitor for DiskUsageVisitor {
    fn visit(&mut self, entry: &ZipEntry<'_>, _reader: &mut dyn Read) -> Result<bool> {
        if !entry.is_dir {
            self.total_size += entry.size;
            self.file_count += 1;
        }
        Ok(true)
    }
}

/// Collects the top-level directory of every entry nested below one.
#[derive(Debug, Default)]
pub struct TopLevelDirVisitor {
    pub directories: BTreeSet<String>,
}

impl ZipEntryVisitor for TopLevelDirVisitor {
    fn visit(&mut self, entry: &ZipEntry<'_>, _reader: &mut dyn Read) -> Result<bool> {
        if let Some(key) = entry_key(entry.name)
            && (key.contains('/') || entry.is_dir)
        {
            self.directories
                .insert(NormalizedPath::new(&key).first_component().to_string());
        }
        Ok(true)
    }
}
