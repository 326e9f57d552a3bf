//! Extraction and planning visitors

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use bundle_fs::checksum::{self, ChecksumWriter};
use bundle_fs::io;

use super::{ZipEntry, ZipEntryVisitor, entry_key};
use crate::Result;
use crate::differences::DeployDifferences;
use crate::hashcode::FileHashcodeMap;
use crate::pattern::PathPattern;
use crate::template::TemplateEngine;

/// Realize pattern and engine of one archive; both must be present to realize.
#[derive(Debug, Clone, Copy, Default)]
struct Realizer<'a> {
    pattern: Option<&'a PathPattern>,
    engine: Option<&'a TemplateEngine>,
}

impl<'a> Realizer<'a> {
    fn engine_for(&self, key: &str) -> Option<&'a TemplateEngine> {
        match (self.pattern, self.engine) {
            (Some(pattern), Some(engine)) if pattern.matches(key) => Some(engine),
            _ => None,
        }
    }
}

fn read_realized(engine: &TemplateEngine, reader: &mut dyn Read) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(engine.replace_tokens(&String::from_utf8_lossy(&bytes)))
}

/// Writes archive entries under a root directory.
///
/// Directory entries are created but not recorded. Entries whose key is in
/// the skip set are left alone. Per-entry failures go to the differences
/// record and the walk carries on.
pub struct ExtractorVisitor<'a> {
    root: &'a Path,
    realizer: Realizer<'a>,
    skip: Option<&'a BTreeSet<String>>,
    dry_run: bool,
    diff: &'a mut DeployDifferences,
    map: FileHashcodeMap,
}

impl<'a> ExtractorVisitor<'a> {
    pub fn new(root: &'a Path, diff: &'a mut DeployDifferences) -> Self {
        Self {
            root,
            realizer: Realizer::default(),
            skip: None,
            dry_run: false,
            diff,
            map: FileHashcodeMap::new(),
        }
    }

    /// Realize entries matching `pattern` through `engine`.
    pub fn realize(mut self, pattern: Option<&'a PathPattern>, engine: Option<&'a TemplateEngine>) -> Self {
        self.realizer = Realizer { pattern, engine };
        self
    }

    pub fn skip(mut self, keys: &'a BTreeSet<String>) -> Self {
        self.skip = Some(keys);
        self
    }

    /// Hash entries without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Hashcodes of every file entry extracted so far.
    pub fn into_map(self) -> FileHashcodeMap {
        self.map
    }

    fn fail(&mut self, key: &str, message: impl std::fmt::Display) {
        tracing::warn!(path = key, error = %message, "Failed to extract archive entry");
        self.diff.add_error(key, message.to_string());
    }

    fn extract(&mut self, key: &str, reader: &mut dyn Read) -> std::result::Result<String, String> {
        let target = self.root.join(key);

        if let Some(engine) = self.realizer.engine_for(key) {
            let realized = read_realized(engine, reader).map_err(|e| e.to_string())?;
            let hashcode = checksum::compute_content_checksum(&realized);
            if !self.dry_run {
                io::write_bytes(&target, realized.as_bytes()).map_err(|e| e.to_string())?;
            }
            tracing::debug!(path = key, "Realized archive entry");
            self.diff.add_realized_file(key, realized);
            return Ok(hashcode);
        }

        if self.dry_run {
            return checksum::compute_reader_checksum(reader).map_err(|e| e.to_string());
        }

        io::ensure_parent_dir(&target).map_err(|e| e.to_string())?;
        let file = File::create(&target).map_err(|e| format!("{}: {e}", target.display()))?;
        let mut writer = ChecksumWriter::new(BufWriter::new(file));
        std::io::copy(reader, &mut writer).map_err(|e| e.to_string())?;
        let (mut output, hashcode) = writer.finish();
        output.flush().map_err(|e| e.to_string())?;
        Ok(hashcode)
    }
}

impl ZipEntryVisitor for ExtractorVisitor<'_> {
    fn visit(&mut self, entry: &ZipEntry<'_>, reader: &mut dyn Read) -> Result<bool> {
        let Some(key) = entry_key(entry.name) else {
            self.fail(entry.name, "archive entry escapes the destination directory");
            return Ok(true);
        };

        if self.skip.is_some_and(|skip| skip.contains(&key)) {
            tracing::debug!(path = %key, "Leaving archive entry in place");
            return Ok(true);
        }

        if entry.is_dir {
            if !self.dry_run {
                let target = self.root.join(&key);
                if let Err(e) = fs::create_dir_all(&target) {
                    self.fail(&key, e);
                }
            }
            return Ok(true);
        }

        match self.extract(&key, reader) {
            Ok(hashcode) => {
                tracing::debug!(path = %key, dry_run = self.dry_run, "Extracted archive entry");
                self.map.insert(key, hashcode);
            }
            Err(message) => self.fail(&key, message),
        }
        Ok(true)
    }
}

/// Computes the hashcodes an extraction would record, without any I/O
/// beyond reading the archive.
#[derive(Default)]
pub struct InMemoryVisitor<'a> {
    realizer: Realizer<'a>,
    map: FileHashcodeMap,
}

impl<'a> InMemoryVisitor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn realize(mut self, pattern: Option<&'a PathPattern>, engine: Option<&'a TemplateEngine>) -> Self {
        self.realizer = Realizer { pattern, engine };
        self
    }

    pub fn into_map(self) -> FileHashcodeMap {
        self.map
    }
}

impl ZipEntryVisitor for InMemoryVisitor<'_> {
    fn visit(&mut self, entry: &ZipEntry<'_>, reader: &mut dyn Read) -> Result<bool> {
        let Some(key) = entry_key(entry.name) else {
            return Ok(true);
        };
        if entry.is_dir {
            return Ok(true);
        }

        let hashcode = match self.realizer.engine_for(&key) {
            Some(engine) => checksum::compute_content_checksum(&read_realized(engine, reader)?),
            None => checksum::compute_reader_checksum(reader)?,
        };
        self.map.insert(key, hashcode);
        Ok(true)
    }
}
