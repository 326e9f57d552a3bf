use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{ZipEntry, ZipEntryVisitor, walk_zip};
use crate::Result;
use crate::pattern::PathPattern;
use crate::template::TemplateEngine;

struct RealizingVisitor<'a> {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    pattern: &'a PathPattern,
    engine: &'a TemplateEngine,
    realized: Vec<String>,
}

/// An archive rebuilt with its templated entries realized.
#[derive(Debug)]
pub struct RealizedArchive {
    pub bytes: Vec<u8>,
    /// Names of the entries that went through the template engine
    pub entries: Vec<String>,
}

impl ZipEntryVisitor for RealizingVisitor<'_> {
    fn visit(&mut self, entry: &ZipEntry<'_>, reader: &mut dyn Read) -> Result<bool> {
        // Fixed timestamps keep the rebuilt archive byte-for-byte reproducible
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        if entry.is_dir {
            self.writer.add_directory(entry.name, options)?;
            return Ok(true);
        }

        self.writer.start_file(entry.name, options)?;
        let key = crate::hashcode::FileHashcodeMap::convert_path(entry.name);
        if self.pattern.matches(&key) {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            let realized = self.engine.replace_tokens(&String::from_utf8_lossy(&bytes));
            self.writer.write_all(realized.as_bytes())?;
            self.realized.push(key);
        } else {
            std::io::copy(reader, &mut self.writer)?;
        }
        Ok(true)
    }
}

/// Rebuild the archive at `path` in memory with every entry matching
/// `pattern` passed through `engine`.
pub fn realize_archive(path: &Path, pattern: &PathPattern, engine: &TemplateEngine) -> Result<RealizedArchive> {
    let mut visitor = RealizingVisitor {
        writer: ZipWriter::new(Cursor::new(Vec::new())),
        pattern,
        engine,
        realized: Vec::new(),
    };
    walk_zip(path, &mut visitor)?;
    Ok(RealizedArchive {
        bytes: visitor.writer.finish()?.into_inner(),
        entries: visitor.realized,
    })
}
