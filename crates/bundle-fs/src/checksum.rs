//! SHA-256 content digests
//!
//! Every hashcode recorded by the deployer is the lowercase hex SHA-256 of
//! the bytes that end up on disk. Copy-and-hash is a single pass through
//! [`ChecksumWriter`].

use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};
use std::path::Path;

/// Compute the digest of raw bytes.
pub fn compute_bytes_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Compute the digest of string content.
pub fn compute_content_checksum(content: &str) -> String {
    compute_bytes_checksum(content.as_bytes())
}

/// Compute the digest of everything readable from `reader`.
pub fn compute_reader_checksum(mut reader: impl Read) -> io::Result<String> {
    let mut writer = ChecksumWriter::new(io::sink());
    io::copy(&mut reader, &mut writer)?;
    Ok(writer.finish().1)
}

/// Compute the digest of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> io::Result<String> {
    let file = std::fs::File::open(path)?;
    compute_reader_checksum(io::BufReader::new(file))
}

/// A writer that hashes every byte it forwards to the inner writer.
pub struct ChecksumWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consume the writer, returning the inner writer and the hex digest.
    pub fn finish(self) -> (W, String) {
        (self.inner, format!("{:x}", self.hasher.finalize()))
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
