//! Error types for bundle-core

use std::path::PathBuf;

/// Result type for bundle-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bundle-core operations
///
/// Per-file problems during a deployment are not errors; they are recorded in
/// [`crate::DeployDifferences::errors`] and processing continues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required deployment property is missing or malformed
    #[error("Invalid deployment properties: {message}")]
    InvalidProperties { message: String },

    /// Deployment inputs are inconsistent
    #[error("Invalid deployment data: {message}")]
    InvalidDeploymentData { message: String },

    /// The destination has no deployment metadata
    #[error("Destination {path} is not managed by any deployment")]
    NotManaged { path: PathBuf },

    /// Deployment metadata is missing or inconsistent
    #[error("Metadata error: {message}")]
    Metadata { message: String },

    /// A persisted hashcode file has a malformed line
    #[error("Malformed hashcode entry in {path} at line {line}")]
    HashcodeParse { path: PathBuf, line: usize },

    /// The rescan could not determine the content of some paths
    #[error("Failed to properly rescan the current deployment: {paths:?}")]
    UnknownContent { paths: Vec<String> },

    /// An archive could not be read
    #[error("Cannot read archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    /// The deployment will not fit on the destination partition
    #[error(
        "Not enough disk space for this deployment: estimated usage {required} bytes exceeds {usable} usable bytes"
    )]
    InsufficientDiskSpace { required: u64, usable: u64 },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from bundle-fs
    #[error(transparent)]
    Fs(#[from] bundle_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid realize or ignore pattern
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Archive format error
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn archive(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
