//! Reserved names inside a managed destination directory.

use std::path::Path;

/// Reserved metadata directory and file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataPath {
    /// The `.deployments` directory at the destination root
    MetadataDir,
    /// Properties of the current deployment; doubles as the current pointer
    CurrentDeployment,
    /// Properties of one deployment revision
    DeploymentProperties,
    /// Properties of the revision a deployment replaced
    PreviousDeployment,
    /// The persisted path/hash map of one revision
    Hashcodes,
    /// Backups of files that lived under the destination root
    BackupDir,
    /// Backups of files that lived outside the destination root
    ExternalBackupDir,
}

impl MetadataPath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetadataDir => ".deployments",
            Self::CurrentDeployment => "current-deployment.properties",
            Self::DeploymentProperties => "deployment.properties",
            Self::PreviousDeployment => "previous-deployment.properties",
            Self::Hashcodes => "file-hashcodes.dat",
            Self::BackupDir => "backup",
            Self::ExternalBackupDir => "ext-backup",
        }
    }
}

impl AsRef<Path> for MetadataPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for MetadataPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for MetadataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
