//! Per-destination deployment ledger
//!
//! Every managed destination carries a metadata directory holding one
//! subdirectory per deployment revision and a pointer to the current one:
//!
//! ```text
//! <dest>/.deployments/
//! ├── current-deployment.properties
//! └── <id>/
//!     ├── deployment.properties
//!     ├── file-hashcodes.dat
//!     ├── previous-deployment.properties
//!     ├── backup/
//!     └── ext-backup/
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use bundle_fs::MetadataPath;
use bundle_fs::path::split_drive_letter;

use crate::hashcode::FileHashcodeMap;
use crate::pattern::PathPattern;
use crate::properties::DeploymentProperties;
use crate::{Error, Result};

/// Reads and writes the metadata of one destination directory.
#[derive(Debug, Clone)]
pub struct DeploymentsMetadata {
    root: PathBuf,
}

impl DeploymentsMetadata {
    pub fn new(destination_directory: impl Into<PathBuf>) -> Self {
        Self {
            root: destination_directory.into(),
        }
    }

    pub fn destination_directory(&self) -> &Path {
        &self.root
    }

    pub fn metadata_directory(&self) -> PathBuf {
        self.root.join(MetadataPath::MetadataDir)
    }

    /// Whether a deployment has ever been recorded here.
    pub fn is_managed(&self) -> bool {
        self.current_pointer().is_file()
    }

    pub fn current_deployment_properties(&self) -> Result<DeploymentProperties> {
        if !self.is_managed() {
            return Err(Error::NotManaged { path: self.root.clone() });
        }
        DeploymentProperties::load(&self.current_pointer())
    }

    pub fn current_deployment_file_hashcodes(&self) -> Result<FileHashcodeMap> {
        let current = self.current_deployment_properties()?;
        self.deployment_file_hashcodes(current.deployment_id)
    }

    pub fn deployment_properties(&self, deployment_id: i32) -> Result<DeploymentProperties> {
        let path = self.deployment_directory(deployment_id).join(MetadataPath::DeploymentProperties);
        require_file(&path)?;
        DeploymentProperties::load(&path)
    }

    pub fn deployment_file_hashcodes(&self, deployment_id: i32) -> Result<FileHashcodeMap> {
        let path = self.deployment_directory(deployment_id).join(MetadataPath::Hashcodes);
        require_file(&path)?;
        FileHashcodeMap::load_from_file(&path)
    }

    /// Properties of the revision `deployment_id` replaced, if it replaced one.
    pub fn previous_deployment_properties(&self, deployment_id: i32) -> Result<Option<DeploymentProperties>> {
        let path = self.deployment_directory(deployment_id).join(MetadataPath::PreviousDeployment);
        if !path.is_file() {
            return Ok(None);
        }
        DeploymentProperties::load(&path).map(Some)
    }

    pub fn deployment_directory(&self, deployment_id: i32) -> PathBuf {
        self.metadata_directory().join(deployment_id.to_string())
    }

    pub fn deployment_backup_directory(&self, deployment_id: i32) -> PathBuf {
        self.deployment_directory(deployment_id).join(MetadataPath::BackupDir)
    }

    pub fn deployment_external_backup_directory(&self, deployment_id: i32) -> PathBuf {
        self.deployment_directory(deployment_id).join(MetadataPath::ExternalBackupDir)
    }

    /// Directory name standing in for a Windows drive letter under `ext-backup`.
    pub fn external_backup_directory_name_for_windows(drive_letter: char) -> String {
        format!("_{}", drive_letter.to_ascii_uppercase())
    }

    /// Backup location of an external map key such as `/etc/app.conf` or `C:/app.conf`.
    pub fn external_backup_file(&self, deployment_id: i32, external_key: &str) -> PathBuf {
        let base = self.deployment_external_backup_directory(deployment_id);
        let (drive, rest) = split_drive_letter(external_key);
        let rest = rest.trim_start_matches(['/', '\\']);
        match drive {
            Some(letter) => base
                .join(Self::external_backup_directory_name_for_windows(letter))
                .join(rest),
            None => base.join(rest),
        }
    }

    /// Map key of a file found under `ext-backup`, given its `/`-separated
    /// path relative to that directory.
    pub fn external_key_from_backup(relative: &str) -> String {
        if cfg!(windows) {
            let mut parts = relative.splitn(2, '/');
            if let (Some(first), Some(rest)) = (parts.next(), parts.next()) {
                let bytes = first.as_bytes();
                if bytes.len() == 2 && bytes[0] == b'_' && bytes[1].is_ascii_alphabetic() {
                    return format!("{}:/{rest}", bytes[1].to_ascii_uppercase() as char);
                }
            }
        }
        format!("/{relative}")
    }

    /// Record `properties` and `map` as a revision and make it current.
    ///
    /// With `remember_previous`, the revision being replaced is written into
    /// the new revision's directory, unless it has the same id. The pointer
    /// is advanced last.
    pub fn set_current_deployment(
        &self,
        properties: &DeploymentProperties,
        map: &FileHashcodeMap,
        remember_previous: bool,
    ) -> Result<()> {
        properties.validate()?;

        let directory = self.deployment_directory(properties.deployment_id);
        fs::create_dir_all(&directory).map_err(|e| bundle_fs::Error::io(&directory, e))?;

        properties.store(&directory.join(MetadataPath::DeploymentProperties))?;
        map.store_to_file(&directory.join(MetadataPath::Hashcodes))?;

        if remember_previous && self.is_managed() {
            let previous = self.current_deployment_properties()?;
            if previous.deployment_id != properties.deployment_id {
                previous.store(&directory.join(MetadataPath::PreviousDeployment))?;
            }
        }

        properties.store(&self.current_pointer())?;
        tracing::debug!(
            deployment_id = properties.deployment_id,
            files = map.len(),
            "Recorded current deployment"
        );
        Ok(())
    }

    /// Adopt whatever is live in the destination as the current deployment.
    pub fn snapshot_live_deployment(
        &self,
        properties: &DeploymentProperties,
        ignore: Option<&PathPattern>,
        ignored: &mut BTreeSet<String>,
    ) -> Result<FileHashcodeMap> {
        let map = FileHashcodeMap::generate_file_hashcode_map(&self.root, ignore, ignored)?;
        self.set_current_deployment(properties, &map, false)?;
        Ok(map)
    }

    fn current_pointer(&self) -> PathBuf {
        self.metadata_directory().join(MetadataPath::CurrentDeployment)
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::Metadata {
            message: format!("missing metadata file {}", path.display()),
        })
    }
}
