//! Reconciling a destination directory with a new deployment
//!
//! A first deployment into an unmanaged destination backs up and clears
//! whatever the destination compliance mode says it owns, then lays the
//! new content down. Every later deployment rescans the destination, compares
//! the last recorded map, the live state and the new content path by path
//! with [`crate::plan::classify`], and executes the decisions: backups
//! first, then deletions, then extraction. Metadata is recorded last.

mod backup;
mod disk;
mod initial;
mod restore;
mod update;

pub use disk::DeploymentDiskUsage;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bundle_fs::checksum;
use bundle_fs::{DeployPath, canonicalize_path, io};

use crate::data::{ArchiveSource, DeploymentData, RawFile};
use crate::differences::DeployDifferences;
use crate::hashcode::{DIRECTORY_HASHCODE, FileHashcodeMap};
use crate::metadata::DeploymentsMetadata;
use crate::visitor::{ExtractorVisitor, InMemoryVisitor, RealizedArchive, realize_archive, walk_zip};
use crate::{Error, Result};

/// Deploys one [`DeploymentData`] into its destination directory.
#[derive(Debug)]
pub struct Deployer {
    data: DeploymentData,
    destination: PathBuf,
    metadata: DeploymentsMetadata,
    /// Where each raw file lands, parallel to `data.raw_files()`
    raw_targets: Vec<DeployPath>,
    /// Where each compressed archive lands, parallel to `data.archives()`
    archive_targets: Vec<Option<DeployPath>>,
}

impl Deployer {
    /// Prepare a deployment, resolving every destination path up front.
    pub fn new(data: DeploymentData) -> Result<Self> {
        let destination = canonicalize_path(data.destination_directory())?;

        let raw_targets = data
            .raw_files()
            .iter()
            .map(|raw| DeployPath::resolve(&destination, &raw.destination))
            .collect::<bundle_fs::Result<Vec<_>>>()?;

        let archive_targets = data
            .archives()
            .iter()
            .map(|archive| {
                if archive.exploded {
                    Ok(None)
                } else {
                    compressed_target(&destination, data.source_directory(), archive).map(Some)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            metadata: DeploymentsMetadata::new(&destination),
            destination,
            data,
            raw_targets,
            archive_targets,
        })
    }

    pub fn deployment_data(&self) -> &DeploymentData {
        &self.data
    }

    /// Canonical destination directory.
    pub fn destination_directory(&self) -> &Path {
        &self.destination
    }

    pub fn metadata(&self) -> &DeploymentsMetadata {
        &self.metadata
    }

    pub fn is_destination_directory_managed(&self) -> bool {
        self.metadata.is_managed()
    }

    /// Deploy for real, cleaning the destination if the deployment data asks for it.
    pub fn deploy(&self, diff: &mut DeployDifferences) -> Result<FileHashcodeMap> {
        self.deploy_with(diff, self.data.clean(), false)
    }

    /// Record in `diff` what [`deploy`](Self::deploy) would do, without changing anything.
    pub fn dry_run(&self, diff: &mut DeployDifferences) -> Result<FileHashcodeMap> {
        self.deploy_with(diff, self.data.clean(), true)
    }

    /// Deploy into the destination.
    ///
    /// With `clean`, an existing deployment is wiped before the new content
    /// goes down; files that would otherwise be left alone get backed up.
    /// A dry run populates `diff` and returns the same map as a real run
    /// but never writes.
    pub fn deploy_with(&self, diff: &mut DeployDifferences, clean: bool, dry_run: bool) -> Result<FileHashcodeMap> {
        let span = self.span();
        let _enter = span.enter();

        self.check_disk_usage()?;

        if self.metadata.is_managed() {
            self.update_deployment(diff, clean, dry_run)
        } else {
            self.initial_deployment(diff, dry_run)
        }
    }

    fn span(&self) -> tracing::Span {
        let props = self.data.properties();
        tracing::info_span!(
            "deployment",
            bundle = %props.bundle_name,
            version = %props.bundle_version,
            id = props.deployment_id
        )
    }

    /// Hashcodes the new content would have on disk, computed in memory.
    fn new_file_hashcode_map(&self) -> Result<FileHashcodeMap> {
        let mut map = FileHashcodeMap::new();
        let engine = self.data.template_engine();

        for (archive, target) in self.data.archives().iter().zip(&self.archive_targets) {
            match target {
                None => {
                    tracing::debug!(zip = ?archive.path, "Hashing archive entries in memory");
                    let mut visitor = InMemoryVisitor::new().realize(archive.realize.as_ref(), engine);
                    walk_zip(&archive.path, &mut visitor)?;
                    map.extend(&visitor.into_map());
                }
                Some(target) => {
                    let (hashcode, _) = self.compressed_content(archive)?;
                    map.insert(target.key(), hashcode);
                }
            }
        }

        for (raw, target) in self.data.raw_files().iter().zip(&self.raw_targets) {
            let hashcode = match self.realized_raw_content(raw)? {
                Some(content) => checksum::compute_content_checksum(&content),
                None => checksum::compute_file_checksum(&raw.source).map_err(|e| bundle_fs::Error::io(&raw.source, e))?,
            };
            map.insert(target.key(), hashcode);
        }

        Ok(map)
    }

    /// Hashcode of a compressed archive as installed, plus the rebuilt
    /// archive when its entries are realized.
    fn compressed_content(&self, archive: &ArchiveSource) -> Result<(String, Option<RealizedArchive>)> {
        match (&archive.realize, self.data.template_engine()) {
            (Some(pattern), Some(engine)) => {
                let realized = realize_archive(&archive.path, pattern, engine)?;
                Ok((checksum::compute_bytes_checksum(&realized.bytes), Some(realized)))
            }
            _ => {
                let hashcode = checksum::compute_file_checksum(&archive.path)
                    .map_err(|e| bundle_fs::Error::io(&archive.path, e))?;
                Ok((hashcode, None))
            }
        }
    }

    fn realized_raw_content(&self, raw: &RawFile) -> Result<Option<String>> {
        match (raw.realize, self.data.template_engine()) {
            (true, Some(engine)) => {
                let bytes = fs::read(&raw.source).map_err(|e| bundle_fs::Error::io(&raw.source, e))?;
                Ok(Some(engine.replace_tokens(&String::from_utf8_lossy(&bytes))))
            }
            _ => Ok(None),
        }
    }

    /// Lay down every archive and raw file, skipping the paths in `leave_alone`.
    ///
    /// The returned map holds what was written plus the `leave_alone` entries.
    fn extract_all(
        &self,
        diff: &mut DeployDifferences,
        dry_run: bool,
        leave_alone: &BTreeMap<String, String>,
    ) -> Result<FileHashcodeMap> {
        let mut map = FileHashcodeMap::new();
        let skip = leave_alone.keys().cloned().collect();
        let engine = self.data.template_engine();

        for (archive, target) in self.data.archives().iter().zip(&self.archive_targets) {
            match target {
                None => {
                    tracing::debug!(zip = ?archive.path, dry_run, "Extracting archive");
                    let mut visitor = ExtractorVisitor::new(&self.destination, diff)
                        .realize(archive.realize.as_ref(), engine)
                        .skip(&skip)
                        .dry_run(dry_run);
                    walk_zip(&archive.path, &mut visitor)?;
                    map.extend(&visitor.into_map());
                }
                Some(target) if !leave_alone.contains_key(target.key()) => {
                    let (hashcode, realized) = self.compressed_content(archive)?;
                    if !dry_run {
                        let native = target.to_native(&self.destination);
                        let bytes = realized.as_ref().map(|r| r.bytes.as_slice());
                        if let Err(e) = install_compressed(&archive.path, &native, &hashcode, bytes) {
                            record_error(diff, target.key(), e);
                            continue;
                        }
                    }
                    if let Some(realized) = realized.filter(|r| !r.entries.is_empty()) {
                        diff.add_realized_file(target.key(), realized.entries.join("\n"));
                    }
                    tracing::debug!(path = target.key(), dry_run, "Installed compressed archive");
                    map.insert(target.key(), hashcode);
                }
                Some(_) => {}
            }
        }

        for (raw, target) in self.data.raw_files().iter().zip(&self.raw_targets) {
            let key = target.key();
            if leave_alone.contains_key(key) {
                continue;
            }
            let native = target.to_native(&self.destination);
            match self.install_raw(raw, &native, key, dry_run, diff) {
                Ok(hashcode) => {
                    map.insert(key, hashcode);
                }
                Err(e) => record_error(diff, key, e),
            }
        }

        for (key, hashcode) in leave_alone {
            if hashcode != DIRECTORY_HASHCODE {
                map.insert(key.clone(), hashcode.clone());
            }
        }

        Ok(map)
    }

    fn install_raw(
        &self,
        raw: &RawFile,
        native: &Path,
        key: &str,
        dry_run: bool,
        diff: &mut DeployDifferences,
    ) -> Result<String> {
        if let Some(content) = self.realized_raw_content(raw)? {
            tracing::debug!(source = ?raw.source, target = ?native, dry_run, "Realizing raw file");
            if !dry_run {
                io::write_bytes(native, content.as_bytes())?;
            }
            let hashcode = checksum::compute_content_checksum(&content);
            diff.add_realized_file(key, content);
            return Ok(hashcode);
        }

        tracing::debug!(source = ?raw.source, target = ?native, dry_run, "Copying raw file");
        if dry_run {
            Ok(checksum::compute_file_checksum(&raw.source).map_err(|e| bundle_fs::Error::io(&raw.source, e))?)
        } else {
            Ok(io::copy_with_checksum(&raw.source, native)?)
        }
    }
}

/// Where a compressed archive is installed.
///
/// Without a destination it keeps its location relative to the source
/// directory; otherwise it goes into the destination directory given.
fn compressed_target(destination: &Path, source_directory: &Path, archive: &ArchiveSource) -> Result<DeployPath> {
    let file_name = archive.path.file_name().ok_or_else(|| Error::InvalidDeploymentData {
        message: format!("archive path {} has no file name", archive.path.display()),
    })?;
    let location = match &archive.destination {
        Some(directory) => directory.join(file_name),
        None => archive
            .path
            .strip_prefix(source_directory)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(file_name)),
    };
    Ok(DeployPath::resolve(destination, &location)?)
}

fn install_compressed(source: &Path, native: &Path, hashcode: &str, realized: Option<&[u8]>) -> Result<()> {
    if let Some(bytes) = realized {
        io::write_bytes(native, bytes)?;
        return Ok(());
    }
    let up_to_date = native.is_file()
        && checksum::compute_file_checksum(native).is_ok_and(|existing| existing == hashcode);
    if !up_to_date {
        io::copy_with_checksum(source, native)?;
    }
    Ok(())
}

fn record_error(diff: &mut DeployDifferences, key: &str, error: impl std::fmt::Display) {
    tracing::warn!(path = key, %error, "Deployment step failed");
    diff.add_error(key, error.to_string());
}
