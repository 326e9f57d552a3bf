//! Inputs of one deployment

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::pattern::PathPattern;
use crate::properties::DeploymentProperties;
use crate::template::TemplateEngine;
use crate::{Error, Result};

/// An archive to lay down, either exploded into entries or copied as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSource {
    pub path: PathBuf,
    pub exploded: bool,
    /// Directory a compressed archive is copied into. `None` keeps the
    /// archive's location relative to the source directory.
    pub destination: Option<PathBuf>,
    /// Entries to pass through the template engine
    pub realize: Option<PathPattern>,
}

/// A single file copied to a destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub source: PathBuf,
    /// Relative to the destination directory, or absolute
    pub destination: PathBuf,
    pub realize: bool,
}

/// Everything a [`crate::Deployer`] needs to know. Immutable once built.
#[derive(Debug, Clone)]
pub struct DeploymentData {
    properties: DeploymentProperties,
    source_directory: PathBuf,
    destination_directory: PathBuf,
    archives: Vec<ArchiveSource>,
    raw_files: Vec<RawFile>,
    template_engine: Option<TemplateEngine>,
    ignore_pattern: Option<PathPattern>,
    clean: bool,
}

impl DeploymentData {
    /// Start describing a deployment.
    ///
    /// Relative archive and raw file sources are resolved against
    /// `source_directory`.
    pub fn builder(
        properties: DeploymentProperties,
        source_directory: impl Into<PathBuf>,
        destination_directory: impl Into<PathBuf>,
    ) -> DeploymentDataBuilder {
        DeploymentDataBuilder {
            properties,
            source_directory: source_directory.into(),
            destination_directory: destination_directory.into(),
            archives: Vec::new(),
            realize_patterns: BTreeMap::new(),
            raw_files: Vec::new(),
            raw_files_to_realize: BTreeSet::new(),
            template_engine: None,
            ignore_pattern: None,
            clean: false,
        }
    }

    pub fn properties(&self) -> &DeploymentProperties {
        &self.properties
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    pub fn destination_directory(&self) -> &Path {
        &self.destination_directory
    }

    pub fn archives(&self) -> &[ArchiveSource] {
        &self.archives
    }

    pub fn raw_files(&self) -> &[RawFile] {
        &self.raw_files
    }

    pub fn template_engine(&self) -> Option<&TemplateEngine> {
        self.template_engine.as_ref()
    }

    pub fn ignore_pattern(&self) -> Option<&PathPattern> {
        self.ignore_pattern.as_ref()
    }

    /// Whether [`crate::Deployer::deploy`] wipes the destination first.
    pub fn clean(&self) -> bool {
        self.clean
    }
}

/// Builder for [`DeploymentData`].
#[derive(Debug)]
pub struct DeploymentDataBuilder {
    properties: DeploymentProperties,
    source_directory: PathBuf,
    destination_directory: PathBuf,
    archives: Vec<ArchiveSource>,
    realize_patterns: BTreeMap<PathBuf, PathPattern>,
    raw_files: Vec<RawFile>,
    raw_files_to_realize: BTreeSet<PathBuf>,
    template_engine: Option<TemplateEngine>,
    ignore_pattern: Option<PathPattern>,
    clean: bool,
}

impl DeploymentDataBuilder {
    /// Add an archive to explode into the destination.
    pub fn zip(mut self, path: impl Into<PathBuf>) -> Self {
        let path = self.source_path(path.into());
        self.archives.push(ArchiveSource {
            path,
            exploded: true,
            destination: None,
            realize: None,
        });
        self
    }

    /// Add an archive to copy without exploding it.
    pub fn compressed_zip(mut self, path: impl Into<PathBuf>, destination: Option<PathBuf>) -> Self {
        let path = self.source_path(path.into());
        self.archives.push(ArchiveSource {
            path,
            exploded: false,
            destination,
            realize: None,
        });
        self
    }

    /// Realize the entries of an already added archive that match `pattern`.
    pub fn zip_realize_pattern(mut self, path: impl Into<PathBuf>, pattern: PathPattern) -> Self {
        let path = self.source_path(path.into());
        self.realize_patterns.insert(path, pattern);
        self
    }

    pub fn raw_file(mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        let source = self.source_path(source.into());
        self.raw_files.push(RawFile {
            source,
            destination: destination.into(),
            realize: false,
        });
        self
    }

    /// Realize an already added raw file through the template engine.
    pub fn realize_raw_file(mut self, source: impl Into<PathBuf>) -> Self {
        let source = self.source_path(source.into());
        self.raw_files_to_realize.insert(source);
        self
    }

    pub fn template_engine(mut self, engine: TemplateEngine) -> Self {
        self.template_engine = Some(engine);
        self
    }

    pub fn ignore_pattern(mut self, pattern: PathPattern) -> Self {
        self.ignore_pattern = Some(pattern);
        self
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Validate and freeze the deployment description.
    pub fn build(mut self) -> Result<DeploymentData> {
        self.properties.validate()?;

        if self.source_directory.as_os_str().is_empty() {
            return Err(invalid("source directory is empty"));
        }
        if self.destination_directory.as_os_str().is_empty() {
            return Err(invalid("destination directory is empty"));
        }
        if self.destination_directory.is_file() {
            return Err(invalid(format!(
                "destination {} is an existing file",
                self.destination_directory.display()
            )));
        }

        for (path, pattern) in std::mem::take(&mut self.realize_patterns) {
            let archive = self
                .archives
                .iter_mut()
                .find(|a| a.path == path)
                .ok_or_else(|| invalid(format!("realize pattern given for unknown archive {}", path.display())))?;
            archive.realize = Some(pattern);
        }

        for source in std::mem::take(&mut self.raw_files_to_realize) {
            let raw = self
                .raw_files
                .iter_mut()
                .find(|r| r.source == source)
                .ok_or_else(|| invalid(format!("cannot realize unknown raw file {}", source.display())))?;
            raw.realize = true;
        }

        let needs_engine =
            self.raw_files.iter().any(|r| r.realize) || self.archives.iter().any(|a| a.realize.is_some());
        if needs_engine && self.template_engine.is_none() {
            return Err(invalid("files are marked for realization but no template engine was given"));
        }

        for archive in &self.archives {
            if !archive.path.is_file() {
                return Err(invalid(format!("archive {} does not exist", archive.path.display())));
            }
        }
        for raw in &self.raw_files {
            if !raw.source.is_file() {
                return Err(invalid(format!("raw file {} does not exist", raw.source.display())));
            }
            if raw.destination.as_os_str().is_empty() {
                return Err(invalid(format!("raw file {} has no destination", raw.source.display())));
            }
        }

        Ok(DeploymentData {
            properties: self.properties,
            source_directory: self.source_directory,
            destination_directory: self.destination_directory,
            archives: self.archives,
            raw_files: self.raw_files,
            template_engine: self.template_engine,
            ignore_pattern: self.ignore_pattern,
            clean: self.clean,
        })
    }

    fn source_path(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.source_directory.join(path)
        }
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidDeploymentData {
        message: message.into(),
    }
}
