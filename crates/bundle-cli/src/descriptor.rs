//! Deployment descriptor files
//!
//! A descriptor names the bundle content and where it goes:
//!
//! ```toml
//! source_dir = "dist"
//! destination_dir = "/srv/app"
//! ignore = "logs|tmp"
//!
//! [deployment]
//! id = 4
//! name = "app"
//! version = "1.4.0"
//! compliance = "filesAndDirectories"
//!
//! [[archives]]
//! path = "app.zip"
//! realize = "conf/.*"
//!
//! [[files]]
//! source = "app.conf"
//! destination = "/etc/app/app.conf"
//! realize = true
//!
//! [tokens]
//! port = "8080"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bundle_core::{DeploymentData, DeploymentProperties, DestinationComplianceMode, PathPattern, TemplateEngine};
use bundle_fs::ConfigStore;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    #[serde(default)]
    pub clean: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
    pub deployment: DeploymentSection,
    #[serde(default)]
    pub archives: Vec<ArchiveEntry>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentSection {
    pub id: i32,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub compliance: DestinationComplianceMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    /// Explode into the destination, or copy the archive file as-is
    #[serde(default = "default_exploded")]
    pub exploded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realize: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(default)]
    pub realize: bool,
}

fn default_exploded() -> bool {
    true
}

impl Descriptor {
    /// Load a descriptor, resolving its directories against the file's location.
    pub fn load(path: &Path) -> Result<Self> {
        let mut descriptor: Self = ConfigStore::new().load(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        descriptor.source_dir = resolve(base, &descriptor.source_dir);
        descriptor.destination_dir = resolve(base, &descriptor.destination_dir);
        tracing::debug!(?path, source = ?descriptor.source_dir, destination = ?descriptor.destination_dir, "Loaded descriptor");
        Ok(descriptor)
    }

    pub fn properties(&self) -> DeploymentProperties {
        let section = &self.deployment;
        let mut properties = DeploymentProperties::new(section.id, &section.name, &section.version)
            .with_compliance(section.compliance);
        if let Some(description) = &section.description {
            properties = properties.with_description(description);
        }
        properties
    }

    /// Build the deployment, optionally sending it somewhere else.
    pub fn to_deployment_data(&self, destination: Option<&Path>) -> Result<DeploymentData> {
        let destination = destination.unwrap_or(&self.destination_dir);
        let mut builder = DeploymentData::builder(self.properties(), &self.source_dir, destination).clean(self.clean);

        for archive in &self.archives {
            builder = if archive.exploded {
                builder.zip(&archive.path)
            } else {
                builder.compressed_zip(&archive.path, archive.destination.clone())
            };
            if let Some(pattern) = &archive.realize {
                builder = builder.zip_realize_pattern(&archive.path, PathPattern::new(pattern)?);
            }
        }

        for file in &self.files {
            builder = builder.raw_file(&file.source, &file.destination);
            if file.realize {
                builder = builder.realize_raw_file(&file.source);
            }
        }

        let realizes = self.files.iter().any(|f| f.realize) || self.archives.iter().any(|a| a.realize.is_some());
        if realizes || !self.tokens.is_empty() {
            builder = builder.template_engine(TemplateEngine::new(self.tokens.clone()));
        }
        if let Some(ignore) = &self.ignore {
            builder = builder.ignore_pattern(PathPattern::new(ignore)?);
        }

        Ok(builder.build()?)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
