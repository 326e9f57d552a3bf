//! Reconciliation engine for bundle deployments
//!
//! This crate lays bundle content (exploded archives, compressed archives and
//! raw files, optionally template-expanded) into a destination directory,
//! implementing:
//!
//! - **Hashcode maps**: Path-to-digest snapshots and rescans of live directories
//! - **Metadata ledger**: Per-revision properties, hashcodes and backups under `.deployments/`
//! - **Decision function**: Pure three-way classification of every path
//! - **Deployer**: Executes backups, deletions and extraction, recording a diff
//!
//! # Architecture
//!
//! `bundle-core` sits above `bundle-fs` and below the CLI:
//!
//! ```text
//!                 bundle-cli
//!                     |
//!                 Deployer
//!                     |
//!    +--------+-------+------+-----------+
//!    |        |              |           |
//! metadata  hashcode       plan      visitor
//!    |        |                          |
//!    +--------+--------------------------+
//!                     |
//!                 bundle-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bundle_core::{DeployDifferences, Deployer, DeploymentData, DeploymentProperties};
//!
//! let data = DeploymentData::builder(DeploymentProperties::new(1, "app", "1.0"), "dist", "/opt/app")
//!     .zip("app.zip")
//!     .build()?;
//! let mut diff = DeployDifferences::new();
//! let map = Deployer::new(data)?.deploy(&mut diff)?;
//! ```

pub mod data;
pub mod deployer;
pub mod differences;
pub mod error;
pub mod hashcode;
pub mod metadata;
pub mod pattern;
pub mod plan;
pub mod properties;
pub mod template;
pub mod visitor;

pub use data::{ArchiveSource, DeploymentData, DeploymentDataBuilder, RawFile};
pub use deployer::{Deployer, DeploymentDiskUsage};
pub use differences::DeployDifferences;
pub use error::{Error, Result};
pub use hashcode::{
    ChangesFileHashcodeMap, DELETED_FILE_HASHCODE, DIRECTORY_HASHCODE, FileHashcodeMap, UNKNOWN_DIR_HASHCODE,
    UNKNOWN_FILE_HASHCODE,
};
pub use metadata::DeploymentsMetadata;
pub use pattern::PathPattern;
pub use plan::{Action, Current, classify};
pub use properties::{DeploymentProperties, DestinationComplianceMode};
pub use template::TemplateEngine;
