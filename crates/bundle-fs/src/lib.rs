//! Filesystem primitives for the bundle deployer
//!
//! Provides path canonicalization, content hashing and safe I/O operations.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;

pub use config::{ConfigFormat, ConfigStore};
pub use constants::MetadataPath;
pub use error::{Error, Result};
pub use path::{DeployPath, NormalizedPath, canonicalize_path, normalize_lexically};
