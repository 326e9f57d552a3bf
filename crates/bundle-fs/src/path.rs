//! Path normalization and canonicalization
//!
//! Map keys are always `/`-separated strings. [`DeployPath`] tags each key as
//! either relative to the destination root or external to it, and is
//! resolved once at the boundary so the rest of the engine never has to
//! guess.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// A `/`-separated path string, the form every map key is stored in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    /// Backslashes become forward slashes; nothing else is touched.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            inner: path.as_ref().to_string_lossy().replace('\\', "/"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn into_string(self) -> String {
        self.inner
    }

    /// Parent directory, if the path has one below the root.
    pub fn parent(&self) -> Option<Self> {
        let (head, _) = self.inner.trim_end_matches('/').rsplit_once('/')?;
        (!head.is_empty()).then(|| Self { inner: head.to_string() })
    }

    /// Every proper ancestor of a relative path, nearest first.
    ///
    /// `a/b/c.txt` yields `a/b` then `a`.
    pub fn ancestors(&self) -> Vec<Self> {
        std::iter::successors(self.parent(), Self::parent).collect()
    }

    /// The first component, e.g. `lib` for `lib/app.jar`.
    pub fn first_component(&self) -> &str {
        let trimmed = self.inner.trim_start_matches('/');
        trimmed.split('/').next().unwrap_or(trimmed)
    }

    /// Extension of the last component; dotfiles have none.
    pub fn extension(&self) -> Option<&str> {
        let name = self.inner.trim_end_matches('/').rsplit('/').next()?;
        match name.rfind('.') {
            Some(idx) if idx > 0 => Some(&name[idx + 1..]),
            _ => None,
        }
    }

    /// Whether this names an absolute location (POSIX root or drive letter).
    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/') || split_drive_letter(&self.inner).0.is_some()
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

/// Split a leading drive letter (`C:/...` or `C:\...`) from a path string.
pub fn split_drive_letter(path: &str) -> (Option<char>, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\' {
            return (Some(bytes[0].to_ascii_uppercase() as char), &path[2..]);
        }
    }
    (None, path)
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// Leading `..` components of a relative path are kept; a `..` at the root
/// of an absolute path is dropped.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => result.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    result.pop();
                    depth -= 1;
                } else if !result.has_root() {
                    result.push("..");
                }
            }
            Component::Normal(name) => {
                result.push(name);
                depth += 1;
            }
        }
    }
    result
}

/// Canonicalize a path that may not fully exist yet.
///
/// The path is made absolute and normalized lexically; the deepest existing
/// ancestor is then resolved through symlinks and the missing remainder
/// re-appended.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| Error::io(path, e))?;
        cwd.join(path)
    };
    let normalized = normalize_lexically(&absolute);

    for ancestor in normalized.ancestors() {
        if ancestor.exists() {
            let canonical = dunce::canonicalize(ancestor).map_err(|e| Error::io(ancestor, e))?;
            return Ok(match normalized.strip_prefix(ancestor) {
                Ok(rest) if !rest.as_os_str().is_empty() => canonical.join(rest),
                _ => canonical,
            });
        }
    }
    Ok(normalized)
}

/// A deployment path, tagged by where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeployPath {
    /// `/`-separated path under the destination root
    Relative(String),
    /// Canonical absolute path outside the destination root
    External(String),
}

impl DeployPath {
    /// Resolve a raw destination against a canonical destination root.
    ///
    /// Absolute inputs are external. Relative inputs that escape the root
    /// through `..` become external too, keyed by their canonical location.
    pub fn resolve(root: &Path, path: &Path) -> Result<Self> {
        if path.is_absolute() {
            let canonical = canonicalize_path(path)?;
            return Ok(Self::External(NormalizedPath::new(canonical).into_string()));
        }

        let joined = canonicalize_path(&root.join(path))?;
        match joined.strip_prefix(root) {
            Ok(rel) if rel.as_os_str().is_empty() => Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "resolves to the destination directory itself".into(),
            }),
            Ok(rel) => Ok(Self::Relative(NormalizedPath::new(rel).into_string())),
            Err(_) => Ok(Self::External(NormalizedPath::new(joined).into_string())),
        }
    }

    /// Recover the tag of an existing map key.
    pub fn from_key(key: &str) -> Self {
        let normalized = NormalizedPath::new(key);
        if normalized.is_absolute() {
            Self::External(normalized.into_string())
        } else {
            Self::Relative(normalized.into_string())
        }
    }

    /// The map key for this path.
    pub fn key(&self) -> &str {
        match self {
            Self::Relative(p) | Self::External(p) => p,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// Native location on disk.
    pub fn to_native(&self, root: &Path) -> PathBuf {
        match self {
            Self::Relative(p) => root.join(p),
            Self::External(p) => PathBuf::from(p),
        }
    }
}

impl std::fmt::Display for DeployPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
