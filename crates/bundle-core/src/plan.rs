//! The three-way decision for a single path
//!
//! [`classify`] looks at the hashcode a path had when last deployed, what
//! is on disk now and what the new deployment wants, and decides what to do.
//! It never touches the filesystem; the deployer interprets the result.

/// What the rescan saw at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Current<'a> {
    /// Not found, and never recorded
    Missing,
    /// Recorded by the last deployment, gone now
    Deleted,
    /// Present with this hashcode
    Present(&'a str),
    /// An external path the rescan does not look at, yet something exists there
    Unscanned,
}

/// The decision for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Current content already matches; extraction rewrites the same bytes
    Unchanged,
    /// New file
    Install,
    /// Untouched since the last deployment, new content differs
    Update,
    /// Locally modified while the new content equals the original; keep the
    /// live file and record the original hashcode
    Preserve { original: String },
    /// Back up the current file, then overwrite it
    Backup { changed: bool },
    /// Remove the current file
    Delete,
    /// Move the current file into the backup area
    BackupAndDelete,
    /// Already gone and no longer wanted
    Gone,
}

impl Action {
    /// Whether the current file must be copied or moved to the backup area.
    pub fn needs_backup(&self) -> bool {
        matches!(self, Self::Backup { .. } | Self::BackupAndDelete)
    }

    /// Whether the current file must be removed from the destination.
    pub fn deletes(&self) -> bool {
        matches!(self, Self::Delete | Self::BackupAndDelete)
    }
}

/// Decide what to do with a path given its original, current and new hashcodes.
///
/// `clean` means the destination is about to be wiped, so there is no live
/// file left to preserve.
pub fn classify(original: Option<&str>, current: Current<'_>, new: Option<&str>, clean: bool) -> Action {
    match (current, new) {
        (Current::Deleted, Some(_)) | (Current::Missing, Some(_)) => Action::Install,
        (Current::Deleted, None) | (Current::Missing, None) => Action::Gone,
        (Current::Unscanned, Some(_)) => Action::Backup { changed: true },
        (Current::Unscanned, None) => Action::Gone,
        (Current::Present(current), new) => match (original, new) {
            (None, None) => Action::BackupAndDelete,
            (None, Some(new)) => Action::Backup {
                changed: new != current,
            },
            (Some(original), None) if original == current => Action::Delete,
            (Some(_), None) => Action::BackupAndDelete,
            (Some(original), Some(new)) if original == current => {
                if new == current {
                    Action::Unchanged
                } else {
                    Action::Update
                }
            }
            (Some(original), Some(new)) => {
                if new == original && !clean {
                    Action::Preserve {
                        original: original.to_string(),
                    }
                } else if new == current {
                    Action::Unchanged
                } else {
                    Action::Backup {
                        changed: new != original,
                    }
                }
            }
        },
    }
}
