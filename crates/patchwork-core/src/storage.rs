//! File storage and version-control collaborators.
//!
//! The engine never touches the filesystem itself. Hosts plug in a [`FileStorage`] that reads
//! and writes files and talks to version control; [`MemoryStorage`] is an in-memory
//! implementation used by tests and headless tools.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// The storage call that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageOperation {
    /// [`FileStorage::read`]
    Read,
    /// [`FileStorage::write`]
    Write,
    /// [`FileStorage::show_at_revision`]
    ShowAtRevision,
    /// [`FileStorage::stage_for_commit`]
    StageForCommit,
    /// [`FileStorage::revert_to_revision`]
    RevertToRevision,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ShowAtRevision => "show-at-revision",
            Self::StageForCommit => "stage",
            Self::RevertToRevision => "revert",
        };
        f.write_str(name)
    }
}

/// Storage and version-control failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The file does not exist.
    #[error("{path}: no such file")]
    NotFound {
        /// Requested path.
        path: String,
    },
    /// Version control has no content for the file at that revision.
    #[error("{path}: no content at revision {revision}")]
    RevisionNotFound {
        /// Requested path.
        path: String,
        /// Requested revision.
        revision: String,
    },
    /// Backend-specific failure (I/O, VCS process, remote API).
    #[error("{operation} {path}: {message}")]
    Backend {
        /// The failed call.
        operation: StorageOperation,
        /// Path it was made for.
        path: String,
        /// Backend message.
        message: String,
    },
}

/// File and version-control access used by an [`EditSession`](crate::session::EditSession).
pub trait FileStorage {
    /// Current content of `path`.
    fn read(&mut self, path: &str) -> Result<String, StorageError>;

    /// Replace the content of `path`.
    fn write(&mut self, path: &str, text: &str) -> Result<(), StorageError>;

    /// Content of `path` at `revision` (e.g. `"HEAD"`), used as a diff baseline.
    fn show_at_revision(&mut self, path: &str, revision: &str) -> Result<String, StorageError>;

    /// Stage `path` for the next commit.
    fn stage_for_commit(&mut self, path: &str) -> Result<(), StorageError>;

    /// Restore `path` on storage to its content at `revision`.
    fn revert_to_revision(&mut self, path: &str, revision: &str) -> Result<(), StorageError>;
}

/// Per-path modification flags reported by version control.
pub trait VersionControlStatus {
    /// Returns `true` if `path` differs from its committed content.
    fn is_modified(&self, path: &str) -> bool;
}

/// A fixed set of modified paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    modified: BTreeSet<String>,
}

impl StatusSnapshot {
    /// A snapshot with nothing modified.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag `path` as modified.
    pub fn mark_modified(&mut self, path: impl Into<String>) {
        self.modified.insert(path.into());
    }
}

impl<S: Into<String>> FromIterator<S> for StatusSnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            modified: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl VersionControlStatus for StatusSnapshot {
    fn is_modified(&self, path: &str) -> bool {
        self.modified.contains(path)
    }
}

/// In-memory [`FileStorage`] with per-operation failure injection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: BTreeMap<String, String>,
    /// (path, revision) -> content
    revisions: BTreeMap<(String, String), String>,
    staged: BTreeSet<String>,
    failing: BTreeSet<StorageOperation>,
    write_count: usize,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a working-tree file and record the same content as its `HEAD` revision.
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        let path = path.into();
        let text = text.into();
        self.revisions
            .insert((path.clone(), "HEAD".to_string()), text.clone());
        self.files.insert(path, text);
        self
    }

    /// Overwrite a working-tree file without touching its revisions.
    pub fn set_file(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    /// Record the content of `path` at `revision`.
    pub fn set_revision(
        &mut self,
        path: impl Into<String>,
        revision: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.revisions
            .insert((path.into(), revision.into()), text.into());
    }

    /// Working-tree content of `path`.
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Returns `true` if `path` has been staged.
    pub fn is_staged(&self, path: &str) -> bool {
        self.staged.contains(path)
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    /// Make every subsequent `operation` fail until [`MemoryStorage::heal`] is called.
    pub fn fail(&mut self, operation: StorageOperation) {
        self.failing.insert(operation);
    }

    /// Undo [`MemoryStorage::fail`].
    pub fn heal(&mut self, operation: StorageOperation) {
        self.failing.remove(&operation);
    }

    fn check(&self, operation: StorageOperation, path: &str) -> Result<(), StorageError> {
        if self.failing.contains(&operation) {
            return Err(StorageError::Backend {
                operation,
                path: path.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn revision(&self, path: &str, revision: &str) -> Result<&String, StorageError> {
        self.revisions
            .get(&(path.to_string(), revision.to_string()))
            .ok_or_else(|| StorageError::RevisionNotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            })
    }
}

impl FileStorage for MemoryStorage {
    fn read(&mut self, path: &str) -> Result<String, StorageError> {
        self.check(StorageOperation::Read, path)?;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    fn write(&mut self, path: &str, text: &str) -> Result<(), StorageError> {
        self.check(StorageOperation::Write, path)?;
        self.files.insert(path.to_string(), text.to_string());
        self.write_count += 1;
        Ok(())
    }

    fn show_at_revision(&mut self, path: &str, revision: &str) -> Result<String, StorageError> {
        self.check(StorageOperation::ShowAtRevision, path)?;
        self.revision(path, revision).cloned()
    }

    fn stage_for_commit(&mut self, path: &str) -> Result<(), StorageError> {
        self.check(StorageOperation::StageForCommit, path)?;
        if !self.files.contains_key(path) {
            return Err(StorageError::NotFound {
                path: path.to_string(),
            });
        }
        self.staged.insert(path.to_string());
        Ok(())
    }

    fn revert_to_revision(&mut self, path: &str, revision: &str) -> Result<(), StorageError> {
        self.check(StorageOperation::RevertToRevision, path)?;
        let text = self.revision(path, revision)?.clone();
        self.files.insert(path.to_string(), text);
        self.staged.remove(path);
        Ok(())
    }
}

/// Modified means the working-tree file differs from its `HEAD` revision.
impl VersionControlStatus for MemoryStorage {
    fn is_modified(&self, path: &str) -> bool {
        match (self.files.get(path), self.revision(path, "HEAD")) {
            (Some(current), Ok(head)) => current != head,
            (Some(_), Err(_)) => true,
            (None, _) => false,
        }
    }
}
