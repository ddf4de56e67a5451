//! Error taxonomy for the reconciliation engine.

use crate::diff::DiffParseError;
use crate::instruction::ParseIssue;
use crate::overlay::EditId;
use crate::resolver::Unresolved;
use crate::storage::{StorageError, StorageOperation};
use thiserror::Error;

/// Errors surfaced by [`EditSession`](crate::session::EditSession) and
/// [`PendingEditOverlay`](crate::overlay::PendingEditOverlay).
///
/// None of these leave a buffer half-modified: every range is validated before splicing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The instruction was malformed and has been dropped.
    #[error("malformed edit instruction: {0}")]
    ParseFailure(#[from] ParseIssue),
    /// No strategy could locate the target; the instruction has been dropped.
    #[error("could not locate target content in {path}: {reason}")]
    UnresolvedAnchor {
        /// File the instruction targeted.
        path: String,
        /// Why the last strategy failed.
        reason: Unresolved,
    },
    /// The edit no longer fits the buffer. It stays pending.
    #[error("edit {id} range {start}..{end} exceeds the buffer ({len} chars)")]
    OutOfBounds {
        /// The edit.
        id: EditId,
        /// Its range start.
        start: usize,
        /// Its range end.
        end: usize,
        /// Buffer length in characters.
        len: usize,
    },
    /// The edit was invalidated by an overlapping accept or no longer matches its snippet.
    #[error("edit {id} no longer matches the buffer")]
    StaleEdit {
        /// The edit.
        id: EditId,
    },
    /// A storage call failed before anything changed in memory.
    #[error("storage failure: {0}")]
    PersistenceFailure(#[from] StorageError),
    /// The path has no open buffer.
    #[error("file is not open: {0}")]
    FileNotOpen(String),
    /// No pending edit with this id exists for the file.
    #[error("no pending edit {id} for {path}")]
    EditNotFound {
        /// File that was searched.
        path: String,
        /// Requested id.
        id: EditId,
    },
    /// The diff text could not be parsed.
    #[error(transparent)]
    DiffParse(#[from] DiffParseError),
}

/// A storage call that failed after the in-memory change was kept.
///
/// Accept and reject are local-first; hosts show these as "applied locally but not saved".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path} was updated in memory but {action} failed: {error}")]
pub struct PersistenceWarning {
    /// File whose storage call failed.
    pub path: String,
    /// The failed call.
    pub action: StorageOperation,
    /// What the storage reported.
    pub error: StorageError,
}
