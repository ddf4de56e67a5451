//! Overlay annotations handed to the rendering host.
//!
//! Each pending edit becomes one [`EditDecoration`], anchored to character offsets in the current
//! buffer. Hosts render them as inline diff zones and wire accept/reject buttons to the edit id.

use crate::overlay::{EditId, EditOrigin, PendingEdit};

/// What accepting the edit will do to the anchored range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationKind {
    /// Empty range; text will be inserted.
    Insertion,
    /// Range will be removed.
    Deletion,
    /// Range will be replaced.
    Replacement,
}

/// One pending edit, as the host should render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDecoration {
    /// Id to pass back on accept or reject.
    pub id: EditId,
    /// Start character offset.
    pub range_start: usize,
    /// End character offset.
    pub range_end: usize,
    /// Proposed text.
    pub new_text: String,
    /// How to render the range.
    pub kind: DecorationKind,
    /// Where the edit came from.
    pub origin: EditOrigin,
    /// The range could not be re-anchored after an overlapping accept.
    pub stale: bool,
}

impl From<&PendingEdit> for EditDecoration {
    fn from(edit: &PendingEdit) -> Self {
        let kind = if edit.range_start == edit.range_end {
            DecorationKind::Insertion
        } else if edit.new_text.is_empty() {
            DecorationKind::Deletion
        } else {
            DecorationKind::Replacement
        };
        Self {
            id: edit.id.clone(),
            range_start: edit.range_start,
            range_end: edit.range_end,
            new_text: edit.new_text.clone(),
            kind,
            origin: edit.source.origin,
            stale: edit.stale,
        }
    }
}
