//! Pending edit overlay.
//!
//! # Overview
//!
//! [`PendingEditOverlay`] is the per-file store of resolved but unapplied edits. Edits are kept
//! sorted by `range_start`, and no two edits for the same file share a `range_start`, which makes
//! [`PendingEditOverlay::add`] idempotent against duplicate resolution from retried messages.
//!
//! Accepting an edit splices it into the [`DocumentBuffer`] and re-anchors siblings:
//!
//! - edits starting at or after the accepted range's end shift by the length difference
//! - edits overlapping the accepted range keep their range and are flagged stale; the next
//!   render pass tries to re-locate them by their original snippet
//!
//! Direct user typing does **not** shift pending edits. Their ranges stay as resolved; accept
//! only re-checks bounds unless [`OverlayOptions::verify_snippet_on_accept`] is set.

use crate::buffer::DocumentBuffer;
use crate::config::OverlayOptions;
use crate::decorations::EditDecoration;
use crate::delta::TextDelta;
use crate::error::ReconcileError;
use crate::search::find_all_literal;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Pending edit identifier: a correlation id plus a per-source sequence number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditId(String);

impl EditId {
    /// Id for the `seq`-th edit of `correlation`, rendered `<correlation>-<seq>`.
    pub fn new(correlation: &str, seq: u64) -> Self {
        Self(format!("{correlation}-{seq}"))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EditId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EditId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Where a pending edit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    /// A streamed agent instruction.
    AgentStream,
    /// A block of a version-control diff.
    Diff,
}

/// Provenance of a pending edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Kind of source that produced the edit.
    pub origin: EditOrigin,
    /// Request or task id shared by every edit of one source message.
    pub correlation_id: String,
    /// Agent-side paragraph id, when the instruction carried one.
    pub paragraph_id: Option<String>,
}

/// A resolved edit awaiting accept or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Unique id within the session.
    pub id: EditId,
    /// File the edit targets.
    pub file_path: String,
    /// Start character offset in the buffer the edit was resolved against.
    pub range_start: usize,
    /// Exclusive end character offset; never less than `range_start`.
    pub range_end: usize,
    /// Buffer text at `range_start..range_end` when the edit was resolved.
    pub original_snippet: String,
    /// Replacement text.
    pub new_text: String,
    /// Where the edit came from.
    pub source: SourceMetadata,
    /// Set when an overlapping sibling was accepted and the range is no longer trustworthy.
    pub stale: bool,
}

impl PendingEdit {
    /// Returns `true` if this edit's range intersects `start..end`.
    ///
    /// Ranges that only touch do not overlap.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        if self.range_start == self.range_end {
            // An insertion point touches a range only from strictly inside.
            return start < self.range_start && self.range_start < end;
        }
        if start == end {
            return self.range_start < start && start < self.range_end;
        }
        self.range_start < end && start < self.range_end
    }

    fn shift(&mut self, removed: usize, inserted: usize) {
        self.range_start = self.range_start + inserted - removed;
        self.range_end = self.range_end + inserted - removed;
    }
}

/// Result of a successful single accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedEdit {
    /// The applied edit, as it was pending.
    pub edit: PendingEdit,
    /// The buffer change.
    pub delta: TextDelta,
    /// Siblings flagged stale because they overlapped the accepted range.
    pub newly_stale: Vec<EditId>,
}

/// An edit `accept_all` did not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEdit {
    /// The edit, removed from the overlay.
    pub edit: PendingEdit,
    /// Why it was not applied.
    pub reason: ReconcileError,
}

/// Outcome of [`PendingEditOverlay::accept_all`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcceptAllReport {
    /// Edits applied, in range order.
    pub applied: Vec<PendingEdit>,
    /// Edits dropped without being applied.
    pub skipped: Vec<SkippedEdit>,
    /// Combined buffer change, one entry per applied edit.
    pub delta: TextDelta,
}

/// Per-file ordered store of pending edits.
#[derive(Debug, Clone, Default)]
pub struct PendingEditOverlay {
    files: BTreeMap<String, Vec<PendingEdit>>,
    options: OverlayOptions,
}

impl PendingEditOverlay {
    /// Create an empty overlay.
    pub fn new(options: OverlayOptions) -> Self {
        Self {
            files: BTreeMap::new(),
            options,
        }
    }

    /// Insert `edit` for `path` unless an edit with the same `range_start` exists.
    ///
    /// Returns `true` if the edit was stored. An edit whose range ends before it starts is
    /// refused.
    pub fn add(&mut self, path: &str, mut edit: PendingEdit) -> bool {
        if edit.range_start > edit.range_end {
            warn!(path, id = %edit.id, start = edit.range_start, end = edit.range_end, "inverted pending edit refused");
            return false;
        }
        edit.file_path = path.to_string();
        let edits = self.files.entry(path.to_string()).or_default();
        match edits.binary_search_by_key(&edit.range_start, |e| e.range_start) {
            Ok(_) => {
                debug!(path, id = %edit.id, start = edit.range_start, "duplicate pending edit ignored");
                false
            }
            Err(idx) => {
                edits.insert(idx, edit);
                true
            }
        }
    }

    /// Discard one edit.
    pub fn remove(&mut self, path: &str, id: &EditId) -> Option<PendingEdit> {
        let edits = self.files.get_mut(path)?;
        let idx = edits.iter().position(|e| &e.id == id)?;
        let edit = edits.remove(idx);
        if edits.is_empty() {
            self.files.remove(path);
        }
        Some(edit)
    }

    /// Discard every edit for `path`, returning them in range order.
    pub fn clear_all(&mut self, path: &str) -> Vec<PendingEdit> {
        self.files.remove(path).unwrap_or_default()
    }

    /// Pending edits for `path`, ordered by `range_start`.
    pub fn edits_for(&self, path: &str) -> &[PendingEdit] {
        self.files.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up one edit.
    pub fn get(&self, path: &str, id: &EditId) -> Option<&PendingEdit> {
        self.edits_for(path).iter().find(|e| &e.id == id)
    }

    /// Number of pending edits for `path`.
    pub fn pending_count(&self, path: &str) -> usize {
        self.edits_for(path).len()
    }

    /// Returns `true` if no file has pending edits.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths with at least one pending edit.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn snippet_matches(edit: &PendingEdit, buffer: &DocumentBuffer) -> bool {
        buffer
            .slice(edit.range_start, edit.range_end)
            .is_ok_and(|current| current == edit.original_snippet)
    }

    /// Apply one edit to `buffer` and re-anchor its siblings.
    ///
    /// An edit that is flagged stale, or that no longer fits the buffer, stays pending and an
    /// error is returned. With `verify_snippet_on_accept`, an edit whose snippet no longer
    /// matches is discarded.
    pub fn accept_one(
        &mut self,
        path: &str,
        id: &EditId,
        buffer: &mut DocumentBuffer,
    ) -> Result<AcceptedEdit, ReconcileError> {
        let not_found = || ReconcileError::EditNotFound {
            path: path.to_string(),
            id: id.clone(),
        };
        let edits = self.files.get_mut(path).ok_or_else(not_found)?;
        let idx = edits.iter().position(|e| &e.id == id).ok_or_else(not_found)?;

        let len = buffer.char_count();
        let candidate = &edits[idx];
        if candidate.stale {
            return Err(ReconcileError::StaleEdit { id: id.clone() });
        }
        if candidate.range_end > len || candidate.range_start > candidate.range_end {
            warn!(path, id = %id, len, "pending edit exceeds buffer");
            return Err(ReconcileError::OutOfBounds {
                id: id.clone(),
                start: candidate.range_start,
                end: candidate.range_end,
                len,
            });
        }
        if self.options.verify_snippet_on_accept && !Self::snippet_matches(candidate, buffer) {
            warn!(path, id = %id, "pending edit no longer matches its snippet; discarded");
            edits.remove(idx);
            if edits.is_empty() {
                self.files.remove(path);
                buffer.release_baseline();
            }
            return Err(ReconcileError::StaleEdit { id: id.clone() });
        }

        let edit = edits.remove(idx);
        let splice = buffer
            .splice(edit.range_start, edit.range_end, &edit.new_text)
            .map_err(|_| ReconcileError::OutOfBounds {
                id: id.clone(),
                start: edit.range_start,
                end: edit.range_end,
                len,
            })?;
        let removed = splice.deleted_len();
        let inserted = splice.inserted_len();

        let mut newly_stale = Vec::new();
        for other in edits.iter_mut() {
            if other.range_start >= edit.range_end {
                other.shift(removed, inserted);
            } else if other.overlaps(edit.range_start, edit.range_end) {
                other.stale = true;
                newly_stale.push(other.id.clone());
            }
        }
        if !newly_stale.is_empty() {
            debug!(path, id = %id, stale = newly_stale.len(), "overlapping edits flagged stale");
        }

        if edits.is_empty() {
            self.files.remove(path);
            buffer.release_baseline();
        }

        debug!(path, id = %id, removed, inserted, "pending edit accepted");
        Ok(AcceptedEdit {
            edit,
            delta: TextDelta {
                before_char_count: len,
                after_char_count: buffer.char_count(),
                edits: vec![splice],
            },
            newly_stale,
        })
    }

    /// Apply every edit for `path` in ascending order, then clear the set.
    ///
    /// Shifts accumulate as edits are applied, so each edit lands where it would have after
    /// accepting its predecessors one by one. Edits that overlap an already-applied sibling,
    /// are stale, or do not fit the buffer are skipped and reported.
    pub fn accept_all(&mut self, path: &str, buffer: &mut DocumentBuffer) -> AcceptAllReport {
        let edits = self.clear_all(path);
        let before_char_count = buffer.char_count();
        let mut report = AcceptAllReport::default();
        // Net change so far, in chars, and the end of the last applied edit (pre-accept coords).
        let mut added = 0usize;
        let mut removed_total = 0usize;
        let mut applied_end: Option<usize> = None;

        for edit in edits {
            let skip = |reason| SkippedEdit {
                edit: edit.clone(),
                reason,
            };

            if edit.stale {
                report.skipped.push(skip(ReconcileError::StaleEdit {
                    id: edit.id.clone(),
                }));
                continue;
            }
            if applied_end.is_some_and(|end| edit.range_start < end) {
                report.skipped.push(skip(ReconcileError::StaleEdit {
                    id: edit.id.clone(),
                }));
                continue;
            }

            let len = buffer.char_count();
            let out_of_bounds = || ReconcileError::OutOfBounds {
                id: edit.id.clone(),
                start: edit.range_start,
                end: edit.range_end,
                len,
            };
            if edit.range_start > edit.range_end {
                report.skipped.push(skip(out_of_bounds()));
                continue;
            }
            let (start, end) = (
                edit.range_start + added - removed_total,
                edit.range_end + added - removed_total,
            );
            if end > len {
                report.skipped.push(skip(out_of_bounds()));
                continue;
            }
            if self.options.verify_snippet_on_accept
                && buffer.slice(start, end).ok().as_deref() != Some(edit.original_snippet.as_str())
            {
                report.skipped.push(skip(ReconcileError::StaleEdit {
                    id: edit.id.clone(),
                }));
                continue;
            }

            match buffer.splice(start, end, &edit.new_text) {
                Ok(splice) => {
                    added += splice.inserted_len();
                    removed_total += splice.deleted_len();
                    applied_end = Some(edit.range_end);
                    report.delta.edits.push(splice);
                    report.applied.push(edit);
                }
                Err(_) => report.skipped.push(skip(ReconcileError::OutOfBounds {
                    id: edit.id.clone(),
                    start,
                    end,
                    len,
                })),
            }
        }

        for skipped in &report.skipped {
            warn!(path, id = %skipped.edit.id, reason = %skipped.reason, "pending edit skipped by accept-all");
        }
        buffer.release_baseline();
        report.delta.before_char_count = before_char_count;
        report.delta.after_char_count = buffer.char_count();
        debug!(path, applied = report.applied.len(), skipped = report.skipped.len(), "accepted all pending edits");
        report
    }

    /// Try to re-locate stale edits by their original snippet.
    ///
    /// A stale edit is recovered when its snippet occurs in the buffer and the occurrence nearest
    /// its old start is not already taken by another edit. Returns the number recovered.
    pub fn reresolve_stale(&mut self, path: &str, buffer: &DocumentBuffer) -> usize {
        let Some(edits) = self.files.get_mut(path) else {
            return 0;
        };
        if !edits.iter().any(|e| e.stale) {
            return 0;
        }

        let text = buffer.text();
        let mut recovered = 0;
        for idx in 0..edits.len() {
            if !edits[idx].stale || edits[idx].original_snippet.is_empty() {
                continue;
            }
            let old_start = edits[idx].range_start;
            let Some(found) = find_all_literal(&text, &edits[idx].original_snippet)
                .into_iter()
                .min_by_key(|m| m.start.abs_diff(old_start))
            else {
                continue;
            };
            let taken = edits
                .iter()
                .enumerate()
                .any(|(other, e)| other != idx && e.range_start == found.start);
            if taken {
                continue;
            }
            let edit = &mut edits[idx];
            edit.range_start = found.start;
            edit.range_end = found.end;
            edit.stale = false;
            recovered += 1;
            debug!(path, id = %edit.id, start = found.start, "stale edit re-anchored");
        }

        if recovered > 0 {
            edits.sort_by_key(|e| e.range_start);
        }
        recovered
    }

    /// Decorations for every pending edit of `path`, in range order.
    pub fn decorations(&self, path: &str) -> Vec<EditDecoration> {
        self.edits_for(path).iter().map(EditDecoration::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn edit(id: &str, start: usize, end: usize, snippet: &str, new_text: &str) -> PendingEdit {
        PendingEdit {
            id: EditId::from(id),
            file_path: String::new(),
            range_start: start,
            range_end: end,
            original_snippet: snippet.to_string(),
            new_text: new_text.to_string(),
            source: SourceMetadata {
                origin: EditOrigin::AgentStream,
                correlation_id: "t".to_string(),
                paragraph_id: None,
            },
            stale: false,
        }
    }

    #[test]
    fn test_add_is_idempotent_on_range_start() {
        let mut overlay = PendingEditOverlay::default();
        assert!(overlay.add("a", edit("t-1", 4, 6, "xx", "y")));
        assert!(!overlay.add("a", edit("t-2", 4, 9, "xxxxx", "z")));
        assert!(overlay.add("a", edit("t-3", 0, 1, "x", "y")));
        let ids: Vec<_> = overlay.edits_for("a").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["t-3", "t-1"]);
    }

    #[test]
    fn test_overlapping_sibling_is_flagged_then_reanchored() {
        let mut buffer = DocumentBuffer::new("a", "alpha beta gamma");
        let mut overlay = PendingEditOverlay::default();
        overlay.add("a", edit("t-1", 0, 10, "alpha beta", "A"));
        overlay.add("a", edit("t-2", 6, 10, "beta", "B"));

        let accepted = overlay.accept_one("a", &EditId::from("t-1"), &mut buffer).unwrap();
        assert_eq!(accepted.newly_stale, vec![EditId::from("t-2")]);
        assert!(overlay.edits_for("a")[0].stale);
        assert!(matches!(
            overlay.accept_one("a", &EditId::from("t-2"), &mut buffer),
            Err(ReconcileError::StaleEdit { .. })
        ));

        // "beta" is gone from the buffer, so the edit cannot be recovered.
        assert_eq!(overlay.reresolve_stale("a", &buffer), 0);
    }

    #[test]
    fn test_reresolve_finds_moved_snippet() {
        let buffer = DocumentBuffer::new("a", "xx beta yy");
        let mut overlay = PendingEditOverlay::default();
        let mut stale = edit("t-1", 0, 4, "beta", "B");
        stale.stale = true;
        overlay.add("a", stale);
        assert_eq!(overlay.reresolve_stale("a", &buffer), 1);
        let e = &overlay.edits_for("a")[0];
        assert_eq!((e.range_start, e.range_end, e.stale), (3, 7, false));
    }

    #[test]
    fn test_out_of_bounds_stays_pending() {
        let mut buffer = DocumentBuffer::new("a", "short");
        let mut overlay = PendingEditOverlay::default();
        overlay.add("a", edit("t-1", 3, 40, "", "x"));
        let err = overlay.accept_one("a", &EditId::from("t-1"), &mut buffer).unwrap_err();
        assert_eq!(err.to_string(), "edit t-1 range 3..40 exceeds the buffer (5 chars)");
        assert_eq!(overlay.pending_count("a"), 1);
        assert_eq!(buffer.text(), "short");
    }
}
