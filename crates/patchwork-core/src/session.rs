//! Editing sessions: open buffers plus their pending edits.
//!
//! An [`EditSession`] owns every open [`DocumentBuffer`], the [`PendingEditOverlay`], and the
//! host's [`FileStorage`]. Instructions and diffs are resolved against the live buffer and
//! stored as pending edits; accept and reject apply or discard them and then persist through
//! storage. Persistence is best-effort: a failed write after an accept is returned as a
//! [`PersistenceWarning`] and the in-memory change is kept.

use crate::buffer::DocumentBuffer;
use crate::config::ReconcileConfig;
use crate::decorations::EditDecoration;
use crate::delta::TextDelta;
use crate::diff::{DiffHunk, extract_hunks, parse_patch};
use crate::error::{PersistenceWarning, ReconcileError};
use crate::instruction::{
    EditInstruction, LegacyFields, WireInstruction, normalize, normalize_message,
};
use crate::line_index::LineIndex;
use crate::overlay::{
    AcceptAllReport, AcceptedEdit, EditId, EditOrigin, PendingEdit, PendingEditOverlay,
    SourceMetadata,
};
use crate::resolver::{AnchorResolver, Unresolved};
use crate::storage::{FileStorage, StorageError, StorageOperation, VersionControlStatus};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Result of accepting one edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// The applied edit and its delta.
    pub accepted: AcceptedEdit,
    /// Storage calls that failed after the buffer changed.
    pub warnings: Vec<PersistenceWarning>,
}

/// Result of accepting every edit for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptAllOutcome {
    /// Applied and skipped edits.
    pub report: AcceptAllReport,
    /// Storage calls that failed after the buffer changed.
    pub warnings: Vec<PersistenceWarning>,
}

/// Result of rejecting every edit for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectAllOutcome {
    /// The dropped edits, in range order.
    pub discarded: Vec<PendingEdit>,
    /// Whether storage was reverted and the buffer reloaded.
    pub reverted: bool,
    /// Storage calls that failed.
    pub warnings: Vec<PersistenceWarning>,
}

/// What happened to the blocks of an ingested diff.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffIngestReport {
    /// Correlation id the block ids were derived from.
    pub correlation_id: String,
    /// Ids of the edits created, in block order.
    pub added: Vec<EditId>,
    /// Blocks whose range was already pending.
    pub duplicates: usize,
    /// Blocks that could not be placed.
    pub unresolved: Vec<ReconcileError>,
}

/// Open buffers, pending edits, and storage for one editing session.
pub struct EditSession<S: FileStorage> {
    storage: S,
    config: ReconcileConfig,
    resolver: AnchorResolver,
    /// Diff blocks carry exact baseline positions, so they always prefer the nearest occurrence.
    diff_resolver: AnchorResolver,
    buffers: BTreeMap<String, DocumentBuffer>,
    overlay: PendingEditOverlay,
    sequences: HashMap<String, u64>,
    next_diff_request: u64,
}

impl<S: FileStorage> std::fmt::Debug for EditSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("open_files", &self.buffers.len())
            .field("pending_files", &self.overlay.paths().count())
            .field("config", &self.config)
            .finish()
    }
}

impl<S: FileStorage> EditSession<S> {
    /// Create a session with no open files.
    pub fn new(storage: S, config: ReconcileConfig) -> Self {
        let mut diff_options = config.resolve.clone();
        diff_options.nearest_occurrence = true;
        Self {
            storage,
            resolver: AnchorResolver::new(config.resolve.clone()),
            diff_resolver: AnchorResolver::new(diff_options),
            overlay: PendingEditOverlay::new(config.overlay.clone()),
            config,
            buffers: BTreeMap::new(),
            sequences: HashMap::new(),
            next_diff_request: 0,
        }
    }

    /// Settings the session was created with.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// The storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable access to the storage collaborator.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Pending edits of every file.
    pub fn overlay(&self) -> &PendingEditOverlay {
        &self.overlay
    }

    /// The open buffer for `path`.
    pub fn buffer(&self, path: &str) -> Option<&DocumentBuffer> {
        self.buffers.get(path)
    }

    /// Returns `true` if `path` has an open buffer.
    pub fn is_open(&self, path: &str) -> bool {
        self.buffers.contains_key(path)
    }

    /// Paths of every open buffer, sorted.
    pub fn open_paths(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Pending edits for `path`, ordered by range start.
    pub fn pending_edits(&self, path: &str) -> &[PendingEdit] {
        self.overlay.edits_for(path)
    }

    /// Open `path` from storage. Opening an already open file returns the existing buffer.
    pub fn open_file(&mut self, path: &str) -> Result<&DocumentBuffer, ReconcileError> {
        if !self.buffers.contains_key(path) {
            let text = self.storage.read(path)?;
            debug!(path, chars = text.chars().count(), "file opened");
            self.buffers
                .insert(path.to_string(), DocumentBuffer::new(path, &text));
        }
        self.buffer(path)
            .ok_or_else(|| ReconcileError::FileNotOpen(path.to_string()))
    }

    /// Open `path` with host-provided text (e.g. an unsaved editor tab).
    pub fn open_file_with_text(&mut self, path: &str, text: &str) -> &DocumentBuffer {
        self.buffers
            .entry(path.to_string())
            .or_insert_with(|| DocumentBuffer::new(path, text))
    }

    /// Close `path`, discarding its pending edits without touching storage.
    pub fn close_file(&mut self, path: &str) -> Result<Vec<PendingEdit>, ReconcileError> {
        if self.buffers.remove(path).is_none() {
            return Err(ReconcileError::FileNotOpen(path.to_string()));
        }
        let discarded = self.overlay.clear_all(path);
        debug!(path, discarded = discarded.len(), "file closed");
        Ok(discarded)
    }

    /// Apply a direct user edit. Pending edits are not shifted.
    pub fn user_edit(
        &mut self,
        path: &str,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<TextDelta, ReconcileError> {
        let buffer = self.buffer_mut(path)?;
        let before_char_count = buffer.char_count();
        let splice = buffer
            .splice(start, end, text)
            .map_err(|_| ReconcileError::OutOfBounds {
                id: EditId::from("user"),
                start,
                end,
                len: before_char_count,
            })?;
        Ok(TextDelta {
            before_char_count,
            after_char_count: buffer.char_count(),
            edits: vec![splice],
        })
    }

    fn buffer_mut(&mut self, path: &str) -> Result<&mut DocumentBuffer, ReconcileError> {
        self.buffers
            .get_mut(path)
            .ok_or_else(|| ReconcileError::FileNotOpen(path.to_string()))
    }

    fn next_id(&mut self, correlation: &str) -> EditId {
        let seq = self.sequences.entry(correlation.to_string()).or_insert(0);
        *seq += 1;
        EditId::new(correlation, *seq)
    }

    fn ensure_open(&mut self, path: &str) -> Result<(), ReconcileError> {
        if !self.buffers.contains_key(path) {
            self.open_file(path)?;
        }
        Ok(())
    }

    /// Resolve `instruction` against the live buffer of `path` and store it as a pending edit.
    ///
    /// The file is opened from storage if needed. Returns `Ok(None)` when an edit with the same
    /// range start is already pending.
    pub fn apply_instruction(
        &mut self,
        path: &str,
        correlation: &str,
        instruction: &EditInstruction,
    ) -> Result<Option<EditId>, ReconcileError> {
        self.add_resolved(path, correlation, instruction, EditOrigin::AgentStream)
    }

    fn add_resolved(
        &mut self,
        path: &str,
        correlation: &str,
        instruction: &EditInstruction,
        origin: EditOrigin,
    ) -> Result<Option<EditId>, ReconcileError> {
        if let Some(issue) = &instruction.issue {
            warn!(path, correlation, reason = %issue, "malformed instruction dropped");
            return Err(ReconcileError::ParseFailure(issue.clone()));
        }
        self.ensure_open(path)?;

        let resolver = match origin {
            EditOrigin::AgentStream => &self.resolver,
            EditOrigin::Diff => &self.diff_resolver,
        };
        let buffer = self
            .buffers
            .get(path)
            .ok_or_else(|| ReconcileError::FileNotOpen(path.to_string()))?;
        let resolved = match resolver.resolve(instruction, buffer.content()) {
            Ok(resolved) => resolved,
            Err(reason) => {
                warn!(path, correlation, reason = reason.reason_code(), "could not locate target content");
                return Err(ReconcileError::UnresolvedAnchor {
                    path: path.to_string(),
                    reason,
                });
            }
        };
        let original_snippet = buffer.slice(resolved.start, resolved.end).map_err(|_| {
            ReconcileError::UnresolvedAnchor {
                path: path.to_string(),
                reason: Unresolved::OutOfBounds {
                    start: resolved.start,
                    end: resolved.end,
                    len: buffer.char_count(),
                },
            }
        })?;
        let new_text = resolved.replacement_text(instruction, buffer.content());

        let id = self.next_id(correlation);
        let edit = PendingEdit {
            id: id.clone(),
            file_path: path.to_string(),
            range_start: resolved.start,
            range_end: resolved.end,
            original_snippet,
            new_text,
            source: SourceMetadata {
                origin,
                correlation_id: correlation.to_string(),
                paragraph_id: instruction.paragraph_id.clone(),
            },
            stale: false,
        };

        if !self.overlay.add(path, edit) {
            return Ok(None);
        }
        if let Some(buffer) = self.buffers.get_mut(path) {
            buffer.ensure_baseline();
        }
        debug!(path, id = %id, start = resolved.start, end = resolved.end, strategy = ?resolved.strategy, "pending edit added");
        Ok(Some(id))
    }

    /// Normalize and apply a `str_replace` message.
    ///
    /// `tag_text` (an inline tag block) wins over `legacy` when it contains a block.
    pub fn ingest_str_replace(
        &mut self,
        path: &str,
        correlation: &str,
        tag_text: Option<&str>,
        legacy: &LegacyFields,
    ) -> Result<Option<EditId>, ReconcileError> {
        let instruction = normalize_message(tag_text, legacy);
        self.apply_instruction(path, correlation, &instruction)
    }

    /// Baseline for diff ingestion: held baseline, else the configured revision, else the live
    /// text.
    fn diff_baseline(&mut self, path: &str) -> Result<LineIndex, ReconcileError> {
        self.ensure_open(path)?;
        let revision = self.config.persistence.baseline_revision.clone();
        let held = self.buffers.get(path).and_then(|b| b.baseline().map(str::to_string));
        let fetched = match held {
            Some(text) => return Ok(LineIndex::from_text(&text)),
            None => self.storage.show_at_revision(path, &revision),
        };

        let buffer = self.buffer_mut(path)?;
        match fetched {
            Ok(text) => buffer.set_baseline(&text),
            Err(err) => {
                warn!(path, revision = %revision, error = %err, "baseline fetch failed; using live text");
                buffer.ensure_baseline();
            }
        }
        let baseline = buffer.baseline().unwrap_or_default();
        Ok(LineIndex::from_text(baseline))
    }

    /// Turn every change block of a single-file diff into pending edits for `path`.
    ///
    /// Without a `request_id`, a `diff-N` correlation id is generated. Per-block failures are
    /// collected in the report; only a syntax error in the diff itself fails the call.
    pub fn ingest_diff(
        &mut self,
        path: &str,
        diff_text: &str,
        request_id: Option<&str>,
    ) -> Result<DiffIngestReport, ReconcileError> {
        let hunks = extract_hunks(diff_text)?;
        self.ingest_hunks(path, &hunks, request_id)
    }

    /// Ingest a multi-file patch, routing each file section to its path.
    pub fn ingest_patch(
        &mut self,
        patch_text: &str,
        request_id: Option<&str>,
    ) -> Result<Vec<(String, DiffIngestReport)>, ReconcileError> {
        let patches = parse_patch(patch_text)?;
        let correlation = self.diff_correlation(request_id);
        let mut reports = Vec::new();
        for patch in patches {
            let Some(path) = patch.path().map(str::to_string) else {
                continue;
            };
            match self.ingest_hunks(&path, &patch.hunks, Some(&correlation)) {
                Ok(report) => reports.push((path, report)),
                Err(err) => {
                    warn!(path = %path, error = %err, "patch section skipped");
                    reports.push((
                        path,
                        DiffIngestReport {
                            correlation_id: correlation.clone(),
                            unresolved: vec![err],
                            ..Default::default()
                        },
                    ));
                }
            }
        }
        Ok(reports)
    }

    fn diff_correlation(&mut self, request_id: Option<&str>) -> String {
        match request_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                self.next_diff_request += 1;
                format!("diff-{}", self.next_diff_request)
            }
        }
    }

    fn ingest_hunks(
        &mut self,
        path: &str,
        hunks: &[DiffHunk],
        request_id: Option<&str>,
    ) -> Result<DiffIngestReport, ReconcileError> {
        let correlation = self.diff_correlation(request_id);
        let baseline = self.diff_baseline(path)?;
        let mut report = DiffIngestReport {
            correlation_id: correlation.clone(),
            ..Default::default()
        };

        for block in hunks.iter().flat_map(DiffHunk::blocks) {
            let instruction = normalize(WireInstruction::DiffBlock {
                block: &block,
                baseline: &baseline,
            });
            match self.add_resolved(path, &correlation, &instruction, EditOrigin::Diff) {
                Ok(Some(id)) => report.added.push(id),
                Ok(None) => report.duplicates += 1,
                Err(err) => report.unresolved.push(err),
            }
        }

        // A diff that produced nothing must not pin a baseline.
        if self.overlay.pending_count(path) == 0
            && let Some(buffer) = self.buffers.get_mut(path)
        {
            buffer.release_baseline();
        }
        debug!(path, correlation, added = report.added.len(), duplicates = report.duplicates, unresolved = report.unresolved.len(), "diff ingested");
        Ok(report)
    }

    fn persist(&mut self, path: &str, stage: bool) -> Vec<PersistenceWarning> {
        let mut warnings = Vec::new();
        let mut record = |action: StorageOperation, error: StorageError| {
            warn!(path, %action, %error, "change kept in memory but not persisted");
            warnings.push(PersistenceWarning {
                path: path.to_string(),
                action,
                error,
            });
        };

        if self.config.persistence.write_on_accept
            && let Some(buffer) = self.buffers.get_mut(path)
        {
            match self.storage.write(path, &buffer.persisted_text()) {
                Ok(()) => buffer.mark_clean(),
                Err(err) => record(StorageOperation::Write, err),
            }
        }
        if stage
            && self.config.persistence.stage_diff_edits_on_accept
            && let Err(err) = self.storage.stage_for_commit(path)
        {
            record(StorageOperation::StageForCommit, err);
        }
        warnings
    }

    /// Accept one pending edit: splice it into the buffer, shift its siblings, and persist.
    pub fn accept(&mut self, path: &str, id: &EditId) -> Result<AcceptOutcome, ReconcileError> {
        let buffer = self
            .buffers
            .get_mut(path)
            .ok_or_else(|| ReconcileError::FileNotOpen(path.to_string()))?;
        let accepted = self.overlay.accept_one(path, id, buffer)?;
        let stage = accepted.edit.source.origin == EditOrigin::Diff;
        let warnings = self.persist(path, stage);
        Ok(AcceptOutcome { accepted, warnings })
    }

    /// Discard one pending edit.
    pub fn reject(&mut self, path: &str, id: &EditId) -> Result<PendingEdit, ReconcileError> {
        let edit = self
            .overlay
            .remove(path, id)
            .ok_or_else(|| ReconcileError::EditNotFound {
                path: path.to_string(),
                id: id.clone(),
            })?;
        self.release_baseline_if_settled(path);
        debug!(path, id = %id, "pending edit rejected");
        Ok(edit)
    }

    fn release_baseline_if_settled(&mut self, path: &str) {
        if self.overlay.pending_count(path) == 0
            && let Some(buffer) = self.buffers.get_mut(path)
        {
            buffer.release_baseline();
        }
    }

    /// Accept every pending edit of `path` in range order, then persist once.
    pub fn accept_all(&mut self, path: &str) -> Result<AcceptAllOutcome, ReconcileError> {
        let buffer = self
            .buffers
            .get_mut(path)
            .ok_or_else(|| ReconcileError::FileNotOpen(path.to_string()))?;
        let report = self.overlay.accept_all(path, buffer);
        let warnings = if report.applied.is_empty() {
            Vec::new()
        } else {
            let stage = report
                .applied
                .iter()
                .any(|e| e.source.origin == EditOrigin::Diff);
            self.persist(path, stage)
        };
        Ok(AcceptAllOutcome { report, warnings })
    }

    /// Discard every pending edit of `path`, reverting storage if the configuration asks to.
    pub fn reject_all(&mut self, path: &str) -> Result<RejectAllOutcome, ReconcileError> {
        let revert = self.config.persistence.revert_on_reject_all;
        self.reject_all_with_revert(path, revert)
    }

    /// Discard every pending edit of `path`.
    ///
    /// With `revert`, storage is restored to the baseline revision and the buffer reloaded from
    /// it. Revert failures are returned as warnings; the edits stay discarded.
    pub fn reject_all_with_revert(
        &mut self,
        path: &str,
        revert: bool,
    ) -> Result<RejectAllOutcome, ReconcileError> {
        if !self.buffers.contains_key(path) {
            return Err(ReconcileError::FileNotOpen(path.to_string()));
        }
        let discarded = self.overlay.clear_all(path);
        self.release_baseline_if_settled(path);

        let mut warnings = Vec::new();
        let mut reverted = false;
        if revert {
            let revision = self.config.persistence.baseline_revision.clone();
            let restored = self
                .storage
                .revert_to_revision(path, &revision)
                .map_err(|e| (StorageOperation::RevertToRevision, e))
                .and_then(|()| {
                    self.storage
                        .read(path)
                        .map_err(|e| (StorageOperation::Read, e))
                });
            match restored {
                Ok(text) => {
                    self.buffer_mut(path)?.reload(&text);
                    reverted = true;
                }
                Err((action, error)) => {
                    warn!(path, %action, %error, "revert failed");
                    warnings.push(PersistenceWarning {
                        path: path.to_string(),
                        action,
                        error,
                    });
                }
            }
        }
        debug!(path, discarded = discarded.len(), reverted, "pending edits rejected");
        Ok(RejectAllOutcome {
            discarded,
            reverted,
            warnings,
        })
    }

    /// Render pass: re-anchor stale edits where possible and return the decorations of `path`.
    pub fn render(&mut self, path: &str) -> Result<Vec<EditDecoration>, ReconcileError> {
        let buffer = self
            .buffers
            .get(path)
            .ok_or_else(|| ReconcileError::FileNotOpen(path.to_string()))?;
        self.overlay.reresolve_stale(path, buffer);
        Ok(self.overlay.decorations(path))
    }

    /// Fetch baselines for open files that version control reports as modified and that hold
    /// no baseline yet. Returns the number of baselines fetched.
    pub fn refresh_baselines(
        &mut self,
        status: &impl VersionControlStatus,
    ) -> (usize, Vec<PersistenceWarning>) {
        let revision = self.config.persistence.baseline_revision.clone();
        let mut fetched = 0;
        let mut warnings = Vec::new();
        for (path, buffer) in self.buffers.iter_mut() {
            if buffer.baseline().is_some() || !status.is_modified(path) {
                continue;
            }
            match self.storage.show_at_revision(path, &revision) {
                Ok(text) => {
                    buffer.set_baseline(&text);
                    fetched += 1;
                }
                Err(error) => {
                    warn!(path = path.as_str(), %error, "baseline refresh failed");
                    warnings.push(PersistenceWarning {
                        path: path.clone(),
                        action: StorageOperation::ShowAtRevision,
                        error,
                    });
                }
            }
        }
        (fetched, warnings)
    }
}
