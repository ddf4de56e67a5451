#![warn(missing_docs)]
//! Patchwork Core - Headless Patch Reconciliation Kernel
//!
//! # Overview
//!
//! `patchwork-core` takes partially specified edit instructions (streamed from an agent or read
//! from a version-control diff), resolves each one to a precise character range in the *current*
//! document buffer, and holds them as reviewable pending edits that can be accepted or rejected
//! one at a time or all together without corrupting the buffer.
//!
//! It does no I/O of its own: file and version-control access go through the
//! [`FileStorage`] trait, and rendering is left to the host via [`EditDecoration`]s.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  EditSession (open files, accept/reject)    │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Pending Edit Overlay + Decorations         │  ← Review State
//! ├─────────────────────────────────────────────┤
//! │  Anchor Resolver (strategy chain)           │  ← Range Location
//! ├─────────────────────────────────────────────┤
//! │  Instruction Parser / Diff Hunk Extractor   │  ← Wire Formats
//! ├─────────────────────────────────────────────┤
//! │  Line Index (Rope-based coordinates)        │  ← Coordinates
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use patchwork_core::{EditSession, LegacyFields, MemoryStorage, ReconcileConfig};
//!
//! let storage = MemoryStorage::new().with_file("notes.md", "line1\nline2\nline3\n");
//! let mut session = EditSession::new(storage, ReconcileConfig::default());
//!
//! let legacy = LegacyFields {
//!     old_str: Some("line2\n".to_string()),
//!     new_str: Some("lineX\n".to_string()),
//!     ..Default::default()
//! };
//! let id = session
//!     .ingest_str_replace("notes.md", "task-1", None, &legacy)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(id.as_str(), "task-1-1");
//!
//! let outcome = session.accept("notes.md", &id).unwrap();
//! assert!(outcome.warnings.is_empty());
//! assert_eq!(session.storage().file("notes.md"), Some("line1\nlineX\nline3\n"));
//! ```
//!
//! # Module Description
//!
//! - [`line_index`] - rope-based line/offset/byte/UTF-16 coordinate translation
//! - [`instruction`] - canonical edit instruction and wire-shape normalization
//! - [`tag_parser`] - recursive-descent parser for inline tag blocks
//! - [`diff`] - unified diff parsing and block classification
//! - [`resolver`] - anchor resolution strategy chain
//! - [`overlay`] - pending edits, accept/reject, sibling re-anchoring
//! - [`session`] - open files, ingestion, persistence
//! - [`storage`] - storage and version-control collaborator traits
//! - [`config`] - serde-loadable settings
//!
//! # Logging
//!
//! Diagnostics go through `tracing`. The library installs no subscriber.

pub mod buffer;
pub mod config;
pub mod decorations;
pub mod delta;
pub mod diff;
pub mod error;
pub mod escape;
pub mod instruction;
pub mod line_ending;
pub mod line_index;
pub mod overlay;
pub mod resolver;
pub mod search;
pub mod session;
pub mod storage;
pub mod tag_parser;

pub use buffer::DocumentBuffer;
pub use config::{ConfigError, OverlayOptions, PersistenceOptions, ReconcileConfig, ResolveOptions};
pub use decorations::{DecorationKind, EditDecoration};
pub use delta::{TextDelta, TextDeltaEdit};
pub use diff::{
    BlockKind, DiffHunk, DiffParseError, FilePatch, HunkBlock, extract_hunks, parse_patch,
};
pub use error::{PersistenceWarning, ReconcileError};
pub use instruction::{
    CommandKind, EditInstruction, LegacyFields, ParseIssue, WireInstruction, normalize,
    normalize_message,
};
pub use line_ending::LineEnding;
pub use line_index::{CoordinateError, LineIndex, Position};
pub use overlay::{
    AcceptAllReport, AcceptedEdit, EditId, EditOrigin, PendingEdit, PendingEditOverlay,
    SkippedEdit, SourceMetadata,
};
pub use resolver::{AnchorResolver, ResolveStrategy, ResolvedRange, Unresolved};
pub use search::{SearchError, SearchMatch};
pub use session::{
    AcceptAllOutcome, AcceptOutcome, DiffIngestReport, EditSession, RejectAllOutcome,
};
pub use storage::{
    FileStorage, MemoryStorage, StatusSnapshot, StorageError, StorageOperation,
    VersionControlStatus,
};
pub use tag_parser::{TagBlock, parse_tag_block};
