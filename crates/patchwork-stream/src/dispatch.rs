//! In-order dispatch of stream messages into an [`EditSession`].

use crate::message::{DiffMessage, MessageError, StrReplaceMessage, StreamMessage};
use patchwork_core::{DiffIngestReport, EditId, EditSession, FileStorage, ReconcileError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures that stop a message from being handled.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message could not be decoded.
    #[error(transparent)]
    Message(#[from] MessageError),
    /// A `str_replace` message named no path and no file is active.
    #[error("message for task {task_id} names no target file")]
    NoTargetPath {
        /// Task id of the message.
        task_id: String,
    },
    /// Opening the target file or another storage call failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// What a handled message produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A pending edit was created.
    EditAdded {
        /// Target file.
        path: String,
        /// The new edit.
        id: EditId,
    },
    /// The edit resolved to a range that is already pending.
    Duplicate {
        /// Target file.
        path: String,
    },
    /// The instruction was malformed or could not be located and has been dropped.
    Dropped {
        /// Target file.
        path: String,
        /// Why it was dropped.
        reason: ReconcileError,
    },
    /// Every change of a diff message was ingested.
    DiffIngested {
        /// Target file.
        path: String,
        /// One report per change, in message order.
        reports: Vec<DiffIngestReport>,
    },
    /// A message type this dispatcher does not handle.
    Ignored {
        /// The message `type`.
        kind: String,
    },
}

/// Feeds decoded messages, strictly in arrival order, into one [`EditSession`].
#[derive(Debug)]
pub struct StreamDispatcher<S: FileStorage> {
    session: EditSession<S>,
    active_path: Option<String>,
}

impl<S: FileStorage> StreamDispatcher<S> {
    /// Dispatch into `session`, with no active file.
    pub fn new(session: EditSession<S>) -> Self {
        Self {
            session,
            active_path: None,
        }
    }

    /// The session messages are fed into.
    pub fn session(&self) -> &EditSession<S> {
        &self.session
    }

    /// Mutable access to the session, e.g. to accept or reject edits.
    pub fn session_mut(&mut self) -> &mut EditSession<S> {
        &mut self.session
    }

    /// Consume the dispatcher and return its session.
    pub fn into_session(self) -> EditSession<S> {
        self.session
    }

    /// The file `str_replace` messages without a path apply to (usually the focused tab).
    pub fn set_active_path(&mut self, path: Option<String>) {
        self.active_path = path;
    }

    /// The current fallback target file.
    pub fn active_path(&self) -> Option<&str> {
        self.active_path.as_deref()
    }

    /// Decode and handle one raw message.
    pub fn handle(&mut self, value: &Value) -> Result<DispatchOutcome, DispatchError> {
        let message = StreamMessage::from_value(value)?;
        self.handle_message(message)
    }

    /// Handle a decoded message.
    ///
    /// Parse and anchor failures are returned as [`DispatchOutcome::Dropped`]; only storage
    /// failures and undecodable messages are errors.
    pub fn handle_message(&mut self, message: StreamMessage) -> Result<DispatchOutcome, DispatchError> {
        match message {
            StreamMessage::StrReplace(msg) => self.handle_str_replace(msg),
            StreamMessage::Diff(msg) => self.handle_diff(msg),
            StreamMessage::Other(kind) => {
                debug!(kind = %kind, "stream message ignored");
                Ok(DispatchOutcome::Ignored { kind })
            }
        }
    }

    fn handle_str_replace(&mut self, msg: StrReplaceMessage) -> Result<DispatchOutcome, DispatchError> {
        let tagged_path = msg
            .tag_text
            .as_deref()
            .and_then(|text| patchwork_core::parse_tag_block(text).ok().flatten())
            .and_then(|block| block.path);
        let Some(path) = tagged_path
            .or(msg.path.clone())
            .or_else(|| self.active_path.clone())
        else {
            return Err(DispatchError::NoTargetPath {
                task_id: msg.task_id,
            });
        };

        match self
            .session
            .ingest_str_replace(&path, &msg.task_id, msg.tag_text.as_deref(), &msg.legacy)
        {
            Ok(Some(id)) => Ok(DispatchOutcome::EditAdded { path, id }),
            Ok(None) => Ok(DispatchOutcome::Duplicate { path }),
            Err(
                reason @ (ReconcileError::ParseFailure(_) | ReconcileError::UnresolvedAnchor { .. }),
            ) => Ok(DispatchOutcome::Dropped { path, reason }),
            Err(err) => Err(err.into()),
        }
    }

    fn handle_diff(&mut self, msg: DiffMessage) -> Result<DispatchOutcome, DispatchError> {
        let mut reports = Vec::with_capacity(msg.changes.len());
        for change in &msg.changes {
            match self
                .session
                .ingest_diff(&msg.file_path, change, msg.request_id.as_deref())
            {
                Ok(report) => reports.push(report),
                Err(ReconcileError::DiffParse(err)) => {
                    warn!(path = %msg.file_path, error = %err, "diff change skipped");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(DispatchOutcome::DiffIngested {
            path: msg.file_path,
            reports,
        })
    }
}
