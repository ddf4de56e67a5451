#![warn(missing_docs)]
//! `patchwork-stream` - streaming-channel integration for `patchwork-core`.
//!
//! Decodes `serde_json::Value` messages from an agent stream (`str_replace` edits and `diff`
//! notifications) and feeds them, in arrival order, into a [`patchwork_core::EditSession`].

pub mod dispatch;
pub mod message;

pub use dispatch::{DispatchError, DispatchOutcome, StreamDispatcher};
pub use message::{DiffMessage, MessageError, StrReplaceMessage, StreamMessage};
