//! Typed decoding of streaming-channel messages.
//!
//! The channel delivers JSON objects tagged by `type`. Two shapes matter here:
//!
//! ```text
//! { "type": "str_replace", "task_id": "t-1", "path": "/w/a.md",
//!   "xml_content": "<paragraph ...>...</paragraph>",          // optional tag block
//!   "old_str": "...", "new_str": "...", "start": 3, "end": 4,  // optional legacy fields
//!   "insert_line": 0 }
//! { "type": "diff", "file_path": "/w/a.md", "request_id": "r-1",
//!   "changes": [ "@@ -1 +1 @@\n-a\n+b\n", { "diff": "..." } ] }
//! ```
//!
//! Everything else decodes to [`StreamMessage::Other`].

use patchwork_core::LegacyFields;
use patchwork_core::escape::decode_quoted_path;
use serde_json::Value;
use thiserror::Error;

/// Why a message could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The object has no string `type`.
    #[error("message has no string `type` field")]
    MissingType,
    /// A required field is absent.
    #[error("`{kind}` message is missing `{field}`")]
    MissingField {
        /// Message type.
        kind: &'static str,
        /// Field name.
        field: &'static str,
    },
    /// A field holds a value of the wrong shape.
    #[error("`{kind}` message has an invalid `{field}`")]
    InvalidField {
        /// Message type.
        kind: &'static str,
        /// Field name.
        field: &'static str,
    },
}

/// A `str_replace` message: one edit for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrReplaceMessage {
    /// `task_id`, or `request_id` when no task id is present.
    pub task_id: String,
    /// Target path from `path` or `file_path`, if the message names one.
    pub path: Option<String>,
    /// Text that may contain an inline tag block.
    pub tag_text: Option<String>,
    /// Legacy edit fields, used when there is no tag block.
    pub legacy: LegacyFields,
}

/// A `diff` message: unified-diff changes for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffMessage {
    /// File the diff applies to.
    pub file_path: String,
    /// Diff texts, in message order.
    pub changes: Vec<String>,
    /// Correlation id for the resulting edits.
    pub request_id: Option<String>,
}

/// A decoded channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// A `str_replace` (or `str_replace_editor`) message.
    StrReplace(StrReplaceMessage),
    /// A `diff` message.
    Diff(DiffMessage),
    /// Any other message type; carries the `type` value.
    Other(String),
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn path_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(decode_quoted_path)
}

/// Integers may arrive as JSON numbers or numeric strings. `null` and `""` mean absent.
fn integer_field(
    value: &Value,
    kind: &'static str,
    field: &'static str,
) -> Result<Option<i64>, MessageError> {
    let invalid = MessageError::InvalidField { kind, field };
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or(invalid),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| invalid),
        Some(_) => Err(invalid),
    }
}

impl StrReplaceMessage {
    /// Decode a `str_replace` object. Only the task id is required.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        const KIND: &str = "str_replace";
        let task_id = string_field(value, "task_id")
            .or_else(|| string_field(value, "request_id"))
            .ok_or(MessageError::MissingField {
                kind: KIND,
                field: "task_id",
            })?;
        let legacy = LegacyFields {
            path: path_field(value, "path").or_else(|| path_field(value, "file_path")),
            old_str: string_field(value, "old_str"),
            new_str: string_field(value, "new_str"),
            insert_line: integer_field(value, KIND, "insert_line")?,
            start: integer_field(value, KIND, "start")?,
            end: integer_field(value, KIND, "end")?,
        };
        Ok(Self {
            task_id,
            path: legacy.path.clone(),
            tag_text: string_field(value, "xml_content").filter(|s| !s.is_empty()),
            legacy,
        })
    }
}

impl DiffMessage {
    /// Decode a `diff` object. Change entries that are neither strings nor objects with a
    /// `diff` or `patch` string are ignored.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        const KIND: &str = "diff";
        let file_path = path_field(value, "file_path").ok_or(MessageError::MissingField {
            kind: KIND,
            field: "file_path",
        })?;
        let changes = value
            .get("changes")
            .and_then(Value::as_array)
            .ok_or(MessageError::MissingField {
                kind: KIND,
                field: "changes",
            })?
            .iter()
            .filter_map(|change| match change {
                Value::String(s) => Some(s.clone()),
                other => string_field(other, "diff").or_else(|| string_field(other, "patch")),
            })
            .collect();
        Ok(Self {
            file_path,
            changes,
            request_id: string_field(value, "request_id").filter(|s| !s.is_empty()),
        })
    }
}

impl StreamMessage {
    /// Decode any channel message by its `type`.
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingType)?;
        match kind {
            "str_replace" | "str_replace_editor" => {
                StrReplaceMessage::from_value(value).map(Self::StrReplace)
            }
            "diff" => DiffMessage::from_value(value).map(Self::Diff),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}
