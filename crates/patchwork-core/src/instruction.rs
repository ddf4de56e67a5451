//! Canonical edit instructions.
//!
//! Agents emit edits in three wire shapes: inline tag blocks, legacy `old_str`/`new_str` field
//! sets, and unified-diff blocks. All of them normalize into [`EditInstruction`] before anchor
//! resolution. Normalization never fails: a malformed input yields an anchorless instruction
//! carrying a [`ParseIssue`], which resolution then reports as unresolved.

use crate::diff::HunkBlock;
use crate::line_index::LineIndex;
use crate::tag_parser::{TagBlock, parse_tag_block};
use thiserror::Error;

/// The operation an instruction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Replace the anchored range with new text.
    Replace,
    /// Insert new text at a position; the anchored range is empty.
    Insert,
    /// Remove the anchored range.
    Delete,
}

impl CommandKind {
    /// Parse a command keyword. `str_replace` is accepted as an alias of `replace`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" | "str_replace" => Some(Self::Replace),
            "insert" => Some(Self::Insert),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Canonical keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Insert => "insert",
            Self::Delete => "delete",
        }
    }
}

/// Why an instruction could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIssue {
    /// A tag opened but never closed.
    #[error("unterminated <{0}> tag")]
    UnterminatedTag(String),
    /// An attribute value is missing its closing quote.
    #[error("unterminated attribute in <{0}> tag")]
    UnterminatedAttribute(String),
    /// The text holds no tag block.
    #[error("no tag block found")]
    MissingTagBlock,
    /// A numeric tag or field does not hold a non-negative integer.
    #[error("<{tag}> is not a valid number: {value:?}")]
    InvalidNumber {
        /// Tag or field name.
        tag: String,
        /// Raw value.
        value: String,
    },
    /// The command keyword is not recognized.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    /// A diff block's line numbers fall outside its baseline.
    #[error("diff block at line {line} does not fit the baseline: {detail}")]
    BlockOutsideBaseline {
        /// First baseline line of the block.
        line: usize,
        /// Coordinate error text.
        detail: String,
    },
}

/// A wire-format-independent edit request.
///
/// Character offsets are 0-based and half-open; line numbers are 1-based. Any subset of the
/// anchors may be present; [`crate::resolver::AnchorResolver`] decides which one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditInstruction {
    /// Operation to perform.
    pub command: CommandKind,
    /// Literal text expected at the target.
    pub match_text: Option<String>,
    /// Start character offset.
    pub char_start: Option<usize>,
    /// End character offset; absent means the end of the document.
    pub char_end: Option<usize>,
    /// First line of the target, or the line to insert after.
    pub line_start: Option<usize>,
    /// Last line (inclusive) of the target.
    pub line_end: Option<usize>,
    /// Replacement text; empty for deletions.
    pub new_text: String,
    /// Target path carried by the wire shape, if any.
    pub path: Option<String>,
    /// Agent-side identifier carried by tag blocks.
    pub paragraph_id: Option<String>,
    /// Set when normalization failed; the instruction is then anchorless.
    pub issue: Option<ParseIssue>,
}

impl EditInstruction {
    /// An anchorless instruction; deletions always carry empty text.
    pub fn new(command: CommandKind, new_text: impl Into<String>) -> Self {
        let new_text = if command == CommandKind::Delete {
            String::new()
        } else {
            new_text.into()
        };
        Self {
            command,
            match_text: None,
            char_start: None,
            char_end: None,
            line_start: None,
            line_end: None,
            new_text,
            path: None,
            paragraph_id: None,
            issue: None,
        }
    }

    /// Build an anchorless instruction for input that failed to parse.
    pub fn malformed(issue: ParseIssue) -> Self {
        let mut instruction = Self::new(CommandKind::Replace, String::new());
        instruction.issue = Some(issue);
        instruction
    }

    /// Returns `true` if at least one anchor is present.
    pub fn has_anchor(&self) -> bool {
        self.match_text.as_deref().is_some_and(|m| !m.is_empty())
            || self.char_start.is_some()
            || self.line_start.is_some()
    }

    /// Returns `true` if normalization failed.
    pub fn is_malformed(&self) -> bool {
        self.issue.is_some()
    }

    /// Record `issue` and drop every anchor so the instruction cannot resolve.
    pub(crate) fn mark_malformed(&mut self, issue: ParseIssue) {
        self.match_text = None;
        self.char_start = None;
        self.char_end = None;
        self.line_start = None;
        self.line_end = None;
        self.issue = Some(issue);
    }

    /// Normalize a parsed tag block.
    ///
    /// For `insert`, `<start>`/`<end>` are 1-based line numbers (insert after `start`, `0`
    /// meaning the top of the document). For `replace`/`delete` they are character offsets.
    pub fn from_tag_block(block: TagBlock) -> Self {
        let command = match block.command.as_deref().map(str::trim) {
            None | Some("") => Ok(CommandKind::Replace),
            Some(raw) => CommandKind::parse(raw).ok_or_else(|| ParseIssue::UnknownCommand(raw.to_string())),
        };
        let start = parse_number("start", block.start.as_deref());
        let end = parse_number("end", block.end.as_deref());

        let mut instruction = Self::new(
            *command.as_ref().unwrap_or(&CommandKind::Replace),
            block.new_content.unwrap_or_default(),
        );
        instruction.path = block.path;
        instruction.paragraph_id = block.id;

        let (command, start, end) = match (command, start, end) {
            (Ok(c), Ok(s), Ok(e)) => (c, s, e),
            (Err(issue), _, _) | (_, Err(issue), _) | (_, _, Err(issue)) => {
                instruction.mark_malformed(issue);
                return instruction;
            }
        };

        instruction.match_text = block.content.filter(|c| !c.is_empty());
        if command == CommandKind::Insert {
            instruction.line_start = start;
            instruction.line_end = end;
        } else {
            instruction.char_start = start;
            instruction.char_end = end;
        }
        instruction
    }

    /// Normalize a legacy field set.
    pub fn from_legacy(fields: &LegacyFields) -> Self {
        let new_text = fields.new_str.clone().unwrap_or_default();

        let mut instruction = match fields.insert_line {
            Some(_) => Self::new(CommandKind::Insert, new_text),
            None => {
                let removes = fields.old_str.as_deref().is_some_and(|s| !s.is_empty());
                if removes && new_text.is_empty() {
                    Self::new(CommandKind::Delete, new_text)
                } else {
                    Self::new(CommandKind::Replace, new_text)
                }
            }
        };
        instruction.path = fields.path.clone();

        let lines = if fields.insert_line.is_some() {
            legacy_line("insert_line", fields.insert_line).map(|start| (start, None))
        } else {
            legacy_line("start", fields.start)
                .and_then(|start| Ok((start, legacy_line("end", fields.end)?)))
        };

        match lines {
            Ok((start, end)) => {
                instruction.line_start = start;
                instruction.line_end = end;
                if fields.insert_line.is_none() {
                    instruction.match_text = fields.old_str.clone().filter(|s| !s.is_empty());
                }
            }
            Err(issue) => instruction.mark_malformed(issue),
        }
        instruction
    }
}

fn parse_number(tag: &str, raw: Option<&str>) -> Result<Option<usize>, ParseIssue> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<usize>().map(Some).map_err(|_| ParseIssue::InvalidNumber {
            tag: tag.to_string(),
            value: value.to_string(),
        }),
    }
}

fn legacy_line(field: &str, value: Option<i64>) -> Result<Option<usize>, ParseIssue> {
    match value {
        None => Ok(None),
        Some(n) => usize::try_from(n).map(Some).map_err(|_| ParseIssue::InvalidNumber {
            tag: field.to_string(),
            value: n.to_string(),
        }),
    }
}

/// Fields of the legacy `str_replace` wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyFields {
    /// Target file.
    pub path: Option<String>,
    /// Text to replace or delete.
    pub old_str: Option<String>,
    /// Replacement or inserted text.
    pub new_str: Option<String>,
    /// Insert after this 1-based line (`0` = top of document).
    pub insert_line: Option<i64>,
    /// 1-based hint line for `old_str`, or the first line of a line-range replace.
    pub start: Option<i64>,
    /// Last line (inclusive) of a line-range replace.
    pub end: Option<i64>,
}

impl LegacyFields {
    /// Returns `true` if no edit field is set.
    pub fn is_empty(&self) -> bool {
        self.old_str.is_none()
            && self.new_str.is_none()
            && self.insert_line.is_none()
            && self.start.is_none()
            && self.end.is_none()
    }
}

/// One edit request as it arrives on the wire.
#[derive(Debug, Clone, Copy)]
pub enum WireInstruction<'a> {
    /// Text containing an inline tag block.
    InlineTag(&'a str),
    /// A legacy `str_replace` field set.
    Legacy(&'a LegacyFields),
    /// One change block of a diff, with the baseline its line numbers refer to.
    DiffBlock {
        /// The block.
        block: &'a HunkBlock,
        /// Text the hunk's line numbers index.
        baseline: &'a LineIndex,
    },
}

/// Normalize any wire shape into a canonical instruction.
pub fn normalize(wire: WireInstruction<'_>) -> EditInstruction {
    match wire {
        WireInstruction::InlineTag(text) => match parse_tag_block(text) {
            Ok(Some(block)) => EditInstruction::from_tag_block(block),
            Ok(None) => EditInstruction::malformed(ParseIssue::MissingTagBlock),
            Err(issue) => EditInstruction::malformed(issue),
        },
        WireInstruction::Legacy(fields) => EditInstruction::from_legacy(fields),
        WireInstruction::DiffBlock { block, baseline } => block.to_instruction(baseline),
    }
}

/// Normalize a message that may carry both a tag block and legacy fields.
///
/// A tag block, when present, is authoritative and the legacy fields are ignored. Text with no
/// tag block falls back to the legacy fields.
pub fn normalize_message(tag_text: Option<&str>, legacy: &LegacyFields) -> EditInstruction {
    let Some(text) = tag_text else {
        return EditInstruction::from_legacy(legacy);
    };
    match parse_tag_block(text) {
        Ok(Some(block)) => {
            let mut instruction = EditInstruction::from_tag_block(block);
            if instruction.path.is_none() {
                instruction.path = legacy.path.clone();
            }
            instruction
        }
        Ok(None) => EditInstruction::from_legacy(legacy),
        Err(issue) => EditInstruction::malformed(issue),
    }
}
