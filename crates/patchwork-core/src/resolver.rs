//! Anchor resolution.
//!
//! [`AnchorResolver`] turns a canonical [`EditInstruction`] into a concrete half-open character
//! range in the current document. Strategies are tried in a fixed order and the first success
//! wins:
//!
//! 1. content match on `match_text`
//! 2. character offsets (`char_start`/`char_end`)
//! 3. line numbers (`line_start`/`line_end`)
//! 4. whitespace-tolerant content match (optional, see [`ResolveOptions`])
//!
//! Resolution is read-only. Failures of individual strategies fall through to the next one; only
//! when all of them fail is an [`Unresolved`] reason reported.

use crate::config::ResolveOptions;
use crate::instruction::{CommandKind, EditInstruction};
use crate::line_index::{CoordinateError, LineIndex};
use crate::search::{SearchMatch, find_all_literal, find_all_whitespace_tolerant};
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, warn};

/// Which strategy produced a [`ResolvedRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// Verbatim match of `match_text`.
    ContentMatch,
    /// Explicit `char_start`/`char_end`.
    CharOffset,
    /// Whole lines from `line_start`/`line_end`.
    LineNumber,
    /// `match_text` matched with whitespace runs collapsed.
    WhitespaceTolerant,
}

/// A resolved target range in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    /// Inclusive start character offset.
    pub start: usize,
    /// Exclusive end character offset.
    pub end: usize,
    /// Strategy that produced the range.
    pub strategy: ResolveStrategy,
}

impl ResolvedRange {
    /// The range as `start..end`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Text to write into this range for `instruction`.
    ///
    /// Line-anchored inserts and replaces operate on whole lines: the new text is terminated
    /// with a newline when the replaced lines were, and an insert after a final line without a
    /// newline starts a new line. Other strategies use `new_text` verbatim.
    pub fn replacement_text(&self, instruction: &EditInstruction, doc: &LineIndex) -> String {
        let text = &instruction.new_text;
        if self.strategy != ResolveStrategy::LineNumber || text.is_empty() {
            return text.clone();
        }

        let char_before = |offset: usize| {
            offset
                .checked_sub(1)
                .and_then(|prev| doc.slice(prev, offset).ok())
        };
        match instruction.command {
            CommandKind::Insert => {
                let after_unterminated_line = self.start == doc.char_count()
                    && char_before(self.start).is_some_and(|prev| prev != "\n");
                if after_unterminated_line {
                    format!("\n{text}")
                } else if text.ends_with('\n') {
                    text.clone()
                } else {
                    format!("{text}\n")
                }
            }
            CommandKind::Replace => {
                let replaced_terminated =
                    self.end > self.start && char_before(self.end).as_deref() == Some("\n");
                if replaced_terminated && !text.ends_with('\n') {
                    format!("{text}\n")
                } else {
                    text.clone()
                }
            }
            CommandKind::Delete => text.clone(),
        }
    }
}

/// Why no strategy produced a range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unresolved {
    /// The instruction carries no usable anchor (including instructions that failed to parse).
    #[error("instruction has no usable anchor")]
    NoAnchor,
    /// Explicit offsets fall outside the document.
    #[error("range {start}..{end} is outside the document ({len} chars)")]
    OutOfBounds {
        /// Requested start offset.
        start: usize,
        /// Requested end offset.
        end: usize,
        /// Document length in characters.
        len: usize,
    },
    /// A line anchor names a line the document does not have.
    #[error("line {line} is outside the document ({line_count} lines)")]
    LineOutOfBounds {
        /// Requested 1-based line.
        line: usize,
        /// Lines in the document.
        line_count: usize,
    },
    /// The computed range ends before it starts.
    #[error("range end {end} precedes start {start}")]
    InvalidRange {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
    },
    /// `match_text` does not occur in the document.
    #[error("match text not found in the document")]
    ContentNotFound,
    /// `match_text` occurs more than once and ambiguity is rejected.
    #[error("match text is ambiguous ({count} candidates)")]
    Ambiguous {
        /// Number of occurrences.
        count: usize,
    },
}

impl Unresolved {
    /// Stable reason code for hosts and logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NoAnchor => "no-anchor",
            Self::OutOfBounds { .. } | Self::LineOutOfBounds { .. } => "out-of-bounds",
            Self::InvalidRange { .. } => "invalid-range",
            Self::ContentNotFound => "content-not-found",
            Self::Ambiguous { .. } => "ambiguous",
        }
    }
}

impl From<CoordinateError> for Unresolved {
    fn from(err: CoordinateError) -> Self {
        match err {
            CoordinateError::OffsetOutOfBounds { offset, len } => Self::OutOfBounds {
                start: offset,
                end: offset,
                len,
            },
            CoordinateError::LineOutOfBounds { line, line_count } => {
                Self::LineOutOfBounds { line, line_count }
            }
            CoordinateError::ColumnOutOfBounds { line, .. } => Self::LineOutOfBounds {
                line,
                line_count: line + 1,
            },
            CoordinateError::InvertedLineRange { start, end } => Self::InvalidRange { start, end },
        }
    }
}

/// Where the instruction expects its target to be, used to rank multiple content matches.
#[derive(Debug, Clone, Copy)]
enum PositionHint {
    Char(usize),
    Line(usize),
}

/// Prioritized strategy chain over a document snapshot.
#[derive(Debug, Clone, Default)]
pub struct AnchorResolver {
    options: ResolveOptions,
}

impl AnchorResolver {
    /// Create a resolver with the given options.
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    /// Options this resolver was built with.
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve against raw text.
    pub fn resolve_in_text(
        &self,
        instruction: &EditInstruction,
        text: &str,
    ) -> Result<ResolvedRange, Unresolved> {
        self.resolve(instruction, &LineIndex::from_text(text))
    }

    /// Resolve `instruction` against `doc`.
    pub fn resolve(
        &self,
        instruction: &EditInstruction,
        doc: &LineIndex,
    ) -> Result<ResolvedRange, Unresolved> {
        if instruction.is_malformed() || !instruction.has_anchor() {
            return Err(Unresolved::NoAnchor);
        }

        let mut failures = Vec::new();
        let needle = instruction.match_text.as_deref().filter(|m| !m.is_empty());
        // Only materialized when a content strategy runs.
        let mut text: Option<String> = None;

        if let Some(needle) = needle {
            let haystack = text.get_or_insert_with(|| doc.get_text());
            match self.content_match(instruction, doc, haystack, needle) {
                Ok(resolved) => return Ok(resolved),
                Err(reason) => failures.push(reason),
            }
        }

        if let Some(start) = instruction.char_start {
            match Self::char_offsets(instruction, doc, start) {
                Ok(resolved) => return Ok(resolved),
                Err(reason) => failures.push(reason),
            }
        }

        if let Some(line) = instruction.line_start {
            match Self::line_numbers(instruction, doc, line) {
                Ok(resolved) => return Ok(resolved),
                Err(reason) => failures.push(reason),
            }
        }

        if let Some(needle) = needle
            && self.options.whitespace_fallback
        {
            let haystack = text.get_or_insert_with(|| doc.get_text());
            match self.whitespace_match(instruction, doc, haystack, needle) {
                Ok(resolved) => return Ok(resolved),
                Err(reason) => failures.push(reason),
            }
        }

        let reason = failures
            .iter()
            .find(|r| **r != Unresolved::ContentNotFound)
            .or_else(|| failures.first())
            .cloned()
            .unwrap_or(Unresolved::NoAnchor);
        debug!(reason = reason.reason_code(), "anchor unresolved");
        Err(reason)
    }

    fn hint(instruction: &EditInstruction) -> Option<PositionHint> {
        instruction
            .char_start
            .map(PositionHint::Char)
            .or(instruction.line_start.map(PositionHint::Line))
    }

    fn content_match(
        &self,
        instruction: &EditInstruction,
        doc: &LineIndex,
        text: &str,
        needle: &str,
    ) -> Result<ResolvedRange, Unresolved> {
        let matches = find_all_literal(text, needle);
        let chosen = match (matches.len(), Self::hint(instruction)) {
            (0, _) => return Err(Unresolved::ContentNotFound),
            (1, _) | (_, None) => matches[0],
            (_, Some(hint)) if self.options.nearest_occurrence => nearest(&matches, hint, doc),
            _ => matches[0],
        };
        Ok(Self::matched_range(instruction, chosen, ResolveStrategy::ContentMatch))
    }

    fn whitespace_match(
        &self,
        instruction: &EditInstruction,
        doc: &LineIndex,
        text: &str,
        needle: &str,
    ) -> Result<ResolvedRange, Unresolved> {
        let significant = needle.chars().filter(|c| !c.is_whitespace()).count();
        if significant < self.options.whitespace_fallback_min_chars.max(1) {
            return Err(Unresolved::ContentNotFound);
        }

        let matches = match find_all_whitespace_tolerant(text, needle) {
            Ok(matches) => matches,
            Err(err) => {
                warn!(error = %err, "whitespace-tolerant pattern rejected");
                return Err(Unresolved::ContentNotFound);
            }
        };
        let chosen = match (matches.len(), Self::hint(instruction)) {
            (0, _) => return Err(Unresolved::ContentNotFound),
            (1, _) => matches[0],
            (_, Some(hint)) if self.options.nearest_occurrence => nearest(&matches, hint, doc),
            (count, _) => return Err(Unresolved::Ambiguous { count }),
        };
        Ok(Self::matched_range(
            instruction,
            chosen,
            ResolveStrategy::WhitespaceTolerant,
        ))
    }

    /// Inserts anchored by content land right after the matched text.
    fn matched_range(
        instruction: &EditInstruction,
        m: SearchMatch,
        strategy: ResolveStrategy,
    ) -> ResolvedRange {
        let start = if instruction.command == CommandKind::Insert {
            m.end
        } else {
            m.start
        };
        ResolvedRange {
            start,
            end: m.end,
            strategy,
        }
    }

    fn char_offsets(
        instruction: &EditInstruction,
        doc: &LineIndex,
        start: usize,
    ) -> Result<ResolvedRange, Unresolved> {
        let len = doc.char_count();
        if start > len {
            return Err(Unresolved::OutOfBounds {
                start,
                end: instruction.char_end.unwrap_or(start),
                len,
            });
        }
        if instruction.command == CommandKind::Insert {
            return Ok(ResolvedRange {
                start,
                end: start,
                strategy: ResolveStrategy::CharOffset,
            });
        }

        let end = instruction.char_end.unwrap_or(len);
        if end < start {
            return Err(Unresolved::InvalidRange { start, end });
        }
        Ok(ResolvedRange {
            start,
            end: end.min(len),
            strategy: ResolveStrategy::CharOffset,
        })
    }

    fn line_numbers(
        instruction: &EditInstruction,
        doc: &LineIndex,
        line: usize,
    ) -> Result<ResolvedRange, Unresolved> {
        let range = if instruction.command == CommandKind::Insert {
            let offset = doc.offset_after_line(line)?;
            offset..offset
        } else {
            let last = instruction.line_end.unwrap_or(line);
            if last < line {
                return Err(Unresolved::InvalidRange {
                    start: line,
                    end: last,
                });
            }
            doc.line_range_to_char_range(line, last)?
        };
        Ok(ResolvedRange {
            start: range.start,
            end: range.end,
            strategy: ResolveStrategy::LineNumber,
        })
    }
}

/// Closest match to `hint`; ties keep the earlier match.
fn nearest(matches: &[SearchMatch], hint: PositionHint, doc: &LineIndex) -> SearchMatch {
    let distance = |m: &SearchMatch| match hint {
        PositionHint::Char(offset) => m.start.abs_diff(offset),
        PositionHint::Line(line) => {
            let match_line = doc
                .offset_to_position(m.start)
                .map(|p| p.line + 1)
                .unwrap_or(usize::MAX);
            match_line.abs_diff(line)
        }
    };
    matches
        .iter()
        .copied()
        .min_by_key(distance)
        .unwrap_or(matches[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::CommandKind;

    fn replace(match_text: &str) -> EditInstruction {
        let mut instruction = EditInstruction::new(CommandKind::Replace, "X");
        instruction.match_text = Some(match_text.to_string());
        instruction
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(Unresolved::NoAnchor.reason_code(), "no-anchor");
        assert_eq!(
            Unresolved::LineOutOfBounds {
                line: 9,
                line_count: 2
            }
            .reason_code(),
            "out-of-bounds"
        );
        assert_eq!(Unresolved::Ambiguous { count: 2 }.reason_code(), "ambiguous");
    }

    #[test]
    fn test_first_occurrence_by_default() {
        let resolver = AnchorResolver::default();
        let mut instruction = replace("foo");
        instruction.line_start = Some(3);
        let resolved = resolver.resolve_in_text(&instruction, "foo\nbar\nfoo\n").unwrap();
        assert_eq!(resolved.range(), 0..3);
    }

    #[test]
    fn test_nearest_occurrence_by_line_hint() {
        let resolver = AnchorResolver::new(ResolveOptions {
            nearest_occurrence: true,
            ..Default::default()
        });
        let mut instruction = replace("foo");
        instruction.line_start = Some(3);
        let resolved = resolver.resolve_in_text(&instruction, "foo\nbar\nfoo\n").unwrap();
        assert_eq!(resolved.range(), 8..11);
        assert_eq!(resolved.strategy, ResolveStrategy::ContentMatch);
    }

    #[test]
    fn test_whitespace_fallback_requires_unique_match() {
        let resolver = AnchorResolver::default();
        let text = "let  x = 1;\nlet y = 2;\n";
        let resolved = resolver.resolve_in_text(&replace("let x = 1;"), text).unwrap();
        assert_eq!(resolved.range(), 0..11);
        assert_eq!(resolved.strategy, ResolveStrategy::WhitespaceTolerant);

        let text = "a  b\na\tb\n";
        assert_eq!(
            resolver.resolve_in_text(&replace("a b"), text),
            Err(Unresolved::Ambiguous { count: 2 })
        );

        let strict = AnchorResolver::new(ResolveOptions {
            whitespace_fallback: false,
            ..Default::default()
        });
        assert_eq!(
            strict.resolve_in_text(&replace("let x = 1;"), "let  x = 1;"),
            Err(Unresolved::ContentNotFound)
        );
    }

    #[test]
    fn test_insert_after_content_match() {
        let resolver = AnchorResolver::default();
        let mut instruction = EditInstruction::new(CommandKind::Insert, "!");
        instruction.match_text = Some("hello".to_string());
        let resolved = resolver.resolve_in_text(&instruction, "hello world").unwrap();
        assert_eq!(resolved.range(), 5..5);
    }

    #[test]
    fn test_line_anchored_text_keeps_line_boundaries() {
        let resolver = AnchorResolver::default();
        let line_edit = |command, text: &str, start: usize, end: Option<usize>| {
            let mut instruction = EditInstruction::new(command, text);
            instruction.line_start = Some(start);
            instruction.line_end = end;
            instruction
        };
        let text_for = |instruction: &EditInstruction, text: &str| {
            let doc = LineIndex::from_text(text);
            let resolved = resolver.resolve(instruction, &doc).unwrap();
            assert_eq!(resolved.strategy, ResolveStrategy::LineNumber);
            resolved.replacement_text(instruction, &doc)
        };

        let insert = line_edit(CommandKind::Insert, "x", 1, None);
        assert_eq!(text_for(&insert, "a\nb\n"), "x\n");
        let insert = line_edit(CommandKind::Insert, "x\n", 2, None);
        assert_eq!(text_for(&insert, "a\nb"), "\nx\n");

        let replace = line_edit(CommandKind::Replace, "X", 2, Some(2));
        assert_eq!(text_for(&replace, "a\nb\nc\n"), "X\n");
        assert_eq!(text_for(&replace, "a\nb"), "X");

        let delete = line_edit(CommandKind::Delete, "", 2, Some(2));
        assert_eq!(text_for(&delete, "a\nb\nc\n"), "");

        // Content anchors keep the text verbatim.
        let content = self::replace("b");
        let doc = LineIndex::from_text("a\nb\n");
        let resolved = resolver.resolve(&content, &doc).unwrap();
        assert_eq!(resolved.replacement_text(&content, &doc), "X");
    }
}
