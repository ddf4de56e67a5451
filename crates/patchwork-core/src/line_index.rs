//! Coordinate translation over a document snapshot.
//!
//! All public offsets are **character offsets** (Unicode scalar values) unless a method says
//! otherwise. Lines are separated by `'\n'` only; a document with `N` newlines has `N + 1`
//! lines, the last of which may be empty.
//!
//! Two numbering conventions meet here:
//! - [`Position`] is 0-based (line and column), matching editor cursor coordinates.
//! - [`LineIndex::line_range_to_char_range`] and [`LineIndex::offset_after_line`] take
//!   **1-based** line numbers, matching the numbers that edit instructions carry.
//!
//! Every lookup is checked and returns [`CoordinateError`] instead of clamping, so callers in
//! the resolution path can fall through to the next strategy.

use ropey::Rope;
use std::ops::Range;
use thiserror::Error;

/// A 0-based line/column position (column counted in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// Line number (0-based).
    pub line: usize,
    /// Column within the line, in characters (0-based).
    pub column: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Out-of-range lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    /// A character offset past the end of the document.
    #[error("offset {offset} is past the end of the document ({len} chars)")]
    OffsetOutOfBounds {
        /// Requested offset.
        offset: usize,
        /// Document length in the same unit as `offset`.
        len: usize,
    },
    /// A line number that does not exist.
    #[error("line {line} does not exist (document has {line_count} lines)")]
    LineOutOfBounds {
        /// Requested line, in the numbering of the call that failed.
        line: usize,
        /// Number of lines in the document.
        line_count: usize,
    },
    /// A column past the end of its line.
    #[error("column {column} is past the end of line {line} ({line_len} chars)")]
    ColumnOutOfBounds {
        /// Line (0-based).
        line: usize,
        /// Requested column.
        column: usize,
        /// Length of the line in characters, excluding the separator.
        line_len: usize,
    },
    /// A line range whose end precedes its start.
    #[error("line range {start}..={end} is inverted")]
    InvertedLineRange {
        /// First line (1-based).
        start: usize,
        /// Last line (1-based).
        end: usize,
    },
}

/// Rope-backed line index for one document snapshot.
#[derive(Debug, Clone)]
pub struct LineIndex {
    rope: Rope,
}

impl LineIndex {
    /// Create an empty line index.
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Build a line index from text.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Total line count (an empty document has one line).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Total character count.
    pub fn char_count(&self) -> usize {
        self.rope.len_chars()
    }

    /// Total byte count (UTF-8).
    pub fn byte_count(&self) -> usize {
        self.rope.len_bytes()
    }

    /// Length of a line in characters, excluding its `'\n'`.
    pub fn line_len(&self, line: usize) -> Result<usize, CoordinateError> {
        self.check_line(line)?;
        let start = self.rope.line_to_char(line);
        let end = self.line_end_exclusive(line);
        Ok(end - start)
    }

    /// Convert a character offset into a 0-based line/column position.
    pub fn offset_to_position(&self, offset: usize) -> Result<Position, CoordinateError> {
        self.check_offset(offset)?;
        let line = self.rope.char_to_line(offset);
        let column = offset - self.rope.line_to_char(line);
        Ok(Position::new(line, column))
    }

    /// Convert a 0-based line/column position into a character offset.
    ///
    /// `column` may equal the line length (the position just before the separator).
    pub fn position_to_offset(&self, line: usize, column: usize) -> Result<usize, CoordinateError> {
        let line_len = self.line_len(line)?;
        if column > line_len {
            return Err(CoordinateError::ColumnOutOfBounds {
                line,
                column,
                line_len,
            });
        }
        Ok(self.rope.line_to_char(line) + column)
    }

    /// Character range covering the 1-based, inclusive line range `start_line..=end_line`.
    ///
    /// The range starts at the first character of `start_line` and ends just after the
    /// separator that terminates `end_line`, or at the end of the document when `end_line`
    /// is the final line.
    pub fn line_range_to_char_range(
        &self,
        start_line: usize,
        end_line: usize,
    ) -> Result<Range<usize>, CoordinateError> {
        if end_line < start_line {
            return Err(CoordinateError::InvertedLineRange {
                start: start_line,
                end: end_line,
            });
        }
        let first = self.one_based_to_index(start_line)?;
        let last = self.one_based_to_index(end_line)?;

        let start = self.rope.line_to_char(first);
        let end = if last + 1 < self.rope.len_lines() {
            self.rope.line_to_char(last + 1)
        } else {
            self.rope.len_chars()
        };
        Ok(start..end)
    }

    /// Character offset immediately after 1-based line `line` (including its separator).
    ///
    /// `line == 0` is the start of the document.
    pub fn offset_after_line(&self, line: usize) -> Result<usize, CoordinateError> {
        if line == 0 {
            return Ok(0);
        }
        let index = self.one_based_to_index(line)?;
        if index + 1 < self.rope.len_lines() {
            Ok(self.rope.line_to_char(index + 1))
        } else {
            Ok(self.rope.len_chars())
        }
    }

    /// Convert a character offset into a UTF-8 byte offset.
    pub fn char_to_byte(&self, offset: usize) -> Result<usize, CoordinateError> {
        self.check_offset(offset)?;
        Ok(self.rope.char_to_byte(offset))
    }

    /// Convert a UTF-8 byte offset into a character offset.
    ///
    /// A byte offset inside a multi-byte character maps to that character's offset.
    pub fn byte_to_char(&self, byte: usize) -> Result<usize, CoordinateError> {
        let len = self.rope.len_bytes();
        if byte > len {
            return Err(CoordinateError::OffsetOutOfBounds { offset: byte, len });
        }
        Ok(self.rope.byte_to_char(byte))
    }

    /// Convert a character offset into a UTF-16 code unit offset.
    pub fn char_to_utf16(&self, offset: usize) -> Result<usize, CoordinateError> {
        self.check_offset(offset)?;
        Ok(self.rope.char_to_utf16_cu(offset))
    }

    /// Convert a UTF-16 code unit offset into a character offset.
    pub fn utf16_to_char(&self, utf16: usize) -> Result<usize, CoordinateError> {
        let len = self.rope.len_utf16_cu();
        if utf16 > len {
            return Err(CoordinateError::OffsetOutOfBounds { offset: utf16, len });
        }
        Ok(self.rope.utf16_cu_to_char(utf16))
    }

    /// Text in the character range `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<String, CoordinateError> {
        self.check_offset(end)?;
        if start > end {
            return Err(CoordinateError::OffsetOutOfBounds { offset: start, len: end });
        }
        Ok(self.rope.slice(start..end).to_string())
    }

    /// Insert text at a character offset.
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<(), CoordinateError> {
        self.check_offset(offset)?;
        self.rope.insert(offset, text);
        Ok(())
    }

    /// Delete the character range `start..end`.
    pub fn delete(&mut self, start: usize, end: usize) -> Result<(), CoordinateError> {
        self.check_offset(end)?;
        if start < end {
            self.rope.remove(start..end);
        }
        Ok(())
    }

    /// Get the complete text.
    pub fn get_text(&self) -> String {
        self.rope.to_string()
    }

    /// Get the text of a 0-based line, excluding its separator.
    pub fn get_line_text(&self, line: usize) -> Option<String> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let mut text = self.rope.line(line).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        Some(text)
    }

    fn line_end_exclusive(&self, line: usize) -> usize {
        if line + 1 < self.rope.len_lines() {
            self.rope.line_to_char(line + 1) - 1
        } else {
            self.rope.len_chars()
        }
    }

    fn one_based_to_index(&self, line: usize) -> Result<usize, CoordinateError> {
        let line_count = self.rope.len_lines();
        if line == 0 || line > line_count {
            return Err(CoordinateError::LineOutOfBounds { line, line_count });
        }
        Ok(line - 1)
    }

    fn check_line(&self, line: usize) -> Result<(), CoordinateError> {
        let line_count = self.rope.len_lines();
        if line >= line_count {
            return Err(CoordinateError::LineOutOfBounds { line, line_count });
        }
        Ok(())
    }

    fn check_offset(&self, offset: usize) -> Result<(), CoordinateError> {
        let len = self.rope.len_chars();
        if offset > len {
            return Err(CoordinateError::OffsetOutOfBounds { offset, len });
        }
        Ok(())
    }
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a character offset in `text` into a 0-based line/column position.
pub fn offset_to_position(text: &str, offset: usize) -> Result<Position, CoordinateError> {
    LineIndex::from_text(text).offset_to_position(offset)
}

/// Convert a 0-based line/column position in `text` into a character offset.
pub fn position_to_offset(text: &str, line: usize, column: usize) -> Result<usize, CoordinateError> {
    LineIndex::from_text(text).position_to_offset(line, column)
}

/// Character range of the 1-based inclusive line range `start_line..=end_line` in `text`.
pub fn line_range_to_char_range(
    text: &str,
    start_line: usize,
    end_line: usize,
) -> Result<Range<usize>, CoordinateError> {
    LineIndex::from_text(text).line_range_to_char_range(start_line, end_line)
}
