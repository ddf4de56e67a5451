//! Open-document state.

use crate::delta::TextDeltaEdit;
use crate::line_ending::LineEnding;
use crate::line_index::{CoordinateError, LineIndex};

/// The in-memory content of one open file.
///
/// Text is held LF-normalized; [`DocumentBuffer::persisted_text`] restores the file's own line
/// ending. The baseline is the text pending edits were computed against. It is kept while any
/// edit for this file is pending and released once none remain.
#[derive(Debug, Clone)]
pub struct DocumentBuffer {
    path: String,
    content: LineIndex,
    baseline: Option<String>,
    is_dirty: bool,
    line_ending: LineEnding,
}

impl DocumentBuffer {
    /// Open a buffer over `text`, recording and normalizing its line ending.
    pub fn new(path: impl Into<String>, text: &str) -> Self {
        let (line_ending, text) = LineEnding::normalize(text);
        Self {
            path: path.into(),
            content: LineIndex::from_text(&text),
            baseline: None,
            is_dirty: false,
            line_ending,
        }
    }

    /// File path this buffer was opened for.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The current LF-normalized text.
    pub fn text(&self) -> String {
        self.content.get_text()
    }

    /// Coordinate index over the current text.
    pub fn content(&self) -> &LineIndex {
        &self.content
    }

    /// Length of the current text in characters.
    pub fn char_count(&self) -> usize {
        self.content.char_count()
    }

    /// Line ending detected when the file was opened.
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Returns `true` if the buffer has changes not yet written to storage.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Record that the current text has been written to storage.
    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Text pending edits were resolved against, while any are pending.
    pub fn baseline(&self) -> Option<&str> {
        self.baseline.as_deref()
    }

    /// Set the baseline from storage text (CRLF is normalized like the content).
    pub fn set_baseline(&mut self, text: &str) {
        let (_, normalized) = LineEnding::normalize(text);
        self.baseline = Some(normalized);
    }

    /// Capture the current text as the baseline unless one is already held.
    pub fn ensure_baseline(&mut self) {
        if self.baseline.is_none() {
            self.baseline = Some(self.content.get_text());
        }
    }

    /// Drop the baseline.
    pub fn release_baseline(&mut self) {
        self.baseline = None;
    }

    /// Text in `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<String, CoordinateError> {
        self.content.slice(start, end)
    }

    /// Replace `start..end` with `text`, returning the splice performed.
    ///
    /// The range is validated before anything changes.
    pub fn splice(
        &mut self,
        start: usize,
        end: usize,
        text: &str,
    ) -> Result<TextDeltaEdit, CoordinateError> {
        let deleted_text = self.content.slice(start, end)?;
        self.content.delete(start, end)?;
        self.content.insert(start, text)?;
        self.is_dirty = true;
        Ok(TextDeltaEdit {
            start,
            deleted_text,
            inserted_text: text.to_string(),
        })
    }

    /// Replace the whole content with text loaded from storage and mark the buffer clean.
    pub fn reload(&mut self, text: &str) {
        let (line_ending, text) = LineEnding::normalize(text);
        self.content = LineIndex::from_text(&text);
        self.line_ending = line_ending;
        self.is_dirty = false;
    }

    /// The current text with the file's original line ending restored.
    pub fn persisted_text(&self) -> String {
        self.line_ending.apply_to_text(&self.content.get_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_is_normalized_and_restored() {
        let mut buffer = DocumentBuffer::new("a.txt", "one\r\ntwo\r\n");
        assert_eq!(buffer.text(), "one\ntwo\n");
        assert_eq!(buffer.char_count(), 8);

        buffer.splice(4, 7, "TWO").unwrap();
        assert!(buffer.is_dirty());
        assert_eq!(buffer.persisted_text(), "one\r\nTWO\r\n");
    }

    #[test]
    fn test_splice_validates_before_mutating() {
        let mut buffer = DocumentBuffer::new("a.txt", "abc");
        assert!(buffer.splice(2, 9, "x").is_err());
        assert_eq!(buffer.text(), "abc");
        assert!(!buffer.is_dirty());

        let edit = buffer.splice(1, 2, "ZZ").unwrap();
        assert_eq!(edit.deleted_text, "b");
        assert_eq!(buffer.text(), "aZZc");
    }

    #[test]
    fn test_baseline_lifecycle() {
        let mut buffer = DocumentBuffer::new("a.txt", "v1");
        buffer.ensure_baseline();
        buffer.splice(0, 2, "v2").unwrap();
        buffer.ensure_baseline();
        assert_eq!(buffer.baseline(), Some("v1"));
        buffer.release_baseline();
        assert_eq!(buffer.baseline(), None);
    }
}
