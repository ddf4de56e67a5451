//! Structured deltas for accepted edits.
//!
//! Every accept returns a [`TextDelta`] in **character offsets** so a host can mirror the splice
//! into its own view of the file (editor model, collaborative document, cache) without diffing
//! old and new text.

/// One splice expressed in character offsets.
///
/// `start` is an offset in the document at the time this splice is applied; splices inside a
/// [`TextDelta`] apply in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDeltaEdit {
    /// Character offset where the splice begins.
    pub start: usize,
    /// Exact removed text (may be empty).
    pub deleted_text: String,
    /// Exact inserted text (may be empty).
    pub inserted_text: String,
}

impl TextDeltaEdit {
    /// Length of `deleted_text` in characters.
    pub fn deleted_len(&self) -> usize {
        self.deleted_text.chars().count()
    }

    /// Length of `inserted_text` in characters.
    pub fn inserted_len(&self) -> usize {
        self.inserted_text.chars().count()
    }

    /// Exclusive end offset in the pre-splice document.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.deleted_len())
    }
}

/// The full change produced by one accept call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextDelta {
    /// Document length before the first splice.
    pub before_char_count: usize,
    /// Document length after the last splice.
    pub after_char_count: usize,
    /// Ordered splices transforming the "before" document into the "after" document.
    pub edits: Vec<TextDeltaEdit>,
}

impl TextDelta {
    /// Returns `true` if this delta contains no splices.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply the splices to `text`, which must be the "before" document.
    ///
    /// Returns `None` if a splice does not fit.
    pub fn apply_to(&self, text: &str) -> Option<String> {
        let mut chars: Vec<char> = text.chars().collect();
        for edit in &self.edits {
            if edit.end() > chars.len() {
                return None;
            }
            chars.splice(edit.start..edit.end(), edit.inserted_text.chars());
        }
        Some(chars.into_iter().collect())
    }
}
