//! Content search for anchor resolution.
//!
//! All public inputs/outputs are **character offsets** (not byte offsets). Two matchers are
//! provided:
//!
//! - literal search (verbatim substring)
//! - whitespace-tolerant search, where every interior whitespace run in the needle matches
//!   any non-empty whitespace run in the haystack. Leading and trailing runs may match
//!   nothing, and a trailing run that holds a newline also matches the end of the text.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// A match expressed as a half-open character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Inclusive start character offset.
    pub start: usize,
    /// Exclusive end character offset.
    pub end: usize,
}

impl SearchMatch {
    /// Returns the length of the match in characters.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` if the match is empty.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Search errors.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The generated pattern failed to compile (e.g. exceeded the size limit).
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

#[derive(Debug)]
pub(crate) struct CharIndex {
    char_to_byte: Vec<usize>,
    text_len: usize,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self {
            char_to_byte,
            text_len: text.len(),
        }
    }

    pub(crate) fn byte_to_char(&self, byte_offset: usize) -> usize {
        let clamped = byte_offset.min(self.text_len);
        match self.char_to_byte.binary_search(&clamped) {
            Ok(idx) => idx,
            Err(idx) => idx,
        }
    }
}

/// Find every non-overlapping literal occurrence of `needle` in `text`, in document order.
///
/// Returns an empty list if `needle` is empty.
pub fn find_all_literal(text: &str, needle: &str) -> Vec<SearchMatch> {
    if needle.is_empty() {
        return Vec::new();
    }

    let index = CharIndex::new(text);
    let needle_chars = needle.chars().count();
    text.match_indices(needle)
        .map(|(byte, _)| {
            let start = index.byte_to_char(byte);
            SearchMatch {
                start,
                end: start + needle_chars,
            }
        })
        .collect()
}

/// Find the first literal occurrence of `needle` in `text`.
pub fn find_first_literal(text: &str, needle: &str) -> Option<SearchMatch> {
    if needle.is_empty() {
        return None;
    }
    let byte = text.find(needle)?;
    let start = text[..byte].chars().count();
    Some(SearchMatch {
        start,
        end: start + needle.chars().count(),
    })
}

/// Interior whitespace runs become `\s+`. Edge runs may match nothing, so a needle with
/// leading or trailing whitespace still matches at a line start or at the end of the text.
/// Edge runs never absorb a neighbouring line's indentation.
fn compile_whitespace_tolerant(needle: &str) -> Result<Regex, SearchError> {
    let body = needle.trim();
    let leading = &needle[..needle.len() - needle.trim_start().len()];
    let trailing = &needle[needle.trim_end().len()..];

    let mut pattern = String::with_capacity(needle.len() * 2);
    if leading.contains('\n') {
        pattern.push_str(r"(?:\A|\n)[^\S\n]*");
    } else if !leading.is_empty() {
        pattern.push_str(r"[^\S\n]*");
    }

    let mut in_whitespace = false;
    for ch in body.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                pattern.push_str(r"\s+");
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        let mut buf = [0u8; 4];
        pattern.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
    }

    if trailing.contains('\n') {
        pattern.push_str(r"[^\S\n]*(?:\n|\z)");
    } else if !trailing.is_empty() {
        pattern.push_str(r"[^\S\n]*");
    }

    Ok(RegexBuilder::new(&pattern).build()?)
}

/// Find every match of `needle` in `text`, treating each whitespace run as any whitespace.
///
/// Returns an empty list if `needle` is empty or whitespace-only.
pub fn find_all_whitespace_tolerant(
    text: &str,
    needle: &str,
) -> Result<Vec<SearchMatch>, SearchError> {
    if needle.trim().is_empty() {
        return Ok(Vec::new());
    }

    let re = compile_whitespace_tolerant(needle)?;
    let index = CharIndex::new(text);

    let mut matches = Vec::new();
    for m in re.find_iter(text) {
        let candidate = SearchMatch {
            start: index.byte_to_char(m.start()),
            end: index.byte_to_char(m.end()),
        };
        if !candidate.is_empty() {
            matches.push(candidate);
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_offsets_are_chars() {
        let text = "你好 hello 你好 hello";
        let all = find_all_literal(text, "hello");
        assert_eq!(
            all,
            vec![
                SearchMatch { start: 3, end: 8 },
                SearchMatch { start: 12, end: 17 }
            ]
        );
        assert_eq!(find_first_literal(text, "hello"), Some(all[0]));
        assert_eq!(find_first_literal(text, ""), None);
        assert_eq!(find_first_literal(text, "absent"), None);
    }

    #[test]
    fn test_whitespace_tolerant_match() {
        let text = "fn main() {\n    let  x = 1;\n}\n";
        let matches = find_all_whitespace_tolerant(text, "let x =\t1;").unwrap();
        assert_eq!(matches, vec![SearchMatch { start: 16, end: 27 }]);
    }

    #[test]
    fn test_whitespace_tolerant_escapes_metacharacters() {
        let text = "a.b (c) [d]";
        let matches = find_all_whitespace_tolerant(text, "(c)  [d]").unwrap();
        assert_eq!(matches.len(), 1);
        assert!(find_all_whitespace_tolerant(text, "   ").unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_tolerant_edges_match_at_line_start_and_end() {
        let text = "fn f() {\nlet x = 1;\n}";
        // Leading indentation the text does not have.
        let matches = find_all_whitespace_tolerant(text, "    let x = 1;").unwrap();
        assert_eq!(matches, vec![SearchMatch { start: 9, end: 19 }]);

        // Trailing newline at the very end of the text.
        let matches = find_all_whitespace_tolerant(text, "}\n").unwrap();
        assert_eq!(matches, vec![SearchMatch { start: 20, end: 21 }]);

        // A trailing newline consumes the line break but not the next line's indentation.
        let text = "a  b\n    c\n";
        let matches = find_all_whitespace_tolerant(text, "a b\n").unwrap();
        assert_eq!(matches, vec![SearchMatch { start: 0, end: 5 }]);
    }
}
