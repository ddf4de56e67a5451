//! Line ending detection and restoration.
//!
//! Buffers hold LF-only text so that offsets reported by agents, diffs, and the host agree.
//! CRLF files are normalized when opened and converted back when written to storage.

/// The newline sequence a file uses on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    Crlf,
}

impl LineEnding {
    /// Any CRLF in `text` makes the file CRLF.
    pub fn detect_in_text(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    /// Detect the line ending of `text` and return it together with the LF-normalized text.
    pub fn normalize(text: &str) -> (Self, String) {
        let ending = Self::detect_in_text(text);
        let normalized = match ending {
            Self::Lf => text.to_string(),
            Self::Crlf => text.replace("\r\n", "\n"),
        };
        (ending, normalized)
    }

    /// Convert LF-normalized `text` back to this line ending.
    pub fn apply_to_text(self, text: &str) -> String {
        match self {
            Self::Lf => text.to_string(),
            Self::Crlf => text.replace('\n', "\r\n"),
        }
    }
}
