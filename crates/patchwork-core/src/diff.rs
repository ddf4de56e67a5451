//! Unified-diff parsing and hunk classification.
//!
//! The parser is a line state machine: outside a hunk it tracks file headers (`diff --git`,
//! `---`, `+++`); inside a hunk it consumes exactly the number of old/new lines announced by
//! the `@@` header. Each hunk can then be split into [`HunkBlock`]s (a run of removed lines,
//! optionally followed by a run of added lines), which convert into canonical edit
//! instructions against a baseline text.

use crate::escape::{decode_quoted_path, strip_diff_side_prefix};
use crate::instruction::{CommandKind, EditInstruction, ParseIssue};
use crate::line_index::LineIndex;
use thiserror::Error;

/// Unified-diff syntax errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffParseError {
    /// A `@@` line that does not follow `@@ -a[,b] +c[,d] @@`.
    #[error("invalid hunk header on line {line_no}: {text}")]
    InvalidHunkHeader {
        /// 1-based line number within the diff text.
        line_no: usize,
        /// The offending line.
        text: String,
    },
    /// A line inside a hunk without a ` `, `-`, `+` or `\` prefix.
    #[error("unexpected line {line_no} inside hunk: {text}")]
    UnexpectedHunkLine {
        /// 1-based line number within the diff text.
        line_no: usize,
        /// The offending line.
        text: String,
    },
    /// The diff ended before a hunk supplied all announced lines.
    #[error("hunk starting at old line {old_start} is truncated")]
    TruncatedHunk {
        /// `oldStart` of the truncated hunk.
        old_start: usize,
    },
}

/// Kind of a line inside a hunk body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkLineKind {
    /// Unchanged line (` `).
    Context,
    /// Line only in the old text (`-`).
    Removed,
    /// Line only in the new text (`+`).
    Added,
}

/// One body line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkLine {
    /// Line kind.
    pub kind: HunkLineKind,
    /// Line text without prefix or separator.
    pub text: String,
    /// Set by a following `\ No newline at end of file` marker.
    pub missing_newline: bool,
}

/// One `@@` block of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    /// First old line (1-based). When `old_line_count == 0` this is the line *after which*
    /// the new lines go.
    pub old_start: usize,
    /// Number of old lines covered.
    pub old_line_count: usize,
    /// First new line (1-based), same convention as `old_start`.
    pub new_start: usize,
    /// Number of new lines covered.
    pub new_line_count: usize,
    /// Every `-` line, in order.
    pub removed_lines: Vec<String>,
    /// Every `+` line, in order.
    pub added_lines: Vec<String>,
    /// The full body, including context.
    pub lines: Vec<HunkLine>,
}

/// All hunks for one file of a (possibly multi-file) patch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilePatch {
    /// Decoded path from the `---` header (`None` for `/dev/null` or when absent).
    pub old_path: Option<String>,
    /// Decoded path from the `+++` header (`None` for `/dev/null` or when absent).
    pub new_path: Option<String>,
    /// Hunks in file order.
    pub hunks: Vec<DiffHunk>,
}

impl FilePatch {
    /// The path edits should target: the new side, falling back to the old side.
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }
}

/// Shape of a classified block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Removed and added lines in the same change run, in either order.
    Replace,
    /// A change run with only added lines.
    Insert,
    /// A change run with only removed lines.
    Delete,
}

/// A contiguous change inside a hunk, positioned in old-file line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkBlock {
    /// Block shape.
    pub kind: BlockKind,
    /// For `Replace`/`Delete`: first removed old line (1-based).
    /// For `Insert`: the old line after which the lines are inserted (0 = file start).
    pub old_line: usize,
    /// Removed lines.
    pub removed: Vec<String>,
    /// Added lines.
    pub added: Vec<String>,
    /// The last removed line has no trailing newline in the old file.
    pub removed_missing_newline: bool,
    /// The last added line has no trailing newline in the new file.
    pub added_missing_newline: bool,
}

impl DiffHunk {
    /// Split the hunk body into replace/insert/delete blocks.
    ///
    /// A change run between two context lines forms one block, whether its `+` lines come
    /// before or after its `-` lines.
    pub fn blocks(&self) -> Vec<HunkBlock> {
        let mut blocks = Vec::new();
        let mut cursor = if self.old_line_count == 0 {
            self.old_start + 1
        } else {
            self.old_start
        };
        let mut pending = PendingBlock::default();

        for line in &self.lines {
            match line.kind {
                HunkLineKind::Context => {
                    pending.flush_into(&mut blocks, cursor);
                    cursor += 1;
                }
                HunkLineKind::Removed => {
                    if !pending.added.is_empty() && !pending.removed.is_empty() {
                        pending.flush_into(&mut blocks, cursor);
                    }
                    pending.removed.push(line.text.clone());
                    pending.removed_missing_newline = line.missing_newline;
                    cursor += 1;
                }
                HunkLineKind::Added => {
                    pending.added.push(line.text.clone());
                    pending.added_missing_newline = line.missing_newline;
                }
            }
        }
        pending.flush_into(&mut blocks, cursor);
        blocks
    }
}

#[derive(Default)]
struct PendingBlock {
    removed: Vec<String>,
    added: Vec<String>,
    removed_missing_newline: bool,
    added_missing_newline: bool,
}

impl PendingBlock {
    fn flush_into(&mut self, blocks: &mut Vec<HunkBlock>, cursor: usize) {
        let taken = std::mem::take(self);
        let (kind, old_line) = match (taken.removed.is_empty(), taken.added.is_empty()) {
            (true, true) => return,
            (true, false) => (BlockKind::Insert, cursor.saturating_sub(1)),
            (false, true) => (BlockKind::Delete, cursor.saturating_sub(taken.removed.len())),
            (false, false) => (BlockKind::Replace, cursor.saturating_sub(taken.removed.len())),
        };
        blocks.push(HunkBlock {
            kind,
            old_line,
            removed: taken.removed,
            added: taken.added,
            removed_missing_newline: taken.removed_missing_newline,
            added_missing_newline: taken.added_missing_newline,
        });
    }
}

fn join_lines(lines: &[String], missing_final_newline: bool) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);
        if i + 1 < lines.len() || !missing_final_newline {
            out.push('\n');
        }
    }
    out
}

impl HunkBlock {
    /// Text of the removed lines as it appears in the old file.
    pub fn removed_text(&self) -> String {
        join_lines(&self.removed, self.removed_missing_newline)
    }

    /// Text of the added lines as it appears in the new file.
    pub fn added_text(&self) -> String {
        join_lines(&self.added, self.added_missing_newline)
    }

    /// Build the canonical instruction for this block, computing character offsets against
    /// `baseline` (the old side of the diff).
    ///
    /// The instruction carries the removed text as `match_text`, the baseline character range,
    /// and the old line numbers. If the block does not fit the baseline, the instruction is
    /// returned anchorless with a [`ParseIssue`].
    pub fn to_instruction(&self, baseline: &LineIndex) -> EditInstruction {
        match self.kind {
            BlockKind::Insert => {
                let mut instruction = EditInstruction::new(CommandKind::Insert, self.added_text());
                match baseline.offset_after_line(self.old_line) {
                    Ok(offset) => {
                        instruction.char_start = Some(offset);
                        instruction.char_end = Some(offset);
                        instruction.line_start = Some(self.old_line);
                    }
                    Err(err) => instruction.mark_malformed(ParseIssue::BlockOutsideBaseline {
                        line: self.old_line,
                        detail: err.to_string(),
                    }),
                }
                instruction
            }
            BlockKind::Replace | BlockKind::Delete => {
                let (command, new_text) = if self.kind == BlockKind::Delete {
                    (CommandKind::Delete, String::new())
                } else {
                    (CommandKind::Replace, self.added_text())
                };
                let mut instruction = EditInstruction::new(command, new_text);
                let last_line = self.old_line + self.removed.len() - 1;
                match baseline.line_range_to_char_range(self.old_line, last_line) {
                    Ok(range) => {
                        instruction.match_text = Some(self.removed_text());
                        instruction.char_start = Some(range.start);
                        instruction.char_end = Some(range.end);
                        instruction.line_start = Some(self.old_line);
                        instruction.line_end = Some(last_line);
                    }
                    Err(err) => instruction.mark_malformed(ParseIssue::BlockOutsideBaseline {
                        line: self.old_line,
                        detail: err.to_string(),
                    }),
                }
                instruction
            }
        }
    }
}

/// Parse a `@@ -a[,b] +c[,d] @@` header. Missing counts default to 1.
fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = line.strip_prefix("@@ -")?;
    let (old, rest) = rest.split_once(' ')?;
    let rest = rest.strip_prefix('+')?;
    let (new, rest) = rest.split_once(' ')?;
    if !rest.starts_with("@@") {
        return None;
    }

    fn range(spec: &str) -> Option<(usize, usize)> {
        match spec.split_once(',') {
            Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
            None => Some((spec.parse().ok()?, 1)),
        }
    }

    let (old_start, old_count) = range(old)?;
    let (new_start, new_count) = range(new)?;
    Some((old_start, old_count, new_start, new_count))
}

/// Decode the path part of a `---`/`+++` header line.
fn header_path(rest: &str) -> Option<String> {
    let raw = if rest.starts_with('"') {
        // Quoted: the path ends at the closing quote that is not escaped.
        let bytes = rest.as_bytes();
        let mut end = None;
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    end = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }
        match end {
            Some(end) => &rest[..=end],
            None => rest,
        }
    } else {
        // Some tools append a tab and a timestamp.
        rest.split('\t').next().unwrap_or(rest).trim_end()
    };
    let decoded = decode_quoted_path(raw);
    strip_diff_side_prefix(&decoded).map(str::to_string)
}

struct OpenHunk {
    hunk: DiffHunk,
    remaining_old: usize,
    remaining_new: usize,
}

/// Parse unified-diff text into per-file patches.
///
/// Text without any file headers yields a single [`FilePatch`] with no paths.
pub fn parse_patch(diff_text: &str) -> Result<Vec<FilePatch>, DiffParseError> {
    let mut patches: Vec<FilePatch> = Vec::new();
    let mut open: Option<OpenHunk> = None;

    let mut lines: Vec<&str> = diff_text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    for (idx, raw_line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(current) = open.as_mut() {
            let (kind, text) = match line.as_bytes().first() {
                Some(b' ') => (HunkLineKind::Context, &line[1..]),
                Some(b'-') => (HunkLineKind::Removed, &line[1..]),
                Some(b'+') => (HunkLineKind::Added, &line[1..]),
                Some(b'\\') => {
                    if let Some(last) = current.hunk.lines.last_mut() {
                        last.missing_newline = true;
                    }
                    continue;
                }
                // Some tools strip the single space of an empty context line.
                None => (HunkLineKind::Context, ""),
                Some(_) => {
                    return Err(DiffParseError::UnexpectedHunkLine {
                        line_no,
                        text: line.to_string(),
                    });
                }
            };

            match kind {
                HunkLineKind::Context => {
                    current.remaining_old = current.remaining_old.saturating_sub(1);
                    current.remaining_new = current.remaining_new.saturating_sub(1);
                }
                HunkLineKind::Removed => {
                    current.remaining_old = current.remaining_old.saturating_sub(1);
                    current.hunk.removed_lines.push(text.to_string());
                }
                HunkLineKind::Added => {
                    current.remaining_new = current.remaining_new.saturating_sub(1);
                    current.hunk.added_lines.push(text.to_string());
                }
            }
            current.hunk.lines.push(HunkLine {
                kind,
                text: text.to_string(),
                missing_newline: false,
            });

            if current.remaining_old == 0 && current.remaining_new == 0 {
                let done = open.take().map(|o| o.hunk);
                if let (Some(hunk), Some(patch)) = (done, patches.last_mut()) {
                    patch.hunks.push(hunk);
                }
            }
            continue;
        }

        if line.starts_with("diff --git ") {
            patches.push(FilePatch::default());
        } else if let Some(rest) = line.strip_prefix("--- ") {
            if patches.last().is_none_or(|p| !p.hunks.is_empty() || p.old_path.is_some()) {
                patches.push(FilePatch::default());
            }
            if let Some(patch) = patches.last_mut() {
                patch.old_path = header_path(rest);
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            if patches.is_empty() {
                patches.push(FilePatch::default());
            }
            if let Some(patch) = patches.last_mut() {
                patch.new_path = header_path(rest);
            }
        } else if line.starts_with("@@") {
            let Some((old_start, old_count, new_start, new_count)) = parse_hunk_header(line)
            else {
                return Err(DiffParseError::InvalidHunkHeader {
                    line_no,
                    text: line.to_string(),
                });
            };
            if patches.is_empty() {
                patches.push(FilePatch::default());
            }
            let hunk = DiffHunk {
                old_start,
                old_line_count: old_count,
                new_start,
                new_line_count: new_count,
                removed_lines: Vec::new(),
                added_lines: Vec::new(),
                lines: Vec::new(),
            };
            if old_count == 0 && new_count == 0 {
                if let Some(patch) = patches.last_mut() {
                    patch.hunks.push(hunk);
                }
            } else {
                open = Some(OpenHunk {
                    hunk,
                    remaining_old: old_count,
                    remaining_new: new_count,
                });
            }
        } else if line.starts_with('\\') {
            // Marker that arrives after the hunk's counts were exhausted.
            if let Some(last) = patches
                .last_mut()
                .and_then(|p| p.hunks.last_mut())
                .and_then(|h| h.lines.last_mut())
            {
                last.missing_newline = true;
            }
        }
        // Everything else (index, mode, similarity lines, trailing blank) is metadata.
    }

    if let Some(unfinished) = open {
        return Err(DiffParseError::TruncatedHunk {
            old_start: unfinished.hunk.old_start,
        });
    }
    Ok(patches)
}

/// Parse unified-diff text into a flat list of hunks, ignoring file headers.
pub fn extract_hunks(diff_text: &str) -> Result<Vec<DiffHunk>, DiffParseError> {
    Ok(parse_patch(diff_text)?
        .into_iter()
        .flat_map(|patch| patch.hunks)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hunk_header_counts_default_to_one() {
        assert_eq!(parse_hunk_header("@@ -5 +5 @@"), Some((5, 1, 5, 1)));
        assert_eq!(
            parse_hunk_header("@@ -2,3 +4,0 @@ fn main()"),
            Some((2, 3, 4, 0))
        );
        assert_eq!(parse_hunk_header("@@ -x +1 @@"), None);
        assert_eq!(parse_hunk_header("@@ -1 +1"), None);
    }

    #[test]
    fn test_extract_replace_hunk() {
        let hunks = extract_hunks("@@ -2,1 +2,1 @@\n-line2\n+lineX\n").unwrap();
        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!((hunk.old_start, hunk.old_line_count), (2, 1));
        assert_eq!(hunk.removed_lines, vec!["line2".to_string()]);
        assert_eq!(hunk.added_lines, vec!["lineX".to_string()]);

        let blocks = hunk.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Replace);
        assert_eq!(blocks[0].old_line, 2);
    }

    #[test]
    fn test_blocks_split_on_context_and_add_before_remove() {
        let diff = "@@ -1,4 +1,3 @@\n a\n-b\n c\n+x\n-d\n";
        let hunks = extract_hunks(diff).unwrap();
        let blocks = hunks[0].blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].kind, blocks[0].old_line), (BlockKind::Delete, 2));
        // `+x` precedes `-d` in the same run, so together they replace line 4.
        assert_eq!((blocks[1].kind, blocks[1].old_line), (BlockKind::Replace, 4));
        assert_eq!(blocks[1].removed, vec!["d".to_string()]);
        assert_eq!(blocks[1].added, vec!["x".to_string()]);
    }

    #[test]
    fn test_add_before_remove_then_another_replace() {
        let diff = "@@ -1,3 +1,3 @@\n+x\n-a\n+y\n-b\n c\n";
        let blocks = extract_hunks(diff).unwrap()[0].blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].kind, blocks[0].old_line), (BlockKind::Replace, 1));
        assert_eq!(blocks[0].added_text(), "x\ny\n");
        assert_eq!((blocks[1].kind, blocks[1].old_line), (BlockKind::Delete, 2));
    }

    #[test]
    fn test_pure_insertion_position() {
        let hunks = extract_hunks("@@ -1,0 +2,2 @@\n+x\n+y\n").unwrap();
        let blocks = hunks[0].blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Insert);
        assert_eq!(blocks[0].old_line, 1);
        assert_eq!(blocks[0].added_text(), "x\ny\n");
    }

    #[test]
    fn test_insertion_at_file_start() {
        let hunks = extract_hunks("@@ -0,0 +1 @@\n+first\n").unwrap();
        let blocks = hunks[0].blocks();
        assert_eq!((blocks[0].kind, blocks[0].old_line), (BlockKind::Insert, 0));
    }

    #[test]
    fn test_no_newline_marker() {
        let diff = "@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n\\ No newline at end of file\n";
        let hunks = extract_hunks(diff).unwrap();
        let blocks = hunks[0].blocks();
        assert_eq!(blocks[0].removed_text(), "old");
        assert_eq!(blocks[0].added_text(), "new");
    }

    #[test]
    fn test_multi_file_patch_with_octal_paths() {
        let diff = concat!(
            "diff --git \"a/caf\\303\\251.txt\" \"b/caf\\303\\251.txt\"\n",
            "index 1111111..2222222 100644\n",
            "--- \"a/caf\\303\\251.txt\"\n",
            "+++ \"b/caf\\303\\251.txt\"\n",
            "@@ -1 +1 @@\n",
            "-a\n",
            "+b\n",
            "diff --git a/src/lib.rs b/src/lib.rs\n",
            "--- a/src/lib.rs\n",
            "+++ b/src/lib.rs\n",
            "@@ -3,0 +4 @@\n",
            "+// added\n",
        );
        let patches = parse_patch(diff).unwrap();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].path(), Some("café.txt"));
        assert_eq!(patches[1].path(), Some("src/lib.rs"));
        assert_eq!(patches[1].hunks[0].blocks()[0].old_line, 3);
    }

    #[test]
    fn test_new_file_uses_new_path() {
        let diff = "--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1 @@\n+hello\n";
        let patches = parse_patch(diff).unwrap();
        assert_eq!(patches[0].old_path, None);
        assert_eq!(patches[0].path(), Some("new.txt"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            extract_hunks("@@ -a +1 @@\n"),
            Err(DiffParseError::InvalidHunkHeader { line_no: 1, .. })
        ));
        assert!(matches!(
            extract_hunks("@@ -1,2 +1,2 @@\n a\n"),
            Err(DiffParseError::TruncatedHunk { old_start: 1 })
        ));
        assert!(matches!(
            extract_hunks("@@ -1 +1 @@\n?what\n"),
            Err(DiffParseError::UnexpectedHunkLine { line_no: 2, .. })
        ));
    }
}
