//! Recursive-descent parser for inline tag blocks.
//!
//! Agents describe an edit with a small XML-like block, usually wrapped in a fenced capsule:
//!
//! ````text
//! ```{type=paragraph}
//! <paragraph_capsule>
//!   <paragraph id="p-3" path="/workspace/notes.md">
//!     <command>replace</command>
//!     <start>120</start>
//!     <end>164</end>
//!     <content>old text</content>
//!     <new_content>new text</new_content>
//!   </paragraph>
//! </paragraph_capsule>
//! ```
//! ````
//!
//! This is not a general XML parser: bodies of the known child tags are taken verbatim up to
//! their closing tag (so they may contain `<` and `>`), no entity decoding happens, and any
//! other tag is skipped.

use crate::instruction::ParseIssue;

/// Raw fields of one tag block. Values are untrimmed except attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagBlock {
    /// `id` attribute of `<paragraph>`.
    pub id: Option<String>,
    /// `path` attribute of `<paragraph>`.
    pub path: Option<String>,
    /// `<command>` body.
    pub command: Option<String>,
    /// `<start>` body.
    pub start: Option<String>,
    /// `<end>` body.
    pub end: Option<String>,
    /// `<content>` body.
    pub content: Option<String>,
    /// `<new_content>` body.
    pub new_content: Option<String>,
}

const CHILD_TAGS: [&str; 5] = ["command", "start", "end", "content", "new_content"];

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Name of the tag opening at `self.pos` (which must point at `<`).
    fn tag_name(&self) -> &'a str {
        let after = &self.src[self.pos + 1..];
        let len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
            .count();
        &after[..len]
    }

    /// Skip past the next `>`, or past the `<` alone if the tag never closes.
    fn skip_tag(&mut self) {
        match self.rest().find('>') {
            Some(rel) => self.pos += rel + 1,
            None => self.pos += 1,
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Parse `name="value"` pairs up to the end of the current open tag.
    fn attributes(&mut self, tag: &str) -> Result<Vec<(&'a str, &'a str)>, ParseIssue> {
        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(ParseIssue::UnterminatedTag(tag.to_string()));
            }
            if let Some(after) = rest.strip_prefix("/>") {
                self.pos = self.src.len() - after.len();
                return Ok(attrs);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok(attrs);
            }

            let name_len = rest
                .find(|c: char| c == '=' || c == '>' || c == '/' || c.is_whitespace())
                .unwrap_or(rest.len());
            if name_len == 0 {
                // Stray character such as a lone '/'; step over it.
                self.pos += rest.chars().next().map_or(1, char::len_utf8);
                continue;
            }
            let name = &rest[..name_len];
            self.pos += name_len;
            self.skip_whitespace();

            let Some(after_eq) = self.rest().strip_prefix('=') else {
                // Valueless attribute.
                attrs.push((name, ""));
                continue;
            };
            self.pos = self.src.len() - after_eq.len();
            self.skip_whitespace();

            let rest = self.rest();
            let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
                return Err(ParseIssue::UnterminatedAttribute(tag.to_string()));
            };
            let body = &rest[1..];
            let Some(close) = body.find(quote) else {
                return Err(ParseIssue::UnterminatedAttribute(tag.to_string()));
            };
            attrs.push((name, &body[..close]));
            self.pos += 1 + close + 1;
        }
    }

    /// Parse `<name ...>body</name>` starting at `self.pos`, returning the verbatim body.
    fn element_body(&mut self, name: &str) -> Result<&'a str, ParseIssue> {
        let open_end = match self.rest().find('>') {
            Some(rel) => self.pos + rel,
            None => return Err(ParseIssue::UnterminatedTag(name.to_string())),
        };
        if self.src[..open_end].ends_with('/') {
            self.pos = open_end + 1;
            return Ok("");
        }

        let body_start = open_end + 1;
        let closing = format!("</{name}>");
        let Some(rel) = self.src[body_start..].find(&closing) else {
            return Err(ParseIssue::UnterminatedTag(name.to_string()));
        };
        self.pos = body_start + rel + closing.len();
        Ok(&self.src[body_start..body_start + rel])
    }
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

/// Parse the first tag block found in `input`.
///
/// Returns `Ok(None)` when `input` contains none of the recognized tags, so callers can fall
/// back to another wire shape. Duplicate child tags keep the first occurrence.
pub fn parse_tag_block(input: &str) -> Result<Option<TagBlock>, ParseIssue> {
    let mut parser = Parser { src: input, pos: 0 };
    let mut block = TagBlock::default();
    let mut seen = false;

    while let Some(rel) = parser.rest().find('<') {
        parser.pos += rel;
        let name = parser.tag_name();

        if name == "paragraph" {
            seen = true;
            parser.pos += 1 + name.len();
            for (attr, value) in parser.attributes(name)? {
                match attr {
                    "id" => set_once(&mut block.id, value),
                    "path" => set_once(&mut block.path, value),
                    _ => {}
                }
            }
        } else if CHILD_TAGS.contains(&name) {
            seen = true;
            let body = parser.element_body(name)?;
            let slot = match name {
                "command" => &mut block.command,
                "start" => &mut block.start,
                "end" => &mut block.end,
                "content" => &mut block.content,
                _ => &mut block.new_content,
            };
            set_once(slot, body);
        } else {
            // Closing tags, wrappers such as <paragraph_capsule>, and anything unknown.
            parser.skip_tag();
        }
    }

    Ok(seen.then_some(block))
}
