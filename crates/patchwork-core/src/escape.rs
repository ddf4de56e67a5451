//! Quoted-path helpers.
//!
//! Version-control tools quote file names that contain non-ASCII or control bytes, writing each
//! such byte as a C-style octal escape (`"caf\303\251.txt"`). The escapes spell out the raw
//! UTF-8 bytes, so they must be collected as bytes before decoding.

/// Decode a possibly quoted, octal-escaped path into UTF-8.
///
/// Surrounding double quotes are removed. Recognized escapes are `\NNN` (1–3 octal digits),
/// `\\`, `\"`, `\a`, `\b`, `\t`, `\n`, `\v`, `\f` and `\r`; any other backslash is kept
/// verbatim. Invalid UTF-8 sequences are replaced with U+FFFD.
pub fn decode_quoted_path(raw: &str) -> String {
    let inner = match raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner,
        None => raw,
    };

    let bytes = inner.as_bytes();
    let mut out = Vec::<u8>::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let next = bytes[i + 1];
        if is_octal_digit(next) {
            let mut value: u32 = 0;
            let mut len = 0;
            while len < 3 && i + 1 + len < bytes.len() && is_octal_digit(bytes[i + 1 + len]) {
                value = value * 8 + u32::from(bytes[i + 1 + len] - b'0');
                len += 1;
            }
            // \777 overflows a byte; keep the text as written.
            if value > 0xFF {
                out.extend_from_slice(&bytes[i..i + 1 + len]);
            } else {
                out.push(value as u8);
            }
            i += 1 + len;
            continue;
        }

        let unescaped = match next {
            b'\\' => Some(b'\\'),
            b'"' => Some(b'"'),
            b'a' => Some(0x07),
            b'b' => Some(0x08),
            b't' => Some(b'\t'),
            b'n' => Some(b'\n'),
            b'v' => Some(0x0B),
            b'f' => Some(0x0C),
            b'r' => Some(b'\r'),
            _ => None,
        };
        match unescaped {
            Some(b) => {
                out.push(b);
                i += 2;
            }
            None => {
                out.push(b'\\');
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Strip the `a/` / `b/` side prefix that unified diffs put in front of paths.
///
/// `/dev/null` is returned as `None`.
pub fn strip_diff_side_prefix(path: &str) -> Option<&str> {
    if path == "/dev/null" {
        return None;
    }
    Some(
        path.strip_prefix("a/")
            .or_else(|| path.strip_prefix("b/"))
            .unwrap_or(path),
    )
}

fn is_octal_digit(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_octal_utf8() {
        assert_eq!(decode_quoted_path(r#""caf\303\251.txt""#), "café.txt");
        assert_eq!(decode_quoted_path(r"\344\275\240\345\245\275.md"), "你好.md");
    }

    #[test]
    fn test_decode_simple_escapes() {
        assert_eq!(decode_quoted_path(r#""a\"b\\c\td""#), "a\"b\\c\td");
        assert_eq!(decode_quoted_path("plain/path.rs"), "plain/path.rs");
    }

    #[test]
    fn test_unknown_escape_and_trailing_backslash_are_kept() {
        assert_eq!(decode_quoted_path(r"a\qb"), r"a\qb");
        assert_eq!(decode_quoted_path("dir\\"), "dir\\");
    }

    #[test]
    fn test_strip_diff_side_prefix() {
        assert_eq!(strip_diff_side_prefix("a/src/lib.rs"), Some("src/lib.rs"));
        assert_eq!(strip_diff_side_prefix("b/src/lib.rs"), Some("src/lib.rs"));
        assert_eq!(strip_diff_side_prefix("src/lib.rs"), Some("src/lib.rs"));
        assert_eq!(strip_diff_side_prefix("/dev/null"), None);
    }
}
