//! Manifest header parsing.
//!
//! A manifest starts with a header block between two `---` lines. Each header
//! line is `key: value` where the value is either plain text, taken verbatim,
//! or a single- or double-quoted YAML string. Anything that would need more
//! than one line (block scalars, indented continuations, multi-line quoted
//! strings) or a nested structure is rejected instead of being folded into a
//! string. The remainder of the file is the body and is passed through
//! untouched.

use std::path::Path;

use serde_yaml::Value;

use crate::{
    error::{ParseError, ParseErrorKind},
    types::{ManifestHeader, ParsedManifest},
};

/// Line that opens and closes the header block.
pub const HEADER_DELIMITER: &str = "---";

const BOM: char = '\u{feff}';

/// Parse raw manifest bytes read from `path`.
pub fn parse_manifest(bytes: &[u8], path: &Path) -> Result<ParsedManifest, ParseError> {
    let content = std::str::from_utf8(bytes).map_err(|e| {
        ParseError::new(path, ParseErrorKind::NonUtf8 {
            offset: e.valid_up_to(),
        })
    })?;
    parse_manifest_str(content, path)
}

/// Parse manifest text read from `path`.
pub fn parse_manifest_str(content: &str, path: &Path) -> Result<ParsedManifest, ParseError> {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    let (header, body) = split_header(content).map_err(|kind| ParseError::new(path, kind))?;
    let header = parse_header(header).map_err(|kind| ParseError::new(path, kind))?;
    Ok(ParsedManifest {
        header,
        body: body.to_string(),
    })
}

/// Split content at the `---` delimiter lines into (header, body).
fn split_header(content: &str) -> Result<(&str, &str), ParseErrorKind> {
    let mut lines = content.split_inclusive('\n');
    let first = lines.next().unwrap_or_default();
    if !is_delimiter(first) {
        return Err(ParseErrorKind::MissingOpenDelimiter);
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if is_delimiter(line) {
            let body_start = offset + line.len();
            return Ok((&content[header_start..offset], &content[body_start..]));
        }
        offset += line.len();
    }
    Err(ParseErrorKind::MissingCloseDelimiter)
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == HEADER_DELIMITER
}

fn parse_header(header: &str) -> Result<ManifestHeader, ParseErrorKind> {
    let mut fields = ManifestHeader::default();
    // Key of the previous field and whether its value was empty, so we can
    // tell a folded continuation from an indented nested block.
    let mut previous: Option<(String, bool)> = None;

    for (idx, raw) in header.lines().enumerate() {
        // Line 1 is the opening delimiter.
        let line_no = idx + 2;
        let line = raw.trim_end();
        let trimmed = line.trim_start();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indented = line.len() != trimmed.len();
        let list_item = trimmed == "-" || trimmed.starts_with("- ");
        if indented || list_item {
            return Err(match previous {
                Some((key, true)) => ParseErrorKind::NestedValue { key, line: line_no },
                Some((key, false)) if !list_item => {
                    ParseErrorKind::MultiLineValue { key, line: line_no }
                },
                _ => ParseErrorKind::MalformedLine {
                    line: line_no,
                    reason: "expected `key: value`".into(),
                },
            });
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(ParseErrorKind::MalformedLine {
                line: line_no,
                reason: "expected `key: value`".into(),
            });
        };
        let key = key.trim();
        if !is_valid_key(key) {
            return Err(ParseErrorKind::MalformedLine {
                line: line_no,
                reason: format!("invalid key `{key}`"),
            });
        }

        let value = parse_scalar(key, value.trim(), line_no)?;
        let empty = value.is_empty();
        if !fields.insert(key.to_string(), value) {
            return Err(ParseErrorKind::DuplicateKey {
                key: key.to_string(),
                line: line_no,
            });
        }
        previous = Some((key.to_string(), empty));
    }

    Ok(fields)
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Decode one single-line header value into its string form.
///
/// Plain values are published exactly as written, so `#`, `: ` and
/// number-like text survive untouched. Quoted values are decoded as YAML
/// strings.
fn parse_scalar(key: &str, raw: &str, line: usize) -> Result<String, ParseErrorKind> {
    let nested = || ParseErrorKind::NestedValue {
        key: key.to_string(),
        line,
    };
    let multi_line = || ParseErrorKind::MultiLineValue {
        key: key.to_string(),
        line,
    };
    let malformed = |reason: String| ParseErrorKind::MalformedLine { line, reason };

    match raw.chars().next() {
        None => Ok(String::new()),
        Some('|' | '>') => Err(multi_line()),
        Some('[' | '{') => Err(nested()),
        Some('-') if raw == "-" || raw.starts_with("- ") => Err(nested()),
        Some('&' | '!') => Err(malformed(format!(
            "value of `{key}` starts with a YAML anchor or tag; quote it to use it as text"
        ))),
        Some(quote @ ('"' | '\'')) => {
            let Some(end) = closing_quote(raw, quote) else {
                return Err(multi_line());
            };
            let trailing = raw[end + 1..].trim_start();
            if !trailing.is_empty() && !trailing.starts_with('#') {
                return Err(malformed(format!(
                    "value of `{key}` has trailing text after the closing quote"
                )));
            }
            match serde_yaml::from_str::<Value>(&raw[..=end]) {
                Ok(Value::String(s)) => Ok(s),
                Ok(_) => Err(malformed(format!("value of `{key}` is not a string"))),
                Err(e) => Err(malformed(format!("value of `{key}`: {e}"))),
            }
        },
        Some(_) if matches!(raw, "~" | "null" | "Null" | "NULL") => Ok(String::new()),
        Some(_) => Ok(raw.to_string()),
    }
}

/// Byte offset of the quote that closes `raw`, honoring `''` in single
/// quotes and backslash escapes in double quotes.
fn closing_quote(raw: &str, quote: char) -> Option<usize> {
    let mut chars = raw.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if quote == '"' => {
                chars.next();
            },
            '\'' if quote == '\'' => {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    return Some(i);
                }
            },
            '"' if quote == '"' => return Some(i),
            _ => {},
        }
    }
    None
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ParsedManifest, ParseErrorKind> {
        parse_manifest_str(content, Path::new("skills/demo/SKILL.md")).map_err(|e| e.kind)
    }

    #[test]
    fn parses_header_and_keeps_body_verbatim() {
        let content = "---\nname: plan-work\ndescription: \"Plan work before coding...\"\n---\n\n# Plan\n\n  indented body stays\n";
        let parsed = parse(content).unwrap();
        assert_eq!(parsed.header.get("name"), Some("plan-work"));
        assert_eq!(
            parsed.header.get("description"),
            Some("Plan work before coding...")
        );
        assert_eq!(parsed.body, "\n# Plan\n\n  indented body stays\n");
    }

    #[test]
    fn decodes_quoted_and_typed_scalars() {
        let content = "---\nname: 'it''s'\nversion: 2\nbeta: true\nempty:\nnothing: ~\nnote: \"quoted\" # trailing comment\n---\n";
        let header = parse(content).unwrap().header;
        assert_eq!(header.get("name"), Some("it's"));
        assert_eq!(header.get("version"), Some("2"));
        assert_eq!(header.get("beta"), Some("true"));
        assert_eq!(header.get("empty"), Some(""));
        assert_eq!(header.get("nothing"), Some(""));
        assert_eq!(header.get("note"), Some("quoted"));
    }

    #[test]
    fn plain_value_with_hash_is_kept_whole() {
        let header = parse("---\ndescription: Fix issue #42 before release\n---\n")
            .unwrap()
            .header;
        assert_eq!(header.get("description"), Some("Fix issue #42 before release"));
    }

    #[test]
    fn number_like_plain_values_keep_their_text() {
        for raw in ["0x10", "1.10", "1e3", "007", "yes", "+.inf"] {
            let header = parse(&format!("---\ndescription: {raw}\n---\n")).unwrap().header;
            assert_eq!(header.get("description"), Some(raw));
        }
    }

    #[test]
    fn leading_asterisk_is_prose() {
        let header = parse("---\ndescription: *bold* text\n---\n").unwrap().header;
        assert_eq!(header.get("description"), Some("*bold* text"));
    }

    #[test]
    fn anchors_and_tags_are_rejected() {
        for content in ["---\nname: &a demo\n---\n", "---\nname: !!str demo\n---\n"] {
            match parse(content) {
                Err(ParseErrorKind::MalformedLine { reason, .. }) => {
                    assert!(reason.contains("anchor or tag"), "{reason}");
                },
                other => panic!("expected malformed line, got {other:?}"),
            }
        }
    }

    #[test]
    fn text_after_closing_quote_is_malformed() {
        for content in [
            "---\ndescription: \"abc\" trailing\n---\n",
            "---\ndescription: 'it''s' here\n---\n",
        ] {
            match parse(content) {
                Err(ParseErrorKind::MalformedLine { reason, line }) => {
                    assert_eq!(line, 2);
                    assert!(reason.contains("trailing text after the closing quote"), "{reason}");
                },
                other => panic!("expected malformed line, got {other:?}"),
            }
        }
    }

    #[test]
    fn escaped_quote_does_not_close_value() {
        let header = parse("---\nname: \"say \\\"hi\\\"\"\n---\n").unwrap().header;
        assert_eq!(header.get("name"), Some("say \"hi\""));
    }

    #[test]
    fn escaped_line_break_survives_parsing() {
        let header = parse("---\nname: \"two\\nlines\"\n---\n").unwrap().header;
        assert_eq!(header.get("name"), Some("two\nlines"));
    }

    #[test]
    fn plain_value_with_colon_is_taken_verbatim() {
        let header = parse("---\ndescription: Plan: then build\n---\n").unwrap().header;
        assert_eq!(header.get("description"), Some("Plan: then build"));
    }

    #[test]
    fn tolerates_bom_crlf_blank_lines_and_comments() {
        let content = "\u{feff}---\r\n# comment\r\n\r\nname: demo\r\n---\r\nbody\r\n";
        let parsed = parse(content).unwrap();
        assert_eq!(parsed.header.get("name"), Some("demo"));
        assert_eq!(parsed.header.len(), 1);
        assert_eq!(parsed.body, "body\r\n");
    }

    #[test]
    fn empty_header_and_body() {
        let parsed = parse("---\n---").unwrap();
        assert!(parsed.header.is_empty());
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn missing_opening_delimiter() {
        assert!(matches!(
            parse("# No header\n---\nname: x\n---\n"),
            Err(ParseErrorKind::MissingOpenDelimiter)
        ));
        assert!(matches!(parse(""), Err(ParseErrorKind::MissingOpenDelimiter)));
    }

    #[test]
    fn missing_closing_delimiter() {
        assert!(matches!(
            parse("---\nname: test\nno closing\n"),
            Err(ParseErrorKind::MissingCloseDelimiter)
        ));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        match parse("---\nname: ok\njust words\n---\n") {
            Err(ParseErrorKind::MalformedLine { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed line, got {other:?}"),
        }
    }

    #[test]
    fn rejects_folded_continuation() {
        match parse("---\nname: demo\ndescription: first half\n  second half\n---\n") {
            Err(ParseErrorKind::MultiLineValue { key, line }) => {
                assert_eq!(key, "description");
                assert_eq!(line, 4);
            },
            other => panic!("expected multi-line value, got {other:?}"),
        }
    }

    #[test]
    fn rejects_block_scalars() {
        assert!(matches!(
            parse("---\ndescription: |\n  text\n---\n"),
            Err(ParseErrorKind::MultiLineValue { .. })
        ));
        assert!(matches!(
            parse("---\ndescription: >-\n  text\n---\n"),
            Err(ParseErrorKind::MultiLineValue { .. })
        ));
    }

    #[test]
    fn rejects_unterminated_quoted_value() {
        assert!(matches!(
            parse("---\ndescription: \"starts here\n  ends here\"\n---\n"),
            Err(ParseErrorKind::MultiLineValue { .. })
        ));
    }

    #[test]
    fn rejects_nested_structures() {
        for content in [
            "---\nallowed-tools: [read, write]\n---\n",
            "---\nmetadata: {a: 1}\n---\n",
            "---\nallowed-tools:\n  - read\n---\n",
            "---\nallowed-tools:\n- read\n---\n",
            "---\nmetadata:\n  nested: value\n---\n",
        ] {
            assert!(
                matches!(parse(content), Err(ParseErrorKind::NestedValue { .. })),
                "{content:?}"
            );
        }
    }

    #[test]
    fn rejects_duplicate_keys() {
        assert!(matches!(
            parse("---\nname: a\nname: b\n---\n"),
            Err(ParseErrorKind::DuplicateKey { .. })
        ));
    }

    #[test]
    fn rejects_non_utf8() {
        let err = parse_manifest(b"---\nname: \xff\n---\n", Path::new("x/SKILL.md")).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::NonUtf8 { offset: 10 }));
        assert_eq!(err.path, Path::new("x/SKILL.md"));
    }
}
