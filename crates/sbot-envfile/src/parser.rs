//! Line classifier for environment files.

use crate::document::{EnvDocument, Line};

/// Parse environment file text into an ordered document.
///
/// Parsing never fails: lines that are not `KEY=VALUE` pairs are kept as
/// opaque text so the document serializes back unchanged.
pub fn parse(text: &str) -> EnvDocument {
    let mut lines = Vec::new();
    let mut crlf = Vec::new();

    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
        let raw = &rest[..pos];
        // Each line keeps its own terminator so mixed files round-trip
        match raw.strip_suffix('\r') {
            Some(stripped) => {
                lines.push(classify(stripped));
                crlf.push(true);
            }
            None => {
                lines.push(classify(raw));
                crlf.push(false);
            }
        }
        rest = &rest[pos + 1..];
    }

    let trailing_newline = rest.is_empty() && !text.is_empty();
    if !rest.is_empty() {
        lines.push(classify(rest));
        crlf.push(false);
    }

    EnvDocument::from_parts(lines, crlf, trailing_newline)
}

fn classify(raw: &str) -> Line {
    if raw.is_empty() {
        return Line::Blank;
    }
    if raw.trim_start().starts_with('#') {
        return Line::Comment(raw.to_string());
    }
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Line::Entry {
            key: key.to_string(),
            value: value.to_string(),
        },
        _ => Line::Other(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lines() {
        assert_eq!(classify(""), Line::Blank);
        assert_eq!(classify("# comment"), Line::Comment("# comment".into()));
        assert_eq!(classify("  # A=B"), Line::Comment("  # A=B".into()));
        assert_eq!(
            classify("A=b=c"),
            Line::Entry {
                key: "A".into(),
                value: "b=c".into()
            }
        );
        assert_eq!(classify("=value"), Line::Other("=value".into()));
        assert_eq!(classify("export"), Line::Other("export".into()));
    }

    #[test]
    fn test_parse_empty() {
        let doc = parse("");
        assert!(doc.lines().is_empty());
        assert_eq!(doc.to_string(), "");
    }

    #[test]
    fn test_parse_single_newline() {
        let doc = parse("\n");
        assert_eq!(doc.lines(), &[Line::Blank]);
        assert_eq!(doc.to_string(), "\n");
    }

    #[test]
    fn test_parse_keeps_key_spacing_literal() {
        let doc = parse("KEY = value\n");
        assert_eq!(doc.get("KEY"), None);
        assert_eq!(doc.get("KEY "), Some(" value"));
    }

    #[test]
    fn test_parse_crlf() {
        let text = "A=1\r\nB=2\r\n";
        let doc = parse(text);
        assert_eq!(doc.get("A"), Some("1"));
        assert_eq!(doc.get("B"), Some("2"));
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn test_parse_mixed_line_endings() {
        for text in [
            "A=1\r\nB=2\nC=3\r\n",
            "# windows header\r\nA=1\n\r\nB=2",
            "A=1\nB=2\r\n",
            "A=1\r",
        ] {
            assert_eq!(parse(text).to_string(), text, "text {:?}", text);
        }
        assert_eq!(parse("A=1\r\nB=2\n").get("A"), Some("1"));
    }

    #[test]
    fn test_verbatim_round_trip() {
        let text = "# Bot settings\nBOT_TOKEN=changeme\n\n  indented line\nREDIS_HOST=redis\n# end";
        assert_eq!(parse(text).to_string(), text);
    }
}
