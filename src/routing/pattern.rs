//! Compiled path patterns with named captures.
//!
//! A pattern is literal runs interleaved with `:name` captures, e.g.
//! `/institutions/:epbcID/fees`. A capture consumes characters up to the
//! next literal delimiter or path-segment boundary, never across a `/`.
//! Matched substrings are URL-unescaped and exposed under their `:name`
//! key, colon included.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

/// Multi-valued capture map; a name appearing twice in one pattern
/// collects both values in order.
pub type Captures = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Capture(String),
}

#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern string. Capture names are alphanumeric runs
    /// (plus `_`); any other character ends the capture and resumes a
    /// literal.
    pub fn compile(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            if chars[i] == ':' {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                i += 1;
                let mut name = String::from(":");
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    name.push(chars[i]);
                    i += 1;
                }
                segments.push(Segment::Capture(name));
            } else {
                literal.push(chars[i]);
                i += 1;
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Structural match against a path (prefix already stripped). Returns
    /// the captures on success, `None` when the path does not fit.
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let mut rest = path;
        let mut captures = Captures::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    rest = rest.strip_prefix(lit.as_str())?;
                }
                Segment::Capture(name) => {
                    // A capture stops at the segment boundary, or earlier
                    // at the start of the next literal.
                    let boundary = rest.find('/').unwrap_or(rest.len());
                    let end = match self.segments.get(i + 1) {
                        Some(Segment::Literal(lit)) if !lit.starts_with('/') => {
                            rest[..boundary].find(lit.as_str())?
                        }
                        _ => boundary,
                    };
                    if end == 0 {
                        return None;
                    }
                    let value = percent_decode_str(&rest[..end])
                        .decode_utf8_lossy()
                        .into_owned();
                    captures.entry(name.clone()).or_default().push(value);
                    rest = &rest[end..];
                }
            }
        }

        if rest.is_empty() {
            Some(captures)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_only() {
        let p = Pattern::compile("/fees");
        assert!(p.matches("/fees").is_some());
        assert!(p.matches("/fees/extra").is_none());
        assert!(p.matches("/other").is_none());
    }

    #[test]
    fn test_single_capture() {
        let p = Pattern::compile("/institutions/:epbcID/fees");
        let caps = p.matches("/institutions/SFU/fees").unwrap();
        assert_eq!(caps[":epbcID"], vec!["SFU".to_string()]);
    }

    #[test]
    fn test_capture_stops_at_segment_boundary() {
        let p = Pattern::compile("/institutions/:epbcID");
        assert!(p.matches("/institutions/SFU/fees").is_none());
        let caps = p.matches("/institutions/SFU").unwrap();
        assert_eq!(caps[":epbcID"], vec!["SFU".to_string()]);
    }

    #[test]
    fn test_capture_with_inline_literal() {
        let p = Pattern::compile("/files/:name.json");
        let caps = p.matches("/files/report.json").unwrap();
        assert_eq!(caps[":name"], vec!["report".to_string()]);
        assert!(p.matches("/files/report.xml").is_none());
    }

    #[test]
    fn test_empty_capture_rejected() {
        let p = Pattern::compile("/institutions/:epbcID/fees");
        assert!(p.matches("/institutions//fees").is_none());
    }

    #[test]
    fn test_capture_is_url_unescaped() {
        let p = Pattern::compile("/institutions/:epbcID");
        let caps = p.matches("/institutions/Simon%20Fraser").unwrap();
        assert_eq!(caps[":epbcID"], vec!["Simon Fraser".to_string()]);
    }

    #[test]
    fn test_repeated_capture_name_collects_values() {
        let p = Pattern::compile("/pair/:id/:id");
        let caps = p.matches("/pair/a/b").unwrap();
        assert_eq!(caps[":id"], vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_multiple_captures() {
        let p = Pattern::compile("/t/:tenant/u/:user");
        let caps = p.matches("/t/acme/u/alice").unwrap();
        assert_eq!(caps[":tenant"], vec!["acme".to_string()]);
        assert_eq!(caps[":user"], vec!["alice".to_string()]);
    }
}
