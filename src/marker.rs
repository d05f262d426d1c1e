//! START/END marker lines.
//!
//! One tolerant rule covers both glyph families:
//!
//! ```text
//! [ws] [glyphs/dashes] [CATS_|DOGS_] (START_FILE:|END_FILE:) <path> [(Content:Base64)] [---] [stray]
//! ```
//!
//! Anything alphanumeric in front of the token (other than the family tag)
//! means the line is prose that merely mentions a marker, not a marker.

use crate::bundle_format::{
    BundleKind, BASE64_HINT, CATS_FAMILY, DOGS_FAMILY, END_TOKEN, MARKER_RULE, START_TOKEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Start,
    End,
}

impl Direction {
    fn token(self) -> &'static str {
        match self {
            Direction::Start => START_TOKEN,
            Direction::End => END_TOKEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub direction: Direction,
    pub path: String,
    pub base64_hint: bool,
}

/// Recognize a marker line, returning its direction, path and hint.
pub fn scan(line: &str) -> Option<Marker> {
    let trimmed = line.trim();
    let (direction, at) = locate_token(trimmed)?;

    if !is_marker_prefix(&trimmed[..at]) {
        return None;
    }

    let rest = trimmed[at + direction.token().len()..].trim();
    let body = strip_closing_rule(rest).trim_end();
    let (body, base64_hint) = strip_hint(body);

    Some(Marker {
        direction,
        path: normalize_path(body),
        base64_hint,
    })
}

/// Format a marker line the way the writer emits it.
pub fn render(kind: BundleKind, direction: Direction, path: &str, base64_hint: bool) -> String {
    let hint = if base64_hint {
        format!(" {BASE64_HINT}")
    } else {
        String::new()
    };
    format!(
        "{} {MARKER_RULE} {}{} {path}{hint} {MARKER_RULE}",
        kind.glyph(),
        kind.family(),
        direction.token()
    )
}

/// Forward slashes, no surrounding whitespace.
pub fn normalize_path(raw: &str) -> String {
    raw.trim().replace('\\', "/")
}

fn locate_token(line: &str) -> Option<(Direction, usize)> {
    let start = line.find(START_TOKEN).map(|i| (Direction::Start, i));
    let end = line.find(END_TOKEN).map(|i| (Direction::End, i));
    match (start, end) {
        (Some(s), Some(e)) => Some(if s.1 <= e.1 { s } else { e }),
        (s, e) => s.or(e),
    }
}

fn is_marker_prefix(prefix: &str) -> bool {
    let prefix = strip_family(prefix);
    !prefix.chars().any(char::is_alphanumeric)
}

fn strip_family(prefix: &str) -> &str {
    for family in [CATS_FAMILY, DOGS_FAMILY] {
        if prefix.len() >= family.len() {
            let split = prefix.len() - family.len();
            if prefix.is_char_boundary(split) && prefix[split..].eq_ignore_ascii_case(family) {
                return &prefix[..split];
            }
        }
    }
    prefix
}

/// Cut the trailing `---` run and anything after it.
fn strip_closing_rule(rest: &str) -> &str {
    let Some(mut cut) = rest.rfind(MARKER_RULE) else {
        return rest;
    };
    while cut > 0 && rest.as_bytes()[cut - 1] == b'-' {
        cut -= 1;
    }
    &rest[..cut]
}

fn strip_hint(body: &str) -> (&str, bool) {
    if let Some(open) = body.rfind('(') {
        if body.ends_with(')') {
            let inner: String = body[open + 1..body.len() - 1]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if inner.eq_ignore_ascii_case("content:base64") {
                return (body[..open].trim_end(), true);
            }
        }
    }
    (body, false)
}
