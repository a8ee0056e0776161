//! Heuristic script rewriting.
//!
//! Not a parser: a byte scanner separates code from string literals, comments
//! and regex literals, then two substitutions are applied to the code parts.
//! Location-like identifiers become [`LOCATION_IDENT`] and string-literal
//! import specifiers go through the URL rewriter. Complex scripts (computed
//! property access, shadowed names, `with` blocks) are not handled.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Identifier of the page-side location proxy.
pub const LOCATION_IDENT: &str = "__veil$location";

/// Marker of the injected bootstrap script, which is never rewritten.
pub(crate) const BOOTSTRAP_MARKER: &str = "__veil$cookies";

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:window|document|self)\s*\.\s*)?location\b")
        .expect("location regex is valid")
});

static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:import|export)\s*(?:[\w$*{}\s,]+?\s*\bfrom\s*)?(?:"([^"\\\n]*)"|'([^'\\\n]*)')"#)
        .expect("static import regex is valid")
});

static DYNAMIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*(?:"([^"\\\n]*)"|'([^'\\\n]*)')\s*\)"#)
        .expect("dynamic import regex is valid")
});

struct Edit {
    range: Range<usize>,
    text: String,
}

pub(crate) fn rewrite(code: &str, map: impl Fn(&str) -> String) -> String {
    if code.is_empty() || code.contains(BOOTSTRAP_MARKER) {
        return code.to_string();
    }
    let spans = code_spans(code);
    let in_code = |pos: usize| {
        let idx = spans.partition_point(|r| r.end <= pos);
        spans.get(idx).is_some_and(|r| r.contains(&pos))
    };

    let mut edits = Vec::new();
    for re in [&*STATIC_IMPORT, &*DYNAMIC_IMPORT] {
        for caps in re.captures_iter(code) {
            let Some(whole) = caps.get(0) else { continue };
            if !in_code(whole.start()) {
                continue;
            }
            if let Some(spec) = caps.get(1).or_else(|| caps.get(2)) {
                let text = map(spec.as_str());
                if text != spec.as_str() {
                    edits.push(Edit {
                        range: spec.range(),
                        text,
                    });
                }
            }
        }
    }
    for m in LOCATION.find_iter(code) {
        if !in_code(m.start()) || is_member_or_ident(code, m.start()) || is_object_key(code, m.range()) {
            continue;
        }
        edits.push(Edit {
            range: m.range(),
            text: LOCATION_IDENT.to_string(),
        });
    }
    apply(code, edits)
}

fn apply(code: &str, mut edits: Vec<Edit>) -> String {
    if edits.is_empty() {
        return code.to_string();
    }
    edits.sort_by_key(|e| e.range.start);
    let mut out = String::with_capacity(code.len() + edits.len() * 16);
    let mut cursor = 0;
    for edit in edits {
        if edit.range.start < cursor {
            continue;
        }
        out.push_str(&code[cursor..edit.range.start]);
        out.push_str(&edit.text);
        cursor = edit.range.end;
    }
    out.push_str(&code[cursor..]);
    out
}

/// `foo.location`, `$location`, `mylocation`: not ours.
fn is_member_or_ident(code: &str, start: usize) -> bool {
    code[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.')
}

/// `{ location: x }` or `, location: x`.
fn is_object_key(code: &str, range: Range<usize>) -> bool {
    let after = code[range.end..].trim_start();
    if !after.starts_with(':') {
        return false;
    }
    matches!(code[..range.start].trim_end().chars().next_back(), Some('{') | Some(','))
}

/// Byte ranges of `code` that are neither strings, comments nor regex literals.
fn code_spans(code: &str) -> Vec<Range<usize>> {
    let bytes = code.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut last: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        // (end of the skipped literal, whether it acts as an operand)
        let (end, operand) = match b {
            b'"' | b'\'' | b'`' => (skip_string(bytes, i), true),
            b'/' if next == Some(b'/') => (find_from(bytes, i, b"\n").unwrap_or(bytes.len()), false),
            b'/' if next == Some(b'*') => {
                (find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2), false)
            }
            b'/' if regex_allowed(last) => (skip_regex(bytes, i), true),
            _ => {
                if !b.is_ascii_whitespace() {
                    last = Some(b);
                }
                i += 1;
                continue;
            }
        };
        spans.push(start..i);
        if operand {
            last = Some(b'a');
        }
        i = end.min(bytes.len());
        start = i;
    }
    spans.push(start..bytes.len());
    spans.retain(|r| !r.is_empty());
    spans
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Returns the index just past the literal opened at `i`. Quote strings stop at a newline.
fn skip_string(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            c if c == quote => return j + 1,
            b'\n' if quote != b'`' => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn skip_regex(bytes: &[u8], i: usize) -> usize {
    let mut j = i + 1;
    let mut in_class = false;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'[' => {
                in_class = true;
                j += 1;
            }
            b']' => {
                in_class = false;
                j += 1;
            }
            b'/' if !in_class => {
                j += 1;
                while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                    j += 1;
                }
                return j;
            }
            b'\n' => return j,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// A `/` starts a regex literal after an operator or at the start of input.
fn regex_allowed(last: Option<u8>) -> bool {
    match last {
        None => true,
        Some(c) => b"(,=:[!&|?{};+-*%<>~^".contains(&c),
    }
}
