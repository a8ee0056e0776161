//! `url(...)` and `@import "..."` references in stylesheets and declarations.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static URL_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#)
        .expect("css url regex is valid")
});

static IMPORT_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).expect("css import regex is valid")
});

/// Replaces the captured URL inside the whole match, leaving quotes and spacing alone.
fn replace_inner(caps: &Captures<'_>, map: &impl Fn(&str) -> String) -> String {
    let whole = caps.get(0).map(|m| (m.start(), m.as_str())).unwrap_or((0, ""));
    let inner = (1..caps.len()).find_map(|i| caps.get(i));
    let Some(inner) = inner else {
        return whole.1.to_string();
    };
    let value = inner.as_str();
    if value.trim().is_empty() {
        return whole.1.to_string();
    }
    let start = inner.start() - whole.0;
    let end = inner.end() - whole.0;
    format!("{}{}{}", &whole.1[..start], map(value), &whole.1[end..])
}

/// Applies `map` to every stylesheet reference. `data:` payloads are left to
/// `map`, which skips them.
pub(crate) fn recast(css: &str, map: impl Fn(&str) -> String) -> String {
    if css.is_empty() {
        return String::new();
    }
    let out = URL_FUNCTION.replace_all(css, |caps: &Captures<'_>| replace_inner(caps, &map));
    IMPORT_STRING
        .replace_all(&out, |caps: &Captures<'_>| replace_inner(caps, &map))
        .into_owned()
}
