//! Text-level document rewriting.
//!
//! Start tags are scanned and their attribute values rewritten in place;
//! everything else is copied through byte for byte. `<style>` and inline
//! `<script>` bodies go through the CSS and JS passes.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::js::BOOTSTRAP_MARKER;
use super::Rewriter;
use crate::config::ScriptRole;
use crate::context::RewriteContext;

/// Attribute marking elements the rewriter injected itself.
pub(crate) const INJECTED_ATTR: &str = "__veil-script";

static META_REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^(\s*[\d.]*\s*[;,]\s*(?:url\s*=\s*)?['"]?)([^'"]*?)(['"]?\s*)$"#)
        .expect("meta refresh regex is valid")
});

#[derive(Debug, Clone, Default)]
pub struct HtmlOptions {
    /// Input is a full document: `<base href>` is honoured and injection is allowed.
    pub document: bool,
    /// Scripts to place at the top of `<head>`.
    pub inject: Option<Injection>,
}

impl HtmlOptions {
    pub fn document() -> Self {
        Self {
            document: true,
            inject: None,
        }
    }

    pub fn with_injection(mut self, injection: Injection) -> Self {
        self.inject = Some(injection);
        self
    }
}

/// State handed to the page before the runtime scripts load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Injection {
    /// Serialized script-visible cookies for the page.
    pub cookies: String,
    /// Decoded referrer of the page.
    pub referrer: String,
}

#[derive(Debug, Error)]
pub(crate) enum HtmlError {
    #[error("unterminated {what} at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },
}

struct Attr {
    name: Range<usize>,
    value: Option<AttrValue>,
}

struct AttrValue {
    /// Raw text between the quotes (or the bare value).
    range: Range<usize>,
    quote: Option<u8>,
}

struct StartTag {
    name: String,
    attrs: Vec<Attr>,
    /// Index just past `>`.
    end: usize,
}

pub(crate) fn rewrite(
    rw: &Rewriter,
    markup: &str,
    ctx: &RewriteContext,
    options: &HtmlOptions,
) -> Result<String, HtmlError> {
    if markup.is_empty() {
        return Ok(String::new());
    }
    let mut ctx = ctx.clone();
    let mut base_seen = false;
    let injection = match &options.inject {
        Some(inj) if options.document && !markup.contains(INJECTED_ATTR) => {
            Some(injection_markup(rw, inj))
        }
        _ => None,
    };
    let mut injected = injection.is_none();

    let mut out = String::with_capacity(markup.len() + 512);
    let mut i = 0;
    while let Some(rel) = markup[i..].find('<') {
        let lt = i + rel;
        out.push_str(&markup[i..lt]);
        let rest = &markup[lt..];
        if rest.starts_with("<!--") {
            let end = rest
                .find("-->")
                .map(|p| lt + p + 3)
                .ok_or(HtmlError::Unterminated { what: "comment", offset: lt })?;
            out.push_str(&markup[lt..end]);
            i = end;
            continue;
        }
        if rest.starts_with("</") || rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest
                .find('>')
                .map(|p| lt + p + 1)
                .ok_or(HtmlError::Unterminated { what: "tag", offset: lt })?;
            out.push_str(&markup[lt..end]);
            i = end;
            continue;
        }
        if !rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            out.push('<');
            i = lt + 1;
            continue;
        }

        let tag = parse_start_tag(markup, lt)?;
        let skip = tag
            .attrs
            .iter()
            .any(|a| markup[a.name.clone()].eq_ignore_ascii_case(INJECTED_ATTR));

        if options.document && !base_seen && tag.name == "base" {
            if let Some(href) = attr_value(markup, &tag, "href") {
                base_seen = true;
                match ctx.resolve(href.trim()) {
                    Ok(base) => ctx = ctx.with_base(base),
                    Err(e) => tracing::debug!("ignoring <base href>: {}", e),
                }
            }
        }

        if skip {
            out.push_str(&markup[lt..tag.end]);
        } else {
            write_start_tag(rw, markup, lt, &tag, &ctx, &mut out);
        }
        i = tag.end;

        if !injected && tag.name == "head" {
            if let Some(inj) = &injection {
                out.push_str(inj);
            }
            injected = true;
        }

        if matches!(tag.name.as_str(), "script" | "style" | "textarea" | "title") {
            let close = find_close_tag(markup, i, &tag.name).ok_or(HtmlError::Unterminated {
                what: "raw text element",
                offset: lt,
            })?;
            let body = &markup[i..close];
            let rewritten = match tag.name.as_str() {
                "style" if !skip => rw.rewrite_css(body, &ctx),
                "script" if !skip && is_javascript(attr_value(markup, &tag, "type")) => {
                    rw.rewrite_js(body, &ctx)
                }
                _ => body.to_string(),
            };
            out.push_str(&rewritten);
            i = close;
        }
    }
    out.push_str(&markup[i..]);

    if !injected {
        if let Some(inj) = injection {
            let at = doctype_end(&out);
            out.insert_str(at, &inj);
        }
    }
    Ok(out)
}

fn write_start_tag(
    rw: &Rewriter,
    markup: &str,
    lt: usize,
    tag: &StartTag,
    ctx: &RewriteContext,
    out: &mut String,
) {
    let refresh = tag.name == "meta"
        && attr_value(markup, tag, "http-equiv").is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"));
    let mut cursor = lt;
    for attr in &tag.attrs {
        let Some(value) = &attr.value else { continue };
        let name = &markup[attr.name.clone()];
        let decoded = decode_entities(&markup[value.range.clone()]);
        let rewritten = if refresh && name.eq_ignore_ascii_case("content") {
            Some(rewrite_refresh(rw, &decoded, ctx))
        } else {
            rw.rewrite_attribute(&tag.name, name, &decoded, ctx)
        };
        let Some(rewritten) = rewritten.filter(|r| *r != decoded) else {
            continue;
        };
        out.push_str(&markup[cursor..value.range.start]);
        match value.quote {
            Some(q) => out.push_str(&escape_attr(&rewritten, q)),
            None => {
                out.push('"');
                out.push_str(&escape_attr(&rewritten, b'"'));
                out.push('"');
            }
        }
        cursor = value.range.end;
    }
    out.push_str(&markup[cursor..tag.end]);
}

/// `content="5; url=/next"` of a refresh `<meta>`.
fn rewrite_refresh(rw: &Rewriter, content: &str, ctx: &RewriteContext) -> String {
    let Some(caps) = META_REFRESH.captures(content) else {
        return content.to_string();
    };
    let url = caps.get(2).map_or("", |m| m.as_str());
    if url.trim().is_empty() {
        return content.to_string();
    }
    format!(
        "{}{}{}",
        caps.get(1).map_or("", |m| m.as_str()),
        rw.rewrite_url(url, ctx),
        caps.get(3).map_or("", |m| m.as_str())
    )
}

fn parse_start_tag(markup: &str, lt: usize) -> Result<StartTag, HtmlError> {
    let bytes = markup.as_bytes();
    let unterminated = HtmlError::Unterminated { what: "start tag", offset: lt };
    let mut i = lt + 1;
    let name_start = i;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let name = markup[name_start..i].to_ascii_lowercase();
    let mut attrs = Vec::new();
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(unterminated);
        }
        if bytes[i] == b'>' {
            return Ok(StartTag { name, attrs, end: i + 1 });
        }
        let attr_start = i;
        i += 1;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'/' | b'>' | b'=')
        {
            i += 1;
        }
        let name_range = attr_start..i;
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'=' {
            attrs.push(Attr { name: name_range, value: None });
            continue;
        }
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() {
            return Err(unterminated);
        }
        let value = match bytes[j] {
            q @ (b'"' | b'\'') => {
                let close = markup[j + 1..]
                    .find(q as char)
                    .map(|p| j + 1 + p)
                    .ok_or(HtmlError::Unterminated { what: "attribute value", offset: j })?;
                i = close + 1;
                AttrValue { range: j + 1..close, quote: Some(q) }
            }
            _ => {
                let start = j;
                while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                    j += 1;
                }
                i = j;
                AttrValue { range: start..j, quote: None }
            }
        };
        attrs.push(Attr { name: name_range, value: Some(value) });
    }
}

/// Decoded value of the first attribute called `name`.
fn attr_value<'a>(markup: &'a str, tag: &StartTag, name: &str) -> Option<&'a str> {
    tag.attrs
        .iter()
        .find(|a| markup[a.name.clone()].eq_ignore_ascii_case(name))
        .map(|a| a.value.as_ref().map_or("", |v| &markup[v.range.clone()]))
}

/// Start of the matching `</name`, case-insensitive.
fn find_close_tag(markup: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    let hay = markup.get(from..)?;
    let lower = hay.to_ascii_lowercase();
    let mut search = 0;
    while let Some(p) = lower[search..].find(&needle) {
        let at = search + p;
        let after = lower.as_bytes().get(at + needle.len()).copied();
        if after.map_or(true, |b| b.is_ascii_whitespace() || b == b'>' || b == b'/') {
            return Some(from + at);
        }
        search = at + needle.len();
    }
    None
}

fn is_javascript(ty: Option<&str>) -> bool {
    match ty.map(|t| t.trim().to_ascii_lowercase()) {
        None => true,
        Some(t) => t.is_empty() || t == "module" || t.contains("javascript") || t.contains("ecmascript"),
    }
}

fn doctype_end(out: &str) -> usize {
    let trimmed = out.trim_start();
    let lead = out.len() - trimmed.len();
    if trimmed.get(..9).is_some_and(|head| head.eq_ignore_ascii_case("<!doctype")) {
        if let Some(p) = trimmed.find('>') {
            return lead + p + 1;
        }
    }
    0
}

fn injection_markup(rw: &Rewriter, inj: &Injection) -> String {
    let json = |s: &str| {
        serde_json::to_string(s)
            .unwrap_or_else(|_| "\"\"".to_string())
            .replace("</", "<\\/")
    };
    let mut out = format!(
        "<script {attr}=\"1\">self.{marker} = {};self.__veil$referrer = {};</script>",
        json(&inj.cookies),
        json(&inj.referrer),
        attr = INJECTED_ATTR,
        marker = BOOTSTRAP_MARKER,
    );
    for role in ScriptRole::INJECTION_ORDER {
        out.push_str(&format!(
            "<script src=\"{}\" {}=\"1\"></script>",
            escape_attr(rw.config().script_path(role), b'"'),
            INJECTED_ATTR
        ));
    }
    out
}

pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let num = entity.strip_prefix('#')?;
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                        None => num.parse().ok()?,
                    };
                    char::from_u32(code)
                }
            }?;
            Some((ch, semi + 1))
        });
        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_attr(value: &str, quote: u8) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' if quote == b'"' => out.push_str("&quot;"),
            '\'' if quote == b'\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
