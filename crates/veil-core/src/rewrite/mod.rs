//! Content rewriter: maps URL-bearing text to its proxied form and back.
//!
//! Every pass is built on [`Rewriter::rewrite_url`], which is idempotent:
//! rewriting already-proxied text leaves it unchanged. The rewriter holds only
//! the immutable [`ProxyConfig`] and is safe to share across threads.

mod attrs;
mod css;
mod html;
mod js;
mod srcset;

use std::sync::LazyLock;

use regex::Regex;

use crate::codec::DecodeError;
use crate::config::ProxyConfig;
use crate::context::RewriteContext;

pub use attrs::{classify_attribute, AttributeKind, EVENT_ATTRIBUTES, FORBIDDEN_ATTRIBUTES, URL_ATTRIBUTES};
pub use html::{HtmlOptions, Injection};
pub use js::LOCATION_IDENT;

/// References that are never routed through the proxy.
static SKIP_SCHEMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:#|about:|data:|mailto:|blob:|javascript:|tel:)")
        .expect("skip-scheme regex is valid")
});

#[derive(Debug, Clone)]
pub struct Rewriter {
    config: ProxyConfig,
}

impl Rewriter {
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Returns true if `value` already points into the proxy.
    pub fn is_proxied(&self, value: &str, ctx: &RewriteContext) -> bool {
        self.strip_prefix(value, ctx).is_some()
    }

    fn strip_prefix<'a>(&self, value: &'a str, ctx: &RewriteContext) -> Option<&'a str> {
        let prefix = self.prefix();
        if !ctx.origin.is_empty() {
            if let Some(rest) = value
                .strip_prefix(ctx.origin.as_str())
                .and_then(|r| r.strip_prefix(prefix))
            {
                return Some(rest);
            }
        }
        value.strip_prefix(prefix)
    }

    /// Rewrites one reference to `origin + prefix + token`.
    pub fn rewrite_url(&self, raw: &str, ctx: &RewriteContext) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return raw.to_string();
        }
        if SKIP_SCHEMES.is_match(trimmed) {
            if let Some(body) = strip_prefix_ignore_case(trimmed, "javascript:") {
                return format!("javascript:{}", self.rewrite_js(body, ctx));
            }
            return raw.to_string();
        }
        if self.is_proxied(trimmed, ctx) {
            return raw.to_string();
        }
        let absolute = match ctx.resolve(trimmed) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::debug!("encoding unresolved reference verbatim: {}", e);
                trimmed.to_string()
            }
        };
        self.proxied_url(&absolute, &ctx.origin)
    }

    /// `origin + prefix + encode(absolute)` without any resolution.
    pub fn proxied_url(&self, absolute: &str, origin: &str) -> String {
        format!(
            "{}{}{}",
            origin,
            self.config.prefix,
            self.config.codec.encode(absolute)
        )
    }

    /// Decodes a proxied reference. `Ok(None)` means it was never proxied.
    pub fn try_source_url(
        &self,
        proxied: &str,
        ctx: &RewriteContext,
    ) -> Result<Option<String>, DecodeError> {
        let Some(rest) = self.strip_prefix(proxied.trim(), ctx) else {
            return Ok(None);
        };
        let (token, query, fragment) = split_token(rest, self.config.codec);
        let mut url = self.config.codec.decode(token)?;
        if let Some(query) = query {
            merge_query(&mut url, query);
        }
        if let Some(fragment) = fragment {
            url.push('#');
            url.push_str(fragment);
        }
        Ok(Some(url))
    }

    /// Inverse of [`rewrite_url`](Self::rewrite_url). Unproxied or undecodable input is returned unchanged.
    pub fn source_url(&self, proxied: &str, ctx: &RewriteContext) -> String {
        match self.try_source_url(proxied, ctx) {
            Ok(Some(url)) => url,
            Ok(None) => proxied.to_string(),
            Err(e) => {
                tracing::debug!("leaving undecodable reference as is: {}", e);
                proxied.to_string()
            }
        }
    }

    pub fn rewrite_css(&self, css: &str, ctx: &RewriteContext) -> String {
        css::recast(css, |u| self.rewrite_url(u, ctx))
    }

    pub fn source_css(&self, css: &str, ctx: &RewriteContext) -> String {
        css::recast(css, |u| self.source_url(u, ctx))
    }

    pub fn rewrite_srcset(&self, srcset: &str, ctx: &RewriteContext) -> String {
        srcset::recast(srcset, |u| self.rewrite_url(u, ctx))
    }

    pub fn source_srcset(&self, srcset: &str, ctx: &RewriteContext) -> String {
        srcset::recast(srcset, |u| self.source_url(u, ctx))
    }

    /// Heuristic JS pass: location identifiers and string-literal import specifiers.
    pub fn rewrite_js(&self, code: &str, ctx: &RewriteContext) -> String {
        js::rewrite(code, |u| self.rewrite_url(u, ctx))
    }

    /// Rewrites one attribute value. `None` means the attribute passes through unchanged.
    pub fn rewrite_attribute(
        &self,
        tag: &str,
        name: &str,
        value: &str,
        ctx: &RewriteContext,
    ) -> Option<String> {
        match classify_attribute(tag, name) {
            AttributeKind::Url => Some(self.rewrite_url(value, ctx)),
            AttributeKind::Srcset => Some(self.rewrite_srcset(value, ctx)),
            AttributeKind::Style => Some(self.rewrite_css(value, ctx)),
            AttributeKind::Html => Some(self.rewrite_html(value, ctx, &HtmlOptions::default())),
            AttributeKind::EventHandler => Some(self.rewrite_js(value, ctx)),
            AttributeKind::Forbidden | AttributeKind::Other => None,
        }
    }

    /// Inverse of [`rewrite_attribute`](Self::rewrite_attribute) for values read back by the page.
    pub fn source_attribute(
        &self,
        tag: &str,
        name: &str,
        value: &str,
        ctx: &RewriteContext,
    ) -> Option<String> {
        match classify_attribute(tag, name) {
            AttributeKind::Url => Some(self.source_url(value, ctx)),
            AttributeKind::Srcset => Some(self.source_srcset(value, ctx)),
            AttributeKind::Style => Some(self.source_css(value, ctx)),
            _ => None,
        }
    }

    /// Rewrites a whole document or fragment; see [`HtmlOptions`].
    pub fn rewrite_html(&self, markup: &str, ctx: &RewriteContext, options: &HtmlOptions) -> String {
        match html::rewrite(self, markup, ctx, options) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!("html rewrite failed, passing markup through: {}", e);
                markup.to_string()
            }
        }
    }
}

/// Splits `token[?query][#fragment]`. The `none` codec keeps its query inside the token.
fn split_token(rest: &str, codec: crate::codec::CodecId) -> (&str, Option<&str>, Option<&str>) {
    if codec == crate::codec::CodecId::None {
        return (rest, None, None);
    }
    let (before_hash, fragment) = match rest.split_once('#') {
        Some((a, b)) => (a, Some(b)),
        None => (rest, None),
    };
    match before_hash.split_once('?') {
        Some((token, query)) => (token, Some(query), fragment),
        None => (before_hash, None, fragment),
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Appends a request query string to a decoded target URL.
pub fn merge_query(url: &mut String, query: &str) {
    if query.is_empty() {
        return;
    }
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(query);
}
