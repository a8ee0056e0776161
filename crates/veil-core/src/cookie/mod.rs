//! Cookie parsing and browser-equivalent scoping.
//!
//! [`is_visible`] and [`serialize`] are pure predicates over a cookie and a
//! [`RewriteContext`]; [`CookieJar`] and [`CookieStore`] hold cookies for the
//! interception layer and, when enabled, for the network edge.

mod jar;
mod scope;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::context::RewriteContext;

pub use jar::{site_of, CookieJar, CookieStore};
pub use scope::{domain_matches, is_visible, serialize};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("cookie string has no name=value pair: '{0}'")]
    MissingPair(String),
    #[error("cookie domain '{domain}' does not match host '{host}'")]
    DomainMismatch { domain: String, host: String },
    #[error("scripts cannot set HttpOnly cookie '{0}'")]
    HttpOnlyFromScript(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// One cookie.
///
/// `domain` starting with `.` matches subdomains; without a dot it is
/// host-only. `None` for `domain` or `path` always matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    /// Absolute expiry from `Max-Age` (preferred) or `Expires`; `None` is a session cookie.
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            same_site: None,
            expires: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into().to_ascii_lowercase());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Parses a `Set-Cookie` value (or a `document.cookie` assignment).
    ///
    /// A `Domain` attribute becomes a dot-prefixed domain cookie after it is
    /// checked against the context host; without one the cookie is host-only
    /// for the context host. Without `Path` the directory of the context path
    /// is used.
    pub fn parse_set_cookie(header: &str, ctx: &RewriteContext) -> Result<Cookie, CookieError> {
        Self::parse_at(header, ctx, Utc::now())
    }

    pub(crate) fn parse_at(
        header: &str,
        ctx: &RewriteContext,
        now: DateTime<Utc>,
    ) -> Result<Cookie, CookieError> {
        let mut parts = header.split(';');
        let pair = parts.next().unwrap_or_default();
        let (name, value) = pair
            .split_once('=')
            .map(|(n, v)| (n.trim(), v.trim()))
            .filter(|(n, _)| !n.is_empty())
            .ok_or_else(|| CookieError::MissingPair(header.to_string()))?;

        let mut cookie = Cookie::new(name, value.trim_matches('"'));
        let mut max_age: Option<i64> = None;
        let mut expires: Option<DateTime<Utc>> = None;
        let mut domain_attr: Option<String> = None;

        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (attr, val) = match part.split_once('=') {
                Some((a, v)) => (a.trim().to_ascii_lowercase(), v.trim()),
                None => (part.to_ascii_lowercase(), ""),
            };
            match attr.as_str() {
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "path" if val.starts_with('/') => cookie.path = Some(val.to_string()),
                "domain" if !val.is_empty() => {
                    domain_attr = Some(val.trim_start_matches('.').to_ascii_lowercase())
                }
                "max-age" => max_age = val.parse().ok(),
                "expires" => {
                    expires = DateTime::parse_from_rfc2822(val)
                        .ok()
                        .map(|d| d.with_timezone(&Utc))
                }
                "samesite" => cookie.same_site = SameSite::parse(val),
                _ => {}
            }
        }

        let host = ctx.hostname();
        cookie.domain = Some(match domain_attr {
            Some(domain) => {
                if host != domain && !host.ends_with(&format!(".{}", domain)) {
                    return Err(CookieError::DomainMismatch { domain, host });
                }
                format!(".{}", domain)
            }
            None => host,
        });
        if cookie.path.is_none() {
            cookie.path = Some(default_path(&ctx.pathname()));
        }
        cookie.expires = match max_age {
            Some(secs) if secs <= 0 => Some(DateTime::<Utc>::MIN_UTC),
            Some(secs) => Some(now + Duration::seconds(secs.min(i64::from(i32::MAX)))),
            None => expires,
        };
        Ok(cookie)
    }
}

/// Directory of a request path: `/a/b.html` → `/a`, `/x` → `/`.
fn default_path(pathname: &str) -> String {
    if !pathname.starts_with('/') {
        return "/".to_string();
    }
    match pathname.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => pathname[..i].to_string(),
    }
}
