//! In-memory cookie storage.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{domain_matches, serialize, Cookie, CookieError};
use crate::context::RewriteContext;

/// Ordered cookies keyed by `(name, domain, path)`.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

fn same_key(a: &Cookie, b: &Cookie) -> bool {
    a.name == b.name && a.domain == b.domain && a.path == b.path
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Stores `cookie`, replacing an existing one with the same key in place.
    /// An already-expired cookie deletes the stored one instead.
    pub fn set(&mut self, cookie: Cookie) {
        self.set_at(cookie, Utc::now());
    }

    fn set_at(&mut self, cookie: Cookie, now: DateTime<Utc>) {
        let existing = self.cookies.iter().position(|c| same_key(c, &cookie));
        match (existing, cookie.is_expired(now)) {
            (Some(i), true) => {
                self.cookies.remove(i);
            }
            (None, true) => {}
            (Some(i), false) => self.cookies[i] = cookie,
            (None, false) => self.cookies.push(cookie),
        }
    }

    /// Applies a response `Set-Cookie` header received for `ctx`.
    pub fn set_from_header(&mut self, header: &str, ctx: &RewriteContext) -> Result<(), CookieError> {
        let cookie = Cookie::parse_set_cookie(header, ctx)?;
        self.set(cookie);
        Ok(())
    }

    /// Applies a `document.cookie = "..."` assignment made by a script.
    ///
    /// Scripts can neither create HttpOnly cookies nor overwrite existing ones.
    pub fn set_from_script(&mut self, assignment: &str, ctx: &RewriteContext) -> Result<(), CookieError> {
        let cookie = Cookie::parse_set_cookie(assignment, ctx)?;
        if cookie.http_only || self.cookies.iter().any(|c| c.http_only && same_key(c, &cookie)) {
            return Err(CookieError::HttpOnlyFromScript(cookie.name));
        }
        if let Some(domain) = &cookie.domain {
            if !domain_matches(domain, &ctx.hostname()) {
                return Err(CookieError::DomainMismatch {
                    domain: domain.clone(),
                    host: ctx.hostname(),
                });
            }
        }
        self.set(cookie);
        Ok(())
    }

    /// Drops expired cookies.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.cookies.retain(|c| !c.is_expired(now));
    }

    /// `Cookie` header (or `document.cookie` value) for `ctx`.
    pub fn header_value(&self, ctx: &RewriteContext, is_script: bool) -> String {
        let now = Utc::now();
        serialize(
            self.cookies.iter().filter(|c| !c.is_expired(now)),
            ctx,
            is_script,
        )
    }
}

/// Last two labels of a host name, used to group cookies by site.
///
/// Not public-suffix aware: `a.example.co.uk` groups under `co.uk`, which only
/// coarsens grouping; domain matching still scopes every read.
pub fn site_of(hostname: &str) -> String {
    let host = hostname.trim_end_matches('.').to_ascii_lowercase();
    if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return host;
    }
    let labels: Vec<&str> = host.rsplitn(3, '.').collect();
    match labels.as_slice() {
        [tld, sld, ..] => format!("{}.{}", sld, tld),
        _ => host,
    }
}

/// Process-wide site → [`CookieJar`] map for server-side cookie handling.
#[derive(Debug, Default)]
pub struct CookieStore {
    jars: RwLock<HashMap<String, CookieJar>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs a `Set-Cookie` header from a response for `ctx`.
    pub fn store(&self, header: &str, ctx: &RewriteContext) -> Result<(), CookieError> {
        let cookie = Cookie::parse_set_cookie(header, ctx)?;
        let site = site_of(&ctx.hostname());
        let mut jars = self.jars.write().unwrap_or_else(|e| e.into_inner());
        jars.entry(site).or_default().set(cookie);
        Ok(())
    }

    /// `Cookie` request header for `ctx`, if any cookie is visible.
    pub fn header_for(&self, ctx: &RewriteContext) -> Option<String> {
        let jars = self.jars.read().unwrap_or_else(|e| e.into_inner());
        let value = jars.get(&site_of(&ctx.hostname()))?.header_value(ctx, false);
        (!value.is_empty()).then_some(value)
    }

    /// Script-visible cookies for `ctx`, as handed to a page on load.
    pub fn script_cookies(&self, ctx: &RewriteContext) -> String {
        let jars = self.jars.read().unwrap_or_else(|e| e.into_inner());
        jars.get(&site_of(&ctx.hostname()))
            .map(|jar| jar.header_value(ctx, true))
            .unwrap_or_default()
    }

    /// Snapshot of one site's jar.
    pub fn jar(&self, site: &str) -> Option<CookieJar> {
        let jars = self.jars.read().unwrap_or_else(|e| e.into_inner());
        jars.get(site).cloned()
    }

    pub fn site_count(&self) -> usize {
        self.jars.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ctx(url: &str) -> RewriteContext {
        RewriteContext::new(url, "")
    }

    #[test]
    fn replaces_in_place_and_keeps_order() {
        let c = ctx("https://example.com/");
        let mut jar = CookieJar::new();
        jar.set_from_header("a=1; Path=/", &c).unwrap();
        jar.set_from_header("b=2; Path=/", &c).unwrap();
        jar.set_from_header("a=3; Path=/", &c).unwrap();
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.header_value(&c, true), "a=3; b=2");
    }

    #[test]
    fn same_name_different_path_is_distinct() {
        let c = ctx("https://example.com/docs/x");
        let mut jar = CookieJar::new();
        jar.set_from_header("a=1; Path=/", &c).unwrap();
        jar.set_from_header("a=2; Path=/docs", &c).unwrap();
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.header_value(&ctx("https://example.com/"), true), "a=1");
    }

    #[test]
    fn non_positive_max_age_deletes() {
        let c = ctx("https://example.com/");
        let mut jar = CookieJar::new();
        jar.set_from_header("a=1; Path=/", &c).unwrap();
        jar.set_from_header("a=; Path=/; Max-Age=0", &c).unwrap();
        assert!(jar.is_empty());
        jar.set_from_header("b=; Path=/; Max-Age=-1", &c).unwrap();
        assert!(jar.is_empty());
    }

    #[test]
    fn scripts_cannot_touch_http_only() {
        let c = ctx("https://example.com/");
        let mut jar = CookieJar::new();
        assert!(matches!(
            jar.set_from_script("a=1; HttpOnly", &c),
            Err(CookieError::HttpOnlyFromScript(_))
        ));
        jar.set_from_header("sid=s; Path=/; HttpOnly", &c).unwrap();
        assert!(jar.set_from_script("sid=evil; Path=/", &c).is_err());
        jar.set_from_script("theme=dark; Path=/", &c).unwrap();
        assert_eq!(jar.header_value(&c, true), "theme=dark");
        assert_eq!(jar.header_value(&c, false), "sid=s; theme=dark");
    }

    #[test]
    fn scripts_cannot_set_foreign_domains() {
        let mut jar = CookieJar::new();
        let err = jar
            .set_from_script("a=1; Domain=evil.com", &ctx("https://example.com/"))
            .unwrap_err();
        assert!(matches!(err, CookieError::DomainMismatch { .. }));
        assert!(jar.is_empty());
    }

    #[test]
    fn purge_drops_expired() {
        let c = ctx("https://example.com/");
        let mut jar = CookieJar::new();
        jar.set_from_header("a=1; Max-Age=10", &c).unwrap();
        jar.set_from_header("b=1", &c).unwrap();
        jar.purge_expired(Utc::now() + Duration::seconds(60));
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.iter().next().map(|c| c.name.as_str()), Some("b"));
    }

    #[test]
    fn site_grouping() {
        assert_eq!(site_of("a.b.example.com"), "example.com");
        assert_eq!(site_of("example.com"), "example.com");
        assert_eq!(site_of("localhost"), "localhost");
        assert_eq!(site_of("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn store_shares_domain_cookies_across_subdomains() {
        let store = CookieStore::new();
        store
            .store("sid=1; Domain=example.com; Path=/", &ctx("https://login.example.com/"))
            .unwrap();
        store
            .store("local=2; Path=/", &ctx("https://login.example.com/"))
            .unwrap();
        assert_eq!(store.site_count(), 1);
        assert_eq!(
            store.header_for(&ctx("https://www.example.com/page")).as_deref(),
            Some("sid=1")
        );
        assert_eq!(
            store.header_for(&ctx("https://login.example.com/")).as_deref(),
            Some("sid=1; local=2")
        );
        assert_eq!(store.header_for(&ctx("https://other.org/")), None);
        assert_eq!(store.jar("example.com").map(|j| j.len()), Some(2));
    }
}
