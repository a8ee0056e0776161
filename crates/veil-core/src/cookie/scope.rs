//! Visibility of a cookie from a given document.

use super::Cookie;
use crate::context::RewriteContext;

/// `.example.com` matches `example.com` and any subdomain; a domain without a
/// leading dot matches only itself.
pub fn domain_matches(domain: &str, hostname: &str) -> bool {
    let hostname = hostname.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    match domain.strip_prefix('.') {
        Some(suffix) => hostname == suffix || hostname.ends_with(&format!(".{}", suffix)),
        None => hostname == domain,
    }
}

/// Whether `cookie` would be exposed to the document described by `ctx`.
pub fn is_visible(cookie: &Cookie, ctx: &RewriteContext, is_script: bool) -> bool {
    if cookie.http_only && is_script {
        return false;
    }
    if let Some(domain) = &cookie.domain {
        if !domain_matches(domain, &ctx.hostname()) {
            return false;
        }
    }
    if cookie.secure && !ctx.is_secure() {
        return false;
    }
    if let Some(path) = &cookie.path {
        if !ctx.pathname().starts_with(path.as_str()) {
            return false;
        }
    }
    true
}

/// `name=value` pairs of the visible cookies, in input order, joined with `; `.
pub fn serialize<'a>(
    cookies: impl IntoIterator<Item = &'a Cookie>,
    ctx: &RewriteContext,
    is_script: bool,
) -> String {
    cookies
        .into_iter()
        .filter(|c| is_visible(c, ctx, is_script))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(url: &str) -> RewriteContext {
        RewriteContext::new(url, "")
    }

    #[test]
    fn dotted_domain_matches_parent_and_subdomains() {
        let c = Cookie::new("a", "1").with_domain(".example.com").with_path("/");
        assert!(is_visible(&c, &at("https://sub.example.com/x"), false));
        assert!(is_visible(&c, &at("http://example.com/x"), false));
        assert!(!is_visible(&c, &at("https://other.com/x"), false));
        assert!(!is_visible(&c, &at("https://badexample.com/x"), false));
    }

    #[test]
    fn bare_domain_is_exact() {
        let c = Cookie::new("a", "1").with_domain("example.com");
        assert!(is_visible(&c, &at("https://example.com/"), false));
        assert!(!is_visible(&c, &at("https://www.example.com/"), false));
    }

    #[test]
    fn http_only_hidden_from_scripts() {
        let c = Cookie::new("a", "1").http_only(true);
        assert!(is_visible(&c, &at("https://example.com/"), false));
        assert!(!is_visible(&c, &at("https://example.com/"), true));
    }

    #[test]
    fn secure_needs_secure_context() {
        let c = Cookie::new("a", "1").secure(true);
        assert!(is_visible(&c, &at("https://example.com/"), true));
        assert!(!is_visible(&c, &at("http://example.com/"), true));
    }

    #[test]
    fn path_is_a_prefix_match() {
        let c = Cookie::new("a", "1").with_path("/docs");
        assert!(is_visible(&c, &at("https://example.com/docs/x"), true));
        assert!(!is_visible(&c, &at("https://example.com/blog"), true));
    }

    #[test]
    fn absent_scope_always_matches() {
        let c = Cookie::new("a", "1");
        assert!(is_visible(&c, &at("https://anything.test/deep/path"), true));
    }

    #[test]
    fn serialize_keeps_order_and_filters() {
        let cookies = vec![
            Cookie::new("z", "1"),
            Cookie::new("hidden", "2").http_only(true),
            Cookie::new("a", "3").with_domain(".example.com"),
            Cookie::new("other", "4").with_domain("other.com"),
        ];
        let ctx = at("https://www.example.com/");
        assert_eq!(serialize(&cookies, &ctx, true), "z=1; a=3");
        assert_eq!(serialize(&cookies, &ctx, false), "z=1; hidden=2; a=3");
        assert_eq!(serialize(&[], &ctx, false), "");
    }
}
