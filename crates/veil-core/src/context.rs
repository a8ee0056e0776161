//! Resolution frame for relative references in one proxied document or worker.

use thiserror::Error;
use url::Url;

/// A relative reference could not be resolved. Never fatal: callers fall back
/// to encoding the raw string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("context url '{url}' is not absolute: {reason}")]
    InvalidContext { url: String, reason: String },
    #[error("cannot resolve '{raw}': {reason}")]
    Unresolvable { raw: String, reason: String },
}

/// `{ base, origin, url }` for one document.
///
/// `origin` is where the proxy is served from (may be empty for same-origin
/// relative output); `url` is the decoded address of the page itself. Values
/// are replaced on navigation, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
    pub base: Option<Url>,
    pub origin: String,
    pub url: String,
}

impl RewriteContext {
    pub fn new(url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            base: None,
            origin: origin.into().trim_end_matches('/').to_string(),
            url: url.into(),
        }
    }

    /// Returns a copy whose relative references resolve against `base`.
    pub fn with_base(&self, base: Url) -> Self {
        Self {
            base: Some(base),
            ..self.clone()
        }
    }

    /// Returns a copy describing `url` after a navigation; the base is dropped.
    pub fn navigated(&self, url: impl Into<String>) -> Self {
        Self {
            base: None,
            origin: self.origin.clone(),
            url: url.into(),
        }
    }

    fn page_url(&self) -> Result<Url, ResolutionError> {
        Url::parse(&self.url).map_err(|e| ResolutionError::InvalidContext {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }

    /// The URL relative references resolve against: `base`, else the page URL.
    pub fn effective_base(&self) -> Result<Url, ResolutionError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => self.page_url(),
        }
    }

    /// Resolves `raw` to an absolute URL. Protocol-relative input takes the base scheme.
    pub fn resolve(&self, raw: &str) -> Result<Url, ResolutionError> {
        let base = self.effective_base()?;
        base.join(raw).map_err(|e| ResolutionError::Unresolvable {
            raw: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serialized origin of the page URL (`https://example.com`), or `null` if opaque.
    pub fn source_origin(&self) -> String {
        match self.page_url() {
            Ok(u) => u.origin().ascii_serialization(),
            Err(_) => "null".to_string(),
        }
    }

    pub fn hostname(&self) -> String {
        self.page_url()
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default()
    }

    pub fn pathname(&self) -> String {
        self.page_url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }

    pub fn is_secure(&self) -> bool {
        matches!(
            self.page_url().map(|u| u.scheme().to_string()).as_deref(),
            Ok("https") | Ok("wss")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RewriteContext {
        RewriteContext::new("https://example.com/dir/page.html?x=1", "http://proxy.local")
    }

    #[test]
    fn resolves_relative_and_absolute_references() {
        let c = ctx();
        assert_eq!(c.resolve("img.png").unwrap().as_str(), "https://example.com/dir/img.png");
        assert_eq!(c.resolve("/a").unwrap().as_str(), "https://example.com/a");
        assert_eq!(c.resolve("../up").unwrap().as_str(), "https://example.com/up");
        assert_eq!(
            c.resolve("http://other.org/x").unwrap().as_str(),
            "http://other.org/x"
        );
    }

    #[test]
    fn protocol_relative_takes_context_scheme() {
        assert_eq!(
            ctx().resolve("//cdn.example.net/lib.js").unwrap().as_str(),
            "https://cdn.example.net/lib.js"
        );
    }

    #[test]
    fn base_wins_over_page_url() {
        let c = ctx().with_base(Url::parse("https://static.example.com/assets/").unwrap());
        assert_eq!(
            c.resolve("a.css").unwrap().as_str(),
            "https://static.example.com/assets/a.css"
        );
        assert_eq!(c.url, ctx().url);
    }

    #[test]
    fn unparseable_page_url_is_a_resolution_error() {
        let c = RewriteContext::new("not a url", "");
        assert!(matches!(
            c.resolve("a"),
            Err(ResolutionError::InvalidContext { .. })
        ));
        assert_eq!(c.source_origin(), "null");
        assert!(!c.is_secure());
    }

    #[test]
    fn page_helpers() {
        let c = ctx();
        assert_eq!(c.source_origin(), "https://example.com");
        assert_eq!(c.hostname(), "example.com");
        assert_eq!(c.pathname(), "/dir/page.html");
        assert!(c.is_secure());
        assert_eq!(c.origin, "http://proxy.local");
        assert_eq!(c.navigated("http://a.b/").base, None);
    }
}
