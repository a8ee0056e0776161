//! Synthetic `location` object over the decoded page URL.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::context::{ResolutionError, RewriteContext};
use crate::rewrite::Rewriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// New history entry (`assign`, `href =`, component setters).
    Assign,
    /// Current entry replaced.
    Replace,
    Reload,
}

/// A navigation the host should perform, already in proxy form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub kind: NavigationKind,
    /// Proxied URL to load.
    pub url: String,
    /// Decoded destination, for the context swap after the load.
    pub source: String,
}

/// Writable parts of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationComponent {
    Protocol,
    Host,
    Hostname,
    Port,
    Pathname,
    Search,
    Hash,
}

/// What page code sees as `location`: getters report the source URL, and
/// every mutation becomes a [`Navigation`] through the proxy.
#[derive(Debug, Clone)]
pub struct LocationProxy {
    url: Url,
    rewriter: Arc<Rewriter>,
    ctx: Arc<RewriteContext>,
}

impl LocationProxy {
    pub fn new(rewriter: Arc<Rewriter>, ctx: Arc<RewriteContext>) -> Result<Self, ResolutionError> {
        let url = Url::parse(&ctx.url).map_err(|e| ResolutionError::InvalidContext {
            url: ctx.url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { url, rewriter, ctx })
    }

    pub fn href(&self) -> String {
        self.url.to_string()
    }

    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn protocol(&self) -> String {
        format!("{}:", self.url.scheme())
    }

    pub fn host(&self) -> String {
        match (self.url.host_str(), self.url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => String::new(),
        }
    }

    pub fn hostname(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }

    /// Empty for the scheme's default port.
    pub fn port(&self) -> String {
        self.url.port().map(|p| p.to_string()).unwrap_or_default()
    }

    pub fn pathname(&self) -> String {
        self.url.path().to_string()
    }

    pub fn search(&self) -> String {
        match self.url.query() {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        }
    }

    pub fn hash(&self) -> String {
        match self.url.fragment() {
            Some(f) if !f.is_empty() => format!("#{}", f),
            _ => String::new(),
        }
    }

    fn navigation(&self, kind: NavigationKind, target: &str) -> Navigation {
        let source = self
            .ctx
            .resolve(target)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| target.to_string());
        Navigation {
            kind,
            url: self.rewriter.rewrite_url(target, &self.ctx),
            source,
        }
    }

    pub fn assign(&self, url: &str) -> Navigation {
        self.navigation(NavigationKind::Assign, url)
    }

    pub fn replace(&self, url: &str) -> Navigation {
        self.navigation(NavigationKind::Replace, url)
    }

    pub fn reload(&self) -> Navigation {
        let href = self.href();
        Navigation {
            kind: NavigationKind::Reload,
            url: self.rewriter.proxied_url(&href, &self.ctx.origin),
            source: href,
        }
    }

    pub fn set_href(&self, url: &str) -> Navigation {
        self.assign(url)
    }

    /// Applies a component setter and navigates to the result.
    /// Invalid values leave the location unchanged, as in a browser.
    pub fn set(&self, component: LocationComponent, value: &str) -> Navigation {
        let mut next = self.url.clone();
        let applied = match component {
            LocationComponent::Protocol => next.set_scheme(value.trim_end_matches(':')).is_ok(),
            LocationComponent::Host => match value.rsplit_once(':') {
                Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
                    next.set_host(Some(host)).is_ok()
                        && port.parse().ok().is_some_and(|p: u16| next.set_port(Some(p)).is_ok())
                }
                _ => next.set_host(Some(value)).is_ok(),
            },
            LocationComponent::Hostname => next.set_host(Some(value)).is_ok(),
            LocationComponent::Port => match value {
                "" => next.set_port(None).is_ok(),
                v => v.parse::<u16>().ok().is_some_and(|p| next.set_port(Some(p)).is_ok()),
            },
            LocationComponent::Pathname => {
                next.set_path(value);
                true
            }
            LocationComponent::Search => {
                let q = value.trim_start_matches('?');
                next.set_query((!q.is_empty()).then_some(q));
                true
            }
            LocationComponent::Hash => {
                let f = value.trim_start_matches('#');
                next.set_fragment((!f.is_empty()).then_some(f));
                true
            }
        };
        if !applied {
            tracing::debug!("ignoring invalid location {:?} value '{}'", component, value);
            next = self.url.clone();
        }
        self.assign(next.as_str())
    }
}

impl fmt::Display for LocationProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
