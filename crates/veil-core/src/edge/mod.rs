//! Network edge: proxy-prefixed request in, upstream response out.
//!
//! Each request moves through `Received → Decoded → Forwarded` and ends in
//! one of the [`EdgeOutcome`] states. Every stage is a method of its own
//! ([`NetworkEdge::decode`], [`NetworkEdge::forward`], [`NetworkEdge::finish`])
//! so a front-end can drive them separately; [`NetworkEdge::handle`] runs all
//! three. The edge never retries: a transport failure is final.

mod executor;
mod transfer;

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::codec::DecodeError;
use crate::config::{EdgeConfig, ProxyConfig};
use crate::context::RewriteContext;
use crate::cookie::CookieStore;
use crate::rewrite::{merge_query, HtmlOptions, Injection, Rewriter};

pub use executor::{FetchExecutor, FetchExecutorError, FetchRequest, FetchResponse};
pub use transfer::CurlExecutor;

/// Statuses whose `Location` is rewritten into proxy form.
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Methods sent upstream without a body.
const EMPTY_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];

pub(crate) fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some((_, v)) => *v = value,
        None => headers.push((name.to_string(), value)),
    }
}

/// A request as received by the edge. `path` is the raw, still-encoded path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Origin the client reached the proxy on; empty means the configured one.
    pub proxy_origin: String,
}

impl ProxyRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    /// Splits a request target (`/service/tok?x=1`) into path and query.
    pub fn from_target(method: impl Into<String>, target: &str) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Self::new(method, path).with_query(query),
            None => Self::new(method, target),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.proxy_origin = origin.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl EdgeResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    fn text(status: u16, message: String) -> Self {
        Self {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: message.into_bytes(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("not a proxied path: {0}")]
    NotProxied(String),
    #[error("failed to decode target: {0}")]
    Decode(#[from] DecodeError),
    #[error("invalid target url '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("unsupported scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },
    #[error(transparent)]
    Fetch(#[from] FetchExecutorError),
}

impl EdgeError {
    pub fn status(&self) -> u16 {
        match self {
            EdgeError::NotProxied(_) => 404,
            EdgeError::Decode(e) => e.status(),
            EdgeError::InvalidTarget { .. } | EdgeError::UnsupportedScheme { .. } => 400,
            EdgeError::Fetch(e) => e.status(),
        }
    }
}

/// Produced once per redirect response; the client performs the follow-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectDecision {
    pub original_location: String,
    pub rewritten_location: String,
    pub status: u16,
}

#[derive(Debug)]
pub enum EdgeOutcome {
    Responded(EdgeResponse),
    RedirectRewritten {
        decision: RedirectDecision,
        response: EdgeResponse,
    },
    Failed(EdgeError),
}

impl EdgeOutcome {
    pub fn status(&self) -> u16 {
        match self {
            EdgeOutcome::Responded(r) => r.status,
            EdgeOutcome::RedirectRewritten { response, .. } => response.status,
            EdgeOutcome::Failed(e) => e.status(),
        }
    }

    /// Response for the client; failures carry their reason as a text body.
    pub fn into_response(self) -> EdgeResponse {
        match self {
            EdgeOutcome::Responded(r) => r,
            EdgeOutcome::RedirectRewritten { response, .. } => response,
            EdgeOutcome::Failed(e) => EdgeResponse::text(e.status(), e.to_string()),
        }
    }
}

/// A request whose target has been decoded.
#[derive(Debug, Clone)]
pub struct DecodedRequest {
    pub request: ProxyRequest,
    pub target: Url,
    /// Context of the target as seen through the proxy origin.
    pub ctx: RewriteContext,
}

pub struct NetworkEdge<E> {
    rewriter: Rewriter,
    settings: EdgeConfig,
    executor: E,
    cookies: CookieStore,
}

impl<E: FetchExecutor> NetworkEdge<E> {
    pub fn new(config: ProxyConfig, settings: EdgeConfig, executor: E) -> Self {
        Self {
            rewriter: Rewriter::new(config),
            settings,
            executor,
            cookies: CookieStore::new(),
        }
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    /// Cookies absorbed when `server_side_cookies` is on.
    pub fn cookies(&self) -> &CookieStore {
        &self.cookies
    }

    pub fn handle(&self, request: ProxyRequest) -> EdgeOutcome {
        let decoded = match self.decode(request) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("rejecting request: {}", e);
                return EdgeOutcome::Failed(e);
            }
        };
        tracing::debug!("{} {} decoded", decoded.request.method, decoded.target);
        match self.forward(&decoded) {
            Ok(response) => self.finish(&decoded, response),
            Err(e) => {
                tracing::warn!("{} {} failed: {}", decoded.request.method, decoded.target, e);
                EdgeOutcome::Failed(e)
            }
        }
    }

    /// `Received → Decoded`: strips the prefix, decodes the token and merges
    /// the request's own query into the target.
    pub fn decode(&self, request: ProxyRequest) -> Result<DecodedRequest, EdgeError> {
        let config = self.rewriter.config();
        let token = request
            .path
            .strip_prefix(config.prefix.as_str())
            .ok_or_else(|| EdgeError::NotProxied(request.path.clone()))?;
        let decoded = config.codec.decode(token)?;

        // fragments never go upstream
        let mut url = match decoded.split_once('#') {
            Some((before, _)) => before.to_string(),
            None => decoded,
        };
        if let Some(query) = &request.query {
            merge_query(&mut url, query);
        }

        let target = parse_target(&url)?;
        let origin = if request.proxy_origin.is_empty() {
            config.origin.clone()
        } else {
            request.proxy_origin.clone()
        };
        let ctx = RewriteContext::new(target.as_str(), origin);
        Ok(DecodedRequest {
            request,
            target,
            ctx,
        })
    }

    /// Upstream request for `decoded`: allow-listed headers plus synthesized
    /// `Host`, `Origin`, `Referer` and, with server-side cookies, `Cookie`.
    pub fn upstream_request(&self, decoded: &DecodedRequest) -> FetchRequest {
        let request = &decoded.request;
        let target = &decoded.target;
        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(name, _)| {
                self.settings
                    .forward_headers
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(name))
            })
            .cloned()
            .collect();

        if let Some(host) = target.host_str() {
            let host = match target.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            set_header(&mut headers, "Host", host);
        }
        let target_origin = target.origin().ascii_serialization();
        if request.header("origin").is_some() {
            set_header(&mut headers, "Origin", target_origin.clone());
        }
        if let Some(referer) = request.header("referer") {
            let referer = match self.rewriter.try_source_url(referer, &decoded.ctx) {
                Ok(Some(source)) => source,
                _ => format!("{}/", target_origin),
            };
            set_header(&mut headers, "Referer", referer);
        }
        if self.settings.server_side_cookies {
            if let Some(cookie) = self.cookies.header_for(&decoded.ctx) {
                set_header(&mut headers, "Cookie", cookie);
            }
        }

        let method = request.method.to_ascii_uppercase();
        let body = if EMPTY_METHODS.contains(&method.as_str()) {
            None
        } else {
            request.body.clone()
        };
        FetchRequest {
            method,
            url: target.to_string(),
            headers,
            body,
            connect_timeout: Duration::from_secs(self.settings.connect_timeout_secs),
            timeout: Duration::from_secs(self.settings.timeout_secs),
        }
    }

    /// `Decoded → Forwarded`.
    pub fn forward(&self, decoded: &DecodedRequest) -> Result<FetchResponse, EdgeError> {
        let upstream = self.upstream_request(decoded);
        Ok(self.executor.execute(&upstream)?)
    }

    /// `Forwarded → Responded | RedirectRewritten`.
    pub fn finish(&self, decoded: &DecodedRequest, response: FetchResponse) -> EdgeOutcome {
        let FetchResponse {
            status,
            headers,
            body,
            opaque_redirect,
        } = response;
        let mut headers = self.downstream_headers(headers, &decoded.ctx);

        let is_redirect = REDIRECT_STATUSES.contains(&status);
        if is_redirect || opaque_redirect {
            let status = if is_redirect { status } else { 302 };
            let decision = match header_value(&headers, "location") {
                Some(location) => Some(RedirectDecision {
                    original_location: location.to_string(),
                    rewritten_location: self.redirect_location(location, &decoded.ctx),
                    status,
                }),
                // nothing to follow but the target itself
                None if opaque_redirect => Some(RedirectDecision {
                    original_location: decoded.target.to_string(),
                    rewritten_location: self
                        .rewriter
                        .proxied_url(decoded.target.as_str(), &decoded.ctx.origin),
                    status,
                }),
                None => None,
            };
            if let Some(decision) = decision {
                tracing::debug!(
                    "redirect {} {} -> {}",
                    decision.status,
                    decision.original_location,
                    decision.rewritten_location
                );
                set_header(&mut headers, "Location", decision.rewritten_location.clone());
                return EdgeOutcome::RedirectRewritten {
                    response: EdgeResponse {
                        status,
                        headers,
                        body,
                    },
                    decision,
                };
            }
        }

        let body = if self.settings.rewrite_bodies {
            self.rewrite_body(decoded, &mut headers, body)
        } else {
            body
        };
        EdgeOutcome::Responded(EdgeResponse {
            status,
            headers,
            body,
        })
    }

    /// Upstream `Location` values are relative to the target, never to the
    /// proxy, so they are resolved before encoding.
    fn redirect_location(&self, location: &str, ctx: &RewriteContext) -> String {
        match ctx.resolve(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                self.rewriter.proxied_url(url.as_str(), &ctx.origin)
            }
            Ok(_) => self.rewriter.rewrite_url(location, ctx),
            Err(e) => {
                tracing::debug!("unresolvable Location {:?}: {}", location, e);
                self.rewriter.rewrite_url(location, ctx)
            }
        }
    }

    /// Drops deny-listed headers and, with server-side cookies, absorbs `Set-Cookie`.
    fn downstream_headers(
        &self,
        headers: Vec<(String, String)>,
        ctx: &RewriteContext,
    ) -> Vec<(String, String)> {
        headers
            .into_iter()
            .filter(|(name, value)| {
                if self
                    .settings
                    .strip_headers
                    .iter()
                    .any(|denied| denied.eq_ignore_ascii_case(name))
                {
                    return false;
                }
                if self.settings.server_side_cookies && name.eq_ignore_ascii_case("set-cookie") {
                    if let Err(e) = self.cookies.store(value, ctx) {
                        tracing::debug!("dropping Set-Cookie from {}: {}", ctx.url, e);
                    }
                    return false;
                }
                true
            })
            .collect()
    }

    fn rewrite_body(
        &self,
        decoded: &DecodedRequest,
        headers: &mut Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Vec<u8> {
        let content_type = header_value(headers, "content-type")
            .unwrap_or_default()
            .to_ascii_lowercase();
        let ctx = &decoded.ctx;
        let is_html = content_type.contains("text/html");
        let is_css = content_type.contains("text/css");
        let is_js = content_type.contains("javascript") || content_type.contains("ecmascript");
        if !(is_html || is_css || is_js) {
            return body;
        }
        let text = match std::str::from_utf8(&body) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("passing non-UTF-8 {} body through: {}", content_type, e);
                return body;
            }
        };
        let rewritten = if is_html {
            let injection = Injection {
                cookies: if self.settings.server_side_cookies {
                    self.cookies.script_cookies(ctx)
                } else {
                    String::new()
                },
                referrer: decoded
                    .request
                    .header("referer")
                    .and_then(|r| self.rewriter.try_source_url(r, ctx).ok().flatten())
                    .unwrap_or_default(),
            };
            let options = HtmlOptions::document().with_injection(injection);
            self.rewriter.rewrite_html(text, ctx, &options)
        } else if is_css {
            self.rewriter.rewrite_css(text, ctx)
        } else {
            self.rewriter.rewrite_js(text, ctx)
        };
        let rewritten = rewritten.into_bytes();
        if header_value(headers, "content-length").is_some() {
            set_header(headers, "Content-Length", rewritten.len().to_string());
        }
        rewritten
    }
}

/// Absolute http(s) target; input without a scheme is retried as `https://`.
fn parse_target(raw: &str) -> Result<Url, EdgeError> {
    let invalid = |e: url::ParseError| EdgeError::InvalidTarget {
        url: raw.to_string(),
        reason: e.to_string(),
    };
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", raw)).map_err(invalid)?
        }
        Err(e) => return Err(invalid(e)),
    };
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(EdgeError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests;
