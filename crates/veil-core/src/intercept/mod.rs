//! Runtime interception: routing of host primitives through the rewriter.
//!
//! An [`InterceptionRegistry`] maps each [`Primitive`] to an ordered chain of
//! handlers. A call is dispatched as: arity check, [`HookEvent`] built from the
//! arguments, chain run in registration order (short-circuiting on
//! [`Flow::Intercepted`]), original called with the rewritten arguments, then
//! post-processing of the result. Substituting the host APIs themselves is the
//! job of a [`HostInstaller`]; nothing in here touches a host directly.

mod dom;
mod event;
mod family;
mod layer;
mod location;
mod message;
mod navigation;
mod network;
mod primitive;
mod registry;
mod storage;
mod style;

use std::sync::RwLock;

use thiserror::Error;

use crate::config::WebSocketPolicy;
use crate::context::RewriteContext;
use crate::cookie::CookieJar;
use crate::rewrite::Rewriter;

pub use dom::{AttributeSnapshot, AttributeUrls, ElementSnapshot, InsertedNodes};
pub use event::{Flow, HookEvent};
pub use family::{
    DomPrimitive, Hook, MessagePrimitive, NavigationPrimitive, NetworkPrimitive, StoragePrimitive,
    StylePrimitive,
};
pub use layer::{HostInstaller, InstallError, InterceptionLayer};
pub use location::{LocationComponent, LocationProxy, Navigation, NavigationKind};
pub use message::MessageOrigins;
pub use navigation::NavigationUrls;
pub use network::{ObjectUrls, RequestUrls, WebSocketGate};
pub use primitive::{Family, Primitive};
pub use registry::InterceptionRegistry;
pub use storage::{CookieAccess, DocumentOrigin};
pub use style::StyleUrls;

/// A handler could not process a call. The call then proceeds as if unproxied.
#[derive(Debug, Error)]
pub enum OverrideFailure {
    #[error("{primitive}: argument '{name}' has an unexpected type")]
    ArgumentType {
        primitive: Primitive,
        name: &'static str,
    },
    #[error("{primitive}: malformed node: {reason}")]
    MalformedNode { primitive: Primitive, reason: String },
}

/// What a handler may read while processing one call.
pub struct Scope<'a> {
    pub rewriter: &'a Rewriter,
    pub ctx: &'a RewriteContext,
    /// Script-visible cookies of the document.
    pub cookies: &'a RwLock<CookieJar>,
    pub websocket: WebSocketPolicy,
}

impl Scope<'_> {
    /// Rewrites a URL produced by page code.
    ///
    /// Hosts resolve relative references against the proxy's own origin, so
    /// `proxy-origin/path` that is not under the prefix is treated as `/path`
    /// of the source document.
    pub fn rewrite_url(&self, raw: &str) -> String {
        let origin = self.ctx.origin.as_str();
        if !origin.is_empty() && !self.rewriter.is_proxied(raw, self.ctx) {
            if let Some(rest) = raw.strip_prefix(origin) {
                if rest.is_empty() || rest.starts_with('/') {
                    let path = if rest.is_empty() { "/" } else { rest };
                    return self.rewriter.rewrite_url(path, self.ctx);
                }
            }
        }
        self.rewriter.rewrite_url(raw, self.ctx)
    }

    pub fn source_url(&self, proxied: &str) -> String {
        self.rewriter.source_url(proxied, self.ctx)
    }
}

/// Rewrites the string argument `name` in place.
pub(crate) fn rewrite_string_arg(
    event: &mut HookEvent,
    name: &'static str,
    scope: &Scope<'_>,
) -> Result<(), OverrideFailure> {
    match event.get(name) {
        Some(serde_json::Value::String(raw)) => {
            let rewritten = scope.rewrite_url(raw);
            event.set(name, rewritten);
            Ok(())
        }
        Some(serde_json::Value::Null) | None => Ok(()),
        Some(_) => Err(OverrideFailure::ArgumentType {
            primitive: event.target,
            name,
        }),
    }
}
