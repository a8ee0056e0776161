//! One document's interception state and the host installation step.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use thiserror::Error;

use super::{InterceptionRegistry, LocationProxy, Primitive, Scope};
use crate::config::{ProxyConfig, WebSocketPolicy};
use crate::context::{ResolutionError, RewriteContext};
use crate::cookie::{Cookie, CookieJar};
use crate::rewrite::Rewriter;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("host has no {0}")]
    Missing(Primitive),
    #[error("host refused to replace {primitive}: {reason}")]
    Rejected { primitive: Primitive, reason: String },
}

/// Host-specific glue that swaps a host API for a wrapper calling
/// [`InterceptionLayer::dispatch`].
pub trait HostInstaller {
    fn install(&self, primitive: Primitive) -> Result<(), InstallError>;
}

/// Context update owed to a forwarded call.
enum ContextChange {
    Navigate(String),
    Rebase(String),
}

/// Registry, context snapshot and cookie jar of one document or worker.
pub struct InterceptionLayer {
    rewriter: Arc<Rewriter>,
    registry: InterceptionRegistry,
    ctx: RwLock<Arc<RewriteContext>>,
    cookies: RwLock<CookieJar>,
    websocket: WebSocketPolicy,
    installed: AtomicBool,
}

impl InterceptionLayer {
    pub fn new(config: ProxyConfig, ctx: RewriteContext) -> Self {
        Self {
            rewriter: Arc::new(Rewriter::new(config)),
            registry: InterceptionRegistry::with_defaults(),
            ctx: RwLock::new(Arc::new(ctx)),
            cookies: RwLock::new(CookieJar::new()),
            websocket: WebSocketPolicy::default(),
            installed: AtomicBool::new(false),
        }
    }

    pub fn with_websocket_policy(mut self, policy: WebSocketPolicy) -> Self {
        self.websocket = policy;
        self
    }

    pub fn with_registry(mut self, registry: InterceptionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    pub fn registry(&self) -> &InterceptionRegistry {
        &self.registry
    }

    /// Snapshot of the current context; in-flight calls keep theirs.
    pub fn context(&self) -> Arc<RewriteContext> {
        Arc::clone(&self.ctx.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Replaces the context after the document moved to `url` (decoded).
    pub fn navigate(&self, url: &str) {
        let next = self.context().navigated(url);
        tracing::debug!("context now {}", next.url);
        *self.ctx.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(next);
    }

    /// Loads the script-visible cookies handed over by the edge, in
    /// `document.cookie` form (`a=1; b=2`).
    pub fn seed_cookies(&self, serialized: &str) -> usize {
        let mut jar = self.cookies.write().unwrap_or_else(|e| e.into_inner());
        let mut seeded = 0;
        for pair in serialized.split(';') {
            let Some((name, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            jar.set(Cookie::new(name, value.trim()));
            seeded += 1;
        }
        seeded
    }

    /// Current `document.cookie` value.
    pub fn cookies(&self) -> String {
        let jar = self.cookies.read().unwrap_or_else(|e| e.into_inner());
        jar.header_value(&self.context(), true)
    }

    /// Routes one host call through the registry. See
    /// [`InterceptionRegistry::dispatch`].
    pub fn dispatch<F>(&self, primitive: Primitive, that: Value, args: Vec<Value>, original: F) -> Value
    where
        F: FnOnce(Value, Vec<Value>) -> Value,
    {
        let ctx = self.context();
        let change = match primitive {
            Primitive::HistoryPushState | Primitive::HistoryReplaceState => args
                .get(2)
                .and_then(Value::as_str)
                .map(|url| ContextChange::Navigate(url.to_string())),
            Primitive::BaseHrefSet => args
                .first()
                .and_then(Value::as_str)
                .map(|href| ContextChange::Rebase(href.to_string())),
            _ => None,
        };
        let scope = Scope {
            rewriter: &self.rewriter,
            ctx: &ctx,
            cookies: &self.cookies,
            websocket: self.websocket,
        };
        let forwarded = Cell::new(false);
        let result = self.registry.dispatch(primitive, that, args, &scope, |that, args| {
            forwarded.set(true);
            original(that, args)
        });

        // intercepted calls never reached the page
        if let Some(change) = change.filter(|_| forwarded.get()) {
            self.apply(&ctx, change);
        }
        result
    }

    fn apply(&self, ctx: &RewriteContext, change: ContextChange) {
        match change {
            // history entries change the page URL without a load
            ContextChange::Navigate(target) => match ctx.resolve(&target) {
                Ok(url) => self.navigate(url.as_str()),
                Err(e) => tracing::debug!("history url not applied to context: {}", e),
            },
            // a base href resolves against the document URL, not the previous base
            ContextChange::Rebase(href) => match ctx.navigated(ctx.url.as_str()).resolve(&href) {
                Ok(base) => {
                    let next = self.context().with_base(base);
                    tracing::debug!("base now {:?}", next.base.as_ref().map(|b| b.as_str()));
                    *self.ctx.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(next);
                }
                Err(e) => tracing::debug!("base href not applied to context: {}", e),
            },
        }
    }

    pub fn location(&self) -> Result<LocationProxy, ResolutionError> {
        LocationProxy::new(Arc::clone(&self.rewriter), self.context())
    }

    /// Replaces every primitive with a handler chain, once per layer.
    /// Returns how many were installed; later calls install nothing.
    pub fn install(&self, installer: &dyn HostInstaller) -> usize {
        if self.installed.swap(true, Ordering::SeqCst) {
            tracing::debug!("interception already installed");
            return 0;
        }
        let mut installed = 0;
        for primitive in self.registry.primitives() {
            match installer.install(primitive) {
                Ok(()) => installed += 1,
                Err(e) => tracing::warn!("leaving {} unproxied: {}", primitive, e),
            }
        }
        tracing::info!("installed {} interception points", installed);
        installed
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for InterceptionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionLayer")
            .field("ctx", &self.context().url)
            .field("registry", &self.registry)
            .field("installed", &self.is_installed())
            .finish()
    }
}
