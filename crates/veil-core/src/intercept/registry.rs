//! Primitive → handler chain mapping and call dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::dom::{AttributeUrls, InsertedNodes};
use super::family::{
    DomHook, DomPrimitive, Hook, MessageHook, MessagePrimitive, NavigationHook,
    NavigationPrimitive, NetworkHook, NetworkPrimitive, StorageHook, StoragePrimitive, StyleHook,
    StylePrimitive,
};
use super::message::MessageOrigins;
use super::navigation::NavigationUrls;
use super::network::{ObjectUrls, RequestUrls, WebSocketGate};
use super::storage::{CookieAccess, DocumentOrigin};
use super::style::StyleUrls;
use super::{Flow, HookEvent, Primitive, Scope};

#[derive(Default, Clone)]
pub struct InterceptionRegistry {
    chains: BTreeMap<Primitive, Vec<Arc<dyn Hook>>>,
}

impl std::fmt::Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.chains.iter().map(|(p, c)| (p, c.iter().map(|h| h.name()).collect::<Vec<_>>())))
            .finish()
    }
}

impl InterceptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handler for every primitive.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_network(RequestUrls);
        registry.register_network(ObjectUrls);
        registry.register_network(WebSocketGate);
        registry.register_navigation(NavigationUrls);
        registry.register_dom(AttributeUrls);
        registry.register_dom(InsertedNodes);
        registry.register_message(MessageOrigins);
        registry.register_storage(CookieAccess);
        registry.register_storage(DocumentOrigin);
        registry.register_style(StyleUrls);
        registry
    }

    /// Appends `hook` to the chain of each primitive it declares. Primitives
    /// outside the hook's family are skipped. Returns the number of chains joined.
    pub fn register(&mut self, hook: Arc<dyn Hook>) -> usize {
        let mut attached = 0;
        for &primitive in hook.primitives() {
            if primitive.family() != hook.family() {
                tracing::warn!(
                    hook = hook.name(),
                    "not attaching to {}: belongs to {:?}",
                    primitive,
                    primitive.family()
                );
                continue;
            }
            self.chains.entry(primitive).or_default().push(Arc::clone(&hook));
            attached += 1;
        }
        attached
    }

    pub fn register_network(&mut self, handler: impl NetworkPrimitive + 'static) -> usize {
        self.register(Arc::new(NetworkHook(handler)))
    }

    pub fn register_navigation(&mut self, handler: impl NavigationPrimitive + 'static) -> usize {
        self.register(Arc::new(NavigationHook(handler)))
    }

    pub fn register_dom(&mut self, handler: impl DomPrimitive + 'static) -> usize {
        self.register(Arc::new(DomHook(handler)))
    }

    pub fn register_message(&mut self, handler: impl MessagePrimitive + 'static) -> usize {
        self.register(Arc::new(MessageHook(handler)))
    }

    pub fn register_storage(&mut self, handler: impl StoragePrimitive + 'static) -> usize {
        self.register(Arc::new(StorageHook(handler)))
    }

    pub fn register_style(&mut self, handler: impl StylePrimitive + 'static) -> usize {
        self.register(Arc::new(StyleHook(handler)))
    }

    /// Primitives with at least one handler, in a stable order.
    pub fn primitives(&self) -> Vec<Primitive> {
        self.chains
            .iter()
            .filter(|(_, chain)| !chain.is_empty())
            .map(|(p, _)| *p)
            .collect()
    }

    /// Handler names for `primitive`, in run order.
    pub fn chain(&self, primitive: Primitive) -> Vec<&'static str> {
        self.chains
            .get(&primitive)
            .map(|c| c.iter().map(|h| h.name()).collect())
            .unwrap_or_default()
    }

    /// Routes one call of `primitive` through its chain.
    ///
    /// `original` is the host's own implementation, called at most once. A
    /// failing handler aborts the chain and `original` receives the call
    /// exactly as the page made it; a failing post-processor yields the
    /// original's unmodified result.
    pub fn dispatch<F>(
        &self,
        primitive: Primitive,
        that: Value,
        args: Vec<Value>,
        scope: &Scope<'_>,
        original: F,
    ) -> Value
    where
        F: FnOnce(Value, Vec<Value>) -> Value,
    {
        let chain = match self.chains.get(&primitive) {
            Some(chain) if !chain.is_empty() => chain,
            _ => return original(that, args),
        };
        if args.len() < primitive.min_args() {
            return original(that, args);
        }

        let unmodified = (that.clone(), args.clone());
        let mut event = HookEvent::new(primitive, that, args);
        for hook in chain {
            match hook.before(event, scope) {
                Ok(Flow::Continue(next)) if next.intercepted => return next.return_value,
                Ok(Flow::Continue(next)) => event = next,
                Ok(Flow::Intercepted(value)) => return value,
                Err(e) => {
                    tracing::warn!(
                        hook = hook.name(),
                        "override of {} failed, calling original unmodified: {}",
                        primitive,
                        e
                    );
                    return original(unmodified.0, unmodified.1);
                }
            }
        }

        let forwarded = event.clone();
        let (that, args) = event.into_call();
        let raw = original(that, args);
        let mut result: Option<Value> = None;
        for hook in chain {
            let current = result.as_ref().unwrap_or(&raw);
            match hook.after(&forwarded, current, scope) {
                Ok(Some(value)) => result = Some(value),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        hook = hook.name(),
                        "post-processing of {} failed, returning original result: {}",
                        primitive,
                        e
                    );
                    return raw;
                }
            }
        }
        result.unwrap_or(raw)
    }
}
