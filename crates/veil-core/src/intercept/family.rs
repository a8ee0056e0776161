//! Handler interfaces, one per primitive family.
//!
//! Concrete handlers implement a family trait; the registry wraps them in a
//! family adapter and only attaches them to primitives of that family.

use serde_json::Value;

use super::{Family, Flow, HookEvent, OverrideFailure, Primitive, Scope};

/// Object-safe form every family handler is erased to inside the registry.
pub trait Hook: Send + Sync {
    fn name(&self) -> &'static str;
    fn family(&self) -> Family;
    fn primitives(&self) -> &'static [Primitive];
    /// Runs before the original; may rewrite arguments or intercept.
    fn before(&self, event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure>;
    /// Runs on the original's result; `event` is the call as forwarded.
    /// `None` leaves the result unchanged.
    fn after(
        &self,
        event: &HookEvent,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, OverrideFailure>;
}

macro_rules! primitive_family {
    ($(#[$meta:meta])* $name:ident, $adapter:ident, $family:expr, $before:ident, $after:ident) => {
        $(#[$meta])*
        pub trait $name: Send + Sync {
            fn name(&self) -> &'static str;

            fn primitives(&self) -> &'static [Primitive];

            fn $before(&self, event: HookEvent, _scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
                Ok(Flow::Continue(event))
            }

            fn $after(
                &self,
                _event: &HookEvent,
                _value: &Value,
                _scope: &Scope<'_>,
            ) -> Result<Option<Value>, OverrideFailure> {
                Ok(None)
            }
        }

        pub(crate) struct $adapter<T>(pub(crate) T);

        impl<T: $name> Hook for $adapter<T> {
            fn name(&self) -> &'static str {
                self.0.name()
            }

            fn family(&self) -> Family {
                $family
            }

            fn primitives(&self) -> &'static [Primitive] {
                self.0.primitives()
            }

            fn before(&self, event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
                self.0.$before(event, scope)
            }

            fn after(
                &self,
                event: &HookEvent,
                value: &Value,
                scope: &Scope<'_>,
            ) -> Result<Option<Value>, OverrideFailure> {
                self.0.$after(event, value, scope)
            }
        }
    };
}

primitive_family!(
    /// Outbound requests: fetch, XHR, sockets, workers, beacons, object URLs.
    NetworkPrimitive, NetworkHook, Family::Network, on_request, on_response
);
primitive_family!(
    /// Navigation targets: links, forms, history, `window.open`.
    NavigationPrimitive, NavigationHook, Family::Navigation, on_navigate, on_read
);
primitive_family!(
    /// Attribute access and inserted nodes.
    DomPrimitive, DomHook, Family::Dom, on_mutate, on_read
);
primitive_family!(
    /// Cross-context messaging.
    MessagePrimitive, MessageHook, Family::Message, on_send, on_receive
);
primitive_family!(
    /// Cookies, `document.domain`, `document.referrer`.
    StoragePrimitive, StorageHook, Family::Storage, on_access, on_read
);
primitive_family!(
    /// Inline style declarations.
    StylePrimitive, StyleHook, Family::Style, on_set, on_get
);
