//! Navigation targets.

use serde_json::Value;

use super::{
    rewrite_string_arg, Flow, HookEvent, NavigationPrimitive, OverrideFailure, Primitive, Scope,
};

/// Rewrites anchor, base, link, form, history and `window.open` targets and decodes them on read.
pub struct NavigationUrls;

impl NavigationPrimitive for NavigationUrls {
    fn name(&self) -> &'static str {
        "navigation-urls"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[
            Primitive::WindowOpen,
            Primitive::HrefSet,
            Primitive::HrefGet,
            Primitive::BaseHrefSet,
            Primitive::BaseHrefGet,
            Primitive::LinkHrefSet,
            Primitive::LinkHrefGet,
            Primitive::FormActionSet,
            Primitive::FormActionGet,
            Primitive::HistoryPushState,
            Primitive::HistoryReplaceState,
        ]
    }

    fn on_navigate(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        match event.target {
            Primitive::HrefSet
            | Primitive::BaseHrefSet
            | Primitive::LinkHrefSet
            | Primitive::FormActionSet => {
                rewrite_string_arg(&mut event, "value", scope)?
            }
            Primitive::WindowOpen => {
                // `window.open()` and `window.open("")` open about:blank
                if event.get_str("url").is_some_and(|u| !u.is_empty()) {
                    rewrite_string_arg(&mut event, "url", scope)?;
                }
            }
            Primitive::HistoryPushState | Primitive::HistoryReplaceState => {
                rewrite_string_arg(&mut event, "url", scope)?
            }
            _ => {}
        }
        Ok(Flow::Continue(event))
    }

    fn on_read(
        &self,
        event: &HookEvent,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, OverrideFailure> {
        match event.target {
            Primitive::HrefGet
            | Primitive::BaseHrefGet
            | Primitive::LinkHrefGet
            | Primitive::FormActionGet => {
                Ok(value.as_str().map(|u| Value::String(scope.source_url(u))))
            }
            _ => Ok(None),
        }
    }
}
