//! Inline style declarations.

use serde_json::Value;

use super::{Flow, HookEvent, OverrideFailure, Primitive, Scope, StylePrimitive};

fn has_url(value: &str) -> bool {
    value.to_ascii_lowercase().contains("url(")
}

/// Routes `setProperty`/`getPropertyValue` values containing `url(` through the CSS pass.
pub struct StyleUrls;

impl StylePrimitive for StyleUrls {
    fn name(&self) -> &'static str {
        "style-urls"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::StyleSetProperty, Primitive::StyleGetPropertyValue]
    }

    fn on_set(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        if event.target == Primitive::StyleSetProperty {
            if let Some(value) = event.get_str("value").filter(|v| has_url(v)) {
                let rewritten = scope.rewriter.rewrite_css(value, scope.ctx);
                event.set("value", rewritten);
            }
        }
        Ok(Flow::Continue(event))
    }

    fn on_get(
        &self,
        event: &HookEvent,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, OverrideFailure> {
        if event.target != Primitive::StyleGetPropertyValue {
            return Ok(None);
        }
        Ok(value
            .as_str()
            .filter(|v| has_url(v))
            .map(|v| Value::String(scope.rewriter.source_css(v, scope.ctx))))
    }
}
