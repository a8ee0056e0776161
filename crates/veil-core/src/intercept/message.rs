//! Origin translation for cross-context messages.

use serde_json::Value;

use super::{Flow, HookEvent, MessagePrimitive, OverrideFailure, Primitive, Scope};

/// Maps the page's source origin to the proxy origin on send and back on receive.
pub struct MessageOrigins;

impl MessagePrimitive for MessageOrigins {
    fn name(&self) -> &'static str {
        "message-origins"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::PostMessage, Primitive::MessageOriginGet]
    }

    fn on_send(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        if event.target != Primitive::PostMessage || scope.ctx.origin.is_empty() {
            return Ok(Flow::Continue(event));
        }
        // "*" and foreign origins pass through unchanged
        let source = scope.ctx.source_origin();
        if event.get_str("targetOrigin") == Some(source.as_str()) {
            event.set("targetOrigin", scope.ctx.origin.clone());
        }
        Ok(Flow::Continue(event))
    }

    fn on_receive(
        &self,
        event: &HookEvent,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, OverrideFailure> {
        if event.target != Primitive::MessageOriginGet || scope.ctx.origin.is_empty() {
            return Ok(None);
        }
        Ok((value.as_str() == Some(scope.ctx.origin.as_str()))
            .then(|| Value::String(scope.ctx.source_origin())))
    }
}
