//! Cookie, domain and referrer access.

use serde_json::Value;

use super::{Flow, HookEvent, OverrideFailure, Primitive, Scope, StoragePrimitive};

/// Serves `document.cookie` from the document's own jar.
///
/// The host cookie store only ever sees the proxy origin, so reads and
/// writes never reach the original accessor.
pub struct CookieAccess;

impl StoragePrimitive for CookieAccess {
    fn name(&self) -> &'static str {
        "cookie-access"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::CookieGet, Primitive::CookieSet]
    }

    fn on_access(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        match event.target {
            Primitive::CookieGet => {
                let jar = scope.cookies.read().unwrap_or_else(|e| e.into_inner());
                let value = jar.header_value(scope.ctx, true);
                event.respond_with(Value::String(value));
            }
            Primitive::CookieSet => {
                let assignment = match event.get("value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                let mut jar = scope.cookies.write().unwrap_or_else(|e| e.into_inner());
                // invalid assignments are dropped
                if let Err(e) = jar.set_from_script(&assignment, scope.ctx) {
                    tracing::debug!("ignoring document.cookie write: {}", e);
                }
                event.respond_with(Value::String(assignment));
            }
            _ => {}
        }
        Ok(Flow::from(event))
    }
}

/// `document.domain` and `document.referrer` in terms of the source site.
pub struct DocumentOrigin;

impl StoragePrimitive for DocumentOrigin {
    fn name(&self) -> &'static str {
        "document-origin"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::DomainGet, Primitive::ReferrerGet]
    }

    fn on_access(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        if event.target == Primitive::DomainGet {
            event.respond_with(Value::String(scope.ctx.hostname()));
        }
        Ok(Flow::from(event))
    }

    fn on_read(
        &self,
        event: &HookEvent,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, OverrideFailure> {
        if event.target != Primitive::ReferrerGet {
            return Ok(None);
        }
        // A referrer outside the proxy is the proxy's own page, not the source's.
        let referrer = value
            .as_str()
            .and_then(|r| scope.rewriter.try_source_url(r, scope.ctx).ok().flatten())
            .unwrap_or_default();
        Ok(Some(Value::String(referrer)))
    }
}
