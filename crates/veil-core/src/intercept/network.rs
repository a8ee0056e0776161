//! Outbound request primitives.

use serde_json::Value;

use super::{rewrite_string_arg, Flow, HookEvent, NetworkPrimitive, OverrideFailure, Primitive, Scope};
use crate::config::WebSocketPolicy;

/// Rewrites the target URL of requests, workers, beacons and event sources.
pub struct RequestUrls;

impl NetworkPrimitive for RequestUrls {
    fn name(&self) -> &'static str {
        "request-urls"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[
            Primitive::Fetch,
            Primitive::XhrOpen,
            Primitive::WorkerNew,
            Primitive::SharedWorkerNew,
            Primitive::SendBeacon,
            Primitive::EventSourceNew,
            Primitive::ImportScripts,
        ]
    }

    fn on_request(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        match event.target {
            Primitive::Fetch => {
                let input = match event.get("input") {
                    Some(Value::String(url)) => Value::String(scope.rewrite_url(url)),
                    // Request objects arrive as `{ "url": ..., ... }`
                    Some(Value::Object(request)) => {
                        let mut request = request.clone();
                        let url = match request.get("url") {
                            Some(Value::String(url)) => scope.rewrite_url(url),
                            _ => {
                                return Err(OverrideFailure::ArgumentType {
                                    primitive: event.target,
                                    name: "input",
                                })
                            }
                        };
                        request.insert("url".to_string(), Value::String(url));
                        Value::Object(request)
                    }
                    _ => {
                        return Err(OverrideFailure::ArgumentType {
                            primitive: event.target,
                            name: "input",
                        })
                    }
                };
                event.set("input", input);
            }
            Primitive::ImportScripts => {
                for arg in event.rest_mut() {
                    if let Value::String(url) = arg {
                        *url = scope.rewrite_url(url);
                    }
                }
            }
            _ => rewrite_string_arg(&mut event, "url", scope)?,
        }
        Ok(Flow::Continue(event))
    }
}

/// Keeps `blob:` URLs in the page's own origin.
///
/// Object URLs are minted under the proxy origin; the page sees them under
/// its source origin and they are mapped back before revocation.
pub struct ObjectUrls;

impl NetworkPrimitive for ObjectUrls {
    fn name(&self) -> &'static str {
        "object-urls"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::CreateObjectUrl, Primitive::RevokeObjectUrl]
    }

    fn on_request(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        if event.target == Primitive::RevokeObjectUrl && !scope.ctx.origin.is_empty() {
            let source = format!("blob:{}", scope.ctx.source_origin());
            if let Some(rest) = event.get_str("url").and_then(|u| u.strip_prefix(&source)) {
                let proxied = format!("blob:{}{}", scope.ctx.origin, rest);
                event.set("url", proxied);
            }
        }
        Ok(Flow::Continue(event))
    }

    fn on_response(
        &self,
        event: &HookEvent,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, OverrideFailure> {
        if event.target != Primitive::CreateObjectUrl || scope.ctx.origin.is_empty() {
            return Ok(None);
        }
        let proxy = format!("blob:{}", scope.ctx.origin);
        Ok(value
            .as_str()
            .and_then(|u| u.strip_prefix(&proxy))
            .map(|rest| Value::String(format!("blob:{}{}", scope.ctx.source_origin(), rest))))
    }
}

/// Applies the configured WebSocket policy.
pub struct WebSocketGate;

impl NetworkPrimitive for WebSocketGate {
    fn name(&self) -> &'static str {
        "websocket-gate"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::WebSocketNew]
    }

    fn on_request(&self, event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        match scope.websocket {
            WebSocketPolicy::Passthrough => Ok(Flow::Continue(event)),
            WebSocketPolicy::Reject => {
                tracing::debug!("rejecting websocket to {:?}", event.get_str("url"));
                Ok(Flow::Intercepted(Value::Null))
            }
        }
    }
}
