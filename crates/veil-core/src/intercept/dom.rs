//! Attribute access and nodes inserted after the initial parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DomPrimitive, Flow, HookEvent, OverrideFailure, Primitive, Scope};
use crate::context::RewriteContext;
use crate::rewrite::Rewriter;

const INJECTED_ATTR: &str = "__veil-script";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSnapshot {
    pub name: String,
    pub value: String,
}

/// Serializable copy of an inserted element subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<AttributeSnapshot>,
    #[serde(default)]
    pub children: Vec<ElementSnapshot>,
}

impl ElementSnapshot {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(AttributeSnapshot {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn child(mut self, child: ElementSnapshot) -> Self {
        self.children.push(child);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Rewrites URL-bearing attributes of the whole subtree. Returns how many changed.
    pub fn rewrite(&mut self, rewriter: &Rewriter, ctx: &RewriteContext) -> usize {
        if self.get(INJECTED_ATTR).is_some() {
            return 0;
        }
        let mut changed = 0;
        for attr in &mut self.attributes {
            if let Some(value) = rewriter.rewrite_attribute(&self.tag, &attr.name, &attr.value, ctx) {
                if value != attr.value {
                    attr.value = value;
                    changed += 1;
                }
            }
        }
        for child in &mut self.children {
            changed += child.rewrite(rewriter, ctx);
        }
        changed
    }
}

fn receiver_tag(event: &HookEvent) -> &str {
    event.that.get("tag").and_then(Value::as_str).unwrap_or("")
}

/// `getAttribute`/`setAttribute` for URL-bearing attributes.
pub struct AttributeUrls;

impl DomPrimitive for AttributeUrls {
    fn name(&self) -> &'static str {
        "attribute-urls"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::GetAttribute, Primitive::SetAttribute]
    }

    fn on_mutate(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        if event.target != Primitive::SetAttribute {
            return Ok(Flow::Continue(event));
        }
        let (Some(name), Some(value)) = (event.get_str("name"), event.get("value")) else {
            return Err(OverrideFailure::ArgumentType {
                primitive: event.target,
                name: "name",
            });
        };
        // setAttribute stringifies its value
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let rewritten = scope
            .rewriter
            .rewrite_attribute(receiver_tag(&event), name, &value, scope.ctx);
        if let Some(rewritten) = rewritten {
            event.set("value", rewritten);
        }
        Ok(Flow::Continue(event))
    }

    fn on_read(
        &self,
        event: &HookEvent,
        value: &Value,
        scope: &Scope<'_>,
    ) -> Result<Option<Value>, OverrideFailure> {
        if event.target != Primitive::GetAttribute {
            return Ok(None);
        }
        let (Some(name), Some(current)) = (event.get_str("name"), value.as_str()) else {
            return Ok(None);
        };
        Ok(scope
            .rewriter
            .source_attribute(receiver_tag(event), name, current, scope.ctx)
            .map(Value::String))
    }
}

/// Rewrites subtrees reported by the mutation observer.
pub struct InsertedNodes;

impl DomPrimitive for InsertedNodes {
    fn name(&self) -> &'static str {
        "inserted-nodes"
    }

    fn primitives(&self) -> &'static [Primitive] {
        &[Primitive::NodeInserted]
    }

    fn on_mutate(&self, mut event: HookEvent, scope: &Scope<'_>) -> Result<Flow, OverrideFailure> {
        let node = event.get("node").cloned().unwrap_or(Value::Null);
        let mut snapshot: ElementSnapshot =
            serde_json::from_value(node).map_err(|e| OverrideFailure::MalformedNode {
                primitive: event.target,
                reason: e.to_string(),
            })?;
        if snapshot.rewrite(scope.rewriter, scope.ctx) > 0 {
            let value = serde_json::to_value(&snapshot).map_err(|e| OverrideFailure::MalformedNode {
                primitive: event.target,
                reason: e.to_string(),
            })?;
            event.set("node", value);
        }
        Ok(Flow::Continue(event))
    }
}
