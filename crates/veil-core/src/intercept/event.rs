//! Per-call hook event and the chain result type.

use serde_json::{Map, Value};

use super::Primitive;

/// Mutable view of one intercepted call.
///
/// Positional arguments are exposed by name in `data`; arguments beyond the
/// named ones are kept aside and handed back to the original untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    pub data: Map<String, Value>,
    pub target: Primitive,
    /// Receiver of the call (element descriptor, window, ...).
    pub that: Value,
    pub intercepted: bool,
    pub return_value: Value,
    arity: usize,
    rest: Vec<Value>,
}

impl HookEvent {
    pub fn new(target: Primitive, that: Value, args: Vec<Value>) -> Self {
        let names = target.arg_names();
        let arity = args.len();
        let mut data = Map::new();
        let mut rest = Vec::new();
        for (i, arg) in args.into_iter().enumerate() {
            match names.get(i) {
                Some(name) => {
                    data.insert((*name).to_string(), arg);
                }
                None => rest.push(arg),
            }
        }
        Self {
            data,
            target,
            that,
            intercepted: false,
            return_value: Value::Null,
            arity,
            rest,
        }
    }

    /// Cancels the call; `value` is returned to the page instead.
    pub fn respond_with(&mut self, value: Value) {
        self.intercepted = true;
        self.return_value = value;
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.data.insert(name.to_string(), value.into());
    }

    /// Unnamed trailing arguments (all arguments for variadic primitives).
    pub fn rest(&self) -> &[Value] {
        &self.rest
    }

    pub fn rest_mut(&mut self) -> &mut [Value] {
        &mut self.rest
    }

    /// Number of arguments the page passed.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Receiver and positional arguments for calling the original.
    pub fn into_call(self) -> (Value, Vec<Value>) {
        let names = self.target.arg_names();
        let mut data = self.data;
        let mut rest = self.rest.into_iter();
        let args = (0..self.arity)
            .map(|i| match names.get(i) {
                Some(name) => data.remove(*name).unwrap_or(Value::Null),
                None => rest.next().unwrap_or(Value::Null),
            })
            .collect();
        (self.that, args)
    }
}

/// Outcome of one chain step.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Keep going with the (possibly rewritten) event.
    Continue(HookEvent),
    /// Stop; return this value without calling the original.
    Intercepted(Value),
}

impl From<HookEvent> for Flow {
    fn from(event: HookEvent) -> Self {
        if event.intercepted {
            Flow::Intercepted(event.return_value)
        } else {
            Flow::Continue(event)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_positional_arguments_and_rebuilds_them() {
        let mut e = HookEvent::new(
            Primitive::XhrOpen,
            json!({}),
            vec![json!("GET"), json!("/a"), json!(true)],
        );
        assert_eq!(e.get_str("url"), Some("/a"));
        e.set("url", "/b");
        let (_, args) = e.into_call();
        assert_eq!(args, vec![json!("GET"), json!("/b"), json!(true)]);
    }

    #[test]
    fn variadic_arguments_live_in_rest() {
        let mut e = HookEvent::new(Primitive::ImportScripts, Value::Null, vec![json!("a.js"), json!("b.js")]);
        assert!(e.data.is_empty());
        e.rest_mut()[1] = json!("c.js");
        assert_eq!(e.into_call().1, vec![json!("a.js"), json!("c.js")]);
    }

    #[test]
    fn respond_with_intercepts() {
        let mut e = HookEvent::new(Primitive::CookieGet, Value::Null, vec![]);
        e.respond_with(json!("a=1"));
        assert_eq!(Flow::from(e), Flow::Intercepted(json!("a=1")));
    }
}
