//! Cross-context "what page is this" registry.
//!
//! Each proxied document or worker registers its decoded URL under its own
//! context id. A controlling context (service worker, gateway) can then answer
//! queries from embedded contexts that only know the proxy form of their
//! address. Entries live as long as the owning context; see [`ContextGuard`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterData {
    #[serde(rename = "originalUrl")]
    pub original_url: String,
}

/// Frames exchanged between contexts, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContextMessage {
    RegisterUrl { data: RegisterData },
    GetOriginalUrl,
    /// Reply to [`ContextMessage::GetOriginalUrl`]; `url` is null for unknown contexts.
    OriginalUrl { url: Option<String> },
}

impl ContextMessage {
    pub fn register(original_url: impl Into<String>) -> Self {
        ContextMessage::RegisterUrl {
            data: RegisterData {
                original_url: original_url.into(),
            },
        }
    }
}

/// Context id -> original URL. Writes are last-writer-wins per id.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    urls: RwLock<HashMap<String, String>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: &str, original_url: &str) {
        let previous = self
            .urls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), original_url.to_string());
        if let Some(previous) = previous {
            tracing::debug!(context = id, "replacing {} with {}", previous, original_url);
        }
    }

    pub fn original_url(&self, id: &str) -> Option<String> {
        self.urls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<String> {
        self.urls.write().unwrap_or_else(|e| e.into_inner()).remove(id)
    }

    pub fn len(&self) -> usize {
        self.urls.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers `id` and returns a guard that removes it again on drop.
    pub fn guard(self: &Arc<Self>, id: impl Into<String>, original_url: &str) -> ContextGuard {
        let id = id.into();
        self.register(&id, original_url);
        ContextGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Applies one frame sent by context `id`. Returns the reply, if any.
    pub fn handle_message(&self, id: &str, message: ContextMessage) -> Option<ContextMessage> {
        match message {
            ContextMessage::RegisterUrl { data } => {
                self.register(id, &data.original_url);
                None
            }
            ContextMessage::GetOriginalUrl => Some(ContextMessage::OriginalUrl {
                url: self.original_url(id),
            }),
            ContextMessage::OriginalUrl { .. } => None,
        }
    }

    /// [`handle_message`](Self::handle_message) on a raw JSON frame.
    pub fn handle_json(&self, id: &str, frame: &str) -> Result<Option<String>, serde_json::Error> {
        let message: ContextMessage = serde_json::from_str(frame)?;
        self.handle_message(id, message)
            .map(|reply| serde_json::to_string(&reply))
            .transpose()
    }
}

/// Keeps a context registered for its lifetime.
#[derive(Debug)]
pub struct ContextGuard {
    registry: Arc<ContextRegistry>,
    id: String,
}

impl ContextGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Records a navigation of the owning context.
    pub fn update(&self, original_url: &str) {
        self.registry.register(&self.id, original_url);
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_wins() {
        let r = ContextRegistry::new();
        r.register("frame-1", "https://a.test/");
        r.register("frame-1", "https://b.test/");
        assert_eq!(r.original_url("frame-1").as_deref(), Some("https://b.test/"));
        assert_eq!(r.len(), 1);
        assert_eq!(r.original_url("frame-2"), None);
    }

    #[test]
    fn guard_removes_entry_on_drop() {
        let r = Arc::new(ContextRegistry::new());
        {
            let g = r.guard("worker", "https://a.test/");
            g.update("https://a.test/next");
            assert_eq!(r.original_url(g.id()).as_deref(), Some("https://a.test/next"));
        }
        assert!(r.is_empty());
    }

    #[test]
    fn wire_format() {
        let json = serde_json::to_value(ContextMessage::register("https://a.test/")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "register-url", "data": { "originalUrl": "https://a.test/" } })
        );
        let query: ContextMessage = serde_json::from_str(r#"{"type":"get-original-url"}"#).unwrap();
        assert_eq!(query, ContextMessage::GetOriginalUrl);
    }

    #[test]
    fn json_frames_register_and_answer() {
        let r = ContextRegistry::new();
        let reply = r
            .handle_json("f", r#"{"type":"register-url","data":{"originalUrl":"https://a.test/x"}}"#)
            .unwrap();
        assert_eq!(reply, None);
        let reply = r.handle_json("f", r#"{"type":"get-original-url"}"#).unwrap();
        assert_eq!(
            reply.as_deref(),
            Some(r#"{"type":"original-url","url":"https://a.test/x"}"#)
        );
        let reply = r.handle_json("unknown", r#"{"type":"get-original-url"}"#).unwrap();
        assert_eq!(reply.as_deref(), Some(r#"{"type":"original-url","url":null}"#));
        assert!(r.handle_json("f", r#"{"type":"bogus"}"#).is_err());
    }
}
