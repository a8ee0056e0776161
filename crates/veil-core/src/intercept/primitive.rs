//! Catalogue of interception points.

use std::fmt;

use serde::{Deserialize, Serialize};

/// API family a primitive belongs to; handlers are registered per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Network,
    Navigation,
    Dom,
    Message,
    Storage,
    Style,
}

/// A host-provided API that is replaced by a routing wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Primitive {
    Fetch,
    XhrOpen,
    WebSocketNew,
    WorkerNew,
    SharedWorkerNew,
    SendBeacon,
    EventSourceNew,
    CreateObjectUrl,
    RevokeObjectUrl,
    ImportScripts,
    WindowOpen,
    HrefSet,
    HrefGet,
    BaseHrefSet,
    BaseHrefGet,
    LinkHrefSet,
    LinkHrefGet,
    FormActionSet,
    FormActionGet,
    HistoryPushState,
    HistoryReplaceState,
    GetAttribute,
    SetAttribute,
    NodeInserted,
    PostMessage,
    MessageOriginGet,
    CookieGet,
    CookieSet,
    DomainGet,
    ReferrerGet,
    StyleSetProperty,
    StyleGetPropertyValue,
}

impl Primitive {
    pub const ALL: [Primitive; 32] = [
        Primitive::Fetch,
        Primitive::XhrOpen,
        Primitive::WebSocketNew,
        Primitive::WorkerNew,
        Primitive::SharedWorkerNew,
        Primitive::SendBeacon,
        Primitive::EventSourceNew,
        Primitive::CreateObjectUrl,
        Primitive::RevokeObjectUrl,
        Primitive::ImportScripts,
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
        Primitive::GetAttribute,
        Primitive::SetAttribute,
        Primitive::NodeInserted,
        Primitive::PostMessage,
        Primitive::MessageOriginGet,
        Primitive::CookieGet,
        Primitive::CookieSet,
        Primitive::DomainGet,
        Primitive::ReferrerGet,
        Primitive::StyleSetProperty,
        Primitive::StyleGetPropertyValue,
    ];

    pub fn family(self) -> Family {
        use Primitive::*;
        match self {
            Fetch | XhrOpen | WebSocketNew | WorkerNew | SharedWorkerNew | SendBeacon
            | EventSourceNew | CreateObjectUrl | RevokeObjectUrl | ImportScripts => Family::Network,
            WindowOpen | HrefSet | HrefGet | BaseHrefSet | BaseHrefGet | LinkHrefSet
            | LinkHrefGet | FormActionSet | FormActionGet | HistoryPushState
            | HistoryReplaceState => Family::Navigation,
            GetAttribute | SetAttribute | NodeInserted => Family::Dom,
            PostMessage | MessageOriginGet => Family::Message,
            CookieGet | CookieSet | DomainGet | ReferrerGet => Family::Storage,
            StyleSetProperty | StyleGetPropertyValue => Family::Style,
        }
    }

    /// Host path the installer replaces.
    pub fn host_name(self) -> &'static str {
        use Primitive::*;
        match self {
            Fetch => "fetch",
            XhrOpen => "XMLHttpRequest.prototype.open",
            WebSocketNew => "WebSocket",
            WorkerNew => "Worker",
            SharedWorkerNew => "SharedWorker",
            SendBeacon => "navigator.sendBeacon",
            EventSourceNew => "EventSource",
            CreateObjectUrl => "URL.createObjectURL",
            RevokeObjectUrl => "URL.revokeObjectURL",
            ImportScripts => "importScripts",
            WindowOpen => "window.open",
            HrefSet => "HTMLHyperlinkElementUtils.href:set",
            HrefGet => "HTMLHyperlinkElementUtils.href:get",
            BaseHrefSet => "HTMLBaseElement.href:set",
            BaseHrefGet => "HTMLBaseElement.href:get",
            LinkHrefSet => "HTMLLinkElement.href:set",
            LinkHrefGet => "HTMLLinkElement.href:get",
            FormActionSet => "HTMLFormElement.action:set",
            FormActionGet => "HTMLFormElement.action:get",
            HistoryPushState => "History.prototype.pushState",
            HistoryReplaceState => "History.prototype.replaceState",
            GetAttribute => "Element.prototype.getAttribute",
            SetAttribute => "Element.prototype.setAttribute",
            NodeInserted => "MutationObserver:childList",
            PostMessage => "window.postMessage",
            MessageOriginGet => "MessageEvent.origin:get",
            CookieGet => "Document.cookie:get",
            CookieSet => "Document.cookie:set",
            DomainGet => "Document.domain:get",
            ReferrerGet => "Document.referrer:get",
            StyleSetProperty => "CSSStyleDeclaration.prototype.setProperty",
            StyleGetPropertyValue => "CSSStyleDeclaration.prototype.getPropertyValue",
        }
    }

    /// Names of the positional arguments, used as keys of the hook event data.
    pub fn arg_names(self) -> &'static [&'static str] {
        use Primitive::*;
        match self {
            Fetch => &["input", "init"],
            XhrOpen => &["method", "url", "async", "user", "password"],
            WebSocketNew => &["url", "protocols"],
            WorkerNew | SharedWorkerNew | EventSourceNew => &["url", "options"],
            SendBeacon => &["url", "data"],
            CreateObjectUrl => &["object"],
            RevokeObjectUrl => &["url"],
            ImportScripts => &[],
            WindowOpen => &["url", "target", "features"],
            HrefSet | BaseHrefSet | LinkHrefSet | FormActionSet | CookieSet => &["value"],
            HistoryPushState | HistoryReplaceState => &["state", "title", "url"],
            GetAttribute => &["name"],
            SetAttribute => &["name", "value"],
            NodeInserted => &["node"],
            PostMessage => &["message", "targetOrigin", "transfer"],
            StyleSetProperty => &["property", "value", "priority"],
            StyleGetPropertyValue => &["property"],
            HrefGet | BaseHrefGet | LinkHrefGet | FormActionGet | MessageOriginGet | CookieGet
            | DomainGet | ReferrerGet => &[],
        }
    }

    /// Below this many arguments the call is passed through untouched.
    pub fn min_args(self) -> usize {
        use Primitive::*;
        match self {
            XhrOpen | HistoryPushState | HistoryReplaceState | SetAttribute | PostMessage
            | StyleSetProperty => 2,
            Fetch | WebSocketNew | WorkerNew | SharedWorkerNew | SendBeacon | EventSourceNew
            | CreateObjectUrl | RevokeObjectUrl | HrefSet | BaseHrefSet | LinkHrefSet
            | FormActionSet | GetAttribute | NodeInserted | CookieSet | StyleGetPropertyValue => 1,
            ImportScripts | WindowOpen | HrefGet | BaseHrefGet | LinkHrefGet | FormActionGet
            | MessageOriginGet | CookieGet | DomainGet | ReferrerGet => 0,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_name())
    }
}
