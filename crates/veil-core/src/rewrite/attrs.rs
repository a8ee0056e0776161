//! Attribute classification for markup and DOM rewriting.

/// Attributes holding a single URL. `data` only counts on `<object>`.
pub const URL_ATTRIBUTES: &[&str] = &[
    "href", "src", "action", "poster", "background", "ping", "movie", "profile", "formaction",
    "icon", "manifest", "codebase", "cite", "archive", "longdesc", "usemap",
];

pub const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "imagesrcset"];

/// Left untouched even though they affect loading.
pub const FORBIDDEN_ATTRIBUTES: &[&str] =
    &["http-equiv", "integrity", "sandbox", "nonce", "crossorigin"];

pub const EVENT_ATTRIBUTES: &[&str] = &[
    "onabort", "onafterprint", "onbeforeprint", "onbeforeunload", "onblur", "oncanplay",
    "oncanplaythrough", "onchange", "onclick", "oncontextmenu", "oncopy", "oncuechange", "oncut",
    "ondblclick", "ondrag", "ondragend", "ondragenter", "ondragleave", "ondragover",
    "ondragstart", "ondrop", "ondurationchange", "onemptied", "onended", "onerror", "onfocus",
    "onhashchange", "oninput", "oninvalid", "onkeydown", "onkeypress", "onkeyup", "onload",
    "onloadeddata", "onloadedmetadata", "onloadstart", "onmessage", "onmousedown",
    "onmousemove", "onmouseout", "onmouseover", "onmouseup", "onmousewheel", "onoffline",
    "ononline", "onpagehide", "onpageshow", "onpaste", "onpause", "onplay", "onplaying",
    "onpopstate", "onprogress", "onratechange", "onreset", "onresize", "onscroll", "onsearch",
    "onseeked", "onseeking", "onselect", "onstalled", "onstorage", "onsubmit", "onsuspend",
    "ontimeupdate", "ontoggle", "onunload", "onvolumechange", "onwaiting", "onwheel",
];

/// How an attribute value is treated by the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Url,
    Srcset,
    /// Markup (`srcdoc`).
    Html,
    /// Inline declarations.
    Style,
    EventHandler,
    Forbidden,
    Other,
}

impl AttributeKind {
    pub fn is_rewritten(self) -> bool {
        !matches!(self, AttributeKind::Forbidden | AttributeKind::Other)
    }
}

/// Classifies `name` on element `tag`. Both are compared case-insensitively.
pub fn classify_attribute(tag: &str, name: &str) -> AttributeKind {
    let name = name.to_ascii_lowercase();
    let name = name.as_str();
    if name == "data" {
        return if tag.eq_ignore_ascii_case("object") {
            AttributeKind::Url
        } else {
            AttributeKind::Other
        };
    }
    if URL_ATTRIBUTES.contains(&name) {
        AttributeKind::Url
    } else if SRCSET_ATTRIBUTES.contains(&name) {
        AttributeKind::Srcset
    } else if name == "srcdoc" {
        AttributeKind::Html
    } else if name == "style" {
        AttributeKind::Style
    } else if EVENT_ATTRIBUTES.contains(&name) {
        AttributeKind::EventHandler
    } else if FORBIDDEN_ATTRIBUTES.contains(&name) {
        AttributeKind::Forbidden
    } else {
        AttributeKind::Other
    }
}
