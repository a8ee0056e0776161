//! Global configuration loaded from `~/.config/veil/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::CodecId;

/// Named scripts the page host injects into proxied documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptRole {
    Bundle,
    Handler,
    Client,
    Config,
    ServiceWorker,
}

impl ScriptRole {
    /// Roles in the order they are injected into a document head.
    pub const INJECTION_ORDER: [ScriptRole; 4] = [
        ScriptRole::Bundle,
        ScriptRole::Config,
        ScriptRole::Client,
        ScriptRole::Handler,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScriptRole::Bundle => "bundle",
            ScriptRole::Handler => "handler",
            ScriptRole::Client => "client",
            ScriptRole::Config => "config",
            ScriptRole::ServiceWorker => "serviceWorker",
        }
    }
}

impl fmt::Display for ScriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host paths of the injected scripts, one per [`ScriptRole`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptPaths {
    pub bundle: String,
    pub handler: String,
    pub client: String,
    pub config: String,
    #[serde(rename = "serviceWorker")]
    pub service_worker: String,
}

impl Default for ScriptPaths {
    fn default() -> Self {
        Self {
            bundle: "/veil/veil.bundle.js".to_string(),
            handler: "/veil/veil.handler.js".to_string(),
            client: "/veil/veil.client.js".to_string(),
            config: "/veil/veil.config.js".to_string(),
            service_worker: "/veil/veil.sw.js".to_string(),
        }
    }
}

impl ScriptPaths {
    pub fn get(&self, role: ScriptRole) -> &str {
        match role {
            ScriptRole::Bundle => &self.bundle,
            ScriptRole::Handler => &self.handler,
            ScriptRole::Client => &self.client,
            ScriptRole::Config => &self.config,
            ScriptRole::ServiceWorker => &self.service_worker,
        }
    }
}

/// What the interception layer does with WebSocket construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSocketPolicy {
    /// Call the original constructor unmodified.
    #[default]
    Passthrough,
    /// Refuse the connection; the page sees `null`.
    Reject,
}

/// Network edge parameters (`[edge]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Request headers forwarded upstream (lowercase).
    pub forward_headers: Vec<String>,
    /// Response headers dropped before reaching the client (lowercase).
    pub strip_headers: Vec<String>,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Rewrite HTML/CSS/JS bodies with the content rewriter.
    pub rewrite_bodies: bool,
    /// Keep upstream cookies in the edge instead of passing Set-Cookie through.
    pub server_side_cookies: bool,
    pub websocket: WebSocketPolicy,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            forward_headers: [
                "accept",
                "accept-language",
                "content-type",
                "range",
                "if-none-match",
                "if-modified-since",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            strip_headers: ["content-security-policy", "x-frame-options", "content-encoding"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            connect_timeout_secs: 10,
            timeout_secs: 30,
            rewrite_bodies: false,
            server_side_cookies: false,
            websocket: WebSocketPolicy::Passthrough,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VeilConfig {
    /// Path segment marking proxied requests.
    pub prefix: String,
    pub codec: CodecId,
    pub scripts: ScriptPaths,
    pub edge: EdgeConfig,
}

impl Default for VeilConfig {
    fn default() -> Self {
        Self {
            prefix: "/service/".to_string(),
            codec: CodecId::default(),
            scripts: ScriptPaths::default(),
            edge: EdgeConfig::default(),
        }
    }
}

impl VeilConfig {
    /// Builds the immutable per-session proxy configuration for `origin`.
    pub fn proxy_config(&self, origin: &str) -> ProxyConfig {
        ProxyConfig::new(&self.prefix, origin, self.codec).with_scripts(self.scripts.clone())
    }

    /// The configuration as it would be written to `config.toml`.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Per-session proxy parameters. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub prefix: String,
    /// Origin the proxy itself is served from, e.g. `http://localhost:8080`. May be empty.
    pub origin: String,
    pub codec: CodecId,
    pub script_paths: ScriptPaths,
}

impl ProxyConfig {
    pub fn new(prefix: &str, origin: &str, codec: CodecId) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            origin: origin.trim_end_matches('/').to_string(),
            codec,
            script_paths: ScriptPaths::default(),
        }
    }

    pub fn with_scripts(mut self, scripts: ScriptPaths) -> Self {
        self.script_paths = scripts;
        self
    }

    pub fn script_path(&self, role: ScriptRole) -> &str {
        self.script_paths.get(role)
    }
}

/// Ensures the prefix starts and ends with `/`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("veil")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VeilConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<VeilConfig> {
    if !path.exists() {
        let default_cfg = VeilConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut cfg: VeilConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    cfg.prefix = normalize_prefix(&cfg.prefix);
    Ok(cfg)
}
