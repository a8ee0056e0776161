//! `veil source <proxied-url>` – inverse of URL rewriting.

use anyhow::Result;
use veil_core::config::VeilConfig;
use veil_core::context::RewriteContext;
use veil_core::rewrite::Rewriter;

pub fn run_source(cfg: &VeilConfig, proxied: &str, origin: &str) -> Result<()> {
    let rewriter = Rewriter::new(cfg.proxy_config(origin));
    let ctx = RewriteContext::new("", origin);
    match rewriter.try_source_url(proxied, &ctx)? {
        Some(url) => println!("{}", url),
        None => anyhow::bail!("'{}' is not under the proxy prefix {}", proxied, rewriter.prefix()),
    }
    Ok(())
}
