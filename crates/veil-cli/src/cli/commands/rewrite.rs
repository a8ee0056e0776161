//! `veil rewrite <kind> <input|->` – run one rewrite pass from the shell.

use std::io;

use anyhow::{Context, Result};
use veil_core::config::VeilConfig;
use veil_core::context::RewriteContext;
use veil_core::rewrite::{HtmlOptions, Injection, Rewriter};

use crate::cli::RewriteKind;

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        io::read_to_string(io::stdin()).context("reading stdin")
    } else {
        Ok(input.to_string())
    }
}

pub fn run_rewrite(
    cfg: &VeilConfig,
    kind: RewriteKind,
    input: &str,
    base: &str,
    origin: &str,
    inject: bool,
) -> Result<()> {
    let ctx = RewriteContext::new(base, origin);
    ctx.effective_base().context("invalid --base")?;
    let rewriter = Rewriter::new(cfg.proxy_config(origin));
    let text = read_input(input)?;

    let out = match kind {
        RewriteKind::Url => rewriter.rewrite_url(&text, &ctx),
        RewriteKind::Css => rewriter.rewrite_css(&text, &ctx),
        RewriteKind::Srcset => rewriter.rewrite_srcset(&text, &ctx),
        RewriteKind::Js => rewriter.rewrite_js(&text, &ctx),
        RewriteKind::Html => {
            let mut options = HtmlOptions::document();
            if inject {
                options = options.with_injection(Injection::default());
            }
            rewriter.rewrite_html(&text, &ctx, &options)
        }
    };
    println!("{}", out);
    Ok(())
}
