//! CLI for the veil rewriting proxy engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use veil_core::codec::CodecId;
use veil_core::config;

use commands::{run_config, run_decode, run_encode, run_fetch, run_rewrite, run_source};

/// Top-level CLI for veil.
#[derive(Debug, Parser)]
#[command(name = "veil")]
#[command(about = "veil: URL-rewriting web proxy engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Content kinds accepted by `veil rewrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RewriteKind {
    Url,
    Css,
    Srcset,
    Js,
    Html,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Encode an absolute URL into a proxy token.
    Encode {
        url: String,
        /// Codec to use (defaults to the configured one).
        #[arg(long)]
        codec: Option<CodecId>,
    },

    /// Decode a proxy token back into the target URL.
    Decode {
        token: String,
        #[arg(long)]
        codec: Option<CodecId>,
    },

    /// Rewrite a URL or a piece of content as if served from `--base`.
    Rewrite {
        #[arg(value_enum)]
        kind: RewriteKind,
        /// Input text, or `-` to read stdin.
        input: String,
        /// Decoded URL of the document the input belongs to.
        #[arg(long)]
        base: String,
        /// Origin the proxy is served from; empty for path-only output.
        #[arg(long, default_value = "")]
        origin: String,
        /// For `html`: inject the runtime scripts into `<head>`.
        #[arg(long)]
        inject: bool,
    },

    /// Print the target of a proxied URL or path.
    Source {
        proxied: String,
        #[arg(long, default_value = "")]
        origin: String,
    },

    /// Run one request through the network edge and print the response summary.
    Fetch {
        /// Proxied path, e.g. `/service/<token>?q=1`.
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Extra request header, `Name: value` (repeatable).
        #[arg(short = 'H', long = "header", value_name = "HEADER")]
        headers: Vec<String>,
        #[arg(long, default_value = "")]
        origin: String,
    },

    /// Show the config file path and effective configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Encode { url, codec } => run_encode(&url, codec.unwrap_or(cfg.codec)),
            CliCommand::Decode { token, codec } => run_decode(&token, codec.unwrap_or(cfg.codec))?,
            CliCommand::Rewrite {
                kind,
                input,
                base,
                origin,
                inject,
            } => run_rewrite(&cfg, kind, &input, &base, &origin, inject)?,
            CliCommand::Source { proxied, origin } => run_source(&cfg, &proxied, &origin)?,
            CliCommand::Fetch {
                path,
                method,
                headers,
                origin,
            } => run_fetch(&cfg, &method, &path, &headers, &origin).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
