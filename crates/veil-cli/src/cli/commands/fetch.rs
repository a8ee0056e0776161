//! `veil fetch <proxied-path>` – one request through the edge with libcurl.

use anyhow::{Context, Result};
use veil_core::config::VeilConfig;
use veil_core::edge::{CurlExecutor, EdgeOutcome, NetworkEdge, ProxyRequest};

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header '{}' is not 'Name: value'", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

pub async fn run_fetch(
    cfg: &VeilConfig,
    method: &str,
    path: &str,
    headers: &[String],
    origin: &str,
) -> Result<()> {
    let mut request = ProxyRequest::from_target(method, path).with_origin(origin);
    for raw in headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }
    let edge = NetworkEdge::new(cfg.proxy_config(origin), cfg.edge.clone(), CurlExecutor::new());

    let outcome = tokio::task::spawn_blocking(move || edge.handle(request))
        .await
        .context("fetch task join")?;

    let response = match outcome {
        EdgeOutcome::Failed(e) => {
            let status = e.status();
            return Err(anyhow::Error::new(e).context(format!("edge answered {}", status)));
        }
        EdgeOutcome::RedirectRewritten { decision, response } => {
            println!(
                "redirect: {} -> {}",
                decision.original_location, decision.rewritten_location
            );
            response
        }
        EdgeOutcome::Responded(response) => response,
    };

    println!("status: {}", response.status);
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    println!("body: {} bytes", response.body.len());
    Ok(())
}
