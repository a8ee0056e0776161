//! Integration test: the network edge with the libcurl executor against a local origin.

mod common;

use common::origin_server;
use veil_core::codec::CodecId;
use veil_core::config::{EdgeConfig, ProxyConfig};
use veil_core::edge::{CurlExecutor, EdgeOutcome, NetworkEdge, ProxyRequest};

fn edge(settings: EdgeConfig) -> NetworkEdge<CurlExecutor> {
    NetworkEdge::new(
        ProxyConfig::new("/service/", "", CodecId::Xor),
        settings,
        CurlExecutor::new(),
    )
}

fn proxied(url: &str) -> String {
    format!("/service/{}", CodecId::Xor.encode(url))
}

fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

#[test]
fn page_passes_through_with_deny_listed_headers_stripped() {
    let base = origin_server::start();
    let response = edge(EdgeConfig::default())
        .handle(ProxyRequest::get(proxied(&format!("{}page", base))))
        .into_response();
    assert_eq!(response.status, 200);
    assert_eq!(body_text(&response.body), origin_server::PAGE);
    assert_eq!(response.header("content-security-policy"), None);
    assert_eq!(response.header("x-frame-options"), None);
    assert_eq!(response.header("x-origin"), Some("test"));
    assert_eq!(response.header("set-cookie"), Some("sid=abc; Path=/"));
}

#[test]
fn upstream_redirect_is_rewritten() {
    let base = origin_server::start();
    let outcome = edge(EdgeConfig::default()).handle(ProxyRequest::get(proxied(&format!("{}old", base))));
    let EdgeOutcome::RedirectRewritten { decision, response } = outcome else {
        panic!("expected a rewritten redirect");
    };
    assert_eq!(response.status, 302);
    assert_eq!(decision.original_location, "/new");
    let expected = proxied(&format!("{}new", base));
    assert_eq!(response.header("location"), Some(expected.as_str()));
}

#[test]
fn only_allow_listed_headers_reach_the_origin() {
    let base = origin_server::start();
    let target = format!("{}echo?a=1", base);
    let host = base.trim_start_matches("http://").trim_end_matches('/').to_string();
    let response = edge(EdgeConfig::default())
        .handle(
            ProxyRequest::from_target("GET", &format!("{}?b=2", proxied(&target)))
                .with_header("Accept", "text/plain")
                .with_header("X-Secret", "hidden")
                .with_header("Cookie", "proxy=1"),
        )
        .into_response();
    let echoed = body_text(&response.body);
    assert!(echoed.starts_with("GET /echo?a=1&b=2\n"), "{}", echoed);
    assert!(echoed.contains("accept: text/plain"), "{}", echoed);
    assert!(echoed.contains(&format!("host: {}", host)), "{}", echoed);
    assert!(!echoed.contains("x-secret"), "{}", echoed);
    assert!(!echoed.contains("cookie:"), "{}", echoed);
}

#[test]
fn curl_defaults_are_not_forwarded() {
    let base = origin_server::start();
    let response = edge(EdgeConfig::default())
        .handle(ProxyRequest::get(proxied(&format!("{}echo", base))))
        .into_response();
    let echoed = body_text(&response.body);
    assert!(echoed.starts_with("GET /echo\n"), "{}", echoed);
    assert!(!echoed.contains("\naccept:"), "{}", echoed);
    assert!(!echoed.contains("\naccept-encoding:"), "{}", echoed);
}

#[test]
fn head_keeps_the_upstream_content_length() {
    let base = origin_server::start();
    let response = edge(EdgeConfig::default())
        .handle(ProxyRequest::new("HEAD", proxied(&format!("{}page", base))))
        .into_response();
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
    let length = origin_server::PAGE.len().to_string();
    assert_eq!(response.header("content-length"), Some(length.as_str()));
}

#[test]
fn request_bodies_are_forwarded() {
    let base = origin_server::start();
    let response = edge(EdgeConfig::default())
        .handle(
            ProxyRequest::new("POST", proxied(&format!("{}echo", base)))
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body(b"q=veil".to_vec()),
        )
        .into_response();
    let echoed = body_text(&response.body);
    assert!(echoed.starts_with("POST /echo\n"), "{}", echoed);
    assert!(echoed.ends_with("\n\nq=veil"), "{}", echoed);
}

#[test]
fn slow_origin_is_a_gateway_timeout() {
    let base = origin_server::start();
    let settings = EdgeConfig {
        timeout_secs: 1,
        ..EdgeConfig::default()
    };
    let response = edge(settings)
        .handle(ProxyRequest::get(proxied(&format!("{}slow", base))))
        .into_response();
    assert_eq!(response.status, 504);
    assert!(!response.body.is_empty());
}

#[test]
fn unreachable_origin_is_a_bad_gateway() {
    let base = origin_server::closed();
    let outcome = edge(EdgeConfig::default()).handle(ProxyRequest::get(proxied(&format!("{}x", base))));
    assert!(matches!(outcome, EdgeOutcome::Failed(_)));
    assert_eq!(outcome.status(), 502);
}

#[test]
fn bodies_and_cookies_are_handled_at_the_edge_when_enabled() {
    let base = origin_server::start();
    let settings = EdgeConfig {
        rewrite_bodies: true,
        server_side_cookies: true,
        ..EdgeConfig::default()
    };
    let e = edge(settings);
    let response = e
        .handle(ProxyRequest::get(proxied(&format!("{}page", base))))
        .into_response();
    let html = body_text(&response.body);
    assert!(html.contains(&proxied(&format!("{}next", base))), "{}", html);
    assert!(html.contains("/veil/veil.handler.js"), "{}", html);
    assert_eq!(response.header("set-cookie"), None);
    assert_eq!(
        response.header("content-length"),
        Some(response.body.len().to_string().as_str())
    );

    let echoed = body_text(
        &e.handle(ProxyRequest::get(proxied(&format!("{}echo", base))))
            .into_response()
            .body,
    );
    assert!(echoed.contains("cookie: sid=abc"), "{}", echoed);
}
