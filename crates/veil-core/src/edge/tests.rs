use std::sync::Mutex;

use super::*;
use crate::codec::CodecId;

/// Executor answering every request with the same canned result.
struct Canned {
    result: Result<FetchResponse, FetchExecutorError>,
    seen: Mutex<Vec<FetchRequest>>,
}

impl Canned {
    fn ok(status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        Self::new(Ok(FetchResponse {
            status,
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
            opaque_redirect: false,
        }))
    }

    fn new(result: Result<FetchResponse, FetchExecutorError>) -> Self {
        Self {
            result,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn last(&self) -> FetchRequest {
        self.seen.lock().unwrap().last().cloned().expect("executor was called")
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl FetchExecutor for Canned {
    fn execute(&self, request: &FetchRequest) -> Result<FetchResponse, FetchExecutorError> {
        self.seen.lock().unwrap().push(request.clone());
        self.result.clone()
    }
}

fn edge(executor: Canned) -> NetworkEdge<Canned> {
    edge_with(executor, EdgeConfig::default())
}

fn edge_with(executor: Canned, settings: EdgeConfig) -> NetworkEdge<Canned> {
    NetworkEdge::new(ProxyConfig::new("/service/", "", CodecId::Xor), settings, executor)
}

fn path(url: &str) -> String {
    format!("/service/{}", CodecId::Xor.encode(url))
}

#[test]
fn redirect_location_is_rewritten_and_status_kept() {
    let e = edge(Canned::ok(302, &[("Location", "/new")], ""));
    let outcome = e.handle(ProxyRequest::get(path("https://example.com/old")));
    let EdgeOutcome::RedirectRewritten { decision, response } = outcome else {
        panic!("expected a rewritten redirect");
    };
    assert_eq!(decision.original_location, "/new");
    assert_eq!(decision.rewritten_location, path("https://example.com/new"));
    assert_eq!(response.status, 302);
    assert_eq!(response.header("location"), Some(path("https://example.com/new").as_str()));
}

#[test]
fn relative_location_under_the_prefix_is_still_encoded() {
    let e = edge(Canned::ok(302, &[("Location", "/service/login")], ""));
    let response = e.handle(ProxyRequest::get(path("https://example.com/old"))).into_response();
    assert_eq!(
        response.header("location"),
        Some(path("https://example.com/service/login").as_str())
    );
    assert_eq!(
        response.header("location"),
        Some("/service/hvtrs8%2F-ezaopne%2Ccmm-sgrtiae-lmgkn")
    );
}

#[test]
fn every_redirect_status_is_preserved() {
    for status in REDIRECT_STATUSES {
        let e = edge(Canned::ok(status, &[("location", "https://b.test/x")], ""));
        let response = e.handle(ProxyRequest::get(path("https://a.test/"))).into_response();
        assert_eq!(response.status, status);
        assert_eq!(response.header("Location"), Some(path("https://b.test/x").as_str()));
    }
}

#[test]
fn redirects_use_the_client_proxy_origin() {
    let e = edge(Canned::ok(301, &[("Location", "/b")], ""));
    let response = e
        .handle(ProxyRequest::get(path("https://a.test/a")).with_origin("http://localhost:8080"))
        .into_response();
    assert_eq!(
        response.header("location"),
        Some(format!("http://localhost:8080{}", path("https://a.test/b")).as_str())
    );
}

#[test]
fn opaque_redirects_point_at_the_target_when_location_is_hidden() {
    let e = edge(Canned::new(Ok(FetchResponse {
        status: 0,
        opaque_redirect: true,
        ..FetchResponse::default()
    })));
    let outcome = e.handle(ProxyRequest::get(path("https://a.test/here")));
    assert!(matches!(outcome, EdgeOutcome::RedirectRewritten { .. }));
    let response = outcome.into_response();
    assert_eq!(response.status, 302);
    assert_eq!(response.header("location"), Some(path("https://a.test/here").as_str()));
}

#[test]
fn redirect_status_without_location_is_a_plain_response() {
    let e = edge(Canned::ok(304, &[], ""));
    assert!(matches!(
        e.handle(ProxyRequest::get(path("https://a.test/"))),
        EdgeOutcome::Responded(_)
    ));
    let e = edge(Canned::ok(302, &[], "moved"));
    let response = e.handle(ProxyRequest::get(path("https://a.test/"))).into_response();
    assert_eq!(response.status, 302);
    assert_eq!(response.body, b"moved");
}

#[test]
fn only_allow_listed_headers_go_upstream() {
    let e = edge(Canned::ok(200, &[], ""));
    e.handle(
        ProxyRequest::get(path("https://example.com:8443/a"))
            .with_header("Accept", "text/html")
            .with_header("Range", "bytes=0-9")
            .with_header("Cookie", "proxy=1")
            .with_header("User-Agent", "test")
            .with_header("Host", "localhost:8080"),
    );
    let sent = e.executor.last();
    assert_eq!(sent.url, "https://example.com:8443/a");
    assert_eq!(sent.header("accept"), Some("text/html"));
    assert_eq!(sent.header("range"), Some("bytes=0-9"));
    assert_eq!(sent.header("host"), Some("example.com:8443"));
    assert_eq!(sent.header("cookie"), None);
    assert_eq!(sent.header("user-agent"), None);
    assert_eq!(sent.header("origin"), None);
    assert_eq!(sent.header("referer"), None);
}

#[test]
fn origin_and_referer_are_synthesized_for_the_target() {
    let e = edge(Canned::ok(200, &[], ""));
    e.handle(
        ProxyRequest::get(path("https://example.com/a"))
            .with_origin("http://localhost:8080")
            .with_header("Origin", "http://localhost:8080")
            .with_header("Referer", &format!("http://localhost:8080{}", path("https://example.com/from"))),
    );
    let sent = e.executor.last();
    assert_eq!(sent.header("origin"), Some("https://example.com"));
    assert_eq!(sent.header("referer"), Some("https://example.com/from"));

    e.handle(ProxyRequest::get(path("https://example.com/a")).with_header("Referer", "http://localhost:8080/"));
    assert_eq!(e.executor.last().header("referer"), Some("https://example.com/"));
}

#[test]
fn deny_listed_response_headers_are_stripped() {
    let e = edge(Canned::ok(
        200,
        &[
            ("Content-Security-Policy", "default-src 'self'"),
            ("X-Frame-Options", "DENY"),
            ("Content-Encoding", "gzip"),
            ("Content-Type", "text/html"),
            ("Set-Cookie", "a=1"),
            ("X-Custom", "kept"),
        ],
        "<a href=\"/x\">x</a>",
    ));
    let response = e.handle(ProxyRequest::get(path("https://a.test/"))).into_response();
    assert_eq!(response.status, 200);
    assert_eq!(
        response.headers,
        vec![
            ("Content-Type".to_string(), "text/html".to_string()),
            ("Set-Cookie".to_string(), "a=1".to_string()),
            ("X-Custom".to_string(), "kept".to_string()),
        ]
    );
    assert_eq!(response.body, b"<a href=\"/x\">x</a>");
}

#[test]
fn unprefixed_paths_are_not_found() {
    let e = edge(Canned::ok(200, &[], ""));
    let outcome = e.handle(ProxyRequest::get("/favicon.ico"));
    assert_eq!(outcome.status(), 404);
    assert_eq!(e.executor.calls(), 0);
}

#[test]
fn malformed_tokens_are_client_errors() {
    let e = edge(Canned::ok(200, &[], ""));
    let outcome = e.handle(ProxyRequest::get("/service/abc%zz"));
    assert!(matches!(outcome, EdgeOutcome::Failed(EdgeError::Decode(_))));
    assert_eq!(outcome.status(), 400);
    assert_eq!(e.executor.calls(), 0);
}

#[test]
fn targets_must_be_http() {
    let e = edge(Canned::ok(200, &[], ""));
    let outcome = e.handle(ProxyRequest::get(path("ftp://a.test/file")));
    assert!(matches!(outcome, EdgeOutcome::Failed(EdgeError::UnsupportedScheme { .. })));
    assert_eq!(outcome.status(), 400);
}

#[test]
fn missing_scheme_is_retried_as_https() {
    let e = edge(Canned::ok(200, &[], ""));
    e.handle(ProxyRequest::get(path("example.com/a")));
    assert_eq!(e.executor.last().url, "https://example.com/a");
}

#[test]
fn request_query_is_merged_into_the_target() {
    let e = edge(Canned::ok(200, &[], ""));
    e.handle(ProxyRequest::from_target("GET", &format!("{}?y=2", path("https://a.test/p?x=1#frag"))));
    assert_eq!(e.executor.last().url, "https://a.test/p?x=1&y=2");
}

#[test]
fn bodies_are_forwarded_for_methods_that_carry_them() {
    let e = edge(Canned::ok(200, &[], ""));
    e.handle(ProxyRequest::new("post", path("https://a.test/form")).with_body(b"a=1".to_vec()));
    let sent = e.executor.last();
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.body.as_deref(), Some(&b"a=1"[..]));

    e.handle(ProxyRequest::get(path("https://a.test/")).with_body(b"ignored".to_vec()));
    assert_eq!(e.executor.last().body, None);
}

#[test]
fn timeouts_map_to_gateway_timeout_with_reason() {
    let e = edge(Canned::new(Err(FetchExecutorError::Timeout("30s elapsed".to_string()))));
    let response = e.handle(ProxyRequest::get(path("https://a.test/"))).into_response();
    assert_eq!(response.status, 504);
    assert!(String::from_utf8_lossy(&response.body).contains("30s elapsed"));

    let e = edge(Canned::new(Err(FetchExecutorError::Connect("refused".to_string()))));
    assert_eq!(e.handle(ProxyRequest::get(path("https://a.test/"))).status(), 502);
    assert_eq!(e.executor.calls(), 1);
}

#[test]
fn configured_timeouts_reach_the_executor() {
    let settings = EdgeConfig {
        connect_timeout_secs: 3,
        timeout_secs: 7,
        ..EdgeConfig::default()
    };
    let e = edge_with(Canned::ok(200, &[], ""), settings);
    e.handle(ProxyRequest::get(path("https://a.test/")));
    let sent = e.executor.last();
    assert_eq!(sent.connect_timeout, Duration::from_secs(3));
    assert_eq!(sent.timeout, Duration::from_secs(7));
}

#[test]
fn bodies_are_rewritten_when_enabled() {
    let settings = EdgeConfig {
        rewrite_bodies: true,
        ..EdgeConfig::default()
    };
    let html = "<html><head></head><body><a href=\"/x\">x</a></body></html>";
    let e = edge_with(
        Canned::ok(
            200,
            &[("Content-Type", "text/html; charset=utf-8"), ("Content-Length", "58")],
            html,
        ),
        settings,
    );
    let response = e.handle(ProxyRequest::get(path("https://a.test/"))).into_response();
    let body = String::from_utf8(response.body.clone()).unwrap();
    assert!(body.contains(&path("https://a.test/x")), "{}", body);
    assert!(body.contains("/veil/veil.bundle.js"), "{}", body);
    assert_eq!(response.header("content-length"), Some(response.body.len().to_string().as_str()));

    let settings = EdgeConfig {
        rewrite_bodies: true,
        ..EdgeConfig::default()
    };
    let e = edge_with(Canned::ok(200, &[("Content-Type", "text/css")], "a{background:url(/bg.png)}"), settings);
    let response = e.handle(ProxyRequest::get(path("https://a.test/s.css"))).into_response();
    assert!(String::from_utf8_lossy(&response.body).contains(&path("https://a.test/bg.png")));
}

#[test]
fn non_utf8_bodies_pass_through_byte_for_byte() {
    let settings = EdgeConfig {
        rewrite_bodies: true,
        ..EdgeConfig::default()
    };
    let latin1 = b"<p>caf\xe9 <a href=\"/x\">x</a></p>".to_vec();
    let e = edge_with(
        Canned::new(Ok(FetchResponse {
            status: 200,
            headers: vec![
                ("Content-Type".to_string(), "text/html; charset=iso-8859-1".to_string()),
                ("Content-Length".to_string(), latin1.len().to_string()),
            ],
            body: latin1.clone(),
            opaque_redirect: false,
        })),
        settings,
    );
    let response = e.handle(ProxyRequest::get(path("https://a.test/"))).into_response();
    assert_eq!(response.body, latin1);
    assert_eq!(response.header("content-length"), Some(latin1.len().to_string().as_str()));
}

#[test]
fn server_side_cookies_are_absorbed_and_replayed() {
    let settings = EdgeConfig {
        server_side_cookies: true,
        ..EdgeConfig::default()
    };
    let e = edge_with(
        Canned::ok(200, &[("Set-Cookie", "sid=abc; Path=/"), ("X-Other", "1")], ""),
        settings,
    );
    let response = e.handle(ProxyRequest::get(path("https://www.a.test/login"))).into_response();
    assert_eq!(response.header("set-cookie"), None);
    assert_eq!(e.cookies().site_count(), 1);

    e.handle(ProxyRequest::get(path("https://www.a.test/account")));
    assert_eq!(e.executor.last().header("cookie"), Some("sid=abc"));

    e.handle(ProxyRequest::get(path("https://other.test/")));
    assert_eq!(e.executor.last().header("cookie"), None);
}

#[test]
fn stages_can_be_driven_separately() {
    let e = edge(Canned::ok(200, &[], "ok"));
    let decoded = e.decode(ProxyRequest::get(path("https://a.test/x"))).unwrap();
    assert_eq!(decoded.target.as_str(), "https://a.test/x");
    assert_eq!(decoded.ctx.url, "https://a.test/x");
    let forwarded = e.forward(&decoded).unwrap();
    let outcome = e.finish(&decoded, forwarded);
    assert_eq!(outcome.into_response().body, b"ok");
}
