//! Reference [`FetchExecutor`] on libcurl.

use std::str;

use super::executor::{FetchExecutor, FetchExecutorError, FetchRequest, FetchResponse};
use super::header_value;

/// Blocking executor; one easy handle per request.
#[derive(Debug, Clone, Default)]
pub struct CurlExecutor;

impl CurlExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl FetchExecutor for CurlExecutor {
    fn execute(&self, request: &FetchRequest) -> Result<FetchResponse, FetchExecutorError> {
        let mut header_lines: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(&request.url).map_err(classify)?;
        easy.follow_location(false).map_err(classify)?;
        easy.connect_timeout(request.connect_timeout).map_err(classify)?;
        easy.timeout(request.timeout).map_err(classify)?;

        match request.method.to_ascii_uppercase().as_str() {
            "GET" => easy.get(true).map_err(classify)?,
            "HEAD" => easy.nobody(true).map_err(classify)?,
            other => easy.custom_request(other).map_err(classify)?,
        }
        if let Some(payload) = &request.body {
            easy.post_fields_copy(payload).map_err(classify)?;
        }

        let mut list = curl::easy::List::new();
        for (name, value) in &request.headers {
            list.append(&format!("{}: {}", name.trim(), value.trim()))
                .map_err(classify)?;
        }
        // an empty value stops curl from adding its own `Accept: */*`
        if header_value(&request.headers, "accept").is_none() {
            list.append("Accept:").map_err(classify)?;
        }
        easy.http_headers(list).map_err(classify)?;

        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        header_lines.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(classify)?;
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(classify)?;
            transfer.perform().map_err(classify)?;
        }

        let status = easy.response_code().map_err(classify)?;
        let mut headers = parse_header_lines(&header_lines);
        if carries_body(&request.method, status) {
            settle_framing(&mut headers, body.len());
        }
        tracing::debug!("{} {} -> {} ({} bytes)", request.method, request.url, status, body.len());
        Ok(FetchResponse {
            status: u16::try_from(status).unwrap_or(502),
            headers,
            body,
            opaque_redirect: false,
        })
    }
}

fn classify(e: curl::Error) -> FetchExecutorError {
    if e.is_operation_timedout() {
        FetchExecutorError::Timeout(e.to_string())
    } else if e.is_couldnt_connect() || e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        FetchExecutorError::Connect(e.to_string())
    } else if e.is_url_malformed() || e.is_unsupported_protocol() {
        FetchExecutorError::InvalidRequest(e.to_string())
    } else {
        FetchExecutorError::Transport(e.to_string())
    }
}

/// Header pairs of the last response in `lines`; interim responses
/// (`100 Continue`) are discarded.
pub(crate) fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.starts_with("HTTP/") {
            headers.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                headers.push((name.to_string(), value.trim().to_string()));
            }
        }
    }
    headers
}

/// HEAD answers and 1xx/204/304 responses keep the upstream `Content-Length`.
fn carries_body(method: &str, status: u32) -> bool {
    !method.eq_ignore_ascii_case("HEAD") && !matches!(status, 100..=199 | 204 | 304)
}

/// The body is de-chunked, so framing headers must describe it.
fn settle_framing(headers: &mut Vec<(String, String)>, body_len: usize) {
    headers.retain(|(name, _)| !name.eq_ignore_ascii_case("transfer-encoding"));
    for (name, value) in headers.iter_mut() {
        if name.eq_ignore_ascii_case("content-length") {
            *value = body_len.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_final_response_headers() {
        let lines = [
            "HTTP/1.1 100 Continue".to_string(),
            "".to_string(),
            "HTTP/1.1 302 Found".to_string(),
            "Location: /next".to_string(),
            "Set-Cookie: a=1".to_string(),
            "Set-Cookie: b=2".to_string(),
        ];
        let headers = parse_header_lines(&lines);
        assert_eq!(
            headers,
            vec![
                ("Location".to_string(), "/next".to_string()),
                ("Set-Cookie".to_string(), "a=1".to_string()),
                ("Set-Cookie".to_string(), "b=2".to_string()),
            ]
        );
    }

    #[test]
    fn header_values_may_contain_colons() {
        let headers = parse_header_lines(&["Location: https://a.test:8443/x".to_string()]);
        assert_eq!(headers[0].1, "https://a.test:8443/x");
    }

    #[test]
    fn framing_matches_decoded_body() {
        let mut headers = vec![
            ("Content-Length".to_string(), "10".to_string()),
            ("Transfer-Encoding".to_string(), "chunked".to_string()),
            ("Content-Type".to_string(), "text/plain".to_string()),
        ];
        settle_framing(&mut headers, 42);
        assert_eq!(
            headers,
            vec![
                ("Content-Length".to_string(), "42".to_string()),
                ("Content-Type".to_string(), "text/plain".to_string()),
            ]
        );
    }

    #[test]
    fn bodiless_answers_keep_their_length() {
        assert!(!carries_body("HEAD", 200));
        assert!(!carries_body("head", 200));
        assert!(!carries_body("GET", 204));
        assert!(!carries_body("GET", 304));
        assert!(carries_body("GET", 200));
        assert!(carries_body("POST", 404));
    }

    #[test]
    fn timeouts_are_gateway_timeouts() {
        assert_eq!(FetchExecutorError::Timeout("t".into()).status(), 504);
        assert_eq!(FetchExecutorError::Connect("c".into()).status(), 502);
    }
}
