//! Minimal HTTP/1.1 origin for integration tests.
//!
//! Routes:
//! - `GET /page`: small HTML document with headers the edge must strip or keep
//! - `HEAD /page`: the same head with `Content-Length` of the page and no body
//! - `GET /old`: `302` to `/new`
//! - `GET|POST /echo`: request headers (lowercased) and body echoed as text
//! - `GET /slow`: answers after three seconds
//! - anything else: `404`

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub const PAGE: &str = "<html><head><title>t</title></head><body><a href=\"/next\">next</a></body></html>";

/// Starts the server in a background thread and returns its base URL
/// (e.g. "http://127.0.0.1:12345/"). The server runs until the process exits.
pub fn start() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

/// A base URL nothing listens on.
pub fn closed() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&data[..head_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = data[head_end..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], body: &[u8]) {
    write_head(stream, status, headers, body.len());
    let _ = stream.write_all(body);
}

fn write_head(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], length: usize) {
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, length);
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
}

fn handle(mut stream: TcpStream) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/page") => respond(
            &mut stream,
            "200 OK",
            &[
                ("Content-Type", "text/html; charset=utf-8".to_string()),
                ("Content-Security-Policy", "default-src 'none'".to_string()),
                ("X-Frame-Options", "DENY".to_string()),
                ("Set-Cookie", "sid=abc; Path=/".to_string()),
                ("X-Origin", "test".to_string()),
            ],
            PAGE.as_bytes(),
        ),
        ("HEAD", "/page") => write_head(
            &mut stream,
            "200 OK",
            &[("Content-Type", "text/html; charset=utf-8".to_string())],
            PAGE.len(),
        ),
        ("GET", "/old") => respond(&mut stream, "302 Found", &[("Location", "/new".to_string())], b""),
        (_, p) if p.starts_with("/echo") => {
            let mut body = format!("{} {}\n", request.method, request.path);
            for (name, value) in &request.headers {
                body.push_str(&format!("{}: {}\n", name, value));
            }
            body.push('\n');
            let mut body = body.into_bytes();
            body.extend_from_slice(&request.body);
            respond(&mut stream, "200 OK", &[("Content-Type", "text/plain".to_string())], &body);
        }
        ("GET", "/slow") => {
            thread::sleep(Duration::from_secs(3));
            respond(&mut stream, "200 OK", &[], b"late");
        }
        _ => respond(&mut stream, "404 Not Found", &[], b"not found"),
    }
}
