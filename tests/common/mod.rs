//! Shared fixtures: a `Pets` service builder, in-memory repositories,
//! a running mock server per test, and a minimal raw-socket HTTP client
//! so assertions see the wire bytes exactly as a client would.

#![allow(dead_code)]

use mockwire::config::MockSettings;
use mockwire::model::{Header, Operation, Response, Service};
use mockwire::repository::{
    InMemoryResponseRepository, InMemoryServiceRepository, InMemoryServiceStateRepository,
};
use mockwire::server::{MockEngineHandle, MockService};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

pub fn operation(
    name: &str,
    method: &str,
    resource_paths: &[&str],
    dispatcher: Option<&str>,
    dispatcher_rules: Option<&str>,
) -> Operation {
    Operation {
        name: name.into(),
        method: method.into(),
        resource_paths: resource_paths.iter().map(|p| p.to_string()).collect(),
        dispatcher: dispatcher.map(Into::into),
        dispatcher_rules: dispatcher_rules.map(Into::into),
        parameter_constraints: vec![],
        default_delay: None,
        id_path: None,
    }
}

pub fn pets_service(operations: Vec<Operation>) -> Service {
    Service {
        id: "pets-1".into(),
        name: "Pets".into(),
        version: "1.0".into(),
        operations,
    }
}

pub fn response(
    operation_id: &str,
    name: &str,
    media_type: Option<&str>,
    content: Option<&str>,
    dispatch_criteria: Option<&str>,
) -> Response {
    Response {
        id: name.into(),
        operation_id: operation_id.into(),
        name: name.into(),
        status: Some("200".into()),
        media_type: media_type.map(Into::into),
        content: content.map(Into::into),
        headers: vec![],
        dispatch_criteria: dispatch_criteria.map(Into::into),
    }
}

pub fn header(name: &str, values: &[&str]) -> Header {
    Header {
        name: name.into(),
        values: values.iter().map(|v| v.to_string()).collect(),
    }
}

/// A running mock engine bound to an ephemeral port.
pub struct TestServer {
    pub addr: String,
    handle: Option<MockEngineHandle>,
}

impl TestServer {
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    listener.local_addr().expect("probe addr").port()
}

/// Start a mock engine over the given definitions and wait until it
/// accepts connections.
pub fn start_server(
    services: Vec<Service>,
    responses: Vec<Response>,
    settings: MockSettings,
) -> TestServer {
    // Proxy tests block a worker thread on the outbound call while the
    // upstream engine serves from the same runtime.
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        may::config().set_workers(4).set_stack_size(0x20000);
    });

    let service = MockService::with_defaults(
        Arc::new(InMemoryServiceRepository::new(services)),
        Arc::new(InMemoryResponseRepository::new(responses)),
        Arc::new(InMemoryServiceStateRepository::new()),
        settings,
    )
    .expect("build mock service");

    let addr = format!("127.0.0.1:{}", free_port());
    let handle = service.serve(&addr).expect("start server");
    handle.wait_ready().expect("server ready");
    TestServer {
        addr,
        handle: Some(handle),
    }
}

/// Parsed wire response.
#[derive(Debug)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl WireResponse {
    /// First header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .count()
    }
}

/// Issue one HTTP/1.1 request over a fresh connection and parse the
/// response. Body framing relies on `Content-Length`, which the server
/// always writes.
pub fn http_request(
    addr: &str,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> WireResponse {
    let mut stream = TcpStream::connect(addr).expect("connect");

    let mut request = format!("{method} {path} HTTP/1.1\r\n");
    if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("host")) {
        request.push_str(&format!("Host: {addr}\r\n"));
    }
    for (name, value) in headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    let body_bytes = body.unwrap_or("");
    request.push_str(&format!("Content-Length: {}\r\n", body_bytes.len()));
    request.push_str("Connection: close\r\n\r\n");
    request.push_str(body_bytes);
    stream.write_all(request.as_bytes()).expect("write request");

    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end;
    loop {
        let n = stream.read(&mut buf).expect("read response");
        if n == 0 {
            panic!("connection closed before headers were complete");
        }
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = find_header_end(&raw) {
            header_end = pos;
            break;
        }
    }

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().expect("status line");
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .expect("status code")
        .parse()
        .expect("numeric status");

    let mut parsed_headers = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            parsed_headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length: usize = parsed_headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);

    let mut body_bytes = raw[header_end + 4..].to_vec();
    while body_bytes.len() < content_length {
        let n = stream.read(&mut buf).expect("read body");
        if n == 0 {
            break;
        }
        body_bytes.extend_from_slice(&buf[..n]);
    }
    body_bytes.truncate(content_length);

    WireResponse {
        status,
        headers: parsed_headers,
        body: String::from_utf8_lossy(&body_bytes).to_string(),
    }
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Map-based convenience over repeated header pairs, last wins.
pub fn headers_map(headers: &[(String, String)]) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(n, v)| (n.to_ascii_lowercase(), v.clone()))
        .collect()
}
