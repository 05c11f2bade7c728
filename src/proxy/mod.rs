//! # Proxy Module
//!
//! Upstream forwarding: decide whether a request must be proxied and,
//! when it must, perform the outbound call.
//!
//! Forwarding happens in two cases:
//!
//! - the operation uses the `PROXY` dispatcher (unconditional forward,
//!   target built from the dispatcher rules plus the resource path), or
//! - a `PROXY_FALLBACK` specification is configured and no canned
//!   response was selected.
//!
//! When a proxy URL is produced the pipeline delegates entirely to the
//! [`ProxyClient`] and returns its response untouched.

use crate::model::{ProxyFallbackSpecification, Response};
use http::Method;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

/// Verbatim response from an upstream call.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Outbound HTTP client used for proxying.
pub trait ProxyClient: Send + Sync {
    /// Forward the request upstream. Transport failures surface as a
    /// 502 response; upstream responses are returned verbatim.
    fn call_external(
        &self,
        url: &str,
        method: &Method,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> ProxyResponse;
}

/// Compose the upstream target from a base URL and the resource path
/// (which may carry the original query string).
fn compose_proxy_url(base: &str, resource_path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), resource_path)
}

/// Decide whether the request must be forwarded upstream.
///
/// Returns the target URL for a `PROXY` dispatcher, or for a configured
/// proxy-fallback when no response was selected. `resource_path` should
/// include the query string so it reaches the upstream unchanged.
pub fn proxy_url_if_needed(
    dispatcher: Option<&str>,
    dispatcher_rules: Option<&str>,
    resource_path: &str,
    proxy_fallback: Option<&ProxyFallbackSpecification>,
    response: Option<&Response>,
) -> Option<String> {
    if dispatcher == Some("PROXY") {
        let base = dispatcher_rules.unwrap_or("");
        let url = compose_proxy_url(base, resource_path);
        debug!(url = %url, "Unconditional proxy dispatch");
        return Some(url);
    }
    if let Some(fallback) = proxy_fallback {
        if response.is_none() {
            let url = compose_proxy_url(&fallback.proxy_url, resource_path);
            debug!(url = %url, "No response matched, proxy fallback engaged");
            return Some(url);
        }
    }
    None
}

/// Hop-by-hop headers that must not be forwarded in either direction.
const HOP_BY_HOP: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// [`ProxyClient`] backed by a blocking reqwest client.
pub struct ReqwestProxyClient {
    client: reqwest::blocking::Client,
}

impl ReqwestProxyClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

impl ProxyClient for ReqwestProxyClient {
    fn call_external(
        &self,
        url: &str,
        method: &Method,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> ProxyResponse {
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        match request.send() {
            Ok(upstream) => {
                let status = upstream.status().as_u16();
                let headers = upstream
                    .headers()
                    .iter()
                    .filter(|(name, _)| !HOP_BY_HOP.contains(&name.as_str()))
                    .filter_map(|(name, value)| {
                        value
                            .to_str()
                            .ok()
                            .map(|v| (name.as_str().to_string(), v.to_string()))
                    })
                    .collect();
                let body = upstream.bytes().map(|b| b.to_vec()).unwrap_or_default();
                ProxyResponse { status, headers, body }
            }
            Err(e) => {
                error!(url, error = %e, "Proxy call failed");
                ProxyResponse {
                    status: 502,
                    headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
                    body: format!("Proxy call to {url} failed: {e}").into_bytes(),
                }
            }
        }
    }
}
