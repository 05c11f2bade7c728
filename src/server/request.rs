use crate::model::EvaluableRequest;
use may_minihttp::Request;
use std::collections::HashMap;
use std::io::Read;

/// Parsed HTTP request data used by `MockService`.
///
/// Header names are lowercased; repeated headers are joined with `", "`.
/// `query_params` values are URL-decoded, while `raw_query` keeps the
/// query string exactly as received (dispatch criteria need the encoded
/// form).
#[derive(Debug, Default, PartialEq)]
pub struct ParsedRequest {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Path including the query string, as received.
    pub raw_path: String,
    pub raw_query: Option<String>,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    /// Body forwarded verbatim as a UTF-8 string.
    pub body: Option<String>,
}

/// Mock addressing parsed from the request path:
/// `/rest/{service}/{version}/**`.
#[derive(Debug, PartialEq)]
pub struct MockPath {
    /// Service name, percent-decoded ('+' kept as-is).
    pub service: String,
    pub version: String,
    /// Resource path after the version segment, still percent-encoded,
    /// with its leading `/`.
    pub resource_path: String,
}

impl MockPath {
    /// Split a request path into service, version and resource path.
    /// Returns `None` when the path is not under `/rest/` or lacks the
    /// service/version segments.
    pub fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix("/rest/")?;
        let (service, rest) = rest.split_once('/')?;
        if service.is_empty() {
            return None;
        }
        let (version, resource) = match rest.split_once('/') {
            Some((version, resource)) => (version, format!("/{resource}")),
            None => (rest, String::new()),
        };
        if version.is_empty() {
            return None;
        }
        Some(MockPath {
            service: urlencoding::decode(service)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| service.to_string()),
            version: urlencoding::decode(version)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| version.to_string()),
            resource_path: resource,
        })
    }

    /// `/{service}/{version}` with the names as addressed by the client;
    /// used to rebase relative `Location` headers.
    pub fn service_and_version(&self) -> String {
        format!("/{}/{}", self.service, self.version)
    }
}

/// Extract useful information from a `may_minihttp::Request`.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();
    let raw_query = raw_path.split_once('?').map(|(_, q)| q.to_string());

    let mut headers: HashMap<String, String> = HashMap::new();
    for h in req.headers().iter() {
        let name = h.name.to_ascii_lowercase();
        let value = String::from_utf8_lossy(h.value).to_string();
        headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let query_params = parse_query_params(&raw_path);

    let body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => Some(body_str),
            _ => None,
        }
    };

    ParsedRequest {
        method,
        path,
        raw_path,
        raw_query,
        headers,
        query_params,
        body,
    }
}

pub fn parse_query_params(path: &str) -> HashMap<String, String> {
    if let Some(pos) = path.find('?') {
        let query_str = &path[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        HashMap::new()
    }
}

/// Scheme/host/port as the client addressed us. Plain HTTP transport,
/// host and port from the `Host` header.
fn client_address(headers: &HashMap<String, String>) -> (String, String, u16) {
    let host_header = headers.get("host").map(String::as_str).unwrap_or("localhost");
    let (host, port) = match host_header.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(80)),
        None => (host_header.to_string(), 80),
    };
    ("http".to_string(), host, port)
}

/// Build the read-only request view handed to script evaluation and
/// template rendering.
pub fn build_evaluable_request(
    parsed: &ParsedRequest,
    resource_path: &str,
    path_variables: HashMap<String, String>,
) -> EvaluableRequest {
    let (scheme, host, port) = client_address(&parsed.headers);
    EvaluableRequest {
        body: parsed.body.clone(),
        path: resource_path.to_string(),
        method: parsed.method.clone(),
        headers: parsed.headers.clone(),
        query_params: parsed.query_params.clone(),
        path_variables,
        scheme,
        host,
        port,
        // No servlet-style context path on this transport.
        context_path: String::new(),
    }
}

/// Zip URI pattern placeholders with the concrete (decoded) path to
/// recover path variables for the template context.
pub fn extract_path_variables(pattern: &str, decoded_path: &str) -> HashMap<String, String> {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = decoded_path.split('/').collect();
    if pattern_parts.len() != path_parts.len() {
        return HashMap::new();
    }
    pattern_parts
        .iter()
        .zip(path_parts.iter())
        .filter_map(|(part, value)| {
            let name = if part.starts_with('{') && part.ends_with('}') {
                &part[1..part.len() - 1]
            } else if let Some(stripped) = part.strip_prefix(':') {
                stripped
            } else {
                return None;
            };
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
