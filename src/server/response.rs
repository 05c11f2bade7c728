use lru::LruCache;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use std::num::NonZeroUsize;
use std::sync::Mutex;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

const HEADER_LINE_CACHE_CAPACITY: usize = 1024;

/// `may_minihttp` accepts only `'static` header lines, so dynamic
/// header content has to be promoted with `Box::leak`. Recently emitted
/// lines are kept in an LRU so the fixed header vocabulary (content
/// types, CORS headers, recopied values) reuses one allocation per
/// line instead of leaking a fresh one on every request; only lines
/// past the cache, such as per-request `Location` targets, pay for a
/// new allocation.
static HEADER_LINES: Lazy<Mutex<LruCache<String, &'static str>>> = Lazy::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(HEADER_LINE_CACHE_CAPACITY).unwrap(),
    ))
});

fn header_line(name: &str, value: &str) -> &'static str {
    let line = format!("{name}: {value}");
    let mut lines = HEADER_LINES.lock().unwrap();
    if let Some(interned) = lines.get(line.as_str()).copied() {
        return interned;
    }
    let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
    lines.put(line, leaked);
    leaked
}

/// Write a mock response: status line, headers, then the body when one
/// is present. Multi-valued headers arrive pre-expanded as pairs.
pub fn write_mock_response(
    res: &mut Response,
    status: u16,
    headers: &[(String, String)],
    body: Option<&[u8]>,
) {
    res.status_code(status as usize, status_reason(status));
    for (name, value) in headers {
        res.header(header_line(name, value));
    }
    if let Some(body) = body {
        res.body_vec(body.to_vec());
    }
}

/// Write an error status with a plain-text message body.
pub fn write_error_response(res: &mut Response, status: u16, message: &str) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: text/plain");
    res.body_vec(message.as_bytes().to_vec());
}

/// Write a bare status with no body at all.
pub fn write_empty_response(res: &mut Response, status: u16) {
    res.status_code(status as usize, status_reason(status));
}
