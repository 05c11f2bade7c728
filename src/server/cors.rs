use crate::config::MockSettings;

/// Allow-methods advertised on synthesized pre-flight responses.
const ALLOWED_METHODS: &str = "POST, PUT, GET, OPTIONS, DELETE, PATCH";

/// Build the header set for a synthesized CORS pre-flight response
/// (status 204, empty body).
///
/// `Access-Control-Request-Headers` from the request is echoed back on
/// both the allow and expose headers. The `Access-Allow-Credentials`
/// spelling is intentional: clients of the original engine depend on it
/// bit-for-bit.
pub fn preflight_headers(
    settings: &MockSettings,
    access_control_request_headers: Option<&str>,
) -> Vec<(String, String)> {
    let mut headers = vec![
        (
            "Access-Control-Allow-Origin".to_string(),
            settings.cors_allowed_origins.clone(),
        ),
        (
            "Access-Control-Allow-Methods".to_string(),
            ALLOWED_METHODS.to_string(),
        ),
    ];

    if let Some(requested) = access_control_request_headers.filter(|h| !h.is_empty()) {
        headers.push(("Access-Control-Allow-Headers".to_string(), requested.to_string()));
        headers.push(("Access-Control-Expose-Headers".to_string(), requested.to_string()));
    }

    headers.push((
        "Access-Allow-Credentials".to_string(),
        settings.cors_allow_credentials.to_string(),
    ));
    headers.push(("Access-Control-Max-Age".to_string(), "3600".to_string()));
    headers.push(("Vary".to_string(), "Accept-Encoding, Origin".to_string()));
    headers
}
