//! # Configuration Module
//!
//! Environment variable-based configuration for the mock engine.
//!
//! ## Environment Variables
//!
//! | variable | default | effect |
//! |---|---|---|
//! | `MOCKS_ENABLE_INVOCATION_STATS` | `true` | emit invocation events |
//! | `MOCKS_REST_ENABLE_CORS_POLICY` | `true` | synthesize CORS pre-flight responses |
//! | `MOCKS_REST_CORS_ALLOWED_ORIGINS` | `*` | `Access-Control-Allow-Origin` value |
//! | `MOCKS_REST_CORS_ALLOW_CREDENTIALS` | `false` | credentials flag on pre-flight |
//!
//! Booleans accept `true/false`, `1/0`, `yes/no` (case-insensitive);
//! anything else falls back to the default.

use std::env;

/// Process-wide mock engine settings, loaded once at startup and shared
/// read-only across request coroutines.
#[derive(Debug, Clone)]
pub struct MockSettings {
    /// Publish an invocation event for every served mock response.
    pub enable_invocation_stats: bool,
    /// Answer OPTIONS requests on unknown operations with a synthesized
    /// CORS pre-flight response.
    pub enable_cors_policy: bool,
    /// Value for `Access-Control-Allow-Origin` on pre-flight responses.
    pub cors_allowed_origins: String,
    /// Credentials flag echoed on pre-flight responses.
    pub cors_allow_credentials: bool,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            enable_invocation_stats: true,
            enable_cors_policy: true,
            cors_allowed_origins: "*".to_string(),
            cors_allow_credentials: false,
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) => match val.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

impl MockSettings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_invocation_stats: env_bool(
                "MOCKS_ENABLE_INVOCATION_STATS",
                defaults.enable_invocation_stats,
            ),
            enable_cors_policy: env_bool(
                "MOCKS_REST_ENABLE_CORS_POLICY",
                defaults.enable_cors_policy,
            ),
            cors_allowed_origins: env::var("MOCKS_REST_CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
            cors_allow_credentials: env_bool(
                "MOCKS_REST_CORS_ALLOW_CREDENTIALS",
                defaults.cors_allow_credentials,
            ),
        }
    }
}
