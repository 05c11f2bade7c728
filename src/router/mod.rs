//! # Router Module
//!
//! Operation resolution: match an incoming `(method, resource path)`
//! pair to one of a service's operations.
//!
//! Resolution is two-pass. The first pass compares the resource path
//! literally against each operation's observed `resource_paths` (with
//! and without a trailing slash). The second pass falls back to regex
//! matching over the operation's URI pattern, which is what lets
//! operations with open-ended dispatchers match paths they have never
//! been observed at.
//!
//! Both passes scan operations in definition order and return the first
//! match, so overlapping patterns (`/pets/{id}` vs `/pets/count`)
//! resolve deterministically to whichever operation is defined first.

use crate::dispatch::{pattern_to_regex, uri_pattern_from_operation_name};
use crate::model::{Operation, Service};
use http::Method;
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Services are editable at runtime, so pattern regexes are compiled on
/// demand and cached rather than precompiled per routing table.
static PATTERN_CACHE: Lazy<Mutex<LruCache<String, Regex>>> =
    Lazy::new(|| Mutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())));

fn compiled_pattern(pattern: &str) -> Option<Regex> {
    let mut cache = PATTERN_CACHE.lock().unwrap();
    if let Some(regex) = cache.get(pattern) {
        return Some(regex.clone());
    }
    match Regex::new(&pattern_to_regex(pattern)) {
        Ok(regex) => {
            cache.put(pattern.to_string(), regex.clone());
            Some(regex)
        }
        Err(e) => {
            warn!(pattern, error = %e, "Operation pattern does not compile to a regex");
            None
        }
    }
}

/// Find the operation of `service` matching the request verb and
/// resource path, or `None`.
///
/// The literal pass compares the resource path exactly as received
/// (still percent-encoded); only criteria extraction later works on the
/// decoded form.
pub fn find_operation<'a>(
    service: &'a Service,
    method: &Method,
    resource_path: &str,
) -> Option<&'a Operation> {
    let trimmed_path = resource_path.strip_suffix('/').unwrap_or(resource_path);

    for operation in &service.operations {
        if operation.method != method.as_str() {
            continue;
        }
        if operation
            .resource_paths
            .iter()
            .any(|p| p == resource_path || p == trimmed_path)
        {
            debug!(
                operation = %operation.name,
                path = resource_path,
                "Operation resolved by literal resource path"
            );
            return Some(operation);
        }
    }

    // No literal match: try again considering only the verb and the
    // operation's URI pattern.
    for operation in &service.operations {
        if operation.method != method.as_str() {
            continue;
        }
        let pattern = uri_pattern_from_operation_name(&operation.name);
        if let Some(regex) = compiled_pattern(pattern) {
            if regex.is_match(resource_path) {
                debug!(
                    operation = %operation.name,
                    path = resource_path,
                    "Operation resolved by pattern match"
                );
                return Some(operation);
            }
        }
    }

    None
}
