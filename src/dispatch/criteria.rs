//! URI pattern utilities: normalizing operation names into path
//! patterns, converting patterns to regexes for fallback matching, and
//! extracting path variables / query parameters into a canonical
//! dispatch criteria string.
//!
//! Criteria strings are storage keys, so every function here is
//! deterministic: parameter segments are emitted in ascending
//! lexicographic order by name, byte-for-byte stable for equal inputs.

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

/// Extracted `(name, value)` pairs; patterns rarely carry more than a
/// handful of placeholders, so keep them on the stack.
type CriteriaVec = SmallVec<[(String, String); 8]>;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\w-]+\}").unwrap());
static COLON_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/:[^:/]+").unwrap());

const VERBS: [&str; 6] = ["GET ", "POST ", "PUT ", "DELETE ", "PATCH ", "OPTIONS "];

/// Retrieve the URI pattern from an operation name by removing the
/// leading verb, if any. `"GET /pets/{id}"` becomes `"/pets/{id}"`;
/// names without a known verb prefix are returned unchanged.
pub fn uri_pattern_from_operation_name(name: &str) -> &str {
    if VERBS.iter().any(|v| name.starts_with(v)) {
        &name[name.find(' ').unwrap() + 1..]
    } else {
        name
    }
}

/// Produce an anchored regex source matching concrete paths for a URI
/// pattern: `{word}` placeholders and `/:word` segments both become
/// `/([^/]+)`. Used only as a fallback to literal resource-path
/// matching.
pub fn pattern_to_regex(pattern: &str) -> String {
    let replaced = PLACEHOLDER.replace_all(pattern, "([^/]+)");
    let replaced = COLON_SEGMENT.replace_all(&replaced, "/([^/]+)");
    format!("^{replaced}$")
}

/// Split a dispatcher rules string into the whitelist of parameter
/// names. Rules are whitespace- or comma-separated; `&&` connectors are
/// tolerated and ignored.
fn parse_rules(rules: &str) -> Vec<&str> {
    rules
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty() && *t != "&&")
        .collect()
}

/// Extract dispatch criteria from URI placeholders.
///
/// Placeholder names are parsed from `pattern` (`{var}` or `:var`
/// segments) and matched position-wise against `concrete_path`. The
/// criteria string concatenates `"?<name>=<value>"` for each placeholder
/// whitelisted in `rules`, ascending lexicographic by name. A segment
/// count mismatch yields an empty criteria string.
///
/// `concrete_path` is expected percent-decoded: path variable values are
/// taken as seen here and become part of the storage key.
pub fn extract_from_uri_pattern(rules: &str, pattern: &str, concrete_path: &str) -> String {
    let rule_names = parse_rules(rules);

    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = concrete_path.split('/').collect();
    if pattern_parts.len() != path_parts.len() {
        tracing::debug!(
            pattern,
            path = concrete_path,
            "Pattern and path segment counts differ, no criteria extracted"
        );
        return String::new();
    }

    let mut pairs = CriteriaVec::new();
    for (part, value) in pattern_parts.iter().zip(path_parts.iter()) {
        let name = if part.starts_with('{') && part.ends_with('}') {
            &part[1..part.len() - 1]
        } else if let Some(stripped) = part.strip_prefix(':') {
            stripped
        } else {
            continue;
        };
        pairs.push((name.to_string(), value.to_string()));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut criteria = String::new();
    for (name, value) in &pairs {
        if rule_names.iter().any(|r| r == name) {
            criteria.push('?');
            criteria.push_str(name);
            criteria.push('=');
            criteria.push_str(value);
        }
    }
    criteria
}

/// Extract dispatch criteria from URI query parameters.
///
/// For each whitelisted name in `rules`, ascending lexicographic, emit
/// `"?<name>=<value>"` with the raw (still-encoded) value from the query
/// string of `full_uri`, or an empty value when the parameter is absent.
/// When the same parameter repeats, the last occurrence wins.
pub fn extract_from_uri_params(rules: &str, full_uri: &str) -> String {
    let mut rule_names = parse_rules(rules);
    rule_names.sort_unstable();
    rule_names.dedup();

    let query = full_uri.split_once('?').map(|(_, q)| q).unwrap_or("");
    let mut params = CriteriaVec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.push((key.to_string(), value.to_string()));
    }

    let mut criteria = String::new();
    for name in rule_names {
        let value = params
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        criteria.push('?');
        criteria.push_str(name);
        criteria.push('=');
        criteria.push_str(value);
    }
    criteria
}
