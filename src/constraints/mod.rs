//! # Constraints Module
//!
//! Parameter constraint validation and header recopy.
//!
//! Constraints guard an operation before any dispatching happens: a
//! violation short-circuits the pipeline with a 400. Only header and
//! query locations are validated; path parameters are implicitly
//! validated by operation resolution.

use crate::model::{Operation, ParameterConstraint, ParameterLocation};
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Validate every constraint of the operation, returning the first
/// violation message, if any.
///
/// `headers` keys are expected lowercased (header names are
/// case-insensitive); `query_params` keys are exact.
pub fn validate_parameter_constraints(
    operation: &Operation,
    headers: &HashMap<String, String>,
    query_params: &HashMap<String, String>,
) -> Option<String> {
    for constraint in &operation.parameter_constraints {
        let violation = validate_constraint(constraint, headers, query_params);
        if violation.is_some() {
            return violation;
        }
    }
    None
}

/// Validate a single constraint against the request, returning a
/// violation message or `None`.
pub fn validate_constraint(
    constraint: &ParameterConstraint,
    headers: &HashMap<String, String>,
    query_params: &HashMap<String, String>,
) -> Option<String> {
    let value = match constraint.location {
        ParameterLocation::Header => headers.get(&constraint.name.to_ascii_lowercase()),
        ParameterLocation::Query => query_params.get(&constraint.name),
        ParameterLocation::Path => return None,
    };

    match value {
        None => {
            if constraint.required {
                return Some(format!("Parameter {} is required", constraint.name));
            }
        }
        Some(value) => {
            if let Some(pattern) = &constraint.must_match_regexp {
                match Regex::new(pattern) {
                    Ok(regex) => {
                        // Full-string match, not a substring search.
                        let anchored = regex
                            .find(value)
                            .map(|m| m.start() == 0 && m.end() == value.len())
                            .unwrap_or(false);
                        if !anchored {
                            return Some(format!(
                                "Parameter {} should match {}",
                                constraint.name, pattern
                            ));
                        }
                    }
                    Err(e) => {
                        warn!(
                            parameter = %constraint.name,
                            pattern = %pattern,
                            error = %e,
                            "Constraint regex does not compile, skipping validation"
                        );
                    }
                }
            }
        }
    }
    None
}

/// Collect `(name, value)` pairs for header constraints flagged
/// `recopy`: those request header values are copied onto the response.
pub fn recopy_headers(
    operation: &Operation,
    headers: &HashMap<String, String>,
) -> Vec<(String, String)> {
    operation
        .parameter_constraints
        .iter()
        .filter(|c| c.location == ParameterLocation::Header && c.recopy)
        .filter_map(|c| {
            headers
                .get(&c.name.to_ascii_lowercase())
                .map(|value| (c.name.clone(), value.clone()))
        })
        .collect()
}
