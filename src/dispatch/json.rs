//! JSON body evaluation for the `JSON_BODY` dispatch strategy.
//!
//! Dispatcher rules are a JSON document describing a pointer expression,
//! an operator and a case table:
//!
//! ```json
//! {
//!   "exp": "/country",
//!   "operator": "equals",
//!   "cases": { "FR": "france response", "default": "other response" }
//! }
//! ```
//!
//! Evaluation returns the matching case value, which the response
//! selector treats as either a dispatch criteria or a response name.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed `JSON_BODY` dispatcher rules.
///
/// `cases` is ordered so that `regexp` evaluation is deterministic when
/// several patterns could match.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonEvaluationSpecification {
    /// JSON pointer expression evaluated against the request body.
    pub exp: String,
    /// One of `equals`, `range`, `size`, `regexp`, `presence`.
    pub operator: String,
    /// Case table keyed by candidate value; `default` is the miss case.
    pub cases: BTreeMap<String, String>,
}

impl JsonEvaluationSpecification {
    /// Parse dispatcher rules into a specification.
    pub fn from_json(rules: &str) -> anyhow::Result<Self> {
        serde_json::from_str(rules)
            .map_err(|e| anyhow::anyhow!("dispatcher rules are not a valid JSON evaluation specification: {e}"))
    }
}

const DEFAULT_CASE: &str = "default";

/// Evaluate a request body against a specification, returning the
/// matched case value.
///
/// # Errors
///
/// Returns an error when the body is not valid JSON, or when the
/// operator is unknown or its operand has the wrong shape (non-numeric
/// value for `range`, non-array for `size`, invalid case regex).
pub fn evaluate(body: &str, specification: &JsonEvaluationSpecification) -> anyhow::Result<String> {
    let document: Value = serde_json::from_str(body)
        .map_err(|e| anyhow::anyhow!("request body is not valid JSON: {e}"))?;
    let target = document.pointer(&specification.exp);

    match specification.operator.as_str() {
        "equals" => {
            let value = target.map(value_as_string).unwrap_or_default();
            Ok(pick_case(specification, &value))
        }
        "range" => {
            let number = numeric_operand(target)?;
            for (case, outcome) in &specification.cases {
                if case == DEFAULT_CASE {
                    continue;
                }
                if range_contains(case, number)? {
                    return Ok(outcome.clone());
                }
            }
            Ok(default_case(specification))
        }
        "size" => {
            let size = target
                .and_then(Value::as_array)
                .map(|a| a.len() as f64)
                .ok_or_else(|| anyhow::anyhow!("size operator requires an array at {}", specification.exp))?;
            for (case, outcome) in &specification.cases {
                if case == DEFAULT_CASE {
                    continue;
                }
                if range_contains(case, size)? {
                    return Ok(outcome.clone());
                }
            }
            Ok(default_case(specification))
        }
        "regexp" => {
            let value = target.map(value_as_string).unwrap_or_default();
            for (case, outcome) in &specification.cases {
                if case == DEFAULT_CASE {
                    continue;
                }
                let re = regex::Regex::new(case)
                    .map_err(|e| anyhow::anyhow!("case {case} is not a valid regex: {e}"))?;
                if re.is_match(&value) {
                    return Ok(outcome.clone());
                }
            }
            Ok(default_case(specification))
        }
        "presence" => {
            let case = if target.is_some() { "found" } else { "missing" };
            Ok(pick_case(specification, case))
        }
        other => Err(anyhow::anyhow!("unknown JSON evaluation operator: {other}")),
    }
}

/// Stringify a JSON value the way case keys are written: strings
/// unquoted, everything else in its canonical JSON form.
fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn numeric_operand(target: Option<&Value>) -> anyhow::Result<f64> {
    target
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow::anyhow!("range operator requires a numeric operand"))
}

fn pick_case(specification: &JsonEvaluationSpecification, value: &str) -> String {
    specification
        .cases
        .get(value)
        .cloned()
        .unwrap_or_else(|| default_case(specification))
}

fn default_case(specification: &JsonEvaluationSpecification) -> String {
    specification.cases.get(DEFAULT_CASE).cloned().unwrap_or_default()
}

/// Check a numeric value against a range case key like `[0;10]`.
/// A square bracket pointing inward (`[` min, `]` max) is inclusive;
/// pointing outward it is exclusive.
fn range_contains(case: &str, value: f64) -> anyhow::Result<bool> {
    let malformed = || anyhow::anyhow!("case {case} is not a valid range");

    if case.len() < 2 {
        return Err(malformed());
    }
    let open = case.chars().next().ok_or_else(malformed)?;
    let close = case.chars().last().ok_or_else(malformed)?;
    if !matches!(open, '[' | ']') || !matches!(close, '[' | ']') {
        return Err(malformed());
    }

    let inner = &case[1..case.len() - 1];
    let (min_str, max_str) = inner.split_once(';').ok_or_else(malformed)?;
    let min: f64 = min_str.trim().parse().map_err(|_| malformed())?;
    let max: f64 = max_str.trim().parse().map_err(|_| malformed())?;

    let above_min = if open == '[' { value >= min } else { value > min };
    let below_max = if close == ']' { value <= max } else { value < max };
    Ok(above_min && below_max)
}
