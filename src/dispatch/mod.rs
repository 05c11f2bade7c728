//! # Dispatch Module
//!
//! Dispatch criteria computation: reduce an incoming request to a
//! deterministic string key used to select among an operation's canned
//! responses.
//!
//! Five evaluation strategies are supported, selected by the operation's
//! dispatcher string:
//!
//! | dispatcher | criteria source |
//! |---|---|
//! | `SEQUENCE`, `URI_PARTS` | URI pattern placeholders |
//! | `URI_PARAMS` | query parameters |
//! | `URI_ELEMENTS` | both, pattern first |
//! | `SCRIPT` | embedded script return value |
//! | `JSON_BODY` | JSON pointer evaluation on the body |
//!
//! `FALLBACK` and `PROXY_FALLBACK` are holder dispatchers: their rules
//! carry a specification whose inner dispatcher drives the first pass
//! (see [`fallback_if_any`] / [`proxy_fallback_if_any`]). `PROXY`
//! forwards unconditionally and produces no criteria.
//!
//! Evaluation failures (script throw, malformed JSON rules) are logged
//! at ERROR and swallowed: the criterion becomes null and the pipeline
//! decides the HTTP outcome. They never surface as a 500.

pub mod criteria;
pub mod json;
pub mod script;

pub use criteria::{extract_from_uri_params, extract_from_uri_pattern, pattern_to_regex, uri_pattern_from_operation_name};
pub use json::JsonEvaluationSpecification;
pub use script::{RhaiScriptEvaluator, ScriptContext, ScriptEvaluator, ServiceStateStore};

use crate::model::{
    DispatchContext, EvaluableRequest, FallbackSpecification, Operation,
    ProxyFallbackSpecification, Service,
};
use crate::repository::ServiceStateRepository;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Dispatch strategy, parsed case-sensitively from the operation's
/// dispatcher string. Unknown dispatchers parse to `None` and produce a
/// null criterion downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStyle {
    Sequence,
    UriParts,
    UriParams,
    UriElements,
    Script,
    JsonBody,
    Proxy,
    Fallback,
    ProxyFallback,
}

impl DispatchStyle {
    pub fn parse(dispatcher: &str) -> Option<Self> {
        match dispatcher {
            "SEQUENCE" => Some(Self::Sequence),
            "URI_PARTS" => Some(Self::UriParts),
            "URI_PARAMS" => Some(Self::UriParams),
            "URI_ELEMENTS" => Some(Self::UriElements),
            "SCRIPT" => Some(Self::Script),
            "JSON_BODY" => Some(Self::JsonBody),
            "PROXY" => Some(Self::Proxy),
            "FALLBACK" => Some(Self::Fallback),
            "PROXY_FALLBACK" => Some(Self::ProxyFallback),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "SEQUENCE",
            Self::UriParts => "URI_PARTS",
            Self::UriParams => "URI_PARAMS",
            Self::UriElements => "URI_ELEMENTS",
            Self::Script => "SCRIPT",
            Self::JsonBody => "JSON_BODY",
            Self::Proxy => "PROXY",
            Self::Fallback => "FALLBACK",
            Self::ProxyFallback => "PROXY_FALLBACK",
        }
    }
}

/// Extract the fallback specification held by a `FALLBACK` dispatcher's
/// rules, if the operation uses one. Malformed rules are logged and
/// treated as no fallback.
pub fn fallback_if_any(operation: &Operation) -> Option<FallbackSpecification> {
    if operation.dispatcher.as_deref() != Some("FALLBACK") {
        return None;
    }
    let rules = operation.dispatcher_rules.as_deref()?;
    match serde_json::from_str(rules) {
        Ok(specification) => Some(specification),
        Err(e) => {
            error!(
                operation = %operation.name,
                error = %e,
                "Dispatcher rules cannot be interpreted as a fallback specification"
            );
            None
        }
    }
}

/// Extract the proxy-fallback specification held by a `PROXY_FALLBACK`
/// dispatcher's rules, if the operation uses one.
pub fn proxy_fallback_if_any(operation: &Operation) -> Option<ProxyFallbackSpecification> {
    if operation.dispatcher.as_deref() != Some("PROXY_FALLBACK") {
        return None;
    }
    let rules = operation.dispatcher_rules.as_deref()?;
    match serde_json::from_str(rules) {
        Ok(specification) => Some(specification),
        Err(e) => {
            error!(
                operation = %operation.name,
                error = %e,
                "Dispatcher rules cannot be interpreted as a proxy-fallback specification"
            );
            None
        }
    }
}

/// Compute the dispatch context for one request.
///
/// `resource_path` must be percent-decoded; `full_uri` keeps the raw
/// query string so `URI_PARAMS` values stay encoded. The returned
/// context carries a null criterion when no dispatcher is set, the
/// dispatcher is unknown, or evaluation failed.
#[allow(clippy::too_many_arguments)]
pub fn compute_dispatch_criteria(
    script_evaluator: &dyn ScriptEvaluator,
    state_repository: &Arc<dyn ServiceStateRepository>,
    service: &Service,
    dispatcher: Option<&str>,
    dispatcher_rules: Option<&str>,
    uri_pattern: &str,
    resource_path: &str,
    full_uri: &str,
    request: &EvaluableRequest,
    body: Option<&str>,
) -> DispatchContext {
    let Some(style) = dispatcher.and_then(DispatchStyle::parse) else {
        if let Some(name) = dispatcher {
            debug!(dispatcher = name, "Unknown dispatcher, null criteria");
        }
        return DispatchContext::default();
    };
    let rules = dispatcher_rules.unwrap_or("");

    let mut context = DispatchContext::default();
    match style {
        DispatchStyle::Sequence | DispatchStyle::UriParts => {
            context.dispatch_criteria =
                Some(extract_from_uri_pattern(rules, uri_pattern, resource_path));
        }
        DispatchStyle::UriParams => {
            context.dispatch_criteria = Some(extract_from_uri_params(rules, full_uri));
        }
        DispatchStyle::UriElements => {
            let mut criteria = extract_from_uri_pattern(rules, uri_pattern, resource_path);
            criteria.push_str(&extract_from_uri_params(rules, full_uri));
            context.dispatch_criteria = Some(criteria);
        }
        DispatchStyle::Script => {
            let mut script_context = ScriptContext {
                request: request.clone(),
                body: body.map(str::to_string),
                store: ServiceStateStore::new(Arc::clone(state_repository), service.id.clone()),
                request_context: HashMap::new(),
            };
            match script_evaluator.evaluate(rules, &mut script_context) {
                Ok(criteria) => context.dispatch_criteria = Some(criteria),
                Err(e) => error!(error = %e, "Error during script evaluation"),
            }
            // The script may have published template values even when it
            // failed to return a criterion.
            context.request_context = Some(script_context.request_context);
        }
        DispatchStyle::JsonBody => {
            match JsonEvaluationSpecification::from_json(rules)
                .and_then(|specification| json::evaluate(body.unwrap_or(""), &specification))
            {
                Ok(criteria) => context.dispatch_criteria = Some(criteria),
                Err(e) => error!(error = %e, "Error during JSON body evaluation"),
            }
        }
        DispatchStyle::Proxy | DispatchStyle::Fallback | DispatchStyle::ProxyFallback => {
            // Holder styles carry no criteria of their own; the first
            // pass runs with the inner dispatcher from the specification.
        }
    }

    debug!(criteria = ?context.dispatch_criteria, "Dispatch criteria computed");
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryServiceStateRepository;

    fn service() -> Service {
        Service {
            id: "svc1".into(),
            name: "Pets".into(),
            version: "1.0".into(),
            operations: vec![],
        }
    }

    fn operation(dispatcher: Option<&str>, rules: Option<&str>) -> Operation {
        Operation {
            name: "GET /pets/{id}".into(),
            method: "GET".into(),
            resource_paths: vec![],
            dispatcher: dispatcher.map(Into::into),
            dispatcher_rules: rules.map(Into::into),
            parameter_constraints: vec![],
            default_delay: None,
            id_path: None,
        }
    }

    fn compute(
        dispatcher: Option<&str>,
        rules: Option<&str>,
        uri_pattern: &str,
        resource_path: &str,
        full_uri: &str,
        body: Option<&str>,
    ) -> DispatchContext {
        let evaluator = RhaiScriptEvaluator::new();
        let state: Arc<dyn ServiceStateRepository> = Arc::new(InMemoryServiceStateRepository::new());
        compute_dispatch_criteria(
            &evaluator,
            &state,
            &service(),
            dispatcher,
            rules,
            uri_pattern,
            resource_path,
            full_uri,
            &EvaluableRequest::default(),
            body,
        )
    }

    #[test]
    fn test_no_dispatcher_yields_null_criteria() {
        let context = compute(None, None, "/pets/{id}", "/pets/1", "/pets/1", None);
        assert_eq!(context.dispatch_criteria, None);
        assert!(context.request_context.is_none());
    }

    #[test]
    fn test_unknown_dispatcher_yields_null_criteria() {
        let context = compute(Some("RANDOM"), None, "/pets/{id}", "/pets/1", "/pets/1", None);
        assert_eq!(context.dispatch_criteria, None);
    }

    #[test]
    fn test_sequence_dispatcher() {
        let context = compute(Some("SEQUENCE"), Some("id"), "/pets/{id}", "/pets/1", "/pets/1", None);
        assert_eq!(context.dispatch_criteria.as_deref(), Some("?id=1"));
    }

    #[test]
    fn test_uri_elements_concatenates_pattern_then_params() {
        let context = compute(
            Some("URI_ELEMENTS"),
            Some("id status"),
            "/pets/{id}",
            "/pets/1",
            "/pets/1?status=available",
            None,
        );
        assert_eq!(
            context.dispatch_criteria.as_deref(),
            Some("?id=1?id=?status=available")
        );
    }

    #[test]
    fn test_uri_elements_keeps_missing_whitelisted_params() {
        // Both legs use the same whitelist; a parameter absent from the
        // query still shows up in the params leg with an empty value.
        let context = compute(
            Some("URI_ELEMENTS"),
            Some("id status"),
            "/pets/{id}",
            "/pets/1",
            "/pets/1",
            None,
        );
        assert_eq!(
            context.dispatch_criteria.as_deref(),
            Some("?id=1?id=?status=")
        );
    }

    #[test]
    fn test_script_failure_swallowed_to_null_criteria() {
        let context = compute(
            Some("SCRIPT"),
            Some("throw \"boom\";"),
            "/pets/{id}",
            "/pets/1",
            "/pets/1",
            None,
        );
        assert_eq!(context.dispatch_criteria, None);
        assert!(context.request_context.is_some());
    }

    #[test]
    fn test_json_body_dispatcher() {
        let rules = r#"{"exp":"/kind","operator":"equals","cases":{"cat":"cat response","default":"other"}}"#;
        let context = compute(
            Some("JSON_BODY"),
            Some(rules),
            "/pets",
            "/pets",
            "/pets",
            Some(r#"{"kind":"cat"}"#),
        );
        assert_eq!(context.dispatch_criteria.as_deref(), Some("cat response"));
    }

    #[test]
    fn test_malformed_json_rules_swallowed() {
        let context = compute(Some("JSON_BODY"), Some("not json"), "/pets", "/pets", "/pets", Some("{}"));
        assert_eq!(context.dispatch_criteria, None);
    }

    #[test]
    fn test_fallback_specification_parsing() {
        let op = operation(
            Some("FALLBACK"),
            Some(r#"{"dispatcher":"SEQUENCE","dispatcherRules":"id","fallback":"default"}"#),
        );
        let fallback = fallback_if_any(&op).unwrap();
        assert_eq!(fallback.dispatcher.as_deref(), Some("SEQUENCE"));
        assert_eq!(fallback.fallback, "default");

        assert!(fallback_if_any(&operation(Some("SEQUENCE"), Some("id"))).is_none());
        assert!(fallback_if_any(&operation(Some("FALLBACK"), Some("not json"))).is_none());
    }

    #[test]
    fn test_proxy_fallback_specification_parsing() {
        let op = operation(
            Some("PROXY_FALLBACK"),
            Some(r#"{"dispatcher":"URI_PARAMS","dispatcherRules":"status","proxyUrl":"http://upstream:8080/api"}"#),
        );
        let proxy = proxy_fallback_if_any(&op).unwrap();
        assert_eq!(proxy.proxy_url, "http://upstream:8080/api");
        assert!(proxy_fallback_if_any(&operation(Some("FALLBACK"), None)).is_none());
    }
}
