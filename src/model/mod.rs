//! # Model Module
//!
//! Domain entities for virtualized services and their canned responses.
//!
//! All entities are externally owned and read-only from the dispatch
//! pipeline's perspective: repositories hand out snapshots, and nothing in
//! the request path mutates them. The only per-request values are
//! [`DispatchContext`] and [`EvaluableRequest`].
//!
//! Serde field naming follows the mock definition file format
//! (camelCase), so a definition document reads:
//!
//! ```json
//! {
//!   "name": "GET /pets/{id}",
//!   "method": "GET",
//!   "resourcePaths": ["/pets/1", "/pets/2"],
//!   "dispatcher": "SEQUENCE",
//!   "dispatcherRules": "id"
//! }
//! ```

mod load;

pub use load::{load_definitions, MockDefinitions};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A virtualized API identified by name and version, grouping operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// One HTTP verb + URI pattern of a service, with dispatching rules.
///
/// `name` has the shape `"<VERB> <uriPattern>"`; the pattern may contain
/// `{var}` or `:var` placeholders. `resource_paths` is the closed set of
/// literal concrete paths the operation was previously observed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub resource_paths: Vec<String>,
    #[serde(default)]
    pub dispatcher: Option<String>,
    #[serde(default)]
    pub dispatcher_rules: Option<String>,
    #[serde(default)]
    pub parameter_constraints: Vec<ParameterConstraint>,
    /// Minimum processing duration in milliseconds, overridable per
    /// request with the `delay` query parameter.
    #[serde(default)]
    pub default_delay: Option<u64>,
    /// JSON pointer used to extract a business id from the request body
    /// for invocation accounting.
    #[serde(default)]
    pub id_path: Option<String>,
}

/// Location where a constrained parameter can be found in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Header,
    Query,
    Path,
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Path => write!(f, "path"),
        }
    }
}

/// Constraint applied to a request parameter before dispatching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterConstraint {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    /// When true and `location == header`, the request header value is
    /// copied onto the response.
    #[serde(default)]
    pub recopy: bool,
    #[serde(default)]
    pub must_match_regexp: Option<String>,
}

/// A response header template. Values are rendered through the template
/// engine before being written out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A canned response attached to an operation.
///
/// `dispatch_criteria` is the storage key produced by the operation's
/// dispatcher; `name` is consulted when SCRIPT/JSON_BODY strategies
/// return a response name directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub operation_id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub dispatch_criteria: Option<String>,
}

/// First-pass dispatch configuration when an operation uses the
/// `FALLBACK` dispatcher. `fallback` is a response *name* consulted when
/// the criterion-based lookup misses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackSpecification {
    pub dispatcher: Option<String>,
    pub dispatcher_rules: Option<String>,
    pub fallback: String,
}

/// First-pass dispatch configuration when an operation uses the
/// `PROXY_FALLBACK` dispatcher. Unmatched requests are forwarded to
/// `proxy_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyFallbackSpecification {
    pub dispatcher: Option<String>,
    pub dispatcher_rules: Option<String>,
    pub proxy_url: String,
}

/// Per-request outcome of dispatch criteria computation.
///
/// `request_context` is populated only by the SCRIPT strategy and is
/// handed to header/body rendering so scripts can publish values for
/// templates.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub dispatch_criteria: Option<String>,
    pub request_context: Option<HashMap<String, serde_json::Value>>,
}

/// Read-only view of the request consumed by the template engine.
///
/// Serialized field names are what templates see, e.g.
/// `{{ request.body }}` or `{{ request.queryParams.status }}`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluableRequest {
    pub body: Option<String>,
    pub path: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub path_variables: HashMap<String, String>,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub context_path: String,
}

/// Storage key for an operation's responses: `<service.id>-<operation.name>`.
pub fn build_operation_id(service: &Service, operation: &Operation) -> String {
    format!("{}-{}", service.id, operation.name)
}
