//! # Render Module
//!
//! Response rendering: headers and body run through a template engine
//! with a request-derived context before being written out.
//!
//! The engine itself sits behind [`TemplateEngine`]; the shipped
//! implementation embeds [MiniJinja](https://docs.rs/minijinja).
//! Templates see three roots:
//!
//! - `request`: the [`EvaluableRequest`] view
//!   (`{{ request.body }}`, `{{ request.queryParams.status }}`),
//! - `requestContext`: values a dispatch script published,
//! - `response`: the selected response's name.
//!
//! Rendering is lenient: a template that fails to render is used
//! unrendered, with a WARN. Mock traffic must keep flowing even when a
//! template is broken.

use crate::model::{EvaluableRequest, Header, Response};
use minijinja::{Environment, UndefinedBehavior};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Anchored matcher deciding whether a `Location` value is already
/// absolute from the client's perspective.
static ABSOLUTE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+\-.]*://.*").unwrap());

/// True when `value` is an absolute URL (`scheme://...`).
pub fn is_absolute_url(value: &str) -> bool {
    ABSOLUTE_URL.is_match(value)
}

/// Rewrite a relative `Location` into an absolute URL from the client's
/// perspective, anchored at the mock base path of the service.
pub fn rewrite_relative_location(
    location: &str,
    request: &EvaluableRequest,
    service_and_version: &str,
) -> String {
    format!(
        "{}://{}:{}{}/rest{}{}",
        request.scheme, request.host, request.port, request.context_path, service_and_version, location
    )
}

/// Context handed to the template engine for one rendering call.
pub struct RenderContext<'a> {
    pub request: &'a EvaluableRequest,
    pub request_context: Option<&'a HashMap<String, serde_json::Value>>,
    pub response_name: &'a str,
}

/// String-to-string template rendering over a request context.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &RenderContext<'_>) -> String;
}

/// [`TemplateEngine`] backed by an embedded MiniJinja environment.
pub struct MiniJinjaTemplateEngine {
    environment: Environment<'static>,
}

impl MiniJinjaTemplateEngine {
    pub fn new() -> Self {
        let mut environment = Environment::new();
        // Missing values render empty instead of failing the response.
        environment.set_undefined_behavior(UndefinedBehavior::Lenient);
        Self { environment }
    }
}

impl Default for MiniJinjaTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaTemplateEngine {
    fn render(&self, template: &str, context: &RenderContext<'_>) -> String {
        if !template.contains("{{") && !template.contains("{%") {
            return template.to_string();
        }
        let values = minijinja::context! {
            request => context.request,
            requestContext => context.request_context,
            response => context.response_name,
        };
        match self.environment.render_str(template, values) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "Template rendering failed, using unrendered template");
                template.to_string()
            }
        }
    }
}

/// Render every header of the response through the template engine.
/// Header names are kept verbatim; only values are templates.
pub fn render_response_headers(
    engine: &dyn TemplateEngine,
    request: &EvaluableRequest,
    request_context: Option<&HashMap<String, serde_json::Value>>,
    response: &Response,
) -> Vec<Header> {
    let context = RenderContext {
        request,
        request_context,
        response_name: &response.name,
    };
    response
        .headers
        .iter()
        .map(|header| Header {
            name: header.name.clone(),
            values: header
                .values
                .iter()
                .map(|value| engine.render(value, &context))
                .collect(),
        })
        .collect()
}

/// Render the response body, if the response carries one.
pub fn render_response_content(
    engine: &dyn TemplateEngine,
    request: &EvaluableRequest,
    request_context: Option<&HashMap<String, serde_json::Value>>,
    response: &Response,
) -> Option<String> {
    let context = RenderContext {
        request,
        request_context,
        response_name: &response.name,
    };
    response
        .content
        .as_ref()
        .map(|content| engine.render(content, &context))
}
