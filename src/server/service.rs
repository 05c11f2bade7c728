use super::cors;
use super::request::{
    build_evaluable_request, extract_path_variables, parse_request, MockPath, ParsedRequest,
};
use super::response::{write_empty_response, write_error_response, write_mock_response};
use crate::config::MockSettings;
use crate::constraints::{recopy_headers, validate_parameter_constraints};
use crate::dispatch::{
    compute_dispatch_criteria, fallback_if_any, proxy_fallback_if_any,
    uri_pattern_from_operation_name, RhaiScriptEvaluator, ScriptEvaluator,
};
use crate::events::{extract_id, publish_mock_invocation, InvocationListener, LoggingInvocationListener};
use crate::ids::RequestId;
use crate::model::build_operation_id;
use crate::proxy::{proxy_url_if_needed, ProxyClient, ReqwestProxyClient};
use crate::render::{
    is_absolute_url, render_response_content, render_response_headers, rewrite_relative_location,
    MiniJinjaTemplateEngine, TemplateEngine,
};
use crate::repository::{ResponseRepository, ServiceRepository, ServiceStateRepository};
use crate::router::find_operation;
use crate::selection::ResponseSelector;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, info_span};

/// The mock dispatch pipeline as an HTTP service.
///
/// One instance is cloned per connection by the server runtime; all
/// fields are shared handles, so clones are cheap and requests never
/// share mutable state.
#[derive(Clone)]
pub struct MockService {
    pub service_repository: Arc<dyn ServiceRepository>,
    pub response_repository: Arc<dyn ResponseRepository>,
    pub state_repository: Arc<dyn ServiceStateRepository>,
    pub script_evaluator: Arc<dyn ScriptEvaluator>,
    pub template_engine: Arc<dyn TemplateEngine>,
    pub proxy_client: Arc<dyn ProxyClient>,
    pub invocation_listeners: Vec<Arc<dyn InvocationListener>>,
    pub settings: MockSettings,
}

impl MockService {
    /// Build a service with the default collaborator implementations:
    /// Rhai scripting, MiniJinja templating, reqwest proxying and log
    /// based invocation accounting.
    pub fn with_defaults(
        service_repository: Arc<dyn ServiceRepository>,
        response_repository: Arc<dyn ResponseRepository>,
        state_repository: Arc<dyn ServiceStateRepository>,
        settings: MockSettings,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            service_repository,
            response_repository,
            state_repository,
            script_evaluator: Arc::new(RhaiScriptEvaluator::new()),
            template_engine: Arc::new(MiniJinjaTemplateEngine::new()),
            proxy_client: Arc::new(ReqwestProxyClient::new()?),
            invocation_listeners: vec![Arc::new(LoggingInvocationListener)],
            settings,
        })
    }

    pub fn add_invocation_listener(&mut self, listener: Arc<dyn InvocationListener>) {
        self.invocation_listeners.push(listener);
    }
}

/// Enforce the post-processing minimum duration: sleep whatever remains
/// of `delay_ms` since `start`. Cooperative, cancelled with the request
/// coroutine.
fn wait_for_delay(start: Instant, delay_ms: Option<u64>) {
    let Some(delay) = delay_ms else { return };
    let target = Duration::from_millis(delay);
    let elapsed = start.elapsed();
    if target > elapsed {
        may::coroutine::sleep(target - elapsed);
    }
}

/// Replace-or-insert semantics for rendered headers (name compared
/// case-insensitively).
fn put_header(headers: &mut Vec<(String, String)>, name: &str, values: Vec<String>) {
    headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    for value in values {
        headers.push((name.to_string(), value));
    }
}

impl HttpService for MockService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let start = Instant::now();
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let parsed: ParsedRequest = parse_request(req);
        let request_id =
            RequestId::from_header_or_new(parsed.headers.get("x-request-id").map(String::as_str));

        let Ok(method) = parsed.method.parse::<Method>() else {
            write_empty_response(res, 404);
            return Ok(());
        };
        let Some(mock) = MockPath::parse(&parsed.path) else {
            write_empty_response(res, 404);
            return Ok(());
        };

        let span = info_span!(
            "rest_mock",
            request_id = %request_id,
            service = %mock.service,
            version = %mock.version,
            mock_id = tracing::field::Empty,
        );
        let _enter = span.enter();

        info!(
            service = %mock.service,
            version = %mock.version,
            uri = %parsed.raw_path,
            verb = %method,
            "Servicing mock response"
        );
        debug!(body = ?parsed.body, "Request body");

        // Built before '+' replacement: Location rewrites must reflect
        // the names as the client addressed them.
        let service_and_version = mock.service_and_version();

        // A service name encoded with '+' instead of '%20' means spaces.
        let service_name = if mock.service.contains('+') {
            mock.service.replace('+', " ")
        } else {
            mock.service.clone()
        };

        let Some(service) = self
            .service_repository
            .find_by_name_and_version(&service_name, &mock.version)
        else {
            // Pre-flight requests probe before the service even exists;
            // they get the CORS policy, not the not-found message.
            if self.settings.enable_cors_policy && method == Method::OPTIONS {
                let headers = cors::preflight_headers(
                    &self.settings,
                    parsed
                        .headers
                        .get("access-control-request-headers")
                        .map(String::as_str),
                );
                write_mock_response(res, 204, &headers, None);
                return Ok(());
            }
            write_error_response(
                res,
                404,
                &format!(
                    "The service {service_name} with version {} does not exist!",
                    mock.version
                ),
            );
            return Ok(());
        };

        let Some(operation) = find_operation(&service, &method, &mock.resource_path) else {
            if self.settings.enable_cors_policy && method == Method::OPTIONS {
                debug!("No valid operation found, answering with CORS policy");
                let headers = cors::preflight_headers(
                    &self.settings,
                    parsed
                        .headers
                        .get("access-control-request-headers")
                        .map(String::as_str),
                );
                write_mock_response(res, 204, &headers, None);
            } else {
                debug!("No valid operation found and no CORS policy to apply");
                write_empty_response(res, 404);
            }
            return Ok(());
        };

        debug!(
            operation = %operation.name,
            rules = ?operation.dispatcher_rules,
            "Found a valid operation"
        );

        if let Some(violation) =
            validate_parameter_constraints(operation, &parsed.headers, &parsed.query_params)
        {
            write_error_response(res, 400, &format!("{violation}. Check parameter constraints."));
            return Ok(());
        }

        // The operation's dispatcher drives the first pass, unless a
        // Fallback or Proxy-Fallback holder carries the first-pass rules.
        let mut dispatcher = operation.dispatcher.clone();
        let mut dispatcher_rules = operation.dispatcher_rules.clone();
        let fallback = fallback_if_any(operation);
        if let Some(f) = &fallback {
            dispatcher = f.dispatcher.clone();
            dispatcher_rules = f.dispatcher_rules.clone();
        }
        let proxy_fallback = proxy_fallback_if_any(operation);
        if let Some(p) = &proxy_fallback {
            dispatcher = p.dispatcher.clone();
            dispatcher_rules = p.dispatcher_rules.clone();
        }

        let decoded_path = urlencoding::decode(&mock.resource_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| mock.resource_path.clone());
        let uri_pattern = uri_pattern_from_operation_name(&operation.name);
        let path_variables = extract_path_variables(uri_pattern, &decoded_path);
        let evaluable_request =
            build_evaluable_request(&parsed, &mock.resource_path, path_variables);

        let dispatch_context = compute_dispatch_criteria(
            self.script_evaluator.as_ref(),
            &self.state_repository,
            &service,
            dispatcher.as_deref(),
            dispatcher_rules.as_deref(),
            uri_pattern,
            &decoded_path,
            &parsed.raw_path,
            &evaluable_request,
            parsed.body.as_deref(),
        );
        debug!(
            criteria = ?dispatch_context.dispatch_criteria,
            "Dispatch criteria for finding response"
        );

        let operation_id = build_operation_id(&service, operation);
        let accept = parsed.headers.get("accept").map(String::as_str);
        let selector = ResponseSelector::new(Arc::clone(&self.response_repository));
        let mut mock_response = selector.select(
            &operation_id,
            dispatch_context.dispatch_criteria.as_deref(),
            fallback.as_ref(),
            accept,
        );

        let proxy_target = {
            let mut target = mock.resource_path.clone();
            if let Some(query) = &parsed.raw_query {
                target.push('?');
                target.push_str(query);
            }
            target
        };
        if let Some(url) = proxy_url_if_needed(
            dispatcher.as_deref(),
            dispatcher_rules.as_deref(),
            &proxy_target,
            proxy_fallback.as_ref(),
            mock_response.as_ref(),
        ) {
            info!(url = %url, "Delegating to upstream proxy");
            let upstream = self.proxy_client.call_external(
                &url,
                &method,
                &parsed.headers,
                parsed.body.as_deref(),
            );
            write_mock_response(
                res,
                upstream.status,
                &upstream.headers,
                Some(&upstream.body),
            );
            return Ok(());
        }

        if mock_response.is_none() {
            if dispatcher.is_none() {
                // No dispatcher: any response of the operation will do.
                // This is what lets OPTIONS operations with no dispatch
                // criteria keep working.
                debug!("No response found so far, tempting with bare operation id");
                mock_response = selector.select_any(&operation_id, accept);
            } else {
                write_error_response(
                    res,
                    400,
                    &format!(
                        "The response {} does not exist!",
                        dispatch_context.dispatch_criteria.as_deref().unwrap_or("null")
                    ),
                );
                return Ok(());
            }
        }

        let Some(mock_response) = mock_response else {
            write_empty_response(res, 400);
            return Ok(());
        };

        let status = mock_response
            .status
            .as_deref()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(200);

        let mut response_headers: Vec<(String, String)> = Vec::new();
        if let Some(media_type) = &mock_response.media_type {
            response_headers.push(("Content-Type".to_string(), format!("{media_type};charset=UTF-8")));
        }
        for (name, value) in recopy_headers(operation, &parsed.headers) {
            put_header(&mut response_headers, &name, vec![value]);
        }

        let rendered_headers = render_response_headers(
            self.template_engine.as_ref(),
            &evaluable_request,
            dispatch_context.request_context.as_ref(),
            &mock_response,
        );
        for header in rendered_headers {
            if header.name == "Location" {
                let location = header.values.first().cloned().unwrap_or_default();
                let location = if is_absolute_url(&location) {
                    location
                } else {
                    // Relative redirects must resolve from the client's
                    // perspective, anchored at the mock base path.
                    rewrite_relative_location(&location, &evaluable_request, &service_and_version)
                };
                response_headers.push((header.name, location));
            } else if !header.name.eq_ignore_ascii_case("Transfer-Encoding") {
                put_header(&mut response_headers, &header.name, header.values);
            }
        }

        let content = render_response_content(
            self.template_engine.as_ref(),
            &evaluable_request,
            dispatch_context.request_context.as_ref(),
            &mock_response,
        );

        let delay = parsed
            .query_params
            .get("delay")
            .and_then(|d| d.parse::<u64>().ok())
            .or(operation.default_delay);
        wait_for_delay(start, delay);

        if self.settings.enable_invocation_stats {
            let id = extract_id(
                parsed.body.as_deref(),
                &mock.resource_path,
                operation.id_path.as_deref(),
            );
            span.record("mock_id", tracing::field::display(&id));
            publish_mock_invocation(
                &self.invocation_listeners,
                &service,
                &mock_response,
                started_at,
                &id,
            );
        }

        // HEAD answers with headers only; otherwise return the rendered
        // content when the response carries one.
        let body_bytes = content.map(String::into_bytes);
        let body = if method == Method::HEAD {
            None
        } else {
            body_bytes.as_deref()
        };
        write_mock_response(res, status, &response_headers, body);
        Ok(())
    }
}
