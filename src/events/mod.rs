//! # Events Module
//!
//! Invocation accounting: when enabled, every served mock response
//! publishes a [`MockInvocationEvent`] to the registered listeners and
//! annotates the current tracing span with the extracted request id.

use crate::model::{Response, Service};
use std::sync::Arc;
use tracing::info;

/// Telemetry event describing one served mock invocation.
#[derive(Debug, Clone)]
pub struct MockInvocationEvent {
    pub service_name: String,
    pub service_version: String,
    pub response_name: String,
    /// Milliseconds since the Unix epoch at request start.
    pub invocation_timestamp: u128,
    /// Business id extracted from the request (see [`extract_id`]).
    pub id: String,
}

/// Sink for invocation events. Listeners run inline on the request
/// coroutine, so implementations should be quick or hand off.
pub trait InvocationListener: Send + Sync {
    fn on_mock_invocation(&self, event: &MockInvocationEvent);
}

/// Listener that records invocations as structured log events.
#[derive(Debug, Default)]
pub struct LoggingInvocationListener;

impl InvocationListener for LoggingInvocationListener {
    fn on_mock_invocation(&self, event: &MockInvocationEvent) {
        info!(
            service = %event.service_name,
            version = %event.service_version,
            response = %event.response_name,
            invocation_timestamp = event.invocation_timestamp,
            request_id = %event.id,
            "Mock invocation"
        );
    }
}

/// Extract a business id for accounting.
///
/// When the operation defines an `id_path`, it is applied as a JSON
/// pointer to the request body. Otherwise (or when the pointer misses)
/// the last resource path segment is used as a best effort.
pub fn extract_id(body: Option<&str>, resource_path: &str, id_path: Option<&str>) -> String {
    if let (Some(body), Some(pointer)) = (body, id_path) {
        if let Ok(document) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(value) = document.pointer(pointer) {
                return match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
    }
    resource_path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Publish an event to every listener.
pub fn publish_mock_invocation(
    listeners: &[Arc<dyn InvocationListener>],
    service: &Service,
    response: &Response,
    invocation_timestamp: u128,
    id: &str,
) {
    let event = MockInvocationEvent {
        service_name: service.name.clone(),
        service_version: service.version.clone(),
        response_name: response.name.clone(),
        invocation_timestamp,
        id: id.to_string(),
    };
    for listener in listeners {
        listener.on_mock_invocation(&event);
    }
}
