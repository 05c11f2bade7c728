use super::{Response, Service};
use serde::Deserialize;
use std::path::Path;

/// A mock definition document: the services to virtualize plus their
/// canned responses. Responses reference operations through
/// `operationId` (see [`crate::model::build_operation_id`]).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDefinitions {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub responses: Vec<Response>,
}

/// Load a mock definition file. Supports both YAML and JSON, decided by
/// file extension.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse as a
/// definition document.
pub fn load_definitions<P: AsRef<Path>>(path: P) -> anyhow::Result<MockDefinitions> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read definitions file {}: {e}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let definitions: MockDefinitions = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    tracing::info!(
        path = %path.display(),
        services = definitions.services.len(),
        responses = definitions.responses.len(),
        "Mock definitions loaded"
    );
    Ok(definitions)
}
