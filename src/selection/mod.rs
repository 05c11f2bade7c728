//! # Selection Module
//!
//! Response selection: given an operation id and the computed dispatch
//! criteria, locate the canned response to serve.
//!
//! Lookup cascade:
//!
//! 1. by dispatch criteria, the common case;
//! 2. by response *name*, since SCRIPT and JSON_BODY strategies may return
//!    the name of a response directly;
//! 3. by the fallback response name, when a fallback is configured.
//!
//! A fourth lookup (all responses of the operation, used only when the
//! operation has no dispatcher) is driven by the pipeline since its
//! outcome changes the error mapping.
//!
//! Every lookup runs the candidate list through content negotiation
//! over the request's `Accept` header.

use crate::model::{FallbackSpecification, Response};
use crate::repository::ResponseRepository;
use std::sync::Arc;
use tracing::debug;

/// Pick a response from candidates according to the `Accept` header.
///
/// An empty or absent `Accept` selects the first candidate. Otherwise
/// the first candidate whose `media_type` equals the header wins, with
/// the first candidate as fallback. Comparison is case-sensitive over
/// the full string; media type parameters are not parsed.
pub fn by_media_type<'a>(responses: &'a [Response], accept: Option<&str>) -> Option<&'a Response> {
    let first = responses.first()?;
    match accept {
        Some(accept) if !accept.is_empty() => Some(
            responses
                .iter()
                .find(|r| r.media_type.as_deref() == Some(accept))
                .unwrap_or(first),
        ),
        _ => Some(first),
    }
}

/// Response selector over the response repository.
#[derive(Clone)]
pub struct ResponseSelector {
    repository: Arc<dyn ResponseRepository>,
}

impl ResponseSelector {
    pub fn new(repository: Arc<dyn ResponseRepository>) -> Self {
        Self { repository }
    }

    /// Run the criteria → name → fallback lookup cascade.
    pub fn select(
        &self,
        operation_id: &str,
        dispatch_criteria: Option<&str>,
        fallback: Option<&FallbackSpecification>,
        accept: Option<&str>,
    ) -> Option<Response> {
        if let Some(criteria) = dispatch_criteria {
            let candidates = self
                .repository
                .find_by_operation_id_and_dispatch_criteria(operation_id, criteria);
            if let Some(response) = by_media_type(&candidates, accept) {
                debug!(operation_id, criteria, response = %response.name, "Response found by criteria");
                return Some(response.clone());
            }

            // SCRIPT and JSON_BODY evaluations may name a response instead.
            let candidates = self
                .repository
                .find_by_operation_id_and_name(operation_id, criteria);
            if let Some(response) = by_media_type(&candidates, accept) {
                debug!(operation_id, criteria, response = %response.name, "Response found by name");
                return Some(response.clone());
            }
        }

        if let Some(fallback) = fallback {
            let candidates = self
                .repository
                .find_by_operation_id_and_name(operation_id, &fallback.fallback);
            if let Some(response) = by_media_type(&candidates, accept) {
                debug!(operation_id, fallback = %fallback.fallback, "Response found by fallback name");
                return Some(response.clone());
            }
        }

        None
    }

    /// Any response of the operation, negotiated. Used when the
    /// operation has no dispatcher at all.
    pub fn select_any(&self, operation_id: &str, accept: Option<&str>) -> Option<Response> {
        let candidates = self.repository.find_by_operation_id(operation_id);
        by_media_type(&candidates, accept).cloned()
    }
}
