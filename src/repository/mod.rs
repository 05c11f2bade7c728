//! # Repository Module
//!
//! Abstract stores for services, responses and per-service state, plus
//! the in-memory implementations used by the binary and the tests.
//!
//! Repositories are read-mostly and shared across request coroutines, so
//! every trait is `Send + Sync` and hands out owned snapshots. The state
//! repository is the only one with interior mutability: scripts may
//! persist cross-request values through it, and read/write atomicity is
//! its concern alone.

use crate::model::{Response, Service};
use std::collections::HashMap;
use std::sync::RwLock;

/// Store of service definitions, looked up by `(name, version)`.
pub trait ServiceRepository: Send + Sync {
    fn find_by_name_and_version(&self, name: &str, version: &str) -> Option<Service>;
}

/// Store of canned responses, indexed by operation id and either the
/// dispatch criteria or the response name.
pub trait ResponseRepository: Send + Sync {
    fn find_by_operation_id_and_dispatch_criteria(
        &self,
        operation_id: &str,
        dispatch_criteria: &str,
    ) -> Vec<Response>;

    fn find_by_operation_id_and_name(&self, operation_id: &str, name: &str) -> Vec<Response>;

    fn find_by_operation_id(&self, operation_id: &str) -> Vec<Response>;
}

/// Key/value store keyed by `(service_id, key)`, mediating any state a
/// dispatch script persists across requests.
pub trait ServiceStateRepository: Send + Sync {
    fn get(&self, service_id: &str, key: &str) -> Option<String>;
    fn put(&self, service_id: &str, key: &str, value: String);
    fn delete(&self, service_id: &str, key: &str);
}

/// In-memory [`ServiceRepository`] over a fixed set of definitions.
#[derive(Debug, Default)]
pub struct InMemoryServiceRepository {
    services: Vec<Service>,
}

impl InMemoryServiceRepository {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }
}

impl ServiceRepository for InMemoryServiceRepository {
    fn find_by_name_and_version(&self, name: &str, version: &str) -> Option<Service> {
        self.services
            .iter()
            .find(|s| s.name == name && s.version == version)
            .cloned()
    }
}

/// In-memory [`ResponseRepository`]. Lookups preserve definition order,
/// which is what makes content negotiation deterministic.
#[derive(Debug, Default)]
pub struct InMemoryResponseRepository {
    responses: Vec<Response>,
}

impl InMemoryResponseRepository {
    pub fn new(responses: Vec<Response>) -> Self {
        Self { responses }
    }
}

impl ResponseRepository for InMemoryResponseRepository {
    fn find_by_operation_id_and_dispatch_criteria(
        &self,
        operation_id: &str,
        dispatch_criteria: &str,
    ) -> Vec<Response> {
        self.responses
            .iter()
            .filter(|r| {
                r.operation_id == operation_id
                    && r.dispatch_criteria.as_deref() == Some(dispatch_criteria)
            })
            .cloned()
            .collect()
    }

    fn find_by_operation_id_and_name(&self, operation_id: &str, name: &str) -> Vec<Response> {
        self.responses
            .iter()
            .filter(|r| r.operation_id == operation_id && r.name == name)
            .cloned()
            .collect()
    }

    fn find_by_operation_id(&self, operation_id: &str) -> Vec<Response> {
        self.responses
            .iter()
            .filter(|r| r.operation_id == operation_id)
            .cloned()
            .collect()
    }
}

/// In-memory [`ServiceStateRepository`] behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryServiceStateRepository {
    entries: RwLock<HashMap<(String, String), String>>,
}

impl InMemoryServiceStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServiceStateRepository for InMemoryServiceStateRepository {
    fn get(&self, service_id: &str, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap()
            .get(&(service_id.to_string(), key.to_string()))
            .cloned()
    }

    fn put(&self, service_id: &str, key: &str, value: String) {
        self.entries
            .write()
            .unwrap()
            .insert((service_id.to_string(), key.to_string()), value);
    }

    fn delete(&self, service_id: &str, key: &str) {
        self.entries
            .write()
            .unwrap()
            .remove(&(service_id.to_string(), key.to_string()));
    }
}
