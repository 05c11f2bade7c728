//! # Server Module
//!
//! The HTTP surface of the mock engine, built on `may_minihttp` and the
//! `may` coroutine runtime.
//!
//! Each request flows through [`MockService::call`](service::MockService):
//!
//! 1. parse the request and the `/rest/{service}/{version}/**` address,
//! 2. resolve the service and operation,
//! 3. validate parameter constraints,
//! 4. compute the dispatch criteria,
//! 5. select the canned response (or delegate to the proxy),
//! 6. render headers and body through the template engine,
//! 7. enforce the artificial delay and publish the invocation event.
//!
//! One coroutine serves one request; all shared state is read-only
//! configuration plus thread-safe collaborator handles.

/// CORS pre-flight synthesis
pub mod cors;
/// Engine lifecycle: serve, readiness, shutdown
pub mod engine;
/// Request parsing and the mock path grammar
pub mod request;
/// Response writing utilities
pub mod response;
/// The dispatch pipeline service
pub mod service;

pub use engine::MockEngineHandle;
pub use request::{parse_request, MockPath, ParsedRequest};
pub use service::MockService;
