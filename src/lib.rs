pub mod config;
pub mod constraints;
pub mod dispatch;
pub mod events;
pub mod ids;
pub mod model;
pub mod proxy;
pub mod render;
pub mod repository;
pub mod router;
pub mod selection;
pub mod server;

pub use config::MockSettings;
pub use model::{
    build_operation_id,
    load_definitions,
    DispatchContext,
    EvaluableRequest,
    FallbackSpecification,
    MockDefinitions,
    Operation,
    ProxyFallbackSpecification,
    Response,
    Service,
};
pub use server::{MockEngineHandle, MockService};
