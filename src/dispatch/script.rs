//! Script evaluation for the `SCRIPT` dispatch strategy.
//!
//! Dispatcher rules are a script whose return value becomes the dispatch
//! criteria (or a response name). Scripts see four bindings:
//!
//! - `request`: the read-only request view (method, path, headers,
//!   query parameters, body),
//! - `body`: the raw request body string,
//! - `requestContext`: a mutable map whose entries flow into header and
//!   body template rendering,
//! - `store`: a [`ServiceStateStore`] scoped to the service, for state
//!   that must survive across requests.
//!
//! The engine itself is abstracted behind [`ScriptEvaluator`] so the
//! pipeline never presupposes a concrete language; the shipped
//! implementation embeds [Rhai](https://rhai.rs).

use crate::model::EvaluableRequest;
use crate::repository::ServiceStateRepository;
use lru::LruCache;
use rhai::{Dynamic, Engine, Map, Scope, AST};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Script-facing view of the per-service key/value state. Cloneable and
/// cheap: it carries the service id and a handle to the repository.
#[derive(Clone)]
pub struct ServiceStateStore {
    repository: Arc<dyn ServiceStateRepository>,
    service_id: String,
}

impl ServiceStateStore {
    pub fn new(repository: Arc<dyn ServiceStateRepository>, service_id: impl Into<String>) -> Self {
        Self {
            repository,
            service_id: service_id.into(),
        }
    }

    fn get(&mut self, key: &str) -> Dynamic {
        match self.repository.get(&self.service_id, key) {
            Some(value) => value.into(),
            None => Dynamic::UNIT,
        }
    }

    fn put(&mut self, key: &str, value: &str) {
        self.repository.put(&self.service_id, key, value.to_string());
    }

    fn delete(&mut self, key: &str) {
        self.repository.delete(&self.service_id, key);
    }
}

/// Everything a dispatch script may observe or mutate for one request.
pub struct ScriptContext {
    pub request: EvaluableRequest,
    pub body: Option<String>,
    pub store: ServiceStateStore,
    /// Scratchpad published to template rendering; scripts mutate it
    /// through the `requestContext` binding.
    pub request_context: HashMap<String, serde_json::Value>,
}

/// Capability to run a dispatcher-rules script against a request.
///
/// Implementations must be safe for concurrent use: the engine may be
/// shared across request coroutines while bindings stay per-request.
pub trait ScriptEvaluator: Send + Sync {
    /// Evaluate `script` with the given context, returning the script's
    /// return value as a string. Mutations to
    /// [`ScriptContext::request_context`] survive the call.
    fn evaluate(&self, script: &str, context: &mut ScriptContext) -> anyhow::Result<String>;
}

const AST_CACHE_CAPACITY: usize = 128;

/// [`ScriptEvaluator`] backed by an embedded Rhai engine.
///
/// Compiled ASTs are cached by script hash so the per-request cost is a
/// scope setup plus evaluation. The engine is built once with the store
/// type registered and shared across requests.
pub struct RhaiScriptEvaluator {
    engine: Engine,
    compiled: Mutex<LruCache<u64, AST>>,
}

impl RhaiScriptEvaluator {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        // Runaway scripts must not stall a request coroutine forever.
        engine.set_max_operations(100_000);
        engine
            .register_type_with_name::<ServiceStateStore>("ServiceStateStore")
            .register_fn("get", ServiceStateStore::get)
            .register_fn("put", ServiceStateStore::put)
            .register_fn("delete", ServiceStateStore::delete);

        Self {
            engine,
            compiled: Mutex::new(LruCache::new(
                NonZeroUsize::new(AST_CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    fn compile(&self, script: &str) -> anyhow::Result<AST> {
        let mut hasher = DefaultHasher::new();
        script.hash(&mut hasher);
        let key = hasher.finish();

        let mut cache = self.compiled.lock().unwrap();
        if let Some(ast) = cache.get(&key) {
            return Ok(ast.clone());
        }
        let ast = self
            .engine
            .compile(script)
            .map_err(|e| anyhow::anyhow!("script compilation failed: {e}"))?;
        cache.put(key, ast.clone());
        Ok(ast)
    }
}

impl Default for RhaiScriptEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEvaluator for RhaiScriptEvaluator {
    fn evaluate(&self, script: &str, context: &mut ScriptContext) -> anyhow::Result<String> {
        let ast = self.compile(script)?;

        let request: Dynamic = rhai::serde::to_dynamic(&context.request)
            .map_err(|e| anyhow::anyhow!("cannot expose request to script: {e}"))?;
        let request_context: Dynamic = rhai::serde::to_dynamic(&context.request_context)
            .map_err(|e| anyhow::anyhow!("cannot expose request context to script: {e}"))?;

        let mut scope = Scope::new();
        scope.push_dynamic("request", request);
        scope.push("body", context.body.clone().unwrap_or_default());
        scope.push_dynamic("requestContext", request_context);
        scope.push("store", context.store.clone());

        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, &ast)
            .map_err(|e| anyhow::anyhow!("script evaluation failed: {e}"))?;

        // Scripts publish template values by mutating requestContext.
        if let Some(map) = scope.get_value::<Map>("requestContext") {
            context.request_context = rhai::serde::from_dynamic(&Dynamic::from(map))
                .map_err(|e| anyhow::anyhow!("request context is not serializable: {e}"))?;
        }

        if result.is_unit() {
            return Err(anyhow::anyhow!("script returned no value"));
        }
        match result.into_string() {
            Ok(s) => Ok(s),
            Err(other) => Err(anyhow::anyhow!("script returned a non-string value ({other})")),
        }
    }
}
