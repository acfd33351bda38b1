//! # Handler collaborators: resolving and running application job code.
//!
//! Two seams live here:
//!
//! - [`JobHandler`] — the capability an application object must expose to
//!   execute jobs: `run(job) -> result` plus `take_log()` for the records
//!   it produced along the way.
//! - [`HandlerRegistry`] — the lookup mechanism mapping a function name to
//!   a handler, split in two steps the way dependency containers work:
//!   [`resolve`](HandlerRegistry::resolve) answers *"is this function
//!   bound to a handler identifier?"* (what the pre-flight validator
//!   checks), and [`instantiate`](HandlerRegistry::instantiate) produces
//!   the object (what can still fail at dispatch time).
//!
//! [`MapRegistry`] is the in-memory implementation: bindings come from the
//! resolved configuration's `handler` fields, factories are registered by
//! handler identifier. Applications with a real service container
//! implement [`HandlerRegistry`] themselves; the dispatcher is polymorphic
//! over any implementation.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use gearvisor::{HandlerRegistry, Job, JobHandler, MapRegistry};
//!
//! struct Resize { log: Mutex<Vec<Value>> }
//!
//! #[async_trait]
//! impl JobHandler for Resize {
//!     async fn run(&self, job: &Job) -> Value {
//!         if let Ok(mut log) = self.log.lock() {
//!             log.push(json!("resizing"));
//!         }
//!         json!({ "resized": job.workload.len() })
//!     }
//!
//!     fn take_log(&self) -> Vec<Value> {
//!         self.log.lock().map(|mut l| std::mem::take(&mut *l)).unwrap_or_default()
//!     }
//! }
//!
//! let mut registry = MapRegistry::new();
//! registry.bind("resize-image", "app.workers.Resize");
//! registry.register("app.workers.Resize", || {
//!     Arc::new(Resize { log: Mutex::new(Vec::new()) }) as Arc<dyn JobHandler>
//! });
//!
//! let handle = registry.resolve("resize-image").expect("bound");
//! assert!(registry.instantiate(&handle).is_ok());
//! assert!(registry.resolve("missing-job").is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::broker::Job;
use crate::config::ResolvedConfig;
use crate::error::DispatchError;

/// The job-execution capability.
///
/// A fresh handler is instantiated per dispatched job, runs once, and is
/// dropped after its log is collected.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Executes the job and returns its result value.
    ///
    /// Handlers report failure through their result and log records; the
    /// dispatcher forwards whatever comes back as the job's completion.
    async fn run(&self, job: &Job) -> Value;

    /// Returns the log records accumulated during [`run`](Self::run).
    ///
    /// Called exactly once, after `run` returns. Records may be any JSON
    /// value; non-scalars are rendered multi-line by the dispatcher.
    fn take_log(&self) -> Vec<Value>;
}

/// Opaque link between a function name and its handler identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerHandle {
    /// Bare function name that resolved.
    pub function: String,
    /// Handler identifier the registry instantiates by.
    pub id: String,
}

/// The handler-lookup collaborator.
pub trait HandlerRegistry: Send + Sync {
    /// Maps a bare function name to its handler identifier, or `None` when
    /// the function is unknown. This is the check the pre-flight validator
    /// runs for every planned function.
    fn resolve(&self, function: &str) -> Option<HandlerHandle>;

    /// Produces the handler object for a resolved handle.
    ///
    /// May still fail at dispatch time — a binding can point at an
    /// identifier nothing provides, or the provider may not satisfy the
    /// handler capability. Such jobs are logged and skipped.
    fn instantiate(&self, handle: &HandlerHandle) -> Result<Arc<dyn JobHandler>, DispatchError>;
}

/// Factory producing one handler instance per job.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn JobHandler> + Send + Sync>;

/// In-memory [`HandlerRegistry`]: config-driven bindings plus registered
/// factories.
#[derive(Default)]
pub struct MapRegistry {
    bindings: HashMap<String, String>,
    factories: HashMap<String, HandlerFactory>,
}

impl MapRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with bindings taken from the configuration's
    /// `handler` fields. Functions without a configured handler stay
    /// unbound and will fail validation.
    pub fn from_config(cfg: &ResolvedConfig) -> Self {
        let mut registry = Self::new();
        for (function, fc) in &cfg.functions {
            if let Some(id) = &fc.handler {
                registry.bind(function.clone(), id.clone());
            }
        }
        registry
    }

    /// Binds a function name to a handler identifier.
    pub fn bind(&mut self, function: impl Into<String>, handler_id: impl Into<String>) {
        self.bindings.insert(function.into(), handler_id.into());
    }

    /// Registers the factory behind a handler identifier.
    pub fn register<F>(&mut self, handler_id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn JobHandler> + Send + Sync + 'static,
    {
        self.factories.insert(handler_id.into(), Arc::new(factory));
    }
}

impl HandlerRegistry for MapRegistry {
    fn resolve(&self, function: &str) -> Option<HandlerHandle> {
        self.bindings.get(function).map(|id| HandlerHandle {
            function: function.to_string(),
            id: id.clone(),
        })
    }

    fn instantiate(&self, handle: &HandlerHandle) -> Result<Arc<dyn JobHandler>, DispatchError> {
        match self.factories.get(&handle.id) {
            Some(factory) => Ok(factory()),
            None => Err(DispatchError::Instantiate {
                function: handle.function.clone(),
                reason: format!("nothing registered for handler id {}", handle.id),
            }),
        }
    }
}
