//! Promise runtime
//!
//! [`Runtime`] bundles the injected task queue with the configuration.
//! Every promise keeps a clone of the runtime it was created from, so
//! promises derived through `then` or a combinator schedule onto the same
//! queue as their source.

mod chain;
pub mod combinators;
pub mod promise;
mod resolution;
pub mod value;

pub use promise::{Promise, PromiseState, Resolvers, SettledOutcome};
pub use value::{Function, NativeFn, Object, Property, Value};

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::event_loop::{Task, TaskQueue};
use std::fmt;
use std::rc::Rc;

/// Handle to a task queue plus configuration. Cloning is cheap.
#[derive(Clone)]
pub struct Runtime {
    queue: Rc<dyn TaskQueue>,
    config: Rc<RuntimeConfig>,
}

impl Runtime {
    /// Create a runtime with the default configuration
    pub fn new(queue: Rc<dyn TaskQueue>) -> Self {
        Self {
            queue,
            config: Rc::new(RuntimeConfig::default()),
        }
    }

    /// Create a runtime with a validated configuration
    pub fn with_config(queue: Rc<dyn TaskQueue>, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            queue,
            config: Rc::new(config),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Submit a task to the underlying queue
    pub fn submit(&self, task: Task) {
        self.queue.submit(task);
    }

    /// Create a promise driven by `executor`
    pub fn promise<F>(&self, executor: F) -> Promise
    where
        F: FnOnce(&Resolvers) -> Result<()>,
    {
        Promise::new(self, executor)
    }

    /// `Promise.resolve`
    pub fn resolve(&self, value: impl Into<Value>) -> Promise {
        combinators::resolve(self, value.into())
    }

    /// `Promise.reject`
    pub fn reject(&self, reason: impl Into<Value>) -> Promise {
        combinators::reject(self, reason.into())
    }

    /// `Promise.all`
    pub fn all(&self, iterable: &Value) -> Promise {
        combinators::all(self, iterable)
    }

    /// `Promise.race`
    pub fn race(&self, iterable: &Value) -> Promise {
        combinators::race(self, iterable)
    }

    /// `Promise.allSettled`
    pub fn all_settled(&self, iterable: &Value) -> Promise {
        combinators::all_settled(self, iterable)
    }

    /// `Promise.any`
    pub fn any(&self, iterable: &Value) -> Promise {
        combinators::any(self, iterable)
    }

    /// Whether `value` exposes a callable `then`
    pub fn is_promise_like(value: &Value) -> bool {
        combinators::is_promise_like(value)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").field("config", &self.config).finish()
    }
}
