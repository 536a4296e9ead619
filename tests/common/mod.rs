//! Shared test helpers for integration tests

use quickpromise::{EventLoop, Function, Promise, Runtime, SettledOutcome, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// A reference event loop plus a runtime submitting to it
pub struct Harness {
    pub event_loop: Rc<EventLoop>,
    pub runtime: Runtime,
}

impl Harness {
    pub fn new() -> Self {
        let event_loop = Rc::new(EventLoop::new());
        let runtime = Runtime::new(event_loop.clone());
        Self {
            event_loop,
            runtime,
        }
    }

    /// Drain every microtask and timer
    pub fn run(&self) {
        self.event_loop.run_until_idle();
    }

    /// A promise fulfilled with `value` after `ms` virtual milliseconds
    pub fn delayed(&self, ms: u64, value: impl Into<Value>) -> Promise {
        self.event_loop
            .delayed(&self.runtime, ms, SettledOutcome::Fulfilled(value.into()))
    }

    /// A promise rejected with `reason` after `ms` virtual milliseconds
    #[allow(dead_code)]
    pub fn delayed_reject(&self, ms: u64, reason: impl Into<Value>) -> Promise {
        self.event_loop
            .delayed(&self.runtime, ms, SettledOutcome::Rejected(reason.into()))
    }
}

/// How `promise` settled; panics while still pending
#[allow(dead_code)]
pub fn outcome(promise: &Promise) -> SettledOutcome {
    promise
        .outcome()
        .unwrap_or_else(|| panic!("{} is still pending", promise))
}

#[allow(dead_code)]
pub fn fulfilled(value: impl Into<Value>) -> SettledOutcome {
    SettledOutcome::Fulfilled(value.into())
}

#[allow(dead_code)]
pub fn rejected(reason: impl Into<Value>) -> SettledOutcome {
    SettledOutcome::Rejected(reason.into())
}

/// An array value from anything convertible
#[allow(dead_code)]
pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Value {
    Value::from(items.into_iter().map(Into::into).collect::<Vec<Value>>())
}

/// A handler that appends `tag` to `log` and passes its argument through
#[allow(dead_code)]
pub fn logging_handler(log: &Rc<RefCell<Vec<String>>>, tag: &str) -> Function {
    let log = log.clone();
    let tag = tag.to_string();
    Function::unary("logger", move |value| {
        log.borrow_mut().push(format!("{}:{}", tag, value));
        Ok(value)
    })
}

/// An object whose `then` synchronously resolves with `inner`
#[allow(dead_code)]
pub fn thenable(inner: Value) -> Value {
    let then = Function::new("then", move |_this, args| {
        let resolve = args[0].as_function().cloned().expect("resolve capability");
        resolve.call(&Value::Undefined, &[inner.clone()])
    });
    Value::object([("then", Value::from(then))])
}
