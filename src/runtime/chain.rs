//! Chaining: `then`, `catch` and `finally`
//!
//! Each operator returns a new promise. Handlers run as reactions on the
//! source, so they always execute from the task queue, never inside the
//! call that attached them.

use super::combinators;
use super::promise::Promise;
use super::resolution::resolve_promise;
use super::value::{Function, Value};
use crate::error::{Error, Result};

/// What a missing handler does with the settled value
#[derive(Clone, Copy)]
enum Passthrough {
    /// Forward a fulfillment value unchanged
    Value,
    /// Rethrow a rejection reason unchanged
    Reason,
}

/// Run one side of a `then` against `argument` and settle `target` with the result
fn react(target: &Promise, handler: Option<&Function>, passthrough: Passthrough, argument: Value) {
    let result = match (handler, passthrough) {
        (Some(handler), _) => handler.call(&Value::Undefined, &[argument]),
        (None, Passthrough::Value) => Ok(argument),
        (None, Passthrough::Reason) => Err(Error::from_reason(argument)),
    };

    match result {
        Ok(value) => resolve_promise(target, value),
        Err(err) => target.settle_rejected(err.into_reason()),
    }
}

impl Promise {
    /// Attach handlers and get the promise for their result.
    ///
    /// A missing `on_fulfilled` forwards the value and a missing
    /// `on_rejected` forwards the reason, so settlements tunnel through
    /// links that do not handle them.
    pub fn then(&self, on_fulfilled: Option<Function>, on_rejected: Option<Function>) -> Promise {
        let derived = Promise::pending(self.runtime());

        let fulfill_target = derived.clone();
        let reject_target = derived.clone();
        self.register_on_settle(
            Box::new(move |value| {
                react(&fulfill_target, on_fulfilled.as_ref(), Passthrough::Value, value)
            }),
            Box::new(move |reason| {
                react(&reject_target, on_rejected.as_ref(), Passthrough::Reason, reason)
            }),
        );

        derived
    }

    /// `then(None, on_rejected)`
    pub fn catch(&self, on_rejected: Option<Function>) -> Promise {
        self.then(None, on_rejected)
    }

    /// Run `on_finally` once the promise settles, whichever way.
    ///
    /// The callback gets no arguments. The returned promise settles like
    /// this one, unless `on_finally` fails or returns something that
    /// rejects; that rejection takes over.
    pub fn finally(&self, on_finally: Function) -> Promise {
        let runtime = self.runtime().clone();
        let callback = on_finally.clone();
        let on_value = Function::unary("finally.onFulfilled", move |value| {
            let settled = combinators::resolve(&runtime, callback.call(&Value::Undefined, &[])?);
            let forward = Function::unary("finally.forward", move |_| Ok(value.clone()));
            Ok(Value::from(settled.then(Some(forward), None)))
        });

        let runtime = self.runtime().clone();
        let callback = on_finally;
        let on_reason = Function::unary("finally.onRejected", move |reason| {
            let settled = combinators::resolve(&runtime, callback.call(&Value::Undefined, &[])?);
            let rethrow = Function::unary("finally.rethrow", move |_| {
                Err(Error::from_reason(reason.clone()))
            });
            Ok(Value::from(settled.then(Some(rethrow), None)))
        });

        self.then(Some(on_value), Some(on_reason))
    }

    /// `then` with only a fulfillment closure
    pub fn then_fn<F>(&self, on_fulfilled: F) -> Promise
    where
        F: Fn(Value) -> Result<Value> + 'static,
    {
        self.then(Some(Function::unary("onFulfilled", on_fulfilled)), None)
    }

    /// `catch` with a closure
    pub fn catch_fn<F>(&self, on_rejected: F) -> Promise
    where
        F: Fn(Value) -> Result<Value> + 'static,
    {
        self.catch(Some(Function::unary("onRejected", on_rejected)))
    }

    /// `finally` with a closure
    pub fn finally_fn<F>(&self, on_finally: F) -> Promise
    where
        F: Fn() -> Result<Value> + 'static,
    {
        self.finally(Function::new("onFinally", move |_this, _args| on_finally()))
    }

    /// Members visible when a promise is treated as an object, so the
    /// resolution procedure can follow promises like any other thenable
    pub(crate) fn member(&self, key: &str) -> Value {
        let promise = self.clone();
        let func = match key {
            "then" => Function::new("then", move |_this, args| {
                let on_fulfilled = args.first().and_then(Value::as_function).cloned();
                let on_rejected = args.get(1).and_then(Value::as_function).cloned();
                Ok(Value::from(promise.then(on_fulfilled, on_rejected)))
            }),
            "catch" => Function::new("catch", move |_this, args| {
                let on_rejected = args.first().and_then(Value::as_function).cloned();
                Ok(Value::from(promise.catch(on_rejected)))
            }),
            "finally" => Function::new("finally", move |_this, args| {
                let derived = match args.first().and_then(Value::as_function) {
                    Some(on_finally) => promise.finally(on_finally.clone()),
                    None => promise.then(None, None),
                };
                Ok(Value::from(derived))
            }),
            _ => return Value::Undefined,
        };
        Value::from(func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use crate::runtime::{PromiseState, Runtime, SettledOutcome};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn setup() -> (Rc<EventLoop>, Runtime) {
        let event_loop = Rc::new(EventLoop::new());
        let runtime = Runtime::new(event_loop.clone());
        (event_loop, runtime)
    }

    #[test]
    fn test_then_on_settled_promise_is_async() {
        let (el, runtime) = setup();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let derived = runtime.resolve(1).then_fn(move |v| {
            flag.set(true);
            Ok(v)
        });
        assert!(!ran.get());
        assert_eq!(derived.state(), PromiseState::Pending);

        el.run_until_idle();
        assert!(ran.get());
        assert_eq!(derived.value(), Some(Value::from(1)));
    }

    #[test]
    fn test_handler_error_rejects_derived() {
        let (el, runtime) = setup();
        let derived = runtime.resolve(1).then_fn(|_| Err(Error::thrown("oops")));
        el.run_until_idle();
        assert_eq!(derived.outcome(), Some(SettledOutcome::Rejected(Value::from("oops"))));
    }

    #[test]
    fn test_catch_recovers() {
        let (el, runtime) = setup();
        let derived = runtime.reject("bad").catch_fn(|reason| Ok(Value::from(format!("handled {}", reason))));
        el.run_until_idle();
        assert_eq!(derived.value(), Some(Value::from("handled bad")));
    }

    #[test]
    fn test_catch_passes_fulfillment_through() {
        let (el, runtime) = setup();
        let derived = runtime.resolve("fine").catch_fn(|_| Ok(Value::from("unreachable")));
        el.run_until_idle();
        assert_eq!(derived.value(), Some(Value::from("fine")));
    }

    #[test]
    fn test_handler_returning_promise_is_flattened() {
        let (el, runtime) = setup();
        let inner_runtime = runtime.clone();
        let derived = runtime
            .resolve(2)
            .then_fn(move |v| Ok(Value::from(inner_runtime.resolve(v))));
        el.run_until_idle();
        assert_eq!(derived.value(), Some(Value::from(2)));
    }

    #[test]
    fn test_finally_runs_without_arguments_and_keeps_value() {
        let (el, runtime) = setup();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let on_finally = Function::new("onFinally", move |_this, args| {
            assert!(args.is_empty());
            counter.set(counter.get() + 1);
            Ok(Value::from("ignored"))
        });
        let derived = runtime.resolve("kept").finally(on_finally);
        el.run_until_idle();
        assert_eq!(calls.get(), 1);
        assert_eq!(derived.value(), Some(Value::from("kept")));
    }

    #[test]
    fn test_finally_keeps_reason() {
        let (el, runtime) = setup();
        let derived = runtime.reject("original").finally_fn(|| Ok(Value::Undefined));
        el.run_until_idle();
        assert_eq!(derived.outcome(), Some(SettledOutcome::Rejected(Value::from("original"))));
    }

    #[test]
    fn test_finally_failure_overrides() {
        let (el, runtime) = setup();
        let thrown = runtime.resolve(1).finally_fn(|| Err(Error::thrown("cleanup failed")));
        let inner_runtime = runtime.clone();
        let rejected = runtime
            .reject("original")
            .finally_fn(move || Ok(Value::from(inner_runtime.reject("cleanup rejected"))));
        el.run_until_idle();
        assert_eq!(thrown.outcome(), Some(SettledOutcome::Rejected(Value::from("cleanup failed"))));
        assert_eq!(
            rejected.outcome(),
            Some(SettledOutcome::Rejected(Value::from("cleanup rejected")))
        );
    }

    #[test]
    fn test_promise_members_are_callable() {
        let (el, runtime) = setup();
        let source = Value::from(runtime.resolve(5));
        let then = source.get("then").unwrap();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        let handler = Function::unary("record", move |v| {
            *sink.borrow_mut() = Some(v.clone());
            Ok(v)
        });
        let derived = then
            .as_function()
            .unwrap()
            .call(&source, &[Value::from(handler)])
            .unwrap();
        assert!(derived.as_promise().is_some());
        assert!(source.get("catch").unwrap().is_callable());
        assert!(source.get("finally").unwrap().is_callable());
        assert!(source.get("unknown").unwrap().is_undefined());

        el.run_until_idle();
        assert_eq!(seen.borrow().clone(), Some(Value::from(5)));
    }
}
