//! Promise factories and combinators
//!
//! `resolve` / `reject` build settled promises; `all`, `race`,
//! `all_settled` and `any` compose several inputs into one promise, each
//! with its own completion policy. Combinators are written purely in terms
//! of `then` and the settlement capabilities of the combined promise.
//!
//! Every combinator accepts any [`Value`]; inputs that are not iterable
//! produce a promise rejected with a TypeError.

use super::promise::{Promise, Resolvers, SettledOutcome};
use super::resolution::{resolve_promise, then_of};
use super::value::{Function, Value};
use super::Runtime;
use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Whether `value` is an object exposing a callable `then`.
///
/// A `then` accessor that fails counts as "not promise-like".
pub fn is_promise_like(value: &Value) -> bool {
    matches!(then_of(value), Ok(Some(_)))
}

/// `Promise.resolve`: a promise is returned unchanged; anything else
/// becomes a new promise settled through the resolution procedure, so plain
/// values fulfill immediately and foreign thenables are adopted.
pub fn resolve(runtime: &Runtime, value: Value) -> Promise {
    match value {
        Value::Promise(promise) => promise,
        other => {
            let promise = Promise::pending(runtime);
            resolve_promise(&promise, other);
            promise
        }
    }
}

/// `Promise.reject`: always a new promise rejected with `reason`, even
/// when the reason is itself promise-like
pub fn reject(runtime: &Runtime, reason: Value) -> Promise {
    Promise::new(runtime, |resolvers| {
        resolvers.reject(reason);
        Ok(())
    })
}

/// Collect the elements of a combinator input
fn elements(combinator: &str, iterable: &Value) -> Result<Vec<Value>> {
    iterable.iter_values().ok_or_else(|| {
        debug!(combinator, type_of = iterable.type_of(), "combinator input is not iterable");
        Error::type_error(format!(
            "{} is not iterable (cannot read property Symbol(Symbol.iterator)) in Promise.{}",
            iterable, combinator
        ))
    })
}

/// `Promise.all`: fulfill with every value in input order, or reject with
/// the first rejection
pub fn all(runtime: &Runtime, iterable: &Value) -> Promise {
    Promise::new(runtime, |resolvers| {
        let items = elements("all", iterable)?;
        let total = items.len();
        if total == 0 {
            resolvers.fulfill(Value::array(Vec::new()));
            return Ok(());
        }

        let results = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let completed = Rc::new(Cell::new(0usize));

        for (index, item) in items.into_iter().enumerate() {
            let results = results.clone();
            let completed = completed.clone();
            let combined = resolvers.clone();
            let on_fulfilled = Function::unary("all.onFulfilled", move |value| {
                results.borrow_mut()[index] = value;
                completed.set(completed.get() + 1);
                if completed.get() == total {
                    let values = std::mem::take(&mut *results.borrow_mut());
                    combined.fulfill(Value::array(values));
                }
                Ok(Value::Undefined)
            });
            resolve(runtime, item).then(Some(on_fulfilled), Some(resolvers.reject_fn()));
        }
        Ok(())
    })
}

/// `Promise.race`: settle like whichever input settles first
pub fn race(runtime: &Runtime, iterable: &Value) -> Promise {
    Promise::new(runtime, |resolvers| {
        for item in elements("race", iterable)? {
            resolve(runtime, item).then(Some(resolvers.fulfill_fn()), Some(resolvers.reject_fn()));
        }
        Ok(())
    })
}

/// `Promise.allSettled`: fulfill, once every input settled, with one
/// `{ status, value }` record per input, in input order
pub fn all_settled(runtime: &Runtime, iterable: &Value) -> Promise {
    Promise::new(runtime, |resolvers| {
        let items = elements("allSettled", iterable)?;
        let total = items.len();
        if total == 0 {
            resolvers.fulfill(Value::array(Vec::new()));
            return Ok(());
        }

        let records = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let settled = Rc::new(Cell::new(0usize));

        for (index, item) in items.into_iter().enumerate() {
            let record = SettledRecorder {
                index,
                total,
                records: records.clone(),
                settled: settled.clone(),
                combined: resolvers.clone(),
            };
            let on_rejected = record.clone();
            let on_fulfilled = Function::unary("allSettled.onFulfilled", move |value| {
                record.record(SettledOutcome::Fulfilled(value));
                Ok(Value::Undefined)
            });
            let on_rejected = Function::unary("allSettled.onRejected", move |reason| {
                on_rejected.record(SettledOutcome::Rejected(reason));
                Ok(Value::Undefined)
            });
            resolve(runtime, item).then(Some(on_fulfilled), Some(on_rejected));
        }
        Ok(())
    })
}

/// Shared bookkeeping for one `all_settled` slot
#[derive(Clone)]
struct SettledRecorder {
    index: usize,
    total: usize,
    records: Rc<RefCell<Vec<Value>>>,
    settled: Rc<Cell<usize>>,
    combined: Resolvers,
}

impl SettledRecorder {
    fn record(&self, outcome: SettledOutcome) {
        self.records.borrow_mut()[self.index] = outcome.into_value();
        self.settled.set(self.settled.get() + 1);
        if self.settled.get() == self.total {
            let records = std::mem::take(&mut *self.records.borrow_mut());
            self.combined.fulfill(Value::array(records));
        }
    }
}

/// `Promise.any`: fulfill with the first fulfillment; if every input
/// rejects, reject with an AggregateError holding the reasons in input order
pub fn any(runtime: &Runtime, iterable: &Value) -> Promise {
    Promise::new(runtime, |resolvers| {
        let items = elements("any", iterable)?;
        let total = items.len();
        if total == 0 {
            return Err(Error::aggregate(Vec::new()));
        }

        let reasons = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let rejected = Rc::new(Cell::new(0usize));

        for (index, item) in items.into_iter().enumerate() {
            let reasons = reasons.clone();
            let rejected = rejected.clone();
            let combined = resolvers.clone();
            let on_rejected = Function::unary("any.onRejected", move |reason| {
                reasons.borrow_mut()[index] = reason;
                rejected.set(rejected.get() + 1);
                if rejected.get() == total {
                    let errors = std::mem::take(&mut *reasons.borrow_mut());
                    combined.reject(Error::aggregate(errors));
                }
                Ok(Value::Undefined)
            });
            resolve(runtime, item).then(Some(resolvers.fulfill_fn()), Some(on_rejected));
        }
        Ok(())
    })
}
