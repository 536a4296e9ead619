//! Thenable resolution
//!
//! The only path by which a handler's return value becomes a settlement.
//! Plain values fulfill the target directly; values with a callable `then`
//! are followed, and whatever they resolve with is run through the same
//! procedure again, so nested thenables flatten to their innermost value.

use super::promise::Promise;
use super::value::{Function, Value};
use crate::error::{Error, Result};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// Probe `value` for a callable `then`.
///
/// `Ok(None)` for primitives and objects whose `then` is not callable; an
/// `Err` when reading `then` fails.
pub(crate) fn then_of(value: &Value) -> Result<Option<Function>> {
    if !value.is_object_like() {
        return Ok(None);
    }
    Ok(value.get("then")?.as_function().cloned())
}

thread_local! {
    /// `then` calls currently on the stack. A capability invoked later from
    /// a task starts again from zero.
    static ACTIVE_THEN_CALLS: Cell<usize> = const { Cell::new(0) };
}

/// Counts one synchronous `then` call for as long as it is alive
struct ThenCallGuard;

impl ThenCallGuard {
    fn enter() -> Self {
        ACTIVE_THEN_CALLS.with(|active| active.set(active.get() + 1));
        ThenCallGuard
    }
}

impl Drop for ThenCallGuard {
    fn drop(&mut self) {
        ACTIVE_THEN_CALLS.with(|active| active.set(active.get().saturating_sub(1)));
    }
}

/// Settle `target` with the flattened form of `value`
pub(crate) fn resolve_promise(target: &Promise, value: Value) {
    if let Value::Promise(candidate) = &value {
        if candidate.ptr_eq(target) {
            debug!(promise = target.id(), "promise resolved with itself");
            let err = Error::CircularResolution {
                promise_id: target.id(),
            };
            target.settle_rejected(err.into_reason());
            return;
        }
    }

    let then = match then_of(&value) {
        Ok(Some(then)) => then,
        Ok(None) => {
            target.settle_fulfilled(value);
            return;
        }
        Err(err) => {
            target.settle_rejected(err.into_reason());
            return;
        }
    };

    // Only thenables that resolve synchronously nest on the stack
    let max_depth = target.runtime().config().max_resolution_depth;
    let depth = ACTIVE_THEN_CALLS.with(Cell::get);
    if depth >= max_depth {
        debug!(promise = target.id(), depth, "thenable nesting too deep");
        let err = Error::type_error(format!(
            "thenable resolution exceeded maximum depth of {}",
            max_depth
        ));
        target.settle_rejected(err.into_reason());
        return;
    }

    // Shared by both capabilities of this invocation: the first call wins
    let called = Rc::new(Cell::new(false));

    let resolve_capability = {
        let target = target.clone();
        let called = called.clone();
        Function::unary("resolve", move |inner| {
            if !called.replace(true) {
                resolve_promise(&target, inner);
            }
            Ok(Value::Undefined)
        })
    };
    let reject_capability = {
        let target = target.clone();
        let called = called.clone();
        Function::unary("reject", move |reason| {
            if !called.replace(true) {
                target.settle_rejected(reason);
            }
            Ok(Value::Undefined)
        })
    };

    let args = [Value::from(resolve_capability), Value::from(reject_capability)];
    let result = {
        let _guard = ThenCallGuard::enter();
        then.call(&value, &args)
    };
    if let Err(err) = result {
        if !called.replace(true) {
            target.settle_rejected(err.into_reason());
        }
    }
}
