//! Promise Implementation
//!
//! The settlement state machine. A [`Promise`] starts `Pending`, settles
//! exactly once, and hands every registered reaction to the runtime's task
//! queue; reactions never run inside the call that registers or settles.
//!
//! Chaining lives in `chain`, thenable flattening in `resolution` and the
//! aggregate operations in [`combinators`](super::combinators).

use super::value::{Function, Value};
use super::Runtime;
use crate::error::Result;
use crate::event_loop::Task;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// ID counter for Promise tracking
static PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// Promise state enum
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PromiseState {
    /// Promise is pending - not yet settled
    Pending,
    /// Promise is fulfilled with a value
    Fulfilled,
    /// Promise is rejected with a reason
    Rejected,
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromiseState::Pending => write!(f, "pending"),
            PromiseState::Fulfilled => write!(f, "fulfilled"),
            PromiseState::Rejected => write!(f, "rejected"),
        }
    }
}

/// A callback waiting for a settlement; it receives the settled value
pub(crate) type Reaction = Box<dyn FnOnce(Value)>;

struct PromiseInternal {
    state: PromiseState,
    /// The settled value (fulfillment value or rejection reason)
    result: Option<Value>,
    /// Reactions waiting for fulfillment, in registration order
    fulfill_reactions: Vec<Reaction>,
    /// Reactions waiting for rejection, in registration order
    reject_reactions: Vec<Reaction>,
}

/// A single-settlement container for a value that may arrive later.
///
/// `Promise` is a cheap handle: clones refer to the same promise, and
/// equality is identity.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use quickpromise::{EventLoop, Promise, PromiseState, Runtime, Value};
///
/// let event_loop = Rc::new(EventLoop::new());
/// let runtime = Runtime::new(event_loop.clone());
///
/// let promise = Promise::new(&runtime, |resolvers| {
///     resolvers.fulfill(Value::from(21));
///     Ok(())
/// });
/// let doubled = promise.then_fn(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) * 2.0)));
/// assert_eq!(doubled.state(), PromiseState::Pending);
///
/// event_loop.run_until_idle();
/// assert_eq!(doubled.value(), Some(Value::from(42)));
/// ```
#[derive(Clone)]
pub struct Promise {
    id: u64,
    inner: Rc<RefCell<PromiseInternal>>,
    runtime: Runtime,
}

impl Promise {
    /// Create a promise and run `executor` synchronously with its settlement
    /// capabilities. An `Err` from the executor rejects the promise.
    pub fn new<F>(runtime: &Runtime, executor: F) -> Promise
    where
        F: FnOnce(&Resolvers) -> Result<()>,
    {
        let promise = Promise::pending(runtime);
        let resolvers = Resolvers {
            promise: promise.clone(),
        };
        if let Err(err) = executor(&resolvers) {
            promise.settle_rejected(err.into_reason());
        }
        promise
    }

    /// Create a pending promise with no executor
    pub(crate) fn pending(runtime: &Runtime) -> Promise {
        Promise {
            id: PROMISE_ID.fetch_add(1, Ordering::Relaxed),
            inner: Rc::new(RefCell::new(PromiseInternal {
                state: PromiseState::Pending,
                result: None,
                fulfill_reactions: Vec::new(),
                reject_reactions: Vec::new(),
            })),
            runtime: runtime.clone(),
        }
    }

    /// Process-unique id, used in diagnostics
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state
    pub fn state(&self) -> PromiseState {
        self.inner.borrow().state
    }

    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// The fulfillment value or rejection reason, once settled
    pub fn value(&self) -> Option<Value> {
        self.inner.borrow().result.clone()
    }

    /// The settlement, if any
    pub fn outcome(&self) -> Option<SettledOutcome> {
        let inner = self.inner.borrow();
        match (inner.state, &inner.result) {
            (PromiseState::Fulfilled, Some(value)) => Some(SettledOutcome::Fulfilled(value.clone())),
            (PromiseState::Rejected, Some(reason)) => Some(SettledOutcome::Rejected(reason.clone())),
            _ => None,
        }
    }

    /// The runtime whose task queue this promise schedules onto
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Whether both handles refer to the same promise
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn settle_fulfilled(&self, value: Value) {
        self.settle(PromiseState::Fulfilled, value);
    }

    pub(crate) fn settle_rejected(&self, reason: Value) {
        self.settle(PromiseState::Rejected, reason);
    }

    fn settle(&self, state: PromiseState, value: Value) {
        let reactions = {
            let mut p = self.inner.borrow_mut();
            if p.state != PromiseState::Pending {
                trace!(promise = self.id, attempted = %state, "already settled; ignoring");
                return;
            }

            p.state = state;
            p.result = Some(value.clone());
            let fulfill = std::mem::take(&mut p.fulfill_reactions);
            let reject = std::mem::take(&mut p.reject_reactions);
            if state == PromiseState::Rejected {
                reject
            } else {
                fulfill
            }
        };

        trace!(promise = self.id, %state, reactions = reactions.len(), "promise settled");
        for reaction in reactions {
            self.schedule(reaction, value.clone());
        }
    }

    /// Register a pair of reactions. While pending they are queued; once
    /// settled the matching one is submitted to the task queue right away.
    pub(crate) fn register_on_settle(&self, on_fulfill: Reaction, on_reject: Reaction) {
        let (reaction, value) = {
            let mut p = self.inner.borrow_mut();
            let value = p.result.clone().unwrap_or(Value::Undefined);
            match p.state {
                PromiseState::Pending => {
                    p.fulfill_reactions.push(on_fulfill);
                    p.reject_reactions.push(on_reject);
                    trace!(promise = self.id, queued = p.fulfill_reactions.len(), "reaction queued");
                    return;
                }
                PromiseState::Fulfilled => (on_fulfill, value),
                PromiseState::Rejected => (on_reject, value),
            }
        };
        self.schedule(reaction, value);
    }

    fn schedule(&self, reaction: Reaction, value: Value) {
        self.runtime.submit(Task::new(move || reaction(value)));
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Promise) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Display for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(p) => match (&p.state, &p.result) {
                (PromiseState::Pending, _) | (_, None) => write!(f, "Promise #{} <pending>", self.id),
                (state, Some(value)) => write!(f, "Promise #{} <{}: {}>", self.id, state, value),
            },
            Err(_) => write!(f, "Promise #{} <busy>", self.id),
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.try_borrow().map(|p| p.state).ok();
        f.debug_struct("Promise")
            .field("id", &self.id)
            .field("state", &state)
            .finish()
    }
}

/// The settlement capabilities handed to an executor.
///
/// Only the first settlement through any capability of a promise takes
/// effect; later calls are ignored.
#[derive(Clone, Debug)]
pub struct Resolvers {
    promise: Promise,
}

impl Resolvers {
    /// The promise these capabilities settle
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Fulfill with `value` as-is (no thenable unwrapping)
    pub fn fulfill(&self, value: impl Into<Value>) {
        self.promise.settle_fulfilled(value.into());
    }

    /// Reject with `reason`
    pub fn reject(&self, reason: impl Into<Value>) {
        self.promise.settle_rejected(reason.into());
    }

    /// Apply a settlement
    pub fn settle(&self, outcome: SettledOutcome) {
        match outcome {
            SettledOutcome::Fulfilled(value) => self.fulfill(value),
            SettledOutcome::Rejected(reason) => self.reject(reason),
        }
    }

    /// The fulfill capability as a callable value
    pub fn fulfill_fn(&self) -> Function {
        let promise = self.promise.clone();
        Function::unary("fulfill", move |value| {
            promise.settle_fulfilled(value);
            Ok(Value::Undefined)
        })
    }

    /// The reject capability as a callable value
    pub fn reject_fn(&self) -> Function {
        let promise = self.promise.clone();
        Function::unary("reject", move |reason| {
            promise.settle_rejected(reason);
            Ok(Value::Undefined)
        })
    }
}

/// How a promise settled.
///
/// `all_settled` reports each element as an object
/// `{ status: "fulfilled" | "rejected", value }`; this is the typed form of
/// that record.
#[derive(Debug, Clone, PartialEq)]
pub enum SettledOutcome {
    Fulfilled(Value),
    Rejected(Value),
}

impl SettledOutcome {
    /// The fulfillment value or rejection reason
    pub fn value(&self) -> &Value {
        match self {
            SettledOutcome::Fulfilled(value) | SettledOutcome::Rejected(value) => value,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SettledOutcome::Fulfilled(_))
    }

    /// `"fulfilled"` or `"rejected"`
    pub fn status(&self) -> &'static str {
        match self {
            SettledOutcome::Fulfilled(_) => "fulfilled",
            SettledOutcome::Rejected(_) => "rejected",
        }
    }

    /// Build the `{ status, value }` record
    pub fn into_value(self) -> Value {
        let status = Value::from(self.status());
        let value = match self {
            SettledOutcome::Fulfilled(value) | SettledOutcome::Rejected(value) => value,
        };
        Value::object([("status", status), ("value", value)])
    }

    /// Read a `{ status, value }` record back
    pub fn from_value(record: &Value) -> Option<Self> {
        let status = record.get("status").ok()?;
        let value = record.get("value").ok()?;
        match status.as_str()? {
            "fulfilled" => Some(SettledOutcome::Fulfilled(value)),
            "rejected" => Some(SettledOutcome::Rejected(value)),
            _ => None,
        }
    }
}
