//! Quickpromise: deferred values with thenable interop, written in Rust
//!
//! Quickpromise implements the promise model popularised by JavaScript: a
//! value that settles exactly once, chaining through `then`, flattening of
//! foreign "thenables", and the `all` / `race` / `allSettled` / `any`
//! combinators. Handlers never run inside the call that registers them; they
//! are handed to an injected [`TaskQueue`].
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use quickpromise::{EventLoop, Runtime, Value};
//!
//! let event_loop = Rc::new(EventLoop::new());
//! let runtime = Runtime::new(event_loop.clone());
//!
//! let inputs = Value::from(vec![Value::from(1), Value::from(runtime.resolve(2))]);
//! let combined = runtime.all(&inputs);
//!
//! event_loop.run_until_idle();
//! assert_eq!(combined.value(), Some(Value::from(vec![Value::from(1), Value::from(2)])));
//! ```
//!
//! # Module Overview
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`runtime`] | [`Promise`], [`Value`], the resolution procedure, chaining and combinators |
//! | [`event_loop`] | [`TaskQueue`] and the reference [`EventLoop`] with virtual-time timers |
//! | [`config`] | [`RuntimeConfig`] |
//! | [`error`](Error) | [`Error`], [`ErrorKind`] |
#![allow(clippy::type_complexity)]

pub mod config;
pub mod event_loop;
pub mod runtime;

mod error;

pub use config::RuntimeConfig;
pub use error::{Error, ErrorKind, Result, ALL_REJECTED_MESSAGE};
pub use event_loop::{EventLoop, EventLoopStats, RunResult, Task, TaskQueue};
pub use runtime::{
    Function, Object, Promise, PromiseState, Property, Resolvers, Runtime, SettledOutcome, Value,
};

/// Quickpromise version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
