//! Error types for the Quickpromise runtime
//!
//! Every failure that user code can produce (a handler returning `Err`, an
//! executor bailing out, a `then` accessor that fails) is an [`Error`]. When
//! an error crosses into the promise machinery it becomes a rejection reason
//! through [`Error::into_reason`], and a reason re-enters Rust code through
//! [`Error::from_reason`] without losing its identity.

use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::runtime::Value;

/// Message carried by the aggregate error produced by `any`
pub const ALL_REJECTED_MESSAGE: &str = "All promises were rejected";

/// Main error type for Quickpromise
#[derive(Error, Debug)]
pub enum Error {
    /// TypeError - wrong type for operation (non-iterable combinator input, ...)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// A promise was resolved with itself
    #[error("TypeError: Chaining cycle detected for promise #{promise_id}")]
    CircularResolution {
        /// Id of the promise that was resolved with itself
        promise_id: u64,
    },

    /// Every input of `any` rejected
    #[error("AggregateError: {message}")]
    AggregateError {
        message: String,
        /// Rejection reasons, in input order
        errors: Vec<Value>,
    },

    /// An arbitrary value thrown by user code
    #[error("Uncaught {0}")]
    Thrown(Value),

    /// Invalid or unreadable runtime configuration
    #[error("ConfigError: {0}")]
    Config(String),
}

/// Result type for Quickpromise operations
pub type Result<T> = std::result::Result<T, Error>;

/// JavaScript-style error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation, including resolution cycles
    TypeError,
    /// AggregateError - several reasons collected into one
    AggregateError,
    /// Generic Error - user-thrown values
    GenericError,
    /// Configuration could not be loaded
    ConfigError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TypeError => write!(f, "TypeError"),
            ErrorKind::AggregateError => write!(f, "AggregateError"),
            ErrorKind::GenericError => write!(f, "Error"),
            ErrorKind::ConfigError => write!(f, "ConfigError"),
        }
    }
}

impl Error {
    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::TypeError(message.into())
    }

    /// Throw an arbitrary value
    pub fn thrown(value: impl Into<Value>) -> Self {
        Error::Thrown(value.into())
    }

    /// Create the aggregate error used by `any`
    pub fn aggregate(errors: Vec<Value>) -> Self {
        Error::AggregateError {
            message: ALL_REJECTED_MESSAGE.to_string(),
            errors,
        }
    }

    /// Turn a rejection reason back into an error, e.g. to rethrow it from a handler
    pub fn from_reason(reason: Value) -> Self {
        Error::Thrown(reason)
    }

    /// Convert this error into the value a promise is rejected with.
    ///
    /// Thrown values are passed through unchanged; every other variant is
    /// wrapped in [`Value::Error`].
    pub fn into_reason(self) -> Value {
        match self {
            Error::Thrown(value) => value,
            other => Value::Error(Rc::new(other)),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TypeError(_) | Error::CircularResolution { .. } => ErrorKind::TypeError,
            Error::AggregateError { .. } => ErrorKind::AggregateError,
            Error::Thrown(_) => ErrorKind::GenericError,
            Error::Config(_) => ErrorKind::ConfigError,
        }
    }

    /// The error message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Error::TypeError(message) | Error::Config(message) => message.clone(),
            Error::CircularResolution { promise_id } => {
                format!("Chaining cycle detected for promise #{}", promise_id)
            }
            Error::AggregateError { message, .. } => message.clone(),
            Error::Thrown(value) => value.to_string(),
        }
    }

    /// Collected reasons of an aggregate error
    pub fn errors(&self) -> Option<&[Value]> {
        match self {
            Error::AggregateError { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Whether this is the self-resolution error
    pub fn is_circular_resolution(&self) -> bool {
        matches!(self, Error::CircularResolution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thrown_value_round_trips_as_reason() {
        let reason = Error::thrown("boom").into_reason();
        assert_eq!(reason, Value::from("boom"));

        let again = Error::from_reason(reason.clone()).into_reason();
        assert_eq!(again, reason);
    }

    #[test]
    fn test_non_thrown_errors_are_wrapped() {
        let reason = Error::type_error("not iterable").into_reason();
        let err = reason.as_error().expect("wrapped error");
        assert_eq!(err.kind(), ErrorKind::TypeError);
        assert_eq!(err.to_string(), "TypeError: not iterable");
    }

    #[test]
    fn test_wrapped_error_keeps_identity() {
        let reason = Error::type_error("x").into_reason();
        let rethrown = Error::from_reason(reason.clone()).into_reason();
        assert_eq!(rethrown, reason);
    }

    #[test]
    fn test_aggregate_error() {
        let err = Error::aggregate(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(err.kind(), ErrorKind::AggregateError);
        assert_eq!(err.message(), ALL_REJECTED_MESSAGE);
        assert_eq!(err.errors().map(|e| e.len()), Some(2));
        assert_eq!(err.to_string(), "AggregateError: All promises were rejected");
    }

    #[test]
    fn test_circular_resolution_is_type_error() {
        let err = Error::CircularResolution { promise_id: 7 };
        assert!(err.is_circular_resolution());
        assert_eq!(err.kind(), ErrorKind::TypeError);
        assert!(err.to_string().contains("#7"));
    }
}
