//! Runtime values carried by promises
//!
//! A promise settles with a dynamically-typed [`Value`]. The reference
//! variants share their payload through `Rc`, so cloning a value is cheap
//! and two clones of an object, function or promise are the same entity.

use crate::error::{Error, Result};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::promise::Promise;

/// Type alias for native function implementations: `(this, args) -> result`
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value>;

/// A callable value
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl Function {
    /// Create a function receiving `this` and the argument list
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + 'static,
    {
        Self {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    /// Create a function that only looks at its first argument
    pub fn unary<F>(name: &str, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + 'static,
    {
        Self::new(name, move |_this, args| {
            func(args.first().cloned().unwrap_or(Value::Undefined))
        })
    }

    /// Call the function
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        (self.func)(this, args)
    }

    /// Function name, used for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether both handles refer to the same function
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function: {}]", self.name)
    }
}

/// An object property
#[derive(Debug, Clone)]
pub enum Property {
    /// Plain stored value
    Data(Value),
    /// Getter invoked with the owning object as `this`; it may fail
    Accessor(Function),
}

/// An ordinary object: a bag of named properties
#[derive(Debug, Clone, Default)]
pub struct Object {
    /// Properties
    pub properties: HashMap<String, Property>,
}

impl Object {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a data property
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), Property::Data(value));
    }

    /// Define an accessor property
    pub fn define_getter(&mut self, key: impl Into<String>, getter: Function) {
        self.properties.insert(key.into(), Property::Accessor(getter));
    }
}

/// A runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Immutable array snapshot
    Array(Rc<[Value]>),
    /// Ordinary object
    Object(Rc<RefCell<Object>>),
    /// Callable
    Function(Function),
    /// Promise
    Promise(Promise),
    /// Error raised by the runtime (type errors, aggregate errors, ...)
    Error(Rc<Error>),
}

impl Value {
    /// Create an array value
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::from(elements))
    }

    /// Create an object from `(key, value)` pairs
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut object = Object::new();
        for (key, value) in entries {
            object.set(key, value);
        }
        Value::Object(Rc::new(RefCell::new(object)))
    }

    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Values whose members can be read: everything except primitives
    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Promise(_) | Value::Error(_)
        )
    }

    /// Check if value is callable
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Get the type of value (like JS typeof)
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // Historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Array(_) | Value::Object(_) | Value::Promise(_) | Value::Error(_) => "object",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(elements) => Some(&**elements),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&Promise> {
        match self {
            Value::Promise(promise) => Some(promise),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&Error> {
        match self {
            Value::Error(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Read a member. Primitives have no members and yield `undefined`;
    /// accessor properties run their getter, which may fail.
    pub fn get(&self, key: &str) -> Result<Value> {
        match self {
            Value::Object(object) => {
                let property = object.borrow().properties.get(key).cloned();
                match property {
                    Some(Property::Data(value)) => Ok(value),
                    Some(Property::Accessor(getter)) => getter.call(self, &[]),
                    None => Ok(Value::Undefined),
                }
            }
            Value::Promise(promise) => Ok(promise.member(key)),
            Value::Array(elements) => Ok(match key {
                "length" => Value::Number(elements.len() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| elements.get(index).cloned())
                    .unwrap_or(Value::Undefined),
            }),
            Value::Function(func) => Ok(match key {
                "name" => Value::String(func.name().to_string()),
                _ => Value::Undefined,
            }),
            Value::Error(err) => Ok(match key {
                "name" => Value::String(err.kind().to_string()),
                "message" => Value::String(err.message()),
                "errors" => err
                    .errors()
                    .map(|errors| Value::array(errors.to_vec()))
                    .unwrap_or(Value::Undefined),
                _ => Value::Undefined,
            }),
            _ => Ok(Value::Undefined),
        }
    }

    /// Forward iteration: arrays yield their elements, strings their
    /// characters. Anything else is not iterable.
    pub fn iter_values(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(elements) => Some(elements.to_vec()),
            Value::String(s) => Some(s.chars().map(|c| Value::String(c.to_string())).collect()),
            _ => None,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        write!(f, "0")
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    element.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                let object = object.borrow();
                // Sorted so output is stable regardless of hash order
                let mut keys: Vec<&String> = object.properties.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: ", key)?;
                    match &object.properties[key] {
                        Property::Data(value) => value.fmt_nested(f)?,
                        Property::Accessor(_) => write!(f, "[Getter]")?,
                    }
                }
                if object.properties.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Promise(promise) => write!(f, "{}", promise),
            Value::Error(err) => write!(f, "{}", err),
        }
    }
}

/// Primitives compare by value (with NaN unequal to itself), arrays
/// element-wise, and everything else by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(elements: Vec<Value>) -> Self {
        Value::array(elements)
    }
}

impl From<Function> for Value {
    fn from(func: Function) -> Self {
        Value::Function(func)
    }
}

impl From<Promise> for Value {
    fn from(promise: Promise) -> Self {
        Value::Promise(promise)
    }
}

impl From<Error> for Value {
    fn from(err: Error) -> Self {
        err.into_reason()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_primitives() {
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::from(10).to_string(), "10");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }

    #[test]
    fn test_display_composites() {
        let array = Value::from(vec![Value::from(1), Value::from("a")]);
        assert_eq!(array.to_string(), "[1, \"a\"]");

        let object = Value::object([("value", Value::from(1)), ("status", Value::from("fulfilled"))]);
        assert_eq!(object.to_string(), "{ status: \"fulfilled\", value: 1 }");
        assert_eq!(Value::object(Vec::<(String, Value)>::new()).to_string(), "{}");
    }

    #[test]
    fn test_equality_semantics() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(
            Value::from(vec![Value::from("a")]),
            Value::from(vec![Value::from("a")])
        );

        let a = Value::object([("x", Value::from(1))]);
        let b = Value::object([("x", Value::from(1))]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_data_and_accessor_properties() {
        let object = Value::object([("then", Value::from(5))]);
        assert_eq!(object.get("then").unwrap(), Value::from(5));
        assert!(object.get("missing").unwrap().is_undefined());

        let mut failing = Object::new();
        failing.define_getter(
            "then",
            Function::new("get then", |_this, _args| Err(Error::thrown("no access"))),
        );
        let failing = Value::Object(Rc::new(RefCell::new(failing)));
        let err = failing.get("then").unwrap_err();
        assert_eq!(err.into_reason(), Value::from("no access"));
    }

    #[test]
    fn test_primitives_have_no_members() {
        assert!(Value::from(3).get("then").unwrap().is_undefined());
        assert!(!Value::from(3).is_object_like());
        assert!(Value::array(vec![]).is_object_like());
    }

    #[test]
    fn test_iteration_capability() {
        assert_eq!(Value::from(vec![Value::from(1)]).iter_values().map(|v| v.len()), Some(1));
        assert_eq!(
            Value::from("ab").iter_values(),
            Some(vec![Value::from("a"), Value::from("b")])
        );
        assert!(Value::from(1).iter_values().is_none());
        assert!(Value::Undefined.iter_values().is_none());
        assert!(Value::object([("length", Value::from(0))]).iter_values().is_none());
    }

    #[test]
    fn test_function_call_and_name() {
        let double = Function::unary("double", |v| Ok(Value::from(v.as_number().unwrap_or(0.0) * 2.0)));
        assert_eq!(double.name(), "double");
        assert_eq!(double.call(&Value::Undefined, &[Value::from(4)]).unwrap(), Value::from(8));
        assert_eq!(double.call(&Value::Undefined, &[]).unwrap(), Value::from(0));
        assert_eq!(Value::from(double.clone()).type_of(), "function");
    }

    #[test]
    fn test_error_members() {
        let err = Value::from(Error::aggregate(vec![Value::from("a")]));
        assert_eq!(err.get("name").unwrap(), Value::from("AggregateError"));
        assert_eq!(err.get("errors").unwrap(), Value::from(vec![Value::from("a")]));
    }
}
