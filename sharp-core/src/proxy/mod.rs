//! Deep Reactive State
//!
//! A [`Proxy`] wraps a JSON document so that every field, at every depth,
//! is an independent reactive cell. Observers subscribe to exactly the
//! fields they read, and writes to one field never wake readers of another.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use sharp_core::proxy::Proxy;
//! use sharp_core::reactive::Effect;
//!
//! let state = Proxy::new(json!({ "user": { "name": "Ada" }, "count": 0 })).unwrap();
//!
//! let reader = state.clone();
//! let effect = Effect::new(move || {
//!     reader.pointer("/user/name");
//! });
//!
//! state.set("count", 1).unwrap();
//! assert_eq!(effect.run_count(), 1);
//!
//! state.set_pointer("/user/name", "Grace").unwrap();
//! assert_eq!(effect.run_count(), 2);
//! ```

mod array;
mod entry;
mod object;
mod pointer;

pub use array::ArrayProxy;
pub use entry::Entry;
pub use object::ObjectProxy;

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::reactive::Signal;

/// The root of a reactive document: an object or an array.
#[derive(Clone)]
pub enum Proxy {
    Object(ObjectProxy),
    Array(ArrayProxy),
}

impl Proxy {
    /// Wrap a JSON value. Primitives cannot be a root.
    pub fn new(value: Value) -> Result<Self> {
        Self::named("state", value)
    }

    /// Like [`Proxy::new`], naming the owner in the error.
    pub(crate) fn named(name: &str, value: Value) -> Result<Self> {
        match Entry::from(value) {
            Entry::Proxy(proxy) => Ok(proxy),
            Entry::Value(primitive) => Err(Error::InvalidInitialState {
                name: name.to_string(),
                kind: kind_of(&primitive),
            }),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectProxy> {
        match self {
            Proxy::Object(object) => Some(object),
            Proxy::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayProxy> {
        match self {
            Proxy::Array(array) => Some(array),
            Proxy::Object(_) => None,
        }
    }

    /// Read one field by key. Array keys are decimal indices.
    pub fn get(&self, key: &str) -> Option<Entry> {
        match self {
            Proxy::Object(object) => object.get(key),
            Proxy::Array(array) => array.get(pointer::index(key)?),
        }
    }

    /// Read one field without tracking.
    pub fn peek(&self, key: &str) -> Option<Entry> {
        match self {
            Proxy::Object(object) => object.peek(key),
            Proxy::Array(array) => array.peek(pointer::index(key)?),
        }
    }

    /// Write one field by key.
    ///
    /// For arrays the key is an index, or `-` to append.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        match self {
            Proxy::Object(object) => {
                object.set(key, value);
                Ok(())
            }
            Proxy::Array(array) if key == "-" => {
                array.push(value);
                Ok(())
            }
            Proxy::Array(array) => {
                let index =
                    pointer::index(key).ok_or_else(|| Error::InvalidPath(key.to_string()))?;
                array.set(index, value)
            }
        }
    }

    /// The signal behind one field.
    pub fn signal(&self, key: &str) -> Option<Signal<Entry>> {
        match self {
            Proxy::Object(object) => object.signal(key),
            Proxy::Array(array) => array.signal(pointer::index(key)?),
        }
    }

    /// Number of keys or elements, tracked.
    pub fn len(&self) -> usize {
        match self {
            Proxy::Object(object) => object.len(),
            Proxy::Array(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a JSON Pointer, tracking every step.
    ///
    /// Returns `None` when the pointer is malformed or does not resolve.
    pub fn pointer(&self, path: &str) -> Option<Entry> {
        let tokens = pointer::parse(path).ok()?;
        let mut current = Entry::Proxy(self.clone());
        for token in &tokens {
            current = current.get(token)?;
        }
        Some(current)
    }

    /// Write the field a JSON Pointer refers to.
    ///
    /// The parent must already exist and be a container.
    pub fn set_pointer(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let mut tokens = pointer::parse(path)?;
        let last = tokens
            .pop()
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;

        let mut parent = self.clone();
        for token in &tokens {
            parent = match parent.peek(token) {
                Some(Entry::Proxy(child)) => child,
                _ => return Err(Error::InvalidPath(path.to_string())),
            };
        }
        parent.set(&last, value)
    }

    /// Deep copy into a plain value, tracking everything read.
    pub fn to_value(&self) -> Value {
        match self {
            Proxy::Object(object) => object.to_value(),
            Proxy::Array(array) => array.to_value(),
        }
    }

    /// Deep copy into a plain value without tracking.
    pub fn snapshot(&self) -> Value {
        match self {
            Proxy::Object(object) => object.snapshot(),
            Proxy::Array(array) => array.snapshot(),
        }
    }

    /// Whether two handles refer to the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Proxy::Object(a), Proxy::Object(b)) => a.ptr_eq(b),
            (Proxy::Array(a), Proxy::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Whether `node` is this container or sits anywhere below it.
    pub(crate) fn contains(&self, node: &Proxy) -> bool {
        if self.ptr_eq(node) {
            return true;
        }
        let children = match self {
            Proxy::Object(object) => object.peek_entries(),
            Proxy::Array(array) => array.peek_entries(),
        };
        children
            .iter()
            .filter_map(Entry::as_proxy)
            .any(|child| child.contains(node))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<ObjectProxy> for Proxy {
    fn from(object: ObjectProxy) -> Self {
        Proxy::Object(object)
    }
}

impl From<ArrayProxy> for Proxy {
    fn from(array: ArrayProxy) -> Self {
        Proxy::Array(array)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proxy::Object(object) => fmt::Debug::fmt(object, f),
            Proxy::Array(array) => fmt::Debug::fmt(array, f),
        }
    }
}

impl Serialize for Proxy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
