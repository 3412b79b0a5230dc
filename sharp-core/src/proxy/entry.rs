//! Entries and field slots.
//!
//! An [`Entry`] is what a proxy read returns: a plain JSON value for
//! primitives, or a nested proxy for objects and arrays. Inside a container
//! each field lives in a [`FieldSlot`], which holds the entry directly until
//! the field is first touched and a signal is created for it.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::{ArrayProxy, ObjectProxy, Proxy};
use crate::error::{Error, Result};
use crate::reactive::Signal;

/// The result of reading a proxy field.
#[derive(Clone)]
pub enum Entry {
    /// A primitive: null, bool, number or string.
    Value(Value),
    /// A nested object or array.
    Proxy(Proxy),
}

impl Entry {
    /// Build an entry from anything convertible to JSON.
    ///
    /// Objects and arrays are wrapped into fresh proxies.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::from(value.into())
    }

    /// The primitive value, if this is not a container.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Entry::Value(value) => Some(value),
            Entry::Proxy(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_value().and_then(Value::as_u64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Entry::Value(Value::Null))
    }

    /// The nested proxy, if this is a container.
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Entry::Proxy(proxy) => Some(proxy),
            Entry::Value(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectProxy> {
        self.as_proxy().and_then(Proxy::as_object)
    }

    pub fn as_array(&self) -> Option<&ArrayProxy> {
        self.as_proxy().and_then(Proxy::as_array)
    }

    /// Read a nested field. `None` for primitives and missing keys.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.as_proxy().and_then(|proxy| proxy.get(key))
    }

    /// Deep copy into a plain value, tracking every read.
    pub fn to_value(&self) -> Value {
        match self {
            Entry::Value(value) => value.clone(),
            Entry::Proxy(proxy) => proxy.to_value(),
        }
    }

    /// Deep copy into a plain value without tracking.
    pub fn snapshot(&self) -> Value {
        match self {
            Entry::Value(value) => value.clone(),
            Entry::Proxy(proxy) => proxy.snapshot(),
        }
    }

    /// Convert into a typed value. Nested reads are tracked.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_value()).map_err(Error::Deserialize)
    }
}

impl From<Value> for Entry {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Entry::Proxy(Proxy::Object(ObjectProxy::from_map(map))),
            Value::Array(items) => Entry::Proxy(Proxy::Array(ArrayProxy::from_vec(items))),
            primitive => Entry::Value(primitive),
        }
    }
}

impl From<Proxy> for Entry {
    fn from(proxy: Proxy) -> Self {
        Entry::Proxy(proxy)
    }
}

/// Primitives compare by value, containers by identity.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Entry::Value(a), Entry::Value(b)) => a == b,
            (Entry::Proxy(a), Entry::Proxy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Value(value) => write!(f, "Value({value})"),
            Entry::Proxy(proxy) => write!(f, "Proxy({})", proxy.snapshot()),
        }
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Storage for one field of a container.
pub(crate) enum FieldSlot {
    /// Never observed; no signal allocated yet.
    Untracked(Entry),
    /// Backed by a signal.
    Tracked(Signal<Entry>),
}

impl FieldSlot {
    pub(crate) fn new(value: Value) -> Self {
        FieldSlot::Untracked(Entry::from(value))
    }

    /// The signal behind this field, created on first use.
    pub(crate) fn signal(&mut self) -> Signal<Entry> {
        if let FieldSlot::Untracked(entry) = self {
            let entry = std::mem::replace(entry, Entry::Value(Value::Null));
            *self = FieldSlot::Tracked(Signal::new(entry));
        }
        match self {
            FieldSlot::Tracked(signal) => signal.clone(),
            FieldSlot::Untracked(_) => unreachable!("slot was just promoted"),
        }
    }

    /// Current entry without tracking or promotion.
    pub(crate) fn peek(&self) -> Entry {
        match self {
            FieldSlot::Untracked(entry) => entry.clone(),
            FieldSlot::Tracked(signal) => signal.get_untracked(),
        }
    }

    /// Store `entry`. Untracked slots are overwritten in place; tracked
    /// ones defer the write so it can happen outside the container lock.
    pub(crate) fn assign(&mut self, entry: Entry, writes: &mut Vec<(Signal<Entry>, Entry)>) {
        match self {
            FieldSlot::Untracked(current) => *current = entry,
            FieldSlot::Tracked(signal) => writes.push((signal.clone(), entry)),
        }
    }

    /// Notify readers of a slot that is being removed.
    pub(crate) fn retire(self) {
        if let FieldSlot::Tracked(signal) = self {
            signal.trigger();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_stay_plain() {
        let entry = Entry::new(3);
        assert_eq!(entry.as_i64(), Some(3));
        assert!(entry.as_proxy().is_none());
    }

    #[test]
    fn containers_become_proxies() {
        let entry = Entry::new(json!({ "name": "Ada", "tags": ["a"] }));
        assert!(entry.as_object().is_some());
        assert_eq!(entry.get("name").and_then(|e| e.as_str().map(String::from)), Some("Ada".into()));
        assert!(entry.get("tags").and_then(|e| e.as_array().cloned()).is_some());
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Entry::new(json!({ "x": 1 }));
        let b = Entry::new(json!({ "x": 1 }));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(Entry::new("x"), Entry::new("x"));
    }

    #[test]
    fn parse_into_typed_value() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Point {
            x: i32,
            y: i32,
        }

        let entry = Entry::new(json!({ "x": 1, "y": 2 }));
        assert_eq!(entry.parse::<Point>().unwrap(), Point { x: 1, y: 2 });
        assert!(matches!(entry.parse::<String>(), Err(Error::Deserialize(_))));
    }

    #[test]
    fn slots_promote_lazily() {
        let mut slot = FieldSlot::new(json!(1));
        assert!(matches!(slot, FieldSlot::Untracked(_)));

        let signal = slot.signal();
        assert!(matches!(slot, FieldSlot::Tracked(_)));
        assert_eq!(signal.get_untracked().as_i64(), Some(1));
        assert!(slot.signal().ptr_eq(&signal));
    }
}
