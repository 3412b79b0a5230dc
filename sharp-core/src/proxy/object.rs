//! Object Proxy
//!
//! A reactive view over a JSON object. Each field is its own reactive cell,
//! so reading `user.name` subscribes to `name` and nothing else.
//!
//! # How Object Proxies Work
//!
//! 1. Fields start out as plain entries. The first read or subscription
//!    promotes a field to a [`Signal`], so untouched fields cost nothing.
//!
//! 2. Writes go through the field's signal. Writing an equal primitive is a
//!    no-op; writing a container always replaces the nested proxy.
//!
//! 3. The set of keys has its own shape signal. Adding or removing a key
//!    bumps it, which wakes readers of `keys()`, `len()`, and readers that
//!    looked up a key that was not present yet.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::trace;

use super::entry::{Entry, FieldSlot};
use super::Proxy;
use crate::error::{Error, Result};
use crate::reactive::{batch, Signal};

struct ObjectNode {
    fields: Mutex<IndexMap<String, FieldSlot>>,
    shape: Signal<u64>,
}

/// A reactive JSON object.
#[derive(Clone)]
pub struct ObjectProxy {
    node: Arc<ObjectNode>,
}

impl ObjectProxy {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    pub(crate) fn from_map(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .map(|(key, value)| (key, FieldSlot::new(value)))
            .collect();
        Self {
            node: Arc::new(ObjectNode {
                fields: Mutex::new(fields),
                shape: Signal::new(0),
            }),
        }
    }

    /// Read a field, subscribing the current observer to it.
    ///
    /// A missing key subscribes to the key set instead, so the reader wakes
    /// up once the key is added.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.signal(key).map(|signal| signal.get())
    }

    /// The signal behind a field.
    ///
    /// Useful for selecting one field by reference and writing it directly.
    pub fn signal(&self, key: &str) -> Option<Signal<Entry>> {
        let signal = self.node.fields.lock().get_mut(key).map(FieldSlot::signal);
        if signal.is_none() {
            self.node.shape.get();
        }
        signal
    }

    /// Write a field, adding it if absent.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.write(key.into(), Entry::from(value.into()));
    }

    /// Write an entry, which may be an existing proxy, into a field.
    ///
    /// Fails with [`Error::CyclicProxy`] if the entry is this object or
    /// one of its ancestors.
    pub fn set_entry(&self, key: impl Into<String>, entry: Entry) -> Result<()> {
        if let Entry::Proxy(proxy) = &entry {
            if proxy.contains(&Proxy::Object(self.clone())) {
                return Err(Error::CyclicProxy);
            }
        }
        self.write(key.into(), entry);
        Ok(())
    }

    fn write(&self, key: String, entry: Entry) {
        let mut writes = Vec::with_capacity(1);
        let added = {
            let mut fields = self.node.fields.lock();
            match fields.get_mut(&key) {
                Some(slot) => {
                    slot.assign(entry, &mut writes);
                    false
                }
                None => {
                    fields.insert(key.clone(), FieldSlot::Untracked(entry));
                    true
                }
            }
        };

        batch(|| {
            for (signal, entry) in writes {
                signal.set(entry);
            }
            if added {
                trace!(key = %key, "object key added");
                self.node.shape.update(|shape| shape + 1);
            }
        });
    }

    /// Compute a new value for a field from its current one.
    ///
    /// The current value is read without tracking.
    pub fn update<V>(&self, key: impl Into<String>, f: impl FnOnce(Option<Entry>) -> V)
    where
        V: Into<Value>,
    {
        let key = key.into();
        let current = self.peek(&key);
        self.set(key, f(current));
    }

    /// Remove a field, returning its last value.
    pub fn remove(&self, key: &str) -> Option<Entry> {
        let slot = self.node.fields.lock().shift_remove(key)?;
        let entry = slot.peek();
        batch(|| {
            slot.retire();
            trace!(key = %key, "object key removed");
            self.node.shape.update(|shape| shape + 1);
        });
        Some(entry)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.node.shape.get();
        self.node.fields.lock().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.node.shape.get();
        self.node.fields.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.node.shape.get();
        self.node.fields.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a field without tracking.
    pub fn peek(&self, key: &str) -> Option<Entry> {
        self.node.fields.lock().get(key).map(FieldSlot::peek)
    }

    pub(crate) fn peek_entries(&self) -> Vec<Entry> {
        self.node.fields.lock().values().map(FieldSlot::peek).collect()
    }

    /// Deep copy into a plain object, tracking the key set and every field.
    pub fn to_value(&self) -> Value {
        self.node.shape.get();
        let signals: Vec<(String, Signal<Entry>)> = self
            .node
            .fields
            .lock()
            .iter_mut()
            .map(|(key, slot)| (key.clone(), slot.signal()))
            .collect();

        let map = signals
            .into_iter()
            .map(|(key, signal)| (key, signal.get().to_value()))
            .collect::<Map<_, _>>();
        Value::Object(map)
    }

    /// Deep copy into a plain object without tracking.
    pub fn snapshot(&self) -> Value {
        let entries: Vec<(String, Entry)> = self
            .node
            .fields
            .lock()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.peek()))
            .collect();

        let map = entries
            .into_iter()
            .map(|(key, entry)| (key, entry.snapshot()))
            .collect::<Map<_, _>>();
        Value::Object(map)
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl Default for ObjectProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectProxy({})", self.snapshot())
    }
}

impl Serialize for ObjectProxy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
