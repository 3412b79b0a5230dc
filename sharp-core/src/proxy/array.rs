//! Array Proxy
//!
//! A reactive view over a JSON array with one reactive cell per index and a
//! separate cell for the length.
//!
//! # How Array Proxies Work
//!
//! Reading index `i` subscribes to cell `i` only. Structural operations
//! (`push`, `pop`, `insert`, `remove`, `truncate`) move values through the
//! existing cells instead of replacing them, so a reader of an index is
//! woken only when the value at that index actually changes. Appending to an
//! array therefore leaves readers of earlier indices alone, while inserting
//! at the front wakes every index that shifted.
//!
//! Every structural operation runs inside a single batch, so an effect that
//! reads several cells runs once per operation.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::trace;

use super::entry::{Entry, FieldSlot};
use super::Proxy;
use crate::error::{Error, Result};
use crate::reactive::{batch, Signal};

type Writes = Vec<(Signal<Entry>, Entry)>;

struct ArrayNode {
    items: Mutex<Vec<FieldSlot>>,
    length: Signal<usize>,
}

/// A reactive JSON array.
#[derive(Clone)]
pub struct ArrayProxy {
    node: Arc<ArrayNode>,
}

impl ArrayProxy {
    /// Create an empty array.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub(crate) fn from_vec(items: Vec<Value>) -> Self {
        let length = items.len();
        Self {
            node: Arc::new(ArrayNode {
                items: Mutex::new(items.into_iter().map(FieldSlot::new).collect()),
                length: Signal::new(length),
            }),
        }
    }

    /// Read an index, subscribing to that cell.
    ///
    /// An out-of-range read subscribes to the length instead.
    pub fn get(&self, index: usize) -> Option<Entry> {
        self.signal(index).map(|signal| signal.get())
    }

    /// The signal behind one index.
    pub fn signal(&self, index: usize) -> Option<Signal<Entry>> {
        let signal = self.node.items.lock().get_mut(index).map(FieldSlot::signal);
        if signal.is_none() {
            self.node.length.get();
        }
        signal
    }

    /// Read an index without tracking.
    pub fn peek(&self, index: usize) -> Option<Entry> {
        self.node.items.lock().get(index).map(FieldSlot::peek)
    }

    pub(crate) fn peek_entries(&self) -> Vec<Entry> {
        self.node.items.lock().iter().map(FieldSlot::peek).collect()
    }

    /// Current length, tracked.
    pub fn len(&self) -> usize {
        self.node.length.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write an index. Writing at `len()` appends.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.set_entry(index, Entry::from(value.into()))
    }

    /// Write an entry, which may be an existing proxy, at `index`.
    ///
    /// Fails with [`Error::CyclicProxy`] if the entry is this array or one
    /// of its ancestors.
    pub fn set_entry(&self, index: usize, entry: Entry) -> Result<()> {
        if let Entry::Proxy(proxy) = &entry {
            if proxy.contains(&Proxy::Array(self.clone())) {
                return Err(Error::CyclicProxy);
            }
        }
        let mut writes = Writes::with_capacity(1);
        {
            let mut items = self.node.items.lock();
            let len = items.len();
            if index > len {
                return Err(Error::IndexOutOfBounds { index, len });
            }
            if index < len {
                items[index].assign(entry, &mut writes);
            } else {
                items.push(FieldSlot::Untracked(entry));
            }
        }
        self.commit(writes, Vec::new());
        Ok(())
    }

    /// Append a value.
    pub fn push(&self, value: impl Into<Value>) {
        let entry = Entry::from(value.into());
        self.node.items.lock().push(FieldSlot::Untracked(entry));
        self.commit(Vec::new(), Vec::new());
    }

    /// Remove and return the last value.
    pub fn pop(&self) -> Option<Entry> {
        let slot = self.node.items.lock().pop()?;
        let entry = slot.peek();
        self.commit(Vec::new(), vec![slot]);
        Some(entry)
    }

    /// Insert a value at `index`, shifting later values up by one.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let entry = Entry::from(value.into());
        let mut writes = Writes::new();
        {
            let mut items = self.node.items.lock();
            let len = items.len();
            if index > len {
                return Err(Error::IndexOutOfBounds { index, len });
            }

            let shifted: Vec<Entry> = items[index..].iter().map(FieldSlot::peek).collect();
            let mut incoming = std::iter::once(entry).chain(shifted);
            for slot in items[index..].iter_mut() {
                if let Some(next) = incoming.next() {
                    slot.assign(next, &mut writes);
                }
            }
            if let Some(last) = incoming.next() {
                items.push(FieldSlot::Untracked(last));
            }
        }
        self.commit(writes, Vec::new());
        Ok(())
    }

    /// Remove the value at `index`, shifting later values down by one.
    pub fn remove(&self, index: usize) -> Result<Entry> {
        let mut writes = Writes::new();
        let (removed, retired) = {
            let mut items = self.node.items.lock();
            let len = items.len();
            if index >= len {
                return Err(Error::IndexOutOfBounds { index, len });
            }

            let removed = items[index].peek();
            let shifted: Vec<Entry> = items[index + 1..].iter().map(FieldSlot::peek).collect();
            for (slot, next) in items[index..].iter_mut().zip(shifted) {
                slot.assign(next, &mut writes);
            }
            (removed, items.pop())
        };
        self.commit(writes, retired.into_iter().collect());
        Ok(removed)
    }

    /// Shorten the array to `len` values. Longer lengths are ignored.
    pub fn truncate(&self, len: usize) {
        let retired = {
            let mut items = self.node.items.lock();
            if len >= items.len() {
                return;
            }
            items.split_off(len)
        };
        self.commit(Vec::new(), retired);
    }

    pub fn clear(&self) {
        self.truncate(0);
    }

    /// Every entry, tracking the length and each index.
    pub fn entries(&self) -> Vec<Entry> {
        self.node.length.get();
        let signals: Vec<Signal<Entry>> = self
            .node
            .items
            .lock()
            .iter_mut()
            .map(FieldSlot::signal)
            .collect();
        signals.iter().map(Signal::get).collect()
    }

    /// Deep copy into a plain array, tracking everything read.
    pub fn to_value(&self) -> Value {
        Value::Array(self.entries().iter().map(Entry::to_value).collect())
    }

    /// Deep copy into a plain array without tracking.
    pub fn snapshot(&self) -> Value {
        let entries: Vec<Entry> = self.node.items.lock().iter().map(FieldSlot::peek).collect();
        Value::Array(entries.iter().map(Entry::snapshot).collect())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Apply deferred cell writes, retire removed cells and publish the new
    /// length, all in one batch.
    fn commit(&self, writes: Writes, retired: Vec<FieldSlot>) {
        batch(|| {
            for (signal, entry) in writes {
                signal.set(entry);
            }
            for slot in retired {
                slot.retire();
            }
            let len = self.node.items.lock().len();
            trace!(len, "array committed");
            self.node.length.set(len);
        });
    }
}

impl Default for ArrayProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArrayProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayProxy({})", self.snapshot())
    }
}

impl Serialize for ArrayProxy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
