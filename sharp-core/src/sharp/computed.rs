//! Named computed values.
//!
//! A [`ComputedSet`] declares derived values over the state. Binding it to
//! an instance turns every declaration into its own [`Memo`], so each one
//! tracks exactly the fields it reads and recomputes lazily.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::proxy::Proxy;
use crate::reactive::Memo;

type ComputedFn = Arc<dyn Fn(&Proxy) -> Value + Send + Sync>;

/// A declared set of computed values, keyed by name.
#[derive(Clone, Default)]
pub struct ComputedSet {
    computed: Arc<IndexMap<String, ComputedFn>>,
}

impl ComputedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a computed value. A later declaration with the same name wins.
    ///
    /// A result that fails to serialize reads as `null` and logs a warning.
    pub fn computed<R, F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        R: Serialize,
        F: Fn(&Proxy) -> R + Send + Sync + 'static,
    {
        let name = name.into();
        let label = name.clone();
        let compute: ComputedFn = Arc::new(move |state: &Proxy| {
            serde_json::to_value(compute(state)).unwrap_or_else(|err| {
                warn!(computed = %label, %err, "computed value did not serialize");
                Value::Null
            })
        });
        Arc::make_mut(&mut self.computed).insert(name, compute);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.computed.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.computed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.computed.is_empty()
    }

    pub(crate) fn bind(&self, value: &Proxy) -> Computed {
        let memos = self
            .computed
            .iter()
            .map(|(name, compute)| {
                let (compute, state) = (compute.clone(), value.clone());
                (name.clone(), Memo::new(move || compute(&state)))
            })
            .collect();
        Computed {
            memos: Arc::new(memos),
        }
    }
}

impl fmt::Debug for ComputedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedSet")
            .field("names", &self.names())
            .finish()
    }
}

/// Computed values bound to one instance.
#[derive(Clone)]
pub struct Computed {
    memos: Arc<IndexMap<String, Memo<Value>>>,
}

impl Computed {
    /// The memo behind a computed value.
    pub fn get(&self, name: &str) -> Option<&Memo<Value>> {
        self.memos.get(name)
    }

    /// Read a computed value, subscribing the current observer to it.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.memos.get(name).map(Memo::get)
    }

    pub fn names(&self) -> Vec<&str> {
        self.memos.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("names", &self.names())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn count(state: &Proxy) -> i64 {
        state.get("count").and_then(|c| c.as_i64()).unwrap_or(0)
    }

    #[test]
    fn computed_values_are_lazy_memos() {
        let state = Proxy::new(json!({ "count": 1, "label": "x" })).unwrap();
        let computed = ComputedSet::new()
            .computed("doubled", |s| count(s) * 2)
            .bind(&state);

        let memo = computed.get("doubled").unwrap();
        assert_eq!(memo.compute_count(), 0);
        assert_eq!(computed.value("doubled"), Some(json!(2)));

        state.set("label", "y").unwrap();
        assert_eq!(computed.value("doubled"), Some(json!(2)));
        assert_eq!(memo.compute_count(), 1);

        state.set("count", 4).unwrap();
        assert_eq!(computed.value("doubled"), Some(json!(8)));
        assert_eq!(memo.compute_count(), 2);
    }

    #[test]
    fn each_binding_gets_its_own_memos() {
        let set = ComputedSet::new().computed("c", count);
        let a = Proxy::new(json!({ "count": 1 })).unwrap();
        let b = Proxy::new(json!({ "count": 2 })).unwrap();
        let (ca, cb) = (set.bind(&a), set.bind(&b));

        a.set("count", 10).unwrap();
        assert_eq!(ca.value("c"), Some(json!(10)));
        assert_eq!(cb.value("c"), Some(json!(2)));
    }

    #[test]
    fn names_and_unknown() {
        let state = Proxy::new(json!({ "first": "Ada", "last": "Lovelace" })).unwrap();
        let computed = ComputedSet::new()
            .computed("full_name", |s| {
                let part = |key| s.get(key).and_then(|v| v.as_str().map(String::from)).unwrap_or_default();
                format!("{} {}", part("first"), part("last"))
            })
            .computed("initial", |s| s.get("first").and_then(|v| v.as_str().map(|n| n[..1].to_string())))
            .bind(&state);

        assert_eq!(computed.names(), vec!["full_name", "initial"]);
        assert_eq!(computed.value("full_name"), Some(json!("Ada Lovelace")));
        assert_eq!(computed.value("initial"), Some(json!("A")));
        assert!(computed.value("missing").is_none());
    }

    #[test]
    fn structured_results_serialize() {
        #[derive(Serialize)]
        struct Summary {
            count: i64,
            even: bool,
        }

        let state = Proxy::new(json!({ "count": 3 })).unwrap();
        let computed = ComputedSet::new()
            .computed("summary", |s| Summary {
                count: count(s),
                even: count(s) % 2 == 0,
            })
            .bind(&state);

        assert_eq!(computed.value("summary"), Some(json!({ "count": 3, "even": false })));
        state.set("count", 4).unwrap();
        assert_eq!(computed.value("summary"), Some(json!({ "count": 4, "even": true })));
    }

    #[test]
    fn unserializable_result_reads_as_null() {
        use std::collections::HashMap;

        let state = Proxy::new(json!({ "count": 1 })).unwrap();
        let computed = ComputedSet::new()
            .computed("by_pair", |s| HashMap::from([((count(s), 0), 1)]))
            .bind(&state);

        assert_eq!(computed.value("by_pair"), Some(Value::Null));
    }
}
