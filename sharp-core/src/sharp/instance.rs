//! State instances.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::actions::Actions;
use super::computed::Computed;
use crate::proxy::Proxy;
use crate::reactive::batch;

struct SharpInner<A, C> {
    name: Arc<str>,
    value: Proxy,
    actions: A,
    computed: C,
}

/// One instance of a state factory.
///
/// `A` is [`Actions`] when the factory declared actions and `()` otherwise;
/// `C` is [`Computed`] or `()` in the same way. Clones share the instance.
pub struct Sharp<A = (), C = ()> {
    inner: Arc<SharpInner<A, C>>,
}

impl<A, C> Sharp<A, C> {
    pub(crate) fn new(name: Arc<str>, value: Proxy, actions: A, computed: C) -> Self {
        Self {
            inner: Arc::new(SharpInner {
                name,
                value,
                actions,
                computed,
            }),
        }
    }

    /// Name of the factory that created this instance.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The state root.
    pub fn value(&self) -> &Proxy {
        &self.inner.value
    }

    /// Run `f` against the state as one batch.
    pub fn update<R>(&self, f: impl FnOnce(&Proxy) -> R) -> R {
        batch(|| f(&self.inner.value))
    }

    /// Run `f` against the state with no extra scope.
    ///
    /// Reads inside `f` are tracked by the current observer. Returning a
    /// field's signal selects it by reference.
    pub fn select<T>(&self, f: impl FnOnce(&Proxy) -> T) -> T {
        f(&self.inner.value)
    }

    /// Plain copy of the state, untracked.
    pub fn snapshot(&self) -> Value {
        self.inner.value.snapshot()
    }

    /// Whether two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Sharp<Actions, C> {
    pub fn actions(&self) -> &Actions {
        &self.inner.actions
    }
}

impl<A> Sharp<A, Computed> {
    pub fn computed(&self) -> &Computed {
        &self.inner.computed
    }
}

impl<A, C> Clone for Sharp<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, C> fmt::Debug for Sharp<A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sharp")
            .field("name", &self.inner.name)
            .field("value", &self.inner.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn plain(value: Value) -> Sharp {
        Sharp::new(Arc::from("plain"), Proxy::new(value).unwrap(), (), ())
    }

    #[test]
    fn update_is_batched() {
        let sharp = plain(json!({ "a": 0, "b": 0 }));
        let runs = Arc::new(AtomicUsize::new(0));
        let (reader, counter) = (sharp.clone(), runs.clone());
        let _effect = Effect::new(move || {
            reader.value().get("a");
            reader.value().get("b");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sharp
            .update(|state| -> crate::Result<()> {
                state.set("a", 1)?;
                state.set("b", 2)
            })
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(sharp.snapshot(), json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn select_returns_values_or_signals() {
        let sharp = plain(json!({ "count": 1 }));
        let count = sharp.select(|state| state.get("count").and_then(|c| c.as_i64()));
        assert_eq!(count, Some(1));

        let signal = sharp.select(|state| state.signal("count")).unwrap();
        signal.set(crate::proxy::Entry::new(7));
        assert_eq!(sharp.snapshot(), json!({ "count": 7 }));
    }

    #[test]
    fn clones_share_the_instance() {
        let sharp = plain(json!([]));
        let other = sharp.clone();
        assert!(sharp.ptr_eq(&other));
        other.value().set("-", 1).unwrap();
        assert_eq!(sharp.snapshot(), json!([1]));
        assert_eq!(sharp.name(), "plain");
    }
}
