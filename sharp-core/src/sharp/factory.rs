//! State Factory
//!
//! A [`SharpFactory`] is declared once with a name and an initializer, and
//! creates independent instances of that state on demand.
//!
//! # How Factories Work
//!
//! 1. `SharpFactory::new(name, initializer)` fixes the argument type of the
//!    initializer. `create` only accepts that type, so a wrong argument
//!    shape is a compile error. `create_from_json` is the dynamic entry
//!    point and reports a mismatch as [`Error::InvalidArguments`].
//!
//! 2. `with_actions` and `with_computed` consume the builder and return a
//!    new type with that capability attached. Each is only defined while
//!    the capability is still missing, so attaching one twice does not
//!    compile:
//!
//! ```compile_fail
//! use serde_json::json;
//! use sharp_core::{ActionSet, SharpFactory};
//!
//! let factory = SharpFactory::new("counter", |(): ()| json!({ "count": 0 }))
//!     .with_actions(ActionSet::new())
//!     .with_actions(ActionSet::new());
//! ```
//!
//! 3. `create` runs the initializer, wraps the result in a [`Proxy`], binds
//!    the actions to that proxy and turns each computed declaration into a
//!    memo. Every call yields a fresh, isolated instance.
//!
//! 4. `provide`, `use_sharp` and `use_optional_sharp` distribute instances
//!    through a [`Scope`] tree.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::actions::{ActionSet, Actions};
use super::computed::{Computed, ComputedSet};
use super::instance::Sharp;
use super::scope::{ContextKey, Scope};
use crate::error::{Error, Result};
use crate::proxy::Proxy;

type Initializer<Args> = Arc<dyn Fn(Args) -> Result<Value> + Send + Sync>;

/// Marker for a factory without actions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoActions;

/// Marker for a factory without computed values.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComputed;

/// The actions slot of a factory: either [`NoActions`] or an [`ActionSet`].
pub trait ActionSlot {
    /// What an instance exposes for this slot.
    type Bound: Clone + Send + Sync + 'static;

    #[doc(hidden)]
    fn bind(&self, owner: Arc<str>, value: &Proxy) -> Self::Bound;
}

impl ActionSlot for NoActions {
    type Bound = ();

    fn bind(&self, _owner: Arc<str>, _value: &Proxy) -> Self::Bound {}
}

impl ActionSlot for ActionSet {
    type Bound = Actions;

    fn bind(&self, owner: Arc<str>, value: &Proxy) -> Actions {
        ActionSet::bind(self, owner, value)
    }
}

/// The computed slot of a factory: either [`NoComputed`] or a [`ComputedSet`].
pub trait ComputedSlot {
    type Bound: Clone + Send + Sync + 'static;

    #[doc(hidden)]
    fn bind(&self, value: &Proxy) -> Self::Bound;
}

impl ComputedSlot for NoComputed {
    type Bound = ();

    fn bind(&self, _value: &Proxy) -> Self::Bound {}
}

impl ComputedSlot for ComputedSet {
    type Bound = Computed;

    fn bind(&self, value: &Proxy) -> Computed {
        ComputedSet::bind(self, value)
    }
}

/// A named state declaration that creates instances.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sharp_core::{ActionSet, ComputedSet, SharpFactory};
///
/// let counter = SharpFactory::new("counter", |(start,): (i64,)| json!({ "count": start }))
///     .with_actions(ActionSet::new().try_action("increment", |api, (): ()| {
///         let state = api.value();
///         let count = state.peek("count").and_then(|c| c.as_i64()).unwrap_or(0);
///         state.set("count", count + 1)
///     }))
///     .with_computed(ComputedSet::new().computed("doubled", |state| {
///         state.get("count").and_then(|c| c.as_i64()).unwrap_or(0) * 2
///     }));
///
/// let sharp = counter.create((1,)).unwrap();
/// sharp.actions().call("increment", ()).unwrap();
/// assert_eq!(sharp.computed().value("doubled"), Some(json!(4)));
/// ```
pub struct SharpFactory<Args, A = NoActions, C = NoComputed> {
    name: Arc<str>,
    key: ContextKey,
    initializer: Initializer<Args>,
    actions: A,
    computed: C,
}

impl<Args: 'static> SharpFactory<Args> {
    /// Declare a factory.
    ///
    /// `initializer` must produce an object or array; anything else fails
    /// at creation with [`Error::InvalidInitialState`].
    pub fn new<F, S>(name: impl Into<String>, initializer: F) -> Self
    where
        F: Fn(Args) -> S + Send + Sync + 'static,
        S: Serialize,
    {
        let initializer: Initializer<Args> = Arc::new(move |args: Args| {
            serde_json::to_value(initializer(args)).map_err(Error::Serialization)
        });
        Self {
            name: Arc::from(name.into()),
            key: ContextKey::new(),
            initializer,
            actions: NoActions,
            computed: NoComputed,
        }
    }
}

impl<Args, C> SharpFactory<Args, NoActions, C> {
    /// Attach actions.
    pub fn with_actions(self, actions: ActionSet) -> SharpFactory<Args, ActionSet, C> {
        SharpFactory {
            name: self.name,
            key: ContextKey::new(),
            initializer: self.initializer,
            actions,
            computed: self.computed,
        }
    }
}

impl<Args, A> SharpFactory<Args, A, NoComputed> {
    /// Attach computed values.
    pub fn with_computed(self, computed: ComputedSet) -> SharpFactory<Args, A, ComputedSet> {
        SharpFactory {
            name: self.name,
            key: ContextKey::new(),
            initializer: self.initializer,
            actions: self.actions,
            computed,
        }
    }
}

impl<Args, A, C> SharpFactory<Args, A, C>
where
    A: ActionSlot,
    C: ComputedSlot,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a new, independent instance.
    pub fn create(&self, args: Args) -> Result<Sharp<A::Bound, C::Bound>> {
        let initial = (self.initializer)(args)?;
        let value = Proxy::named(&self.name, initial)?;
        let actions = self.actions.bind(self.name.clone(), &value);
        let computed = self.computed.bind(&value);
        debug!(sharp = %self.name, "instance created");
        Ok(Sharp::new(self.name.clone(), value, actions, computed))
    }

    /// Create an instance from untyped arguments.
    pub fn create_from_json(&self, args: Value) -> Result<Sharp<A::Bound, C::Bound>>
    where
        Args: DeserializeOwned,
    {
        let args = serde_json::from_value(args)
            .map_err(|source| Error::invalid_arguments(&*self.name, source))?;
        self.create(args)
    }

    /// Make `sharp` reachable from the returned child scope and below.
    ///
    /// A provider further down the tree shadows this one.
    pub fn provide(&self, scope: &Scope, sharp: Sharp<A::Bound, C::Bound>) -> Scope {
        let child = scope.provide(self.key, sharp);
        debug!(sharp = %self.name, depth = child.depth(), "instance provided");
        child
    }

    /// The nearest provided instance.
    pub fn use_sharp(&self, scope: &Scope) -> Result<Sharp<A::Bound, C::Bound>> {
        self.use_optional_sharp(scope)
            .ok_or_else(|| Error::MissingProvider {
                name: self.name.to_string(),
            })
    }

    /// The nearest provided instance, if any.
    pub fn use_optional_sharp(&self, scope: &Scope) -> Option<Sharp<A::Bound, C::Bound>> {
        scope.lookup(self.key)
    }

    /// Run `f` against the state of the nearest provided instance.
    pub fn select<T>(&self, scope: &Scope, f: impl FnOnce(&Proxy) -> T) -> Result<T> {
        Ok(self.use_sharp(scope)?.select(f))
    }
}

impl<Args, A: Clone, C: Clone> Clone for SharpFactory<Args, A, C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key: self.key,
            initializer: self.initializer.clone(),
            actions: self.actions.clone(),
            computed: self.computed.clone(),
        }
    }
}

impl<Args, A, C> fmt::Debug for SharpFactory<Args, A, C>
where
    A: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharpFactory")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .field("computed", &self.computed)
            .finish()
    }
}

/// Names the instance type a factory creates.
pub trait CreatesSharp {
    type Instance;
}

impl<Args, A, C> CreatesSharp for SharpFactory<Args, A, C>
where
    A: ActionSlot,
    C: ComputedSlot,
{
    type Instance = Sharp<A::Bound, C::Bound>;
}

/// The instance type of factory type `F`.
///
/// ```
/// use serde_json::json;
/// use sharp_core::{InferSharp, SharpFactory};
///
/// type TodoFactory = SharpFactory<()>;
///
/// let factory: TodoFactory = SharpFactory::new("todo", |(): ()| json!({ "items": [] }));
/// let sharp: InferSharp<TodoFactory> = factory.create(()).unwrap();
/// assert_eq!(sharp.name(), "todo");
/// ```
pub type InferSharp<F> = <F as CreatesSharp>::Instance;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter() -> SharpFactory<(i64,)> {
        SharpFactory::new("counter", |(start,): (i64,)| json!({ "count": start }))
    }

    #[test]
    fn create_builds_isolated_instances() {
        let factory = counter();
        let a = factory.create((1,)).unwrap();
        let b = factory.create((1,)).unwrap();

        a.value().set("count", 5).unwrap();
        assert_eq!(a.snapshot(), json!({ "count": 5 }));
        assert_eq!(b.snapshot(), json!({ "count": 1 }));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn create_from_json_checks_arguments() {
        let factory = counter();
        let sharp = factory.create_from_json(json!([3])).unwrap();
        assert_eq!(sharp.snapshot(), json!({ "count": 3 }));

        let err = factory.create_from_json(json!(["three"])).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { ref target, .. } if target == "counter"));
    }

    #[test]
    fn primitive_initial_state_fails() {
        let factory = SharpFactory::new("bad", |(): ()| 5);
        let err = factory.create(()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidInitialState { ref name, kind: "number" } if name == "bad"
        ));
    }

    #[test]
    fn initializer_runs_once_per_create() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory = SharpFactory::new("calls", move |(): ()| {
            counter.fetch_add(1, Ordering::SeqCst);
            json!({})
        });

        factory.create(()).unwrap();
        factory.create(()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn typed_initial_state() {
        #[derive(serde::Serialize)]
        struct Todo {
            title: String,
            done: bool,
        }

        let factory = SharpFactory::new("todo", |(title,): (String,)| Todo { title, done: false });
        let sharp = factory.create(("write docs".to_string(),)).unwrap();
        assert_eq!(sharp.snapshot(), json!({ "title": "write docs", "done": false }));
    }

    #[test]
    fn provide_and_use() {
        let factory = counter();
        let root = Scope::root();
        assert!(factory.use_optional_sharp(&root).is_none());

        let err = factory.use_sharp(&root).unwrap_err();
        assert!(err.is_missing_provider());
        assert_eq!(
            err.to_string(),
            "counter.use_sharp must be used within counter.Provider"
        );

        let sharp = factory.create((0,)).unwrap();
        let scope = factory.provide(&root, sharp.clone());
        let found = factory.use_sharp(&scope.child()).unwrap();
        assert!(found.ptr_eq(&sharp));

        let count = factory
            .select(&scope, |state| state.get("count").and_then(|c| c.as_i64()))
            .unwrap();
        assert_eq!(count, Some(0));
    }

    #[test]
    fn nested_providers_shadow() {
        let factory = counter();
        let outer = factory.create((1,)).unwrap();
        let inner = factory.create((2,)).unwrap();

        let outer_scope = factory.provide(&Scope::root(), outer.clone());
        let inner_scope = factory.provide(&outer_scope.child(), inner.clone());

        assert!(factory.use_sharp(&inner_scope).unwrap().ptr_eq(&inner));
        assert!(factory.use_sharp(&outer_scope).unwrap().ptr_eq(&outer));
    }

    #[test]
    fn factories_with_equal_names_do_not_collide() {
        let first = counter();
        let second = counter();
        let scope = first.provide(&Scope::root(), first.create((0,)).unwrap());
        assert!(second.use_optional_sharp(&scope).is_none());
    }
}
