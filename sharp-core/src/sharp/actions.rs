//! Named actions.
//!
//! An [`ActionSet`] is declared once on a factory. Every instance binds it
//! to its own state, producing [`Actions`] that can be called by name.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::proxy::Proxy;
use crate::reactive::batch;

type ActionFn = Arc<dyn Fn(&ActionApi, Value) -> Result<Value> + Send + Sync>;

/// What an action sees: write access to the state plus the batch helper.
#[derive(Clone, Debug)]
pub struct ActionApi {
    value: Proxy,
}

impl ActionApi {
    /// The instance state.
    pub fn value(&self) -> &Proxy {
        &self.value
    }

    /// Run `f` as one batch, so observers see all of its writes at once.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        batch(f)
    }
}

/// A declared set of actions, keyed by name.
///
/// Each action receives the [`ActionApi`] and one parameter value. Use a
/// tuple for several parameters and `()` for none.
///
/// # Example
///
/// ```
/// use sharp_core::ActionSet;
///
/// let actions = ActionSet::new()
///     .action("increment", |api, (): ()| {
///         if let Some(counter) = api.value().as_object() {
///             counter.update("count", |c| c.and_then(|c| c.as_i64()).unwrap_or(0) + 1);
///         }
///     })
///     .action("add", |api, (amount,): (i64,)| {
///         if let Some(counter) = api.value().as_object() {
///             counter.update("count", |c| c.and_then(|c| c.as_i64()).unwrap_or(0) + amount);
///         }
///     });
///
/// assert_eq!(actions.names(), vec!["increment", "add"]);
/// ```
#[derive(Clone, Default)]
pub struct ActionSet {
    actions: Arc<IndexMap<String, ActionFn>>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an action. A later declaration with the same name wins.
    pub fn action<P, R, F>(self, name: impl Into<String>, action: F) -> Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(&ActionApi, P) -> R + Send + Sync + 'static,
    {
        self.try_action(name, move |api, params: P| Ok(action(api, params)))
    }

    /// Declare an action that can fail. Its error is returned from
    /// [`Actions::call`] unchanged.
    pub fn try_action<P, R, F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(&ActionApi, P) -> Result<R> + Send + Sync + 'static,
    {
        let name = name.into();
        let target = name.clone();
        let action: ActionFn = Arc::new(move |api: &ActionApi, params: Value| {
            let params = serde_json::from_value(params)
                .map_err(|source| Error::invalid_arguments(target.as_str(), source))?;
            serde_json::to_value(action(api, params)?).map_err(Error::Serialization)
        });
        Arc::make_mut(&mut self.actions).insert(name, action);
        self
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub(crate) fn bind(&self, owner: Arc<str>, value: &Proxy) -> Actions {
        Actions {
            owner,
            api: ActionApi {
                value: value.clone(),
            },
            actions: self.actions.clone(),
        }
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSet")
            .field("names", &self.names())
            .finish()
    }
}

/// Actions bound to one instance.
#[derive(Clone)]
pub struct Actions {
    owner: Arc<str>,
    api: ActionApi,
    actions: Arc<IndexMap<String, ActionFn>>,
}

impl Actions {
    /// Call an action by name.
    ///
    /// The arguments are converted to the action's parameter type; a
    /// mismatch fails with [`Error::InvalidArguments`]. Actions are not
    /// batched implicitly; use [`ActionApi::batch`] inside the action.
    pub fn call(&self, action: &str, args: impl Serialize) -> Result<Value> {
        let run = self
            .actions
            .get(action)
            .ok_or_else(|| Error::UnknownAction {
                name: self.owner.to_string(),
                action: action.to_string(),
            })?;
        let args = serde_json::to_value(args).map_err(Error::Serialization)?;
        trace!(sharp = %self.owner, action, "calling action");
        run(&self.api, args)
    }

    /// Call an action and convert its result.
    pub fn call_as<R: DeserializeOwned>(&self, action: &str, args: impl Serialize) -> Result<R> {
        let result = self.call(action, args)?;
        serde_json::from_value(result).map_err(Error::Deserialize)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actions")
            .field("owner", &self.owner)
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
    use crate::reactive::Effect;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_actions() -> ActionSet {
        ActionSet::new()
            .try_action("increment", |api, (): ()| {
                let state = api.value();
                let next = state.peek("count").and_then(|c| c.as_i64()).unwrap_or(0) + 1;
                state.set("count", next)
            })
            .try_action("rename", |api, name: String| api.value().set("name", name))
            .action("read", |api, (): ()| {
                api.value().peek("count").and_then(|c| c.as_i64())
            })
    }

    fn bound() -> (Proxy, Actions) {
        let state = Proxy::new(json!({ "count": 0, "name": "a" })).unwrap();
        let actions = counter_actions().bind(Arc::from("counter"), &state);
        (state, actions)
    }

    #[test]
    fn calls_by_name() {
        let (state, actions) = bound();
        actions.call("increment", ()).unwrap();
        actions.call("increment", ()).unwrap();
        assert_eq!(state.peek("count").and_then(|c| c.as_i64()), Some(2));

        let count: Option<i64> = actions.call_as("read", ()).unwrap();
        assert_eq!(count, Some(2));
    }

    #[test]
    fn unknown_action() {
        let (_state, actions) = bound();
        let err = actions.call("decrement", ()).unwrap_err();
        assert!(matches!(err, Error::UnknownAction { ref action, .. } if action == "decrement"));
        assert!(err.to_string().contains("counter"));
    }

    #[test]
    fn mismatched_arguments() {
        let (state, actions) = bound();
        let err = actions.call("rename", 42).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { ref target, .. } if target == "rename"));
        assert_eq!(state.peek("name").and_then(|n| n.as_str().map(String::from)), Some("a".into()));
    }

    #[test]
    fn batch_groups_writes() {
        let state = Proxy::new(json!({ "a": 0, "b": 0 })).unwrap();
        let actions = ActionSet::new()
            .try_action("both", |api, (): ()| {
                api.batch(|| {
                    api.value().set("a", 1)?;
                    api.value().set("b", 1)
                })
            })
            .bind(Arc::from("pair"), &state);

        let runs = Arc::new(AtomicUsize::new(0));
        let (reader, counter) = (state.clone(), runs.clone());
        let _effect = Effect::new(move || {
            reader.get("a");
            reader.get("b");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        actions.call("both", ()).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn later_declaration_wins() {
        let set = ActionSet::new()
            .action("x", |_, (): ()| 1)
            .action("x", |_, (): ()| 2);
        assert_eq!(set.len(), 1);

        let state = Proxy::new(json!({})).unwrap();
        let actions = set.bind(Arc::from("x"), &state);
        assert_eq!(actions.call_as::<i64>("x", ()).unwrap(), 2);
    }
}
