//! Scope Tree
//!
//! Scopes model the component tree for distributing instances. A provider
//! makes an instance reachable from a child scope and everything below it;
//! lookups walk from a scope toward the root and stop at the nearest
//! provider for the requested factory.
//!
//! Scopes are immutable. Providing returns a new child rather than changing
//! the scope it was called on, so siblings never see each other's values.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identifies what a provider stores. Every factory gets a fresh key, so
/// two factories with the same name never see each other's instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ContextKey(u64);

impl ContextKey {
    pub(crate) fn new() -> Self {
        Self(NEXT_CONTEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

struct Provided {
    key: ContextKey,
    value: Arc<dyn Any + Send + Sync>,
}

struct ScopeNode {
    parent: Option<Scope>,
    depth: usize,
    provided: Option<Provided>,
}

/// A node in the distribution tree.
#[derive(Clone)]
pub struct Scope {
    node: Arc<ScopeNode>,
}

impl Scope {
    /// A scope with no parent and nothing provided.
    pub fn root() -> Self {
        Self {
            node: Arc::new(ScopeNode {
                parent: None,
                depth: 0,
                provided: None,
            }),
        }
    }

    /// A plain child scope that inherits everything from this one.
    pub fn child(&self) -> Self {
        self.derive(None)
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.node.parent.as_ref()
    }

    /// Distance from the root.
    pub fn depth(&self) -> usize {
        self.node.depth
    }

    pub fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    pub(crate) fn provide<T>(&self, key: ContextKey, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.derive(Some(Provided {
            key,
            value: Arc::new(value),
        }))
    }

    /// Nearest value stored under `key`, searching toward the root.
    pub(crate) fn lookup<T>(&self, key: ContextKey) -> Option<T>
    where
        T: Any + Clone,
    {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(provided) = &current.node.provided {
                if provided.key == key {
                    return provided.value.downcast_ref::<T>().cloned();
                }
            }
            scope = current.parent();
        }
        None
    }

    fn derive(&self, provided: Option<Provided>) -> Self {
        Self {
            node: Arc::new(ScopeNode {
                parent: Some(self.clone()),
                depth: self.node.depth + 1,
                provided,
            }),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("depth", &self.node.depth)
            .field("provides", &self.node.provided.as_ref().map(|p| p.key))
            .finish()
    }
}
