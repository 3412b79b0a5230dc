//! Sharp Core
//!
//! This crate provides the core runtime for Sharp, a small state-container
//! factory with fine-grained reactivity. It implements:
//!
//! - Reactive primitives (signals, memos, effects, batches)
//! - Deep reactive state proxies over JSON documents
//! - Named state factories with actions, computed values and scoped
//!   distribution
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `proxy`: Field-by-field reactive mirror of a nested value
//! - `sharp`: Factories, instances and the scope tree
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use sharp_core::reactive::Effect;
//! use sharp_core::{ActionSet, ComputedSet, Scope, SharpFactory};
//!
//! let counter = SharpFactory::new("counter", |(): ()| json!({ "count": 0 }))
//!     .with_actions(ActionSet::new().try_action("increment", |api, (): ()| {
//!         let state = api.value();
//!         let count = state.peek("count").and_then(|c| c.as_i64()).unwrap_or(0);
//!         state.set("count", count + 1)
//!     }))
//!     .with_computed(ComputedSet::new().computed("doubled", |state| {
//!         state.get("count").and_then(|c| c.as_i64()).unwrap_or(0) * 2
//!     }));
//!
//! // Provide an instance at the top of the tree
//! let scope = counter.provide(&Scope::root(), counter.create(()).unwrap());
//!
//! // A component deep in the tree reads the doubled count
//! let sharp = counter.use_sharp(&scope.child()).unwrap();
//! let reader = sharp.clone();
//! let render = Effect::new(move || {
//!     reader.computed().value("doubled");
//! });
//!
//! sharp.actions().call("increment", ()).unwrap();
//! assert_eq!(sharp.computed().value("doubled"), Some(json!(2)));
//! assert_eq!(render.run_count(), 2);
//! ```

pub mod proxy;
pub mod reactive;
pub mod sharp;

mod config;
mod error;

pub use config::{RuntimeConfig, DEFAULT_MAX_FLUSH_PASSES};
pub use error::{Error, Result};
pub use proxy::{Entry, Proxy};
pub use reactive::{batch, untracked, Effect, Memo, Runtime, Signal};
pub use sharp::{
    ActionApi, ActionSet, Actions, Computed, ComputedSet, InferSharp, Scope, Sharp, SharpFactory,
};
