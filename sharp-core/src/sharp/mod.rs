//! State Factories
//!
//! This module ties the reactive primitives and the state proxy together
//! into named, reusable state declarations.
//!
//! # Concepts
//!
//! ## Factories
//!
//! A [`SharpFactory`] pairs a name with an initializer and optionally a set
//! of actions and computed values. It creates instances and distributes them.
//!
//! ## Instances
//!
//! A [`Sharp`] bundles one state proxy with its bound actions and computed
//! values. Each `create` call yields an independent instance.
//!
//! ## Scopes
//!
//! A [`Scope`] is a node in the tree that instances are provided through.
//! Reading from a scope finds the nearest provider above it.

mod actions;
mod computed;
mod factory;
mod instance;
mod scope;

pub use actions::{ActionApi, ActionSet, Actions};
pub use computed::{Computed, ComputedSet};
pub use factory::{
    ActionSlot, ComputedSlot, CreatesSharp, InferSharp, NoActions, NoComputed, SharpFactory,
};
pub use instance::Sharp;
pub use scope::Scope;
