//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, effects
//! and batches. These primitives back every field of a Sharp state proxy.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal holds one value plus a version counter. Reading it inside a
//! memo or effect records a dependency on the version seen; writing a
//! different value bumps the version and marks every dependent.
//!
//! ## Memos
//!
//! A Memo caches a derived value. It recomputes lazily on the next read
//! after an input changes, and keeps its version when the new result equals
//! the old one so downstream readers stay asleep.
//!
//! ## Effects
//!
//! An Effect runs eagerly whenever something it read has changed. Effects
//! model subscribed component renders.
//!
//! ## Batches
//!
//! A batch groups writes so that every affected effect runs once, after the
//! last write.
//!
//! # Implementation Notes
//!
//! Dependencies are collected through a thread-local stack of tracking
//! frames. Dirtiness is pushed eagerly to subscribers, values are pulled
//! lazily on read.

mod batch;
mod context;
mod effect;
mod memo;
mod runtime;
mod signal;
mod subscriber;

pub use batch::{batch, Batch};
pub use context::{untracked, ReactiveContext};
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use runtime::{Dependency, DirtyState, Reactive, ReactiveHandle, Runtime, Source};
pub use signal::Signal;
pub use subscriber::{SourceId, SubscriberId};
