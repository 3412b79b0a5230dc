//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! the subscriber onto the stack. When the computation completes, we pop it
//! and hand the collected dependencies back to the computation.
//!
//! This design supports nested reactive contexts (e.g., a memo that reads
//! from another memo). A frame without a subscriber suspends tracking,
//! which is how [`untracked`] is implemented.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::runtime::Dependency;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The running computation, or `None` inside `untracked`.
    subscriber_id: Option<SubscriberId>,
    /// Sources read during this computation, deduplicated by source ID.
    dependencies: SmallVec<[Dependency; 4]>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any source that is read will
    /// register the subscriber as a dependent.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: SmallVec::new(),
            });
        });

        Self {
            subscriber_id,
            finished: false,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record a dependency of the running computation.
    ///
    /// A second read of the same source keeps the latest observed version.
    pub(crate) fn track(dependency: Dependency) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(entry) = stack.last_mut() else {
                return;
            };
            if entry.subscriber_id.is_none() {
                return;
            }
            let id = dependency.source.source_id();
            match entry
                .dependencies
                .iter_mut()
                .find(|existing| existing.source.source_id() == id)
            {
                Some(existing) => existing.version = dependency.version,
                None => entry.dependencies.push(dependency),
            }
        });
    }

    /// Number of dependencies collected so far in the current frame.
    pub fn dependency_count() -> usize {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.len())
                .unwrap_or_default()
        })
    }

    /// Pop this context and return the dependencies it collected.
    pub(crate) fn finish(mut self) -> SmallVec<[Dependency; 4]> {
        self.finished = true;
        self.pop().map(|entry| entry.dependencies).unwrap_or_default()
    }

    fn pop(&self) -> Option<ContextEntry> {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = &popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
            popped
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}

/// Run `f` without registering any reads as dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::push(None);
    f()
}
