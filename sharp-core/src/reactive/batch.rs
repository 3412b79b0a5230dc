//! Batch Scope
//!
//! A batch defers effect execution until it ends. Writes inside the batch
//! still mark dependents immediately (so memos read inside the batch are
//! fresh), but every queued effect runs at most once, after the last write.
//!
//! Batches nest: inner batches join the outermost one and only the
//! outermost batch flushes.

use std::marker::PhantomData;

use super::runtime::Runtime;

/// Scope guard for a batch. Flushes on drop, including during unwinding.
///
/// Not `Send`: the queue it flushes belongs to the current thread.
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct Batch {
    _thread_bound: PhantomData<*const ()>,
}

impl Batch {
    /// Open a batch on the current thread.
    pub fn enter() -> Self {
        Runtime::begin_batch();
        Self {
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        Runtime::end_batch();
    }
}

/// Run `f` inside a batch and return its result.
///
/// # Example
///
/// ```
/// use sharp_core::reactive::{batch, Effect, Signal};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let a = Signal::new(1);
/// let b = Signal::new(2);
/// let runs = Arc::new(AtomicUsize::new(0));
///
/// let (a2, b2, runs2) = (a.clone(), b.clone(), runs.clone());
/// let _effect = Effect::new(move || {
///     a2.get();
///     b2.get();
///     runs2.fetch_add(1, Ordering::SeqCst);
/// });
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(runs.load(Ordering::SeqCst), 2); // initial run + one flush
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _batch = Batch::enter();
    f()
}
