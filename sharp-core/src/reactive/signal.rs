//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a cell holding one value
//! that tracks which computations read it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber and the context records
//!    the signal's current version.
//!
//! 2. When a signal is written with a value different from the current one,
//!    its version increases and all subscribers are notified. Writing an
//!    equal value is a no-op.
//!
//! 3. Notifications mark memos stale and queue effects, which run before
//!    the write returns unless a batch is open.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value (size depends on type, stored behind Arc)
//! - A version counter
//! - A set of subscriber IDs (grows with number of dependents)

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::context::ReactiveContext;
use super::runtime::{Dependency, DirtyState, Runtime, Source};
use super::subscriber::{SourceId, SubscriberId};

struct SignalInner<T> {
    /// Unique identifier for this signal.
    id: SourceId,

    /// The current value.
    value: RwLock<T>,

    /// Bumped on every write that changes the value.
    version: AtomicU64,

    /// Computations that read this signal during their last run.
    subscribers: Mutex<IndexSet<SubscriberId>>,
}

impl<T> Source for SignalInner<T>
where
    T: Send + Sync,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.lock().shift_remove(&subscriber);
    }
}

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. `PartialEq` decides
///   whether a write is a change.
///
/// # Example
///
/// ```
/// use sharp_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// assert_eq!(count.version(), 1);
///
/// // Equal writes do not bump the version
/// count.set(5);
/// assert_eq!(count.version(), 1);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SourceId::new(),
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                subscribers: Mutex::new(IndexSet::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.read().clone()
    }

    /// Borrow the current value, tracking the read.
    ///
    /// `f` must not write to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.read())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    fn track(&self) {
        if let Some(subscriber_id) = ReactiveContext::current_subscriber() {
            self.inner.subscribers.lock().insert(subscriber_id);
            let source: Arc<dyn Source> = self.inner.clone();
            ReactiveContext::track(Dependency::new(source, self.version()));
        }
    }

    /// Set a new value and notify subscribers.
    ///
    /// Does nothing if the new value equals the current one.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                trace!(signal = ?self.inner.id, "skipping write of an equal value");
                return;
            }
            *guard = value;
        }

        self.trigger();
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Bump the version and notify subscribers without a value change.
    ///
    /// Used by containers when the slot behind this signal is removed.
    pub(crate) fn trigger(&self) {
        self.inner.version.fetch_add(1, Ordering::AcqRel);
        let subscribers: Vec<SubscriberId> =
            self.inner.subscribers.lock().iter().copied().collect();
        Runtime::notify(subscribers, DirtyState::Dirty);
    }

    /// Number of changing writes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Whether two handles point at the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("version", &self.version())
            .field("subscriber_count", &self.subscriber_count())
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
    use std::sync::atomic::AtomicUsize;

    fn watch(signal: &Signal<i32>) -> (Effect, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let signal = signal.clone();
        let effect = Effect::new(move || {
            signal.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        (effect, runs)
    }

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_subscribers() {
        let signal = Signal::new(0);
        let (_effect, runs) = watch(&signal);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        signal.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let signal = Signal::new(7);
        let (_effect, runs) = watch(&signal);

        signal.set(7);
        signal.update(|v| *v);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(signal.version(), 0);
    }

    #[test]
    fn dropped_subscriber_unsubscribes() {
        let signal = Signal::new(0);
        let (effect, runs) = watch(&signal);
        assert_eq!(signal.subscriber_count(), 1);

        drop(effect);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn trigger_notifies_without_change() {
        let signal = Signal::new(0);
        let (_effect, runs) = watch(&signal);

        signal.trigger();
        assert_eq!(signal.version(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
        assert!(signal1.ptr_eq(&signal2));
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn with_borrows_without_clone() {
        let signal = Signal::new(vec![1, 2, 3]);
        assert_eq!(signal.with(|v| v.len()), 3);
    }
}
