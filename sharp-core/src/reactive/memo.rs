//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a direct dependency changes, the memo is marked `Dirty`; when a
//!    dependency further upstream changes, it is marked `MaybeDirty`. Either
//!    way the memo notifies its own subscribers, but does not recompute.
//!
//! 4. On next access, a `MaybeDirty` memo checks whether any input actually
//!    moved; a `Dirty` one recomputes straight away.
//!
//! 5. A recomputation that yields a value equal to the cached one keeps the
//!    memo's version, so subscribers that only depend on this memo are not
//!    re-run.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)
//!
//! The dependency set is rebuilt on every recomputation, so computations
//! that branch on their inputs stay correct.
//!
//! # Threads
//!
//! Only one thread computes a memo at a time. A reader on another thread
//! waits for that computation and then sees its result. Re-entering the
//! computation from the thread running it is a cycle.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::context::ReactiveContext;
use super::runtime::{
    release_dependencies, Dependency, DirtyState, Reactive, ReactiveHandle, Runtime, Source,
};
use super::subscriber::{SourceId, SubscriberId};
use crate::error::{Error, Result};

/// Dirty state for a memo.
pub type MemoState = DirtyState;

struct MemoInner<T> {
    /// Unique identifier for this memo as a source.
    id: SourceId,

    /// The subscriber ID used for dependency tracking.
    subscriber_id: SubscriberId,

    /// The computation function.
    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    /// Current dirty state.
    state: Mutex<DirtyState>,

    /// Bumped whenever a recomputation produces a different value.
    version: AtomicU64,

    /// Thread running `compute`; a read from that thread is a cycle.
    computing: Mutex<Option<ThreadId>>,

    /// Held across refresh so other threads wait instead of recomputing.
    refresh_lock: Mutex<()>,

    /// Sources read during the last computation.
    dependencies: Mutex<SmallVec<[Dependency; 4]>>,

    /// Subscriber IDs that depend on this memo.
    dependents: Mutex<IndexSet<SubscriberId>>,

    /// Number of times `compute` has run.
    compute_count: AtomicUsize,

    _handle: ReactiveHandle,
}

/// Clears the computing thread even if the computation panics.
struct ComputingGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> ComputingGuard<'a> {
    fn enter(computing: &'a Mutex<Option<ThreadId>>) -> Self {
        *computing.lock() = Some(thread::current().id());
        Self(computing)
    }
}

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl<T> MemoInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn has_value(&self) -> bool {
        self.value.read().is_some()
    }

    /// Bring the cached value up to date.
    fn refresh(&self) -> Result<()> {
        if *self.computing.lock() == Some(thread::current().id()) {
            return Err(Error::Cycle(self.id));
        }
        // A computation clears the state only after claiming `computing`
        if *self.state.lock() == DirtyState::Clean
            && self.has_value()
            && self.computing.lock().is_none()
        {
            return Ok(());
        }

        // Blocks while another thread computes; state is re-read afterwards
        let _exclusive = self.refresh_lock.lock();
        let state = *self.state.lock();
        match state {
            DirtyState::Clean if self.has_value() => return Ok(()),
            DirtyState::MaybeDirty if self.has_value() => {
                let dependencies = self.dependencies.lock().clone();
                if !dependencies.iter().any(Dependency::changed) {
                    *self.state.lock() = DirtyState::Clean;
                    return Ok(());
                }
            }
            _ => {}
        }

        self.recompute()
    }

    /// Recompute the memo's value.
    ///
    /// This runs the computation function within a reactive context to
    /// track dependencies. Callers hold `refresh_lock`.
    fn recompute(&self) -> Result<()> {
        let _guard = ComputingGuard::enter(&self.computing);

        let previous = std::mem::take(&mut *self.dependencies.lock());
        release_dependencies(self.subscriber_id, &previous);

        // Marks arriving while computing must survive, so clear first
        *self.state.lock() = DirtyState::Clean;

        let ctx = ReactiveContext::enter(self.subscriber_id);
        let new_value = (self.compute)();
        *self.dependencies.lock() = ctx.finish();
        self.compute_count.fetch_add(1, Ordering::Relaxed);

        let changed = {
            let mut current = self.value.write();
            let changed = current.as_ref() != Some(&new_value);
            if changed {
                *current = Some(new_value);
            }
            changed
        };
        if changed {
            self.version.fetch_add(1, Ordering::AcqRel);
        }

        debug!(memo = ?self.id, changed, "recomputed memo");
        Ok(())
    }
}

impl<T> Source for MemoInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn current_version(&self) -> u64 {
        if let Err(err) = self.refresh() {
            warn!(memo = ?self.id, %err, "memo could not refresh while checking dependents");
        }
        self.version.load(Ordering::Acquire)
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.dependents.lock().shift_remove(&subscriber);
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark(&self, state: DirtyState) {
        let was_clean = {
            let mut current = self.state.lock();
            let was_clean = *current == DirtyState::Clean;
            *current = (*current).max(state);
            was_clean
        };

        // Already-stale memos have already told their dependents
        if was_clean {
            let dependents: Vec<SubscriberId> = self.dependents.lock().iter().copied().collect();
            Runtime::notify(dependents, DirtyState::MaybeDirty);
        }
    }

    fn update(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        release_dependencies(self.subscriber_id, &self.dependencies.lock());
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some memos might return the same value even if inputs changed).
///
/// # Example
///
/// ```
/// use sharp_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let count_clone = count.clone();
/// let doubled = Memo::new(move || count_clone.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// assert_eq!(doubled.compute_count(), 2);
/// ```
pub struct Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();
        let inner = Arc::new_cyclic(|weak: &Weak<MemoInner<T>>| {
            let reactive: Weak<dyn Reactive> = weak.clone();
            MemoInner {
                id: SourceId::new(),
                subscriber_id,
                compute: Box::new(compute),
                value: RwLock::new(None),
                state: Mutex::new(DirtyState::Dirty),
                version: AtomicU64::new(0),
                computing: Mutex::new(None),
                refresh_lock: Mutex::new(()),
                dependencies: Mutex::new(SmallVec::new()),
                dependents: Mutex::new(IndexSet::new()),
                compute_count: AtomicUsize::new(0),
                _handle: Runtime::register(subscriber_id, reactive),
            }
        });
        Self { inner }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a memo's value.
    ///
    /// # Panics
    ///
    /// Panics if the memo is read from inside its own computation. Use
    /// [`Memo::try_get`] to handle that case.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// Get the current value, or [`Error::Cycle`] if the memo is being
    /// computed on this thread right now.
    pub fn try_get(&self) -> Result<T> {
        self.inner.refresh()?;

        if let Some(subscriber_id) = ReactiveContext::current_subscriber() {
            self.inner.dependents.lock().insert(subscriber_id);
            let source: Arc<dyn Source> = self.inner.clone();
            ReactiveContext::track(Dependency::new(source, self.version()));
        }

        Ok(self.cached())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Result<T> {
        self.inner.refresh()?;
        Ok(self.cached())
    }

    fn cached(&self) -> T {
        self.inner
            .value
            .read()
            .clone()
            .expect("refreshed memo should have a value")
    }

    /// Mark the memo as potentially needing recomputation.
    pub fn mark_maybe_dirty(&self) {
        self.inner.mark(DirtyState::MaybeDirty);
    }

    /// Mark the memo as definitely needing recomputation.
    pub fn mark_dirty(&self) {
        self.inner.mark(DirtyState::Dirty);
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// Number of value changes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Number of times the computation has run.
    pub fn compute_count(&self) -> usize {
        self.inner.compute_count.load(Ordering::Relaxed)
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.lock().len()
    }

    /// Number of sources read during the last computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.has_value()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};
    use std::sync::OnceLock;

    #[test]
    fn memo_computes_on_first_access() {
        let memo = Memo::new(|| 42);

        // Not computed yet
        assert!(!memo.has_value());
        assert_eq!(memo.compute_count(), 0);

        // First access triggers computation
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.compute_count(), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let memo = Memo::new(|| 42);

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.compute_count(), 1);
    }

    #[test]
    fn memo_recomputes_when_dependency_changes() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get() + 1);

        assert_eq!(memo.get(), 2);
        signal.set(5);
        assert_eq!(memo.state(), MemoState::Dirty);
        assert_eq!(memo.get(), 6);
        assert_eq!(memo.compute_count(), 2);
    }

    #[test]
    fn memo_is_lazy() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get());
        memo.get();

        signal.set(2);
        signal.set(3);
        signal.set(4);
        assert_eq!(memo.compute_count(), 1);

        assert_eq!(memo.get(), 4);
        assert_eq!(memo.compute_count(), 2);
    }

    #[test]
    fn maybe_dirty_without_changes_skips_recompute() {
        let signal = Signal::new(3);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get());
        assert_eq!(memo.get(), 3);

        memo.mark_maybe_dirty();
        assert_eq!(memo.state(), MemoState::MaybeDirty);

        assert_eq!(memo.get(), 3);
        assert_eq!(memo.compute_count(), 1);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn equal_result_keeps_version() {
        let signal = Signal::new(2);
        let signal_clone = signal.clone();
        let parity = Memo::new(move || signal_clone.get() % 2);
        parity.get();
        let version = parity.version();

        signal.set(4);
        assert_eq!(parity.get(), 0);
        assert_eq!(parity.compute_count(), 2);
        assert_eq!(parity.version(), version);
    }

    #[test]
    fn equal_result_does_not_rerun_subscribers() {
        let signal = Signal::new(2);
        let signal_clone = signal.clone();
        let parity = Memo::new(move || signal_clone.get() % 2);

        let runs = Arc::new(AtomicUsize::new(0));
        let (parity_clone, runs_clone) = (parity.clone(), runs.clone());
        let _effect = Effect::new(move || {
            parity_clone.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(4);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        signal.set(5);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dependencies_follow_branches() {
        let use_a = Signal::new(true);
        let a = Signal::new(1);
        let b = Signal::new(10);

        let (use_a2, a2, b2) = (use_a.clone(), a.clone(), b.clone());
        let memo = Memo::new(move || if use_a2.get() { a2.get() } else { b2.get() });

        assert_eq!(memo.get(), 1);
        assert_eq!(memo.dependency_count(), 2);
        assert_eq!(b.subscriber_count(), 0);

        use_a.set(false);
        assert_eq!(memo.get(), 10);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        // No longer a dependency
        a.set(2);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn memo_depends_on_memo() {
        let base = Signal::new(5);
        let base_clone = base.clone();
        let doubled = Memo::new(move || base_clone.get() * 2);
        let doubled_clone = doubled.clone();
        let plus_ten = Memo::new(move || doubled_clone.get() + 10);

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(plus_ten.state(), MemoState::MaybeDirty);
        assert_eq!(plus_ten.get(), 30);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn self_read_is_a_cycle() {
        let slot: Arc<OnceLock<Memo<i32>>> = Arc::new(OnceLock::new());
        let slot_clone = slot.clone();
        let memo = Memo::new(move || match slot_clone.get() {
            Some(memo) => match memo.try_get() {
                Err(Error::Cycle(_)) => -1,
                _ => 0,
            },
            None => 0,
        });
        let _ = slot.set(memo.clone());

        assert_eq!(memo.get(), -1);
    }

    #[test]
    fn reader_on_another_thread_waits_for_computation() {
        use std::sync::mpsc;
        use std::time::Duration;

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (entered_tx, release_rx) = (Mutex::new(entered_tx), Mutex::new(release_rx));
        let memo = Memo::new(move || {
            let _ = entered_tx.lock().send(());
            let _ = release_rx.lock().recv();
            42
        });

        let first = {
            let memo = memo.clone();
            std::thread::spawn(move || memo.try_get())
        };
        entered_rx.recv().unwrap();

        let second = {
            let memo = memo.clone();
            std::thread::spawn(move || memo.try_get())
        };
        std::thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert_eq!(first.join().unwrap().unwrap(), 42);
        assert_eq!(second.join().unwrap().unwrap(), 42);
        assert_eq!(memo.compute_count(), 1);
    }

    #[test]
    fn memo_clone_shares_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();

        // Clone should have same ID and share state
        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert_eq!(memo2.get(), 42);

        // Marking one dirty affects both
        memo1.mark_dirty();
        assert_eq!(memo2.state(), MemoState::Dirty);
    }

    #[test]
    fn memo_state_transitions() {
        let memo = Memo::new(|| 42);

        // Starts dirty
        assert_eq!(memo.state(), MemoState::Dirty);

        // After get, becomes clean
        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);

        // Mark maybe dirty
        memo.mark_maybe_dirty();
        assert_eq!(memo.state(), MemoState::MaybeDirty);

        // Mark dirty overrides maybe dirty
        memo.mark_dirty();
        assert_eq!(memo.state(), MemoState::Dirty);

        // After get, becomes clean again
        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);
    }
}
