//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. It is the stand-in for a subscribed component
//! render: it re-runs if and only if something it read during its last
//! run has changed.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued on the runtime and
//!    runs when the current batch ends (immediately for a plain write).
//!
//! 3. If the effect was only reached through memos, it first checks whether
//!    those memos actually produced new values and skips the run otherwise.
//!
//! 4. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use super::context::ReactiveContext;
use super::runtime::{
    release_dependencies, Dependency, DirtyState, Reactive, ReactiveHandle, Runtime,
};
use super::subscriber::SubscriberId;

struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    subscriber_id: SubscriberId,

    /// The effect function.
    run: Box<dyn Fn() + Send + Sync>,

    /// Sources read during the last run.
    dependencies: Mutex<SmallVec<[Dependency; 4]>>,

    /// Staleness since the last run.
    state: Mutex<DirtyState>,

    /// Whether the effect has been disposed.
    disposed: AtomicBool,

    /// Number of times the effect has run.
    run_count: AtomicUsize,

    _handle: ReactiveHandle,
}

impl EffectInner {
    /// Execute the effect function.
    ///
    /// This runs the function within a reactive context to track dependencies.
    fn execute(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        // Clear old dependencies
        let previous = std::mem::take(&mut *self.dependencies.lock());
        release_dependencies(self.subscriber_id, &previous);
        *self.state.lock() = DirtyState::Clean;

        let ctx = ReactiveContext::enter(self.subscriber_id);
        (self.run)();
        *self.dependencies.lock() = ctx.finish();

        let runs = self.run_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(effect = ?self.subscriber_id, runs, "effect ran");
    }

    fn is_stale(&self) -> bool {
        let state = *self.state.lock();
        match state {
            DirtyState::Clean => false,
            DirtyState::Dirty => true,
            DirtyState::MaybeDirty => {
                let dependencies = self.dependencies.lock().clone();
                dependencies.iter().any(Dependency::changed)
            }
        }
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            let previous = std::mem::take(&mut *self.dependencies.lock());
            release_dependencies(self.subscriber_id, &previous);
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark(&self, state: DirtyState) {
        let mut current = self.state.lock();
        *current = (*current).max(state);
    }

    fn update(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if self.is_stale() {
            self.execute();
        } else {
            *self.state.lock() = DirtyState::Clean;
        }
    }

    fn is_eager(&self) -> bool {
        !self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        release_dependencies(self.subscriber_id, &self.dependencies.lock());
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// Dropping the last handle disposes the effect.
///
/// # Example
///
/// ```
/// use sharp_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let count_clone = count.clone();
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", count_clone.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// The effect has no dependencies until its first [`Effect::execute`].
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();
        let inner = Arc::new_cyclic(|weak: &Weak<EffectInner>| {
            let reactive: Weak<dyn Reactive> = weak.clone();
            EffectInner {
                subscriber_id,
                run: Box::new(run),
                dependencies: Mutex::new(SmallVec::new()),
                state: Mutex::new(DirtyState::Clean),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
                _handle: Runtime::register(subscriber_id, reactive),
            }
        });
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect now, regardless of whether it is stale.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again and holds no
    /// subscriptions.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
