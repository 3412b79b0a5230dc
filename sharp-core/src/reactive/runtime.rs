//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the subscriber registry and the per-thread flush queue.
//!
//! # How It Works
//!
//! 1. When a memo or effect is created, it registers with the runtime.
//!
//! 2. When a memo or effect reads a source, the source records the
//!    subscriber and the computation records the source together with the
//!    version it observed.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks its direct subscribers `Dirty`
//!    b. Memos that were clean mark their own subscribers `MaybeDirty`
//!    c. Queues eager subscribers (effects)
//!    d. Flushes the queue once the outermost batch ends
//!
//! 4. A queued effect that is only `MaybeDirty` first asks each dependency
//!    for its current version. Memos recompute lazily while answering, and
//!    keep their version when the new value equals the old one, so effects
//!    downstream of an unchanged memo are skipped.
//!
//! # Thread Safety
//!
//! The registry is global so handles can be shared across threads. Batching
//! and dependency tracking are thread-local: all reads, writes and flushes
//! of one logical UI thread happen on one OS thread.

use std::cell::{Cell, RefCell};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use tracing::{error, trace};

use super::batch::Batch;
use super::subscriber::{SourceId, SubscriberId};
use crate::config::RuntimeConfig;

/// How stale a computation is.
///
/// Ordered so that a stronger mark never gets downgraded by a weaker one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DirtyState {
    /// The cached result is up-to-date.
    Clean,

    /// A transitive dependency changed. Need to check direct dependencies.
    MaybeDirty,

    /// A direct dependency changed. Must recompute.
    Dirty,
}

/// A readable reactive value that computations can depend on.
pub trait Source: Send + Sync {
    /// Identifier of this source.
    fn source_id(&self) -> SourceId;

    /// Bring the source up to date and return its version.
    ///
    /// The version increases exactly when the observable value changes.
    fn current_version(&self) -> u64;

    /// Forget a subscriber.
    fn unsubscribe(&self, subscriber: SubscriberId);
}

/// A source read by a computation, with the version it had at read time.
#[derive(Clone)]
pub struct Dependency {
    pub(crate) source: Arc<dyn Source>,
    pub(crate) version: u64,
}

impl Dependency {
    pub(crate) fn new(source: Arc<dyn Source>, version: u64) -> Self {
        Self { source, version }
    }

    /// Whether the source moved on since it was read.
    pub(crate) fn changed(&self) -> bool {
        self.source.current_version() != self.version
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("source", &self.source.source_id())
            .field("version", &self.version)
            .finish()
    }
}

/// Drop every subscription a computation holds.
pub(crate) fn release_dependencies(subscriber: SubscriberId, dependencies: &[Dependency]) {
    if !dependencies.is_empty() {
        trace!(?subscriber, count = dependencies.len(), "clearing dependencies");
    }
    for dependency in dependencies {
        dependency.source.unsubscribe(subscriber);
    }
}

/// A trait for types that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Raise the dirty state of this reactive value.
    fn mark(&self, state: DirtyState);

    /// Re-run if stale (effects only; called during flush).
    fn update(&self);

    /// Check if this reactive value is an effect (eager) or memo (lazy).
    fn is_eager(&self) -> bool;
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    /// The registered subscriber.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The reactive runtime.
///
/// Stateless facade over the global registry and the thread-local queue.
pub struct Runtime;

// Maps subscriber IDs to weak references to avoid preventing cleanup.
static REGISTRY: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();

fn registry() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

#[derive(Default)]
struct FlushQueue {
    depth: usize,
    pending: IndexSet<SubscriberId>,
}

thread_local! {
    static QUEUE: RefCell<FlushQueue> = RefCell::new(FlushQueue::default());
    static CONFIG: Cell<RuntimeConfig> = Cell::new(RuntimeConfig::default());
}

/// Restores the batch depth even if an effect panics mid-flush.
struct DepthRestore;

impl Drop for DepthRestore {
    fn drop(&mut self) {
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.depth = queue.depth.saturating_sub(1);
        });
    }
}

impl Runtime {
    /// Register a reactive value with the runtime.
    ///
    /// Takes a weak reference so nodes can register from inside
    /// `Arc::new_cyclic` and own their handle. Returns a handle that
    /// unregisters the value when dropped.
    pub fn register(id: SubscriberId, reactive: Weak<dyn Reactive>) -> ReactiveHandle {
        registry().insert(id, reactive);
        ReactiveHandle { subscriber_id: id }
    }

    /// Unregister a reactive value.
    fn unregister(id: SubscriberId) {
        registry().remove(&id);
        // The queue may already be gone when handles drop during thread exit.
        let _ = QUEUE.try_with(|queue| {
            queue.borrow_mut().pending.shift_remove(&id);
        });
    }

    /// Whether a subscriber is still registered and alive.
    pub fn is_registered(id: SubscriberId) -> bool {
        Self::lookup(id).is_some()
    }

    fn lookup(id: SubscriberId) -> Option<Arc<dyn Reactive>> {
        let weak = registry().get(&id).map(|entry| entry.value().clone())?;
        weak.upgrade()
    }

    /// Mark subscribers stale and queue the eager ones.
    ///
    /// This is the core update propagation mechanism. Runs as its own
    /// batch, so outside any enclosing batch the queue is flushed before
    /// this returns.
    pub fn notify<I>(subscribers: I, state: DirtyState)
    where
        I: IntoIterator<Item = SubscriberId>,
    {
        let _batch = Batch::enter();

        for id in subscribers {
            let Some(reactive) = Self::lookup(id) else {
                continue;
            };
            reactive.mark(state);
            if reactive.is_eager() {
                Self::enqueue(id);
            }
        }
    }

    fn enqueue(id: SubscriberId) {
        QUEUE.with(|queue| {
            queue.borrow_mut().pending.insert(id);
        });
    }

    pub(crate) fn begin_batch() {
        QUEUE.with(|queue| queue.borrow_mut().depth += 1);
    }

    pub(crate) fn end_batch() {
        let _restore = DepthRestore;
        let outermost = QUEUE.with(|queue| queue.borrow().depth == 1);
        if outermost {
            Self::flush();
        }
    }

    /// Run queued effects in passes until the queue drains.
    ///
    /// The batch depth stays at one while flushing, so writes made by
    /// effects queue a further pass instead of flushing recursively.
    fn flush() {
        let max_passes = Self::config().max_flush_passes;
        let mut passes = 0usize;

        loop {
            let pass: Vec<SubscriberId> =
                QUEUE.with(|queue| queue.borrow_mut().pending.drain(..).collect());
            if pass.is_empty() {
                break;
            }

            passes += 1;
            if passes > max_passes {
                error!(
                    max_passes,
                    dropped = pass.len(),
                    "effects kept re-triggering each other; dropping the rest of the flush"
                );
                break;
            }

            for id in pass {
                if let Some(reactive) = Self::lookup(id) {
                    reactive.update();
                }
            }
        }
    }

    /// Whether a batch is open on this thread.
    pub fn is_batching() -> bool {
        QUEUE.with(|queue| queue.borrow().depth > 0)
    }

    /// Number of effects waiting for the current batch to end.
    pub fn pending_count() -> usize {
        QUEUE.with(|queue| queue.borrow().pending.len())
    }

    /// Install a configuration for this thread.
    pub fn configure(config: RuntimeConfig) {
        CONFIG.with(|cell| cell.set(config));
    }

    /// The configuration in effect on this thread.
    pub fn config() -> RuntimeConfig {
        CONFIG.with(|cell| cell.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockReactive {
        id: SubscriberId,
        state: Mutex<DirtyState>,
        updates: AtomicUsize,
        eager: bool,
    }

    impl MockReactive {
        fn new(eager: bool) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                state: Mutex::new(DirtyState::Clean),
                updates: AtomicUsize::new(0),
                eager,
            })
        }
    }

    fn register(mock: &Arc<MockReactive>) -> ReactiveHandle {
        let reactive: Arc<dyn Reactive> = mock.clone();
        Runtime::register(mock.id, Arc::downgrade(&reactive))
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn mark(&self, state: DirtyState) {
            let mut current = self.state.lock();
            *current = (*current).max(state);
        }

        fn update(&self) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            *self.state.lock() = DirtyState::Clean;
        }

        fn is_eager(&self) -> bool {
            self.eager
        }
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let reactive = MockReactive::new(false);
        let id = reactive.id;

        let handle = register(&reactive);
        assert!(Runtime::is_registered(id));

        drop(handle);
        assert!(!Runtime::is_registered(id));
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let memo = MockReactive::new(false);
        let effect = MockReactive::new(true);

        let _memo_handle = register(&memo);
        let _effect_handle = register(&effect);

        Runtime::notify([memo.id, effect.id], DirtyState::Dirty);

        // Memo stays marked; effect was flushed and cleaned
        assert_eq!(*memo.state.lock(), DirtyState::Dirty);
        assert_eq!(*effect.state.lock(), DirtyState::Clean);

        // Only the eager reactive is updated
        assert_eq!(memo.updates.load(Ordering::SeqCst), 0);
        assert_eq!(effect.updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn marks_never_downgrade() {
        let memo = MockReactive::new(false);
        let _handle = register(&memo);

        Runtime::notify([memo.id], DirtyState::Dirty);
        Runtime::notify([memo.id], DirtyState::MaybeDirty);
        assert_eq!(*memo.state.lock(), DirtyState::Dirty);
    }

    #[test]
    fn notify_skips_dropped_subscribers() {
        let effect = MockReactive::new(true);
        let id = effect.id;
        let handle = register(&effect);
        drop(handle);

        Runtime::notify([id], DirtyState::Dirty);
        assert_eq!(effect.updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn batched_notifications_are_deduplicated() {
        let effect = MockReactive::new(true);
        let _handle = register(&effect);

        {
            let _batch = Batch::enter();
            Runtime::notify([effect.id], DirtyState::Dirty);
            Runtime::notify([effect.id], DirtyState::Dirty);
            assert_eq!(Runtime::pending_count(), 1);
            assert_eq!(effect.updates.load(Ordering::SeqCst), 0);
        }

        assert_eq!(effect.updates.load(Ordering::SeqCst), 1);
        assert!(!Runtime::is_batching());
    }

    #[test]
    fn configure_is_per_thread() {
        Runtime::configure(RuntimeConfig::default().with_max_flush_passes(3));
        assert_eq!(Runtime::config().max_flush_passes, 3);

        let other = std::thread::spawn(|| Runtime::config().max_flush_passes)
            .join()
            .unwrap();
        assert_eq!(other, crate::config::DEFAULT_MAX_FLUSH_PASSES);
    }
}
