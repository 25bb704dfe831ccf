// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The feature bridge engine.
//
// Shared logic calls `dispatch::<dyn Feature>(..)` without knowing whether a
// platform implementation exists. If one is registered and alive the callback
// runs on the main thread right away; otherwise it is parked in that
// feature's queue and replayed, in order, the moment an implementation
// registers.
//
// Lock discipline: registry and queues are only touched inside
// `FeatureLock::with_lock`, through borrows that end within the body.
// Callbacks never run under the lock, and actions removed from a queue are
// dropped only after the lock is released.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error};

use featurebridge_core::{BridgeError, EngineConfig, FeatureKey, InstanceId, Priority};
use featurebridge_platform::{FeatureLock, MainThreadExecutor};

use crate::metrics::{Counter, FeatureCounters, FeatureMetrics, Metrics};
use crate::queue::{FeatureAction, PendingQueue, QueuedAction};
use crate::registry::Registry;

/// Mutable engine state, guarded by the engine lock.
///
/// The lock is reentrant and only hands out `&EngineState`, so every field
/// carries its own interior mutability.
pub(crate) struct EngineState {
    pub(crate) registry: RefCell<Registry>,
    pub(crate) queues: RefCell<HashMap<FeatureKey, PendingQueue>>,
    pub(crate) config: Cell<EngineConfig>,
    next_seq: Cell<u64>,
}

impl EngineState {
    fn new(config: EngineConfig) -> Self {
        Self {
            registry: RefCell::new(Registry::default()),
            queues: RefCell::new(HashMap::new()),
            config: Cell::new(config),
            next_seq: Cell::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        seq
    }
}

/// Result of sweeping every queue of an engine.
#[derive(Debug, Default)]
pub(crate) struct QueueSweep {
    /// Features that lost actions to expiry, with how many.
    pub(crate) expired: Vec<(FeatureKey, usize)>,
    /// Non-empty queues after the sweep.
    pub(crate) queues: Vec<QueueSummary>,
}

#[derive(Debug)]
pub(crate) struct QueueSummary {
    pub(crate) key: FeatureKey,
    pub(crate) pending: usize,
    pub(crate) oldest: Option<Duration>,
}

/// What `dispatch` decided while holding the lock.
enum Route<T: ?Sized> {
    Now(Arc<T>, FeatureAction<T>),
    Parked {
        dropped: Vec<QueuedAction>,
        expired: usize,
        evicted: usize,
        pending: usize,
        debug: bool,
    },
}

/// One independent registry/queue/lock/config set.
///
/// Build named instances with [`FeatureBridge::create`] or
/// [`FeatureBridge::builder`]; the process-wide default lives in
/// [`crate::global`].
pub struct FeatureBridge {
    pub(crate) scope: String,
    pub(crate) id: InstanceId,
    pub(crate) state: FeatureLock<EngineState>,
    pub(crate) metrics: Metrics,
    executor: RwLock<Arc<dyn MainThreadExecutor>>,
}

impl FeatureBridge {
    /// Assemble an engine from already-validated parts.
    pub(crate) fn from_parts(
        scope: String,
        config: EngineConfig,
        executor: Arc<dyn MainThreadExecutor>,
    ) -> Self {
        Self {
            scope,
            id: InstanceId::new(),
            state: FeatureLock::new(EngineState::new(config)),
            metrics: Metrics::default(),
            executor: RwLock::new(executor),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn instance_id(&self) -> InstanceId {
        self.id
    }

    pub fn config(&self) -> EngineConfig {
        self.state.with_lock(|state| state.config.get())
    }

    pub(crate) fn update_config(&self, update: impl FnOnce(&mut EngineConfig)) {
        self.state.with_lock(|state| {
            let mut config = state.config.get();
            update(&mut config);
            state.config.set(config);
        });
    }

    pub(crate) fn set_executor(&self, executor: Arc<dyn MainThreadExecutor>) {
        *self.executor.write() = executor;
    }

    pub fn executor_name(&self) -> String {
        self.executor.read().platform_name().to_string()
    }

    // -- Registration --------------------------------------------------------

    /// Make `implementation` the live implementation of `T` and replay every
    /// non-expired action queued for `T` against it.
    ///
    /// Only a weak handle is stored; the caller keeps `implementation` alive.
    /// Replay goes through the main-thread executor after the lock is
    /// released, so with an inline executor every replayed callback has run
    /// by the time this returns.
    pub fn register<T: ?Sized + Send + Sync + 'static>(&self, implementation: &Arc<T>) {
        let key = FeatureKey::of::<T>();
        let (replay, expired, replaced, debug) = self.state.with_lock(|state| {
            let config = state.config.get();
            let replaced = state.registry.borrow_mut().insert(implementation);
            let mut queue = state.queues.borrow_mut().remove(&key).unwrap_or_default();
            let expired = queue.sweep_expired(config.action_expiry);
            (queue.drain(), expired, replaced, config.debug_mode)
        });

        let counters = self.metrics.counters(key);
        counters.add(Counter::Expired, expired.len());
        if debug {
            debug!(
                scope = %self.scope,
                feature = %key,
                replaced,
                expired = expired.len(),
                replaying = replay.len(),
                "feature registered"
            );
        }
        drop(expired);

        for queued in replay {
            match queued.into_action::<T>() {
                Some(action) => {
                    counters.add(Counter::Replayed, 1);
                    self.execute(key, Arc::clone(implementation), action, Arc::clone(&counters));
                }
                None => error!(scope = %self.scope, feature = %key, "queued action has a foreign type; dropped"),
            }
        }
    }

    /// Clear and forget the handle for `T`. A no-op when nothing is registered.
    pub fn unregister<T: ?Sized + 'static>(&self) {
        let key = FeatureKey::of::<T>();
        let (removed, debug) = self
            .state
            .with_lock(|state| (state.registry.borrow_mut().remove(&key), state.config.get().debug_mode));
        if debug && removed {
            debug!(scope = %self.scope, feature = %key, "feature unregistered");
        }
    }

    /// Whether `T` has a registered implementation that is still alive.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        let key = FeatureKey::of::<T>();
        self.state.with_lock(|state| state.registry.borrow().is_alive(&key))
    }

    // -- Dispatch ------------------------------------------------------------

    /// Run `action` against the current implementation of `T`, or queue it
    /// until one registers.
    ///
    /// Never fails and never propagates a panic from `action`. Anything the
    /// closure captures may be held until replay, expiry or
    /// [`clear_queue`](Self::clear_queue).
    pub fn dispatch<T: ?Sized + Send + Sync + 'static>(&self, action: impl FnOnce(&T) + Send + 'static) {
        self.route::<T>(Box::new(action), None);
    }

    /// Like [`dispatch`](Self::dispatch), but a queued action is ordered by
    /// `priority` and overflow evicts the lowest-priority entry.
    pub fn dispatch_with_priority<T: ?Sized + Send + Sync + 'static>(
        &self,
        priority: Priority,
        action: impl FnOnce(&T) + Send + 'static,
    ) {
        self.route::<T>(Box::new(action), Some(priority));
    }

    fn route<T: ?Sized + Send + Sync + 'static>(&self, action: FeatureAction<T>, priority: Option<Priority>) {
        let key = FeatureKey::of::<T>();
        let route = self.state.with_lock(|state| {
            if let Some(target) = state.registry.borrow().resolve::<T>() {
                return Route::Now(target, action);
            }

            let config = state.config.get();
            let seq = state.next_seq();

            let mut queues = state.queues.borrow_mut();
            let queue = queues.entry(key).or_default();
            let mut dropped = queue.sweep_expired(config.action_expiry);
            let expired = dropped.len();

            let queued = QueuedAction::new(action, priority.unwrap_or_default(), seq);
            let evicted = match priority {
                None => queue.push_back(queued, config.max_queue_size),
                Some(_) => queue.push_prioritized(queued, config.max_queue_size),
            };
            let evicted_count = evicted.len();
            dropped.extend(evicted);

            Route::Parked {
                dropped,
                expired,
                evicted: evicted_count,
                pending: queue.len(),
                debug: config.debug_mode,
            }
        });

        let counters = self.metrics.counters(key);
        match route {
            Route::Now(target, action) => {
                counters.add(Counter::Dispatched, 1);
                self.execute(key, target, action, counters);
            }
            Route::Parked {
                dropped,
                expired,
                evicted,
                pending,
                debug,
            } => {
                counters.add(Counter::Queued, 1);
                counters.add(Counter::Expired, expired);
                counters.add(Counter::Evicted, evicted);
                if debug {
                    debug!(
                        scope = %self.scope,
                        feature = %key,
                        priority = %priority.unwrap_or_default(),
                        pending,
                        expired,
                        evicted,
                        "no live implementation; action queued"
                    );
                }
                drop(dropped);
            }
        }
    }

    /// Post `action` to the main thread, containing any panic it raises.
    fn execute<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: FeatureKey,
        target: Arc<T>,
        action: FeatureAction<T>,
        counters: Arc<FeatureCounters>,
    ) {
        debug_assert!(!self.state.is_held_by_current_thread(), "callbacks run outside the engine lock");
        let scope = self.scope.clone();
        let executor = Arc::clone(&*self.executor.read());
        executor.run_on_main(Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(&*target)));
            if let Err(payload) = outcome {
                counters.add(Counter::Failed, 1);
                let failure = BridgeError::CallbackPanicked {
                    feature: key.name().to_string(),
                    message: panic_message(&*payload),
                };
                error!(scope = %scope, feature = %key, "{failure}");
            }
        }));
    }

    // -- Queue maintenance ---------------------------------------------------

    /// Discard every action queued for `T`, releasing whatever they captured.
    ///
    /// Returns how many were discarded.
    pub fn clear_queue<T: ?Sized + 'static>(&self) -> usize {
        let key = FeatureKey::of::<T>();
        let (discarded, debug) = self.state.with_lock(|state| {
            let discarded = state
                .queues
                .borrow_mut()
                .remove(&key)
                .map(|mut q| q.drain())
                .unwrap_or_default();
            (discarded, state.config.get().debug_mode)
        });
        let count = discarded.len();
        drop(discarded);

        self.metrics.counters(key).add(Counter::Cleared, count);
        if debug && count > 0 {
            debug!(scope = %self.scope, feature = %key, discarded = count, "queue cleared");
        }
        count
    }

    /// Number of live queued actions for `T`. Expired entries are swept first.
    pub fn pending_count<T: ?Sized + 'static>(&self) -> usize {
        let key = FeatureKey::of::<T>();
        let (expired, pending) = self.state.with_lock(|state| {
            let ttl = state.config.get().action_expiry;
            match state.queues.borrow_mut().get_mut(&key) {
                Some(queue) => (queue.sweep_expired(ttl), queue.len()),
                None => (Vec::new(), 0),
            }
        });
        self.metrics.counters(key).add(Counter::Expired, expired.len());
        pending
    }

    /// Live queued actions across every feature, after an expiry sweep.
    pub fn pending_count_all(&self) -> usize {
        self.sweep_all().queues.iter().map(|queue| queue.pending).sum()
    }

    /// Sweep every queue and summarize what is left.
    pub(crate) fn sweep_all(&self) -> QueueSweep {
        let (sweep, garbage) = self.state.with_lock(sweep_queues);
        drop(garbage);
        self.record_expired(&sweep);
        sweep
    }

    pub(crate) fn record_expired(&self, sweep: &QueueSweep) {
        for (key, count) in &sweep.expired {
            self.metrics.counters(*key).add(Counter::Expired, *count);
        }
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Drop every registration, queued action and counter of this instance.
    ///
    /// Configuration is kept and the instance stays usable.
    pub fn reset(&self) {
        let (garbage, debug) = self.state.with_lock(|state| {
            state.registry.borrow_mut().clear();
            let garbage: Vec<QueuedAction> = state
                .queues
                .borrow_mut()
                .drain()
                .flat_map(|(_, mut q)| q.drain())
                .collect();
            (garbage, state.config.get().debug_mode)
        });
        let discarded = garbage.len();
        drop(garbage);
        self.metrics.reset();

        if debug {
            debug!(scope = %self.scope, discarded, "bridge reset");
        }
    }

    // -- Metrics -------------------------------------------------------------

    pub fn metrics_for<T: ?Sized + 'static>(&self) -> FeatureMetrics {
        self.metrics.snapshot_for(&FeatureKey::of::<T>())
    }

    /// Counters for every feature seen since creation or the last reset.
    pub fn metrics(&self) -> BTreeMap<String, FeatureMetrics> {
        self.metrics.snapshot_all()
    }
}

/// Drop expired actions from every queue while the lock is held.
///
/// The removed actions are handed back so the caller can drop them after
/// releasing the lock.
pub(crate) fn sweep_queues(state: &EngineState) -> (QueueSweep, Vec<QueuedAction>) {
    let ttl = state.config.get().action_expiry;
    let mut sweep = QueueSweep::default();
    let mut garbage = Vec::new();
    for (key, queue) in state.queues.borrow_mut().iter_mut() {
        let expired = queue.sweep_expired(ttl);
        if !expired.is_empty() {
            sweep.expired.push((*key, expired.len()));
            garbage.extend(expired);
        }
        if !queue.is_empty() {
            sweep.queues.push(QueueSummary {
                key: *key,
                pending: queue.len(),
                oldest: queue.oldest_age(),
            });
        }
    }
    (sweep, garbage)
}

impl std::fmt::Debug for FeatureBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureBridge")
            .field("scope", &self.scope)
            .field("id", &self.id)
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}

/// Render a panic payload as text.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use featurebridge_platform::{HeadlessExecutor, MainLoop};

    trait TestFeature: Send + Sync {
        fn execute(&self, value: &str);
    }

    trait OtherFeature: Send + Sync {
        fn ping(&self);
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("recorder").clone()
        }
    }

    impl TestFeature for Recorder {
        fn execute(&self, value: &str) {
            self.calls.lock().expect("recorder").push(value.to_string());
        }
    }

    #[derive(Default)]
    struct Pinger(AtomicUsize);

    impl OtherFeature for Pinger {
        fn ping(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Route engine logs to the test harness; `RUST_LOG` overrides the level.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    fn bridge_with(max_queue_size: usize, action_expiry: Duration) -> FeatureBridge {
        init_tracing();
        FeatureBridge::from_parts(
            "engine-test".into(),
            EngineConfig {
                max_queue_size,
                action_expiry,
                debug_mode: true,
            },
            Arc::new(HeadlessExecutor),
        )
    }

    fn bridge() -> FeatureBridge {
        bridge_with(100, Duration::from_secs(300))
    }

    /// Register a fresh recorder; the returned `Arc`s keep it alive.
    fn register_recorder(bridge: &FeatureBridge) -> (Arc<Recorder>, Arc<dyn TestFeature>) {
        let recorder = Arc::new(Recorder::default());
        let feature: Arc<dyn TestFeature> = recorder.clone();
        bridge.register(&feature);
        (recorder, feature)
    }

    #[test]
    fn registration_tracks_the_latest_handle() {
        let bridge = bridge();
        assert!(!bridge.is_registered::<dyn TestFeature>());

        let (recorder, feature) = register_recorder(&bridge);
        assert!(bridge.is_registered::<dyn TestFeature>());

        bridge.unregister::<dyn TestFeature>();
        assert!(!bridge.is_registered::<dyn TestFeature>());
        bridge.unregister::<dyn TestFeature>();

        bridge.register(&feature);
        assert!(bridge.is_registered::<dyn TestFeature>());
        drop(feature);
        drop(recorder);
        assert!(!bridge.is_registered::<dyn TestFeature>());
    }

    #[test]
    fn immediate_dispatch_reaches_live_implementation() {
        let bridge = bridge();
        let (recorder, _feature) = register_recorder(&bridge);

        bridge.dispatch::<dyn TestFeature>(|f| f.execute("now"));

        assert_eq!(recorder.calls(), vec!["now"]);
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 0);
        assert_eq!(bridge.metrics_for::<dyn TestFeature>().dispatched, 1);
    }

    #[test]
    fn queued_actions_replay_in_fifo_order_on_register() {
        let bridge = bridge();
        for value in ["a", "b", "c"] {
            bridge.dispatch::<dyn TestFeature>(move |f| f.execute(value));
        }
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 3);

        let (recorder, _feature) = register_recorder(&bridge);

        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 0);
        assert_eq!(recorder.calls(), vec!["a", "b", "c"]);

        let metrics = bridge.metrics_for::<dyn TestFeature>();
        assert_eq!(metrics.queued, 3);
        assert_eq!(metrics.replayed, 3);
    }

    #[test]
    fn queue_keeps_only_the_most_recent_actions() {
        let bridge = bridge_with(5, Duration::from_secs(300));
        for i in 0..10 {
            bridge.dispatch::<dyn TestFeature>(move |f| f.execute(&i.to_string()));
        }
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 5);
        assert_eq!(bridge.metrics_for::<dyn TestFeature>().evicted, 5);

        let (recorder, _feature) = register_recorder(&bridge);
        assert_eq!(recorder.calls(), vec!["5", "6", "7", "8", "9"]);
    }

    #[test]
    fn expired_actions_are_never_replayed() {
        let bridge = bridge_with(100, Duration::from_millis(1));
        bridge.dispatch::<dyn TestFeature>(|f| f.execute("stale"));
        thread::sleep(Duration::from_millis(10));

        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 0);
        assert_eq!(bridge.metrics_for::<dyn TestFeature>().expired, 1);

        bridge.dispatch::<dyn TestFeature>(|f| f.execute("also stale"));
        thread::sleep(Duration::from_millis(10));
        let (recorder, _feature) = register_recorder(&bridge);
        assert!(recorder.calls().is_empty());
        assert_eq!(bridge.metrics_for::<dyn TestFeature>().expired, 2);
    }

    #[test]
    fn priority_overflow_evicts_the_lowest() {
        let bridge = bridge_with(2, Duration::from_secs(300));
        bridge.dispatch_with_priority::<dyn TestFeature>(Priority::HIGH, |f| f.execute("high"));
        bridge.dispatch_with_priority::<dyn TestFeature>(Priority::LOW, |f| f.execute("low"));
        bridge.dispatch_with_priority::<dyn TestFeature>(Priority::CRITICAL, |f| f.execute("critical"));
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 2);

        let (recorder, _feature) = register_recorder(&bridge);
        assert_eq!(recorder.calls(), vec!["critical", "high"]);
    }

    #[test]
    fn priority_dispatch_to_live_feature_runs_immediately() {
        let bridge = bridge();
        let (recorder, _feature) = register_recorder(&bridge);
        bridge.dispatch_with_priority::<dyn TestFeature>(Priority::LOW, |f| f.execute("direct"));
        assert_eq!(recorder.calls(), vec!["direct"]);
    }

    #[test]
    fn dead_implementation_sends_actions_to_the_queue() {
        let bridge = bridge();
        let (recorder, feature) = register_recorder(&bridge);
        drop(feature);
        drop(recorder);

        bridge.dispatch::<dyn TestFeature>(|f| f.execute("later"));
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 1);

        let (replacement, _feature) = register_recorder(&bridge);
        assert_eq!(replacement.calls(), vec!["later"]);
    }

    #[test]
    fn nested_dispatch_from_a_callback_does_not_deadlock() {
        let bridge = Arc::new(bridge());
        let (recorder, _feature) = register_recorder(&bridge);

        let inner = Arc::clone(&bridge);
        bridge.dispatch::<dyn TestFeature>(move |f| {
            f.execute("outer");
            inner.dispatch::<dyn TestFeature>(|f| f.execute("inner"));
        });

        assert_eq!(recorder.calls(), vec!["outer", "inner"]);
    }

    #[test]
    fn replayed_callback_may_dispatch_again() {
        let bridge = Arc::new(bridge());

        let inner = Arc::clone(&bridge);
        bridge.dispatch::<dyn TestFeature>(move |f| {
            f.execute("outer");
            inner.dispatch::<dyn TestFeature>(|f| f.execute("inner"));
            inner.dispatch::<dyn OtherFeature>(|p| p.ping());
        });

        let (recorder, _feature) = register_recorder(&bridge);
        assert_eq!(recorder.calls(), vec!["outer", "inner"]);
        assert_eq!(bridge.pending_count::<dyn OtherFeature>(), 1);

        let pinger = Arc::new(Pinger::default());
        let other: Arc<dyn OtherFeature> = pinger.clone();
        bridge.register(&other);
        assert_eq!(pinger.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let bridge = bridge();
        let (recorder, _feature) = register_recorder(&bridge);

        bridge.dispatch::<dyn TestFeature>(|_| panic!("immediate failure"));
        bridge.dispatch::<dyn TestFeature>(|f| f.execute("after"));

        assert_eq!(recorder.calls(), vec!["after"]);
        assert_eq!(bridge.metrics_for::<dyn TestFeature>().failed, 1);
    }

    #[test]
    fn panicking_replay_does_not_abort_the_batch() {
        let bridge = bridge();
        bridge.dispatch::<dyn TestFeature>(|f| f.execute("first"));
        bridge.dispatch::<dyn TestFeature>(|_| panic!("replay failure"));
        bridge.dispatch::<dyn TestFeature>(|f| f.execute("third"));

        let (recorder, _feature) = register_recorder(&bridge);

        assert_eq!(recorder.calls(), vec!["first", "third"]);
        let metrics = bridge.metrics_for::<dyn TestFeature>();
        assert_eq!(metrics.replayed, 3);
        assert_eq!(metrics.failed, 1);
    }

    #[test]
    fn clear_queue_releases_captured_state() {
        let bridge = bridge();
        let payload = Arc::new(vec![0_u8; 1024]);
        let captured = Arc::clone(&payload);
        bridge.dispatch::<dyn TestFeature>(move |f| f.execute(&captured.len().to_string()));
        assert_eq!(Arc::strong_count(&payload), 2);

        assert_eq!(bridge.clear_queue::<dyn TestFeature>(), 1);
        assert_eq!(Arc::strong_count(&payload), 1);
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 0);
        assert_eq!(bridge.clear_queue::<dyn TestFeature>(), 0);
        assert_eq!(bridge.metrics_for::<dyn TestFeature>().cleared, 1);
    }

    #[test]
    fn queues_are_per_feature() {
        let bridge = bridge();
        bridge.dispatch::<dyn TestFeature>(|f| f.execute("x"));
        bridge.dispatch::<dyn OtherFeature>(|p| p.ping());
        bridge.dispatch::<dyn OtherFeature>(|p| p.ping());

        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 1);
        assert_eq!(bridge.pending_count::<dyn OtherFeature>(), 2);
        assert_eq!(bridge.pending_count_all(), 3);

        bridge.clear_queue::<dyn OtherFeature>();
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 1);
    }

    #[test]
    fn reset_clears_state_but_keeps_config() {
        let bridge = bridge_with(7, Duration::from_secs(60));
        let (_recorder, _feature) = register_recorder(&bridge);
        bridge.dispatch::<dyn OtherFeature>(|p| p.ping());

        bridge.reset();

        assert!(!bridge.is_registered::<dyn TestFeature>());
        assert_eq!(bridge.pending_count::<dyn OtherFeature>(), 0);
        assert!(bridge.metrics().values().all(|m| m.queued == 0));
        assert_eq!(bridge.config().max_queue_size, 7);
    }

    #[test]
    fn concurrent_dispatch_loses_nothing() {
        let bridge = Arc::new(bridge_with(1_000, Duration::from_secs(300)));
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let bridge = Arc::clone(&bridge);
                thread::spawn(move || {
                    for i in 0..50 {
                        bridge.dispatch::<dyn TestFeature>(move |f| f.execute(&format!("{worker}-{i}")));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("dispatcher");
        }
        assert_eq!(bridge.pending_count::<dyn TestFeature>(), 400);

        let (recorder, _feature) = register_recorder(&bridge);
        assert_eq!(recorder.calls().len(), 400);
    }

    #[test]
    fn register_racing_dispatchers_runs_every_action_once() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 200;

        for round in 0..20 {
            let bridge = Arc::new(bridge_with(THREADS * PER_THREAD, Duration::from_secs(300)));
            let recorder = Arc::new(Recorder::default());
            let feature: Arc<dyn TestFeature> = recorder.clone();

            let workers: Vec<_> = (0..THREADS)
                .map(|worker| {
                    let bridge = Arc::clone(&bridge);
                    thread::spawn(move || {
                        for i in 0..PER_THREAD {
                            bridge.dispatch::<dyn TestFeature>(move |f| f.execute(&format!("{worker}-{i}")));
                        }
                    })
                })
                .collect();
            bridge.register(&feature);
            for worker in workers {
                worker.join().expect("dispatcher");
            }

            let calls = recorder.calls();
            let pending = bridge.pending_count::<dyn TestFeature>();
            assert_eq!(calls.len() + pending, THREADS * PER_THREAD, "round {round}");

            let unique: std::collections::HashSet<&String> = calls.iter().collect();
            assert_eq!(unique.len(), calls.len(), "round {round}: an action ran twice");
        }
    }

    #[test]
    fn engine_reads_reenter_a_held_lock() {
        let bridge = bridge();
        bridge.dispatch::<dyn TestFeature>(|f| f.execute("queued"));

        let (registered, pending) = bridge.state.with_lock(|_| {
            assert!(bridge.state.is_held_by_current_thread());
            (bridge.is_registered::<dyn TestFeature>(), bridge.pending_count::<dyn TestFeature>())
        });
        assert!(!registered);
        assert_eq!(pending, 1);
        assert_eq!(bridge.config().max_queue_size, 100);
    }

    #[test]
    fn background_dispatch_runs_on_the_main_loop() {
        let main_loop = MainLoop::new();
        let bridge = Arc::new(FeatureBridge::from_parts(
            "main-loop-test".into(),
            EngineConfig::default(),
            Arc::new(main_loop.handle()),
        ));
        let (recorder, _feature) = register_recorder(&bridge);

        let main_id = thread::current().id();
        let seen_on = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen_on);
        let worker_bridge = Arc::clone(&bridge);
        thread::spawn(move || {
            worker_bridge.dispatch::<dyn TestFeature>(move |f| {
                *sink.lock().expect("thread slot") = Some(thread::current().id());
                f.execute("posted");
            });
        })
        .join()
        .expect("worker");

        assert!(recorder.calls().is_empty());
        assert_eq!(main_loop.run_pending(), 1);
        assert_eq!(recorder.calls(), vec!["posted"]);
        assert_eq!(*seen_on.lock().expect("thread slot"), Some(main_id));
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*static_str), "static");
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }
}
