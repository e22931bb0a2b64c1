//! Per-view poller.
//!
//! A mounted view gets one poller task. The task runs a round immediately,
//! then on a timer. A round fetches every endpoint of the view concurrently
//! and commits only when all of them succeeded, at least one payload changed
//! since the last commit, the commit gate is open and the mount is still
//! live. Commits go to the view's `ViewStore` slot and to a watch channel that
//! renderers subscribe to.

use futures::future::try_join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Fetch};
use crate::bus::{BusEvent, SharedBus};
use crate::sync::coalesce::SharedCoalescingCache;
use crate::sync::store::{CachedView, SharedViewStore};

/// Floor for every view's refresh interval
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Default minimum spacing between two commits of the same view
pub const DEFAULT_MIN_COMMIT_INTERVAL: Duration = Duration::from_millis(900);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub refresh_interval: Duration,
    pub min_commit_interval: Duration,
}

impl PollerConfig {
    pub fn new(refresh_interval: Duration, min_commit_interval: Duration) -> Self {
        Self {
            refresh_interval,
            min_commit_interval,
        }
    }

    /// Timer period actually used, never below [`MIN_REFRESH_INTERVAL`]
    pub fn effective_interval(&self) -> Duration {
        self.refresh_interval.max(MIN_REFRESH_INTERVAL)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new(MIN_REFRESH_INTERVAL, DEFAULT_MIN_COMMIT_INTERVAL)
    }
}

/// One backend stream a view reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Coalescing cache key
    pub key: &'static str,
    pub path: &'static str,
}

impl Endpoint {
    pub const fn new(key: &'static str, path: &'static str) -> Self {
        Self { key, path }
    }
}

/// What a poller needs to know about the view it feeds
pub trait ViewSource: Send + Sync + 'static {
    type Snapshot: Clone + Send + Sync + 'static;

    /// Stable key; also names the view's `ViewStore` slot
    fn name(&self) -> &'static str;

    fn endpoints(&self) -> &[Endpoint];

    /// Build the snapshot to commit from this round's payloads (in
    /// `endpoints()` order). `previous` is the currently committed snapshot.
    fn assemble(
        &self,
        payloads: &[Arc<Value>],
        previous: Option<&Self::Snapshot>,
    ) -> Result<Self::Snapshot, ApiError>;

    /// Notification text for the first failure of a streak, `None` to stay quiet
    fn failure_message(&self, _error: &ApiError) -> Option<String> {
        Some(format!("Failed to fetch {}", self.name()))
    }

    fn recovery_message(&self) -> String {
        format!("Reconnected: {}", self.name())
    }
}

/// Observable state of a mounted view
#[derive(Debug, Clone)]
pub struct PollerState<S> {
    pub data: Option<S>,
    /// True until the first successful commit when nothing was cached
    pub loading: bool,
    pub last_commit: Option<Instant>,
}

impl<S> Default for PollerState<S> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            last_commit: None,
        }
    }
}

/// Result of applying one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Committed,
    /// Every payload is pointer-equal to the committed ones
    Unchanged,
    /// Changed, but the previous commit is too recent
    Throttled,
    Failed,
    /// The mount was stopped before the round could commit
    Disposed,
}

/// Minimum-interval gate between commits, independent of the poll cadence
#[derive(Debug, Clone)]
pub struct CommitGate {
    min_interval: Duration,
    last_commit: Option<Instant>,
}

impl CommitGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_commit: None,
        }
    }

    pub fn is_open(&self, now: Instant) -> bool {
        match self.last_commit {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.last_commit = Some(now);
    }

    pub fn last_commit(&self) -> Option<Instant> {
        self.last_commit
    }
}

/// Lifetime of one mount: cancellation for the timer plus the disposal flag
/// tested before every commit.
struct Mount {
    disposed: AtomicBool,
    commit_lock: Mutex<()>,
    token: CancellationToken,
}

impl Mount {
    fn new() -> Self {
        Self {
            disposed: AtomicBool::new(false),
            commit_lock: Mutex::new(()),
            token: CancellationToken::new(),
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns true the first time only
    fn dispose(&self) -> bool {
        let first = {
            let _guard = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
            !self.disposed.swap(true, Ordering::AcqRel)
        };
        self.token.cancel();
        first
    }

    /// Run `commit` unless disposed; `dispose` cannot interleave with it
    fn commit_if_live(&self, commit: impl FnOnce()) -> bool {
        let _guard = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_disposed() {
            return false;
        }
        commit();
        true
    }
}

/// Everything a view's poller needs, before it is started
pub struct Poller<V: ViewSource> {
    view: Arc<V>,
    fetcher: Arc<dyn Fetch>,
    cache: SharedCoalescingCache,
    store: SharedViewStore,
    bus: SharedBus,
    config: PollerConfig,
}

impl<V: ViewSource> Poller<V> {
    pub fn new(
        view: V,
        fetcher: Arc<dyn Fetch>,
        cache: SharedCoalescingCache,
        store: SharedViewStore,
        bus: SharedBus,
        config: PollerConfig,
    ) -> Self {
        Self {
            view: Arc::new(view),
            fetcher,
            cache,
            store,
            bus,
            config,
        }
    }

    /// Mount the view: seed state from the store and spawn the poll loop
    pub fn start(self) -> PollerHandle<V::Snapshot> {
        let view = self.view.name();
        let bus = self.bus.clone();
        let mount = Arc::new(Mount::new());
        let refresh = Arc::new(Notify::new());
        let (period, period_rx) = watch::channel(self.config.effective_interval());

        info!(
            view,
            interval = ?self.config.effective_interval(),
            min_commit = ?self.config.min_commit_interval,
            "Mounting view"
        );

        let task = self.prepare(mount.clone());
        let state = task.state.subscribe();
        let join = tokio::spawn(task.run(refresh.clone(), period_rx));

        bus.publish(BusEvent::ViewMounted {
            view: view.to_string(),
        });

        PollerHandle {
            view,
            mount,
            refresh,
            period,
            state,
            bus,
            task: Some(join),
        }
    }

    fn prepare(self, mount: Arc<Mount>) -> PollerTask<V> {
        let cached = self.store.load::<V::Snapshot>(self.view.name());
        let (initial, committed) = match cached {
            Some(CachedView { snapshot, payloads }) => (
                PollerState {
                    data: Some(snapshot),
                    loading: false,
                    last_commit: None,
                },
                Some(payloads),
            ),
            None => (PollerState::default(), None),
        };
        let (state, _) = watch::channel(initial);

        PollerTask {
            gate: CommitGate::new(self.config.min_commit_interval),
            poller: self,
            mount,
            state,
            committed,
            failures: 0,
        }
    }
}

struct PollerTask<V: ViewSource> {
    poller: Poller<V>,
    mount: Arc<Mount>,
    state: watch::Sender<PollerState<V::Snapshot>>,
    gate: CommitGate,
    /// Payloads behind the currently committed snapshot
    committed: Option<Vec<Arc<Value>>>,
    failures: u32,
}

impl<V: ViewSource> PollerTask<V> {
    async fn run(mut self, refresh: Arc<Notify>, mut period: watch::Receiver<Duration>) {
        let view = self.poller.view.name();
        let shutdown = self.mount.token.clone();
        let mut poll_timer = interval(*period.borrow_and_update());
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(view, "Poller cancelled");
                    break;
                }
                _ = poll_timer.tick() => {}
                _ = refresh.notified() => {
                    debug!(view, "Forced refresh");
                    poll_timer.reset();
                }
                Ok(()) = period.changed() => {
                    let next = *period.borrow_and_update();
                    info!(view, interval = ?next, "Refresh interval changed");
                    poll_timer = rescheduled(next);
                    continue;
                }
            }

            // In-flight requests run to completion; the disposal flag keeps
            // their result out of view state.
            let fetched = self.fetch_round().await;
            let outcome = self.apply_round(fetched, Instant::now());
            debug!(view, ?outcome, "Poll round finished");

            if outcome == RoundOutcome::Disposed {
                break;
            }
        }

        info!(view, "Poller stopped");
    }

    async fn fetch_round(&self) -> Result<Vec<Value>, ApiError> {
        let fetcher = &self.poller.fetcher;
        try_join_all(
            self.poller
                .view
                .endpoints()
                .iter()
                .map(|endpoint| fetcher.get_payload(endpoint.path)),
        )
        .await
    }

    fn apply_round(&mut self, fetched: Result<Vec<Value>, ApiError>, now: Instant) -> RoundOutcome {
        if self.mount.is_disposed() {
            return RoundOutcome::Disposed;
        }

        match fetched.and_then(|raw| self.settle(raw, now)) {
            Ok(outcome) => {
                if outcome != RoundOutcome::Disposed {
                    self.record_success();
                }
                outcome
            }
            Err(e) => {
                self.record_failure(&e);
                RoundOutcome::Failed
            }
        }
    }

    fn settle(&mut self, raw: Vec<Value>, now: Instant) -> Result<RoundOutcome, ApiError> {
        let view = self.poller.view.name();
        let payloads: Vec<Arc<Value>> = self
            .poller
            .view
            .endpoints()
            .iter()
            .zip(raw)
            .map(|(endpoint, value)| self.poller.cache.coalesce(endpoint.key, value))
            .collect();

        let unchanged = self.committed.as_ref().is_some_and(|committed| {
            committed.len() == payloads.len()
                && committed
                    .iter()
                    .zip(&payloads)
                    .all(|(a, b)| Arc::ptr_eq(a, b))
        });
        if unchanged {
            return Ok(RoundOutcome::Unchanged);
        }

        if !self.gate.is_open(now) {
            debug!(view, "Commit gate closed, dropping round");
            return Ok(RoundOutcome::Throttled);
        }

        let snapshot = {
            let current = self.state.borrow();
            self.poller.view.assemble(&payloads, current.data.as_ref())?
        };

        let store = &self.poller.store;
        let state = &self.state;
        let committed = self.mount.commit_if_live(|| {
            store.save(
                view,
                CachedView {
                    snapshot: snapshot.clone(),
                    payloads: payloads.clone(),
                },
            );
            state.send_modify(|s| {
                s.data = Some(snapshot);
                s.loading = false;
                s.last_commit = Some(now);
            });
        });

        if !committed {
            return Ok(RoundOutcome::Disposed);
        }

        self.gate.record(now);
        self.committed = Some(payloads);
        self.poller.bus.publish(BusEvent::ViewCommitted {
            view: view.to_string(),
        });
        Ok(RoundOutcome::Committed)
    }

    fn record_failure(&mut self, error: &ApiError) {
        let view = self.poller.view.name();
        self.failures += 1;
        warn!(view, failures = self.failures, "Poll failed: {}", error);

        if self.failures == 1 {
            if let Some(message) = self.poller.view.failure_message(error) {
                self.poller.bus.publish(BusEvent::error(message));
            }
        }
    }

    fn record_success(&mut self) {
        if self.failures > 0 {
            info!(
                view = self.poller.view.name(),
                failures = self.failures,
                "Poll recovered"
            );
            self.failures = 0;
            self.poller
                .bus
                .publish(BusEvent::info(self.poller.view.recovery_message()));
        }
    }
}

/// Timer whose first tick is one full period away
fn rescheduled(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Handle to a mounted view. Dropping it unmounts the view.
pub struct PollerHandle<S> {
    view: &'static str,
    mount: Arc<Mount>,
    refresh: Arc<Notify>,
    /// Timer period, already clamped to [`MIN_REFRESH_INTERVAL`]
    period: watch::Sender<Duration>,
    state: watch::Receiver<PollerState<S>>,
    bus: SharedBus,
    task: Option<JoinHandle<()>>,
}

impl<S> PollerHandle<S> {
    pub fn view(&self) -> &'static str {
        self.view
    }

    pub fn is_active(&self) -> bool {
        !self.mount.is_disposed()
    }

    /// Run a round now instead of waiting for the timer
    pub fn refresh_now(&self) {
        self.refresher().refresh_now();
    }

    pub fn refresh_interval(&self) -> Duration {
        *self.period.borrow()
    }

    /// Change the timer period of the running poller, clamped to
    /// [`MIN_REFRESH_INTERVAL`]. The next round runs one new period from
    /// now. Returns the period in effect.
    pub fn set_refresh_interval(&self, requested: Duration) -> Duration {
        let next = requested.max(MIN_REFRESH_INTERVAL);
        self.period.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        next
    }

    /// Cloneable trigger for `refresh_now`, e.g. for a delayed refresh task
    pub fn refresher(&self) -> Refresher {
        Refresher {
            mount: Arc::clone(&self.mount),
            refresh: Arc::clone(&self.refresh),
        }
    }

    /// Unmount: cancel the timer and discard any round still in flight
    pub fn stop(&self) {
        if self.mount.dispose() {
            info!(view = self.view, "Unmounting view");
            self.bus.publish(BusEvent::ViewUnmounted {
                view: self.view.to_string(),
            });
        }
    }

    /// Stop and wait for the poll loop to exit
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<S: Clone> PollerHandle<S> {
    pub fn subscribe(&self) -> watch::Receiver<PollerState<S>> {
        self.state.clone()
    }

    /// Current state (clone of the latest published value)
    pub fn state(&self) -> PollerState<S> {
        self.state.borrow().clone()
    }
}

impl<S> Drop for PollerHandle<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forces a round on a mounted view; does nothing once it is unmounted
#[derive(Clone)]
pub struct Refresher {
    mount: Arc<Mount>,
    refresh: Arc<Notify>,
}

impl Refresher {
    pub fn refresh_now(&self) {
        if !self.mount.is_disposed() {
            self.refresh.notify_one();
        }
    }
}
