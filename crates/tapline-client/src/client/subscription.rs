// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription creation and change dispatch.
//!
//! The [`SubscriptionDispatcher`] wraps the transport's native
//! subscription primitive. It normalizes every raw change into a
//! [`ChangeRecord`] and fans it out to the registered listeners,
//! isolating listener failures from each other and from the delivery
//! task (which belongs to the transport, not to this module).
//!
//! A [`SubscriptionSet`] is pinned to the session epoch it was created
//! under. After a reconnect the set is stale: its watch tokens belong
//! to a connection that no longer exists, and any late deliveries are
//! dropped and counted rather than forwarded.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tapline_client::client::{ChannelListener, SubscriptionDispatcher};
//!
//! let dispatcher = SubscriptionDispatcher::new(session);
//! let (listener, mut rx) = ChannelListener::channel(256);
//!
//! let set = dispatcher
//!     .create(1000, &nodes, Arc::new(listener))
//!     .await?;
//!
//! while let Some(record) = rx.recv().await {
//!     println!("{record}");
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, trace, warn};

use tapline_core::convert::coerce_scalar;
use tapline_core::error::{SubscriptionError, SubscriptionResult, TaplineResult};
use tapline_core::types::{ChangeRecord, NodeRef};

use crate::client::session::SessionManager;
use crate::client::transport::{ChangeCallback, RawChange, SubscriptionHandle, WatchToken};

// =============================================================================
// SubscriptionSetId
// =============================================================================

/// Locally assigned identifier for a subscription set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionSetId(u32);

impl SubscriptionSetId {
    /// Creates a new id.
    #[inline]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubscriptionSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// =============================================================================
// ChangeListener
// =============================================================================

/// Consumer of normalized change records.
///
/// Listener errors are caught by the dispatcher, logged, and counted;
/// they never stop delivery to other listeners.
#[async_trait]
pub trait ChangeListener: Send + Sync {
    /// Handles one change record.
    async fn on_change(&self, record: &ChangeRecord) -> SubscriptionResult<()>;

    /// Name used in dispatch logs.
    fn name(&self) -> &str {
        "listener"
    }
}

/// Listener that forwards records into an mpsc channel.
///
/// Delivery is best-effort: when the channel is full or closed the
/// record is dropped with a trace log, never an error. Slow consumers
/// shed load here instead of stalling the delivery task.
pub struct ChannelListener {
    sender: mpsc::Sender<ChangeRecord>,
}

impl ChannelListener {
    /// Wraps an existing sender.
    pub fn new(sender: mpsc::Sender<ChangeRecord>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and its listener in one step.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ChangeRecord>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ChangeListener for ChannelListener {
    async fn on_change(&self, record: &ChangeRecord) -> SubscriptionResult<()> {
        if let Err(e) = self.sender.try_send(record.clone()) {
            trace!(error = %e, "channel listener dropped a record");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Listener that fans records out on a tokio broadcast channel.
///
/// This is the live-stream surface: any number of observers can
/// `subscribe()` and lagging observers lose old records instead of
/// applying backpressure.
pub struct BroadcastListener {
    sender: broadcast::Sender<ChangeRecord>,
}

impl BroadcastListener {
    /// Creates a broadcast listener with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new receiver on the stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeRecord> {
        self.sender.subscribe()
    }

    /// Returns the number of connected receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl ChangeListener for BroadcastListener {
    async fn on_change(&self, record: &ChangeRecord) -> SubscriptionResult<()> {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.sender.send(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "broadcast"
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Normalizes a raw transport change into a [`ChangeRecord`].
///
/// Total: a missing node id falls back to the display rendering, the
/// value is coerced with the fixed int/float/string precedence, and
/// missing timestamps stay absent (readers fall back to
/// `observed_time`).
pub fn normalize(change: RawChange) -> ChangeRecord {
    let RawChange {
        node_id,
        display,
        value,
        source_time,
        server_time,
    } = change;

    let node_id = node_id.unwrap_or(display);
    let mut record = ChangeRecord::new(node_id, coerce_scalar(&value));
    record.source_time = source_time;
    record.server_time = server_time;
    record
}

// =============================================================================
// DispatcherStats
// =============================================================================

/// Atomic counters for dispatch activity, shared across all sets
/// created by one dispatcher.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    sets_created: AtomicU64,
    notifications: AtomicU64,
    dispatched: AtomicU64,
    listener_errors: AtomicU64,
    stale_drops: AtomicU64,
    watch_failures: AtomicU64,
    invalidations: AtomicU64,
}

impl DispatcherStats {
    fn record_set_created(&self) {
        self.sets_created.fetch_add(1, Ordering::Relaxed);
    }

    fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_listener_error(&self) {
        self.listener_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_stale_drop(&self) {
        self.stale_drops.fetch_add(1, Ordering::Relaxed);
    }

    fn record_watch_failure(&self) {
        self.watch_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of sets created.
    pub fn sets_created(&self) -> u64 {
        self.sets_created.load(Ordering::Relaxed)
    }

    /// Returns the number of notifications normalized.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Returns the number of successful listener deliveries.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Returns the number of listener errors swallowed.
    pub fn listener_errors(&self) -> u64 {
        self.listener_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of deliveries dropped on stale sets.
    pub fn stale_drops(&self) -> u64 {
        self.stale_drops.load(Ordering::Relaxed)
    }

    /// Returns the number of per-node watch registrations that failed.
    pub fn watch_failures(&self) -> u64 {
        self.watch_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of set invalidations.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Takes a serializable snapshot.
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            sets_created: self.sets_created(),
            notifications: self.notifications(),
            dispatched: self.dispatched(),
            listener_errors: self.listener_errors(),
            stale_drops: self.stale_drops(),
            watch_failures: self.watch_failures(),
            invalidations: self.invalidations(),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.sets_created.store(0, Ordering::Relaxed);
        self.notifications.store(0, Ordering::Relaxed);
        self.dispatched.store(0, Ordering::Relaxed);
        self.listener_errors.store(0, Ordering::Relaxed);
        self.stale_drops.store(0, Ordering::Relaxed);
        self.watch_failures.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of [`DispatcherStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherStatsSnapshot {
    /// Sets created.
    pub sets_created: u64,
    /// Notifications normalized.
    pub notifications: u64,
    /// Successful listener deliveries.
    pub dispatched: u64,
    /// Listener errors swallowed.
    pub listener_errors: u64,
    /// Deliveries dropped on stale sets.
    pub stale_drops: u64,
    /// Per-node watch registrations that failed.
    pub watch_failures: u64,
    /// Set invalidations.
    pub invalidations: u64,
}

// =============================================================================
// Dispatch State & Callback
// =============================================================================

/// State shared between a [`SubscriptionSet`] and the callback the
/// transport holds. The callback outlives handle teardown on the
/// transport side, so staleness lives here.
struct DispatchState {
    set_id: SubscriptionSetId,
    stale: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
    stats: Arc<DispatcherStats>,
}

struct DispatchCallback {
    state: Arc<DispatchState>,
}

#[async_trait]
impl ChangeCallback for DispatchCallback {
    async fn on_raw_change(&self, change: RawChange) {
        if self.state.stale.load(Ordering::SeqCst) {
            self.state.stats.record_stale_drop();
            return;
        }

        let record = normalize(change);
        self.state.stats.record_notification();

        let listeners = self.state.listeners.read().await;
        for listener in listeners.iter() {
            match listener.on_change(&record).await {
                Ok(()) => self.state.stats.record_dispatched(),
                Err(e) => {
                    warn!(
                        set_id = %self.state.set_id,
                        listener = listener.name(),
                        error = %e,
                        "listener failed, continuing dispatch"
                    );
                    self.state.stats.record_listener_error();
                }
            }
        }
    }
}

// =============================================================================
// SubscriptionSet
// =============================================================================

/// One standing registration for change notifications.
///
/// Owns the native handle and the per-node watch tokens. The set is
/// valid only for the session epoch it was created under; after a
/// reconnect it must be rebuilt through
/// [`SubscriptionDispatcher::recreate`].
pub struct SubscriptionSet {
    id: SubscriptionSetId,
    epoch: u64,
    interval: Duration,
    requested: Vec<String>,
    watched: Vec<String>,
    tokens: HashMap<String, WatchToken>,
    handle: Box<dyn SubscriptionHandle>,
    state: Arc<DispatchState>,
}

impl SubscriptionSet {
    /// Returns the local set id.
    #[inline]
    pub fn id(&self) -> SubscriptionSetId {
        self.id
    }

    /// Returns the transport-native subscription id.
    #[inline]
    pub fn native_id(&self) -> u32 {
        self.handle.id()
    }

    /// Returns the session epoch this set was created under.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the publishing interval.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the node ids that were requested, deduplicated in
    /// request order. Rebuilds retry the full requested set.
    pub fn requested_nodes(&self) -> &[String] {
        &self.requested
    }

    /// Returns the node ids with a live watch.
    pub fn watched_nodes(&self) -> &[String] {
        &self.watched
    }

    /// Returns the watch token for a node, if it was registered.
    pub fn watch_token(&self, node_id: &str) -> Option<WatchToken> {
        self.tokens.get(node_id).copied()
    }

    /// Returns `true` when the set has no live watches. An empty
    /// requested list produces a valid, inert set.
    pub fn is_inert(&self) -> bool {
        self.watched.is_empty()
    }

    /// Returns `true` once the set has been invalidated.
    pub fn is_stale(&self) -> bool {
        self.state.stale.load(Ordering::SeqCst)
    }

    /// Returns `true` if the set is invalidated or was created under
    /// an older epoch than `current_epoch`.
    pub fn is_stale_for(&self, current_epoch: u64) -> bool {
        self.is_stale() || self.epoch != current_epoch
    }

    /// Marks the set stale. Late deliveries are dropped and counted
    /// from this point on.
    pub fn invalidate(&self) {
        if !self.state.stale.swap(true, Ordering::SeqCst) {
            self.state.stats.record_invalidation();
            debug!(set_id = %self.id, epoch = self.epoch, "subscription set invalidated");
        }
    }

    /// Registers an additional listener on this set.
    pub async fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.state.listeners.write().await.push(listener);
    }

    /// Returns the current listeners, for rebuilding after a reconnect.
    pub async fn listeners(&self) -> Vec<Arc<dyn ChangeListener>> {
        self.state.listeners.read().await.clone()
    }

    /// Invalidates the set and cancels the native subscription.
    ///
    /// Cancel failures are logged and swallowed; after a reconnect the
    /// native subscription is already gone and cancel is expected to
    /// fail.
    pub async fn cancel(&self) {
        self.invalidate();
        if let Err(e) = self.handle.cancel().await {
            debug!(set_id = %self.id, error = %e, "native cancel failed, handle discarded");
        }
    }
}

impl fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .field("interval", &self.interval)
            .field("watched", &self.watched.len())
            .field("stale", &self.is_stale())
            .finish()
    }
}

// =============================================================================
// SubscriptionDispatcher
// =============================================================================

/// Creates and rebuilds subscription sets against a session.
pub struct SubscriptionDispatcher {
    session: Arc<SessionManager>,
    next_id: AtomicU32,
    stats: Arc<DispatcherStats>,
}

impl SubscriptionDispatcher {
    /// Creates a dispatcher bound to a session.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            next_id: AtomicU32::new(1),
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    /// Returns the dispatch counters.
    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    /// Creates a subscription set.
    ///
    /// `interval_ms` must be positive. Duplicate node ids are ignored;
    /// an empty list is valid and produces an inert set. A watch
    /// failure on one node is logged and that node is skipped, the
    /// rest of the set still comes up.
    pub async fn create(
        &self,
        interval_ms: u64,
        node_ids: &[String],
        listener: Arc<dyn ChangeListener>,
    ) -> TaplineResult<SubscriptionSet> {
        if interval_ms == 0 {
            return Err(SubscriptionError::invalid_interval(interval_ms).into());
        }

        let mut seen = std::collections::HashSet::new();
        let requested: Vec<String> = node_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        self.create_inner(Duration::from_millis(interval_ms), requested, vec![listener])
            .await
    }

    /// Rebuilds a stale set against the current session.
    ///
    /// The old set is cancelled, then a new set is created for the
    /// full originally requested node list with the same interval and
    /// listeners. Nodes that failed to watch before get another try.
    pub async fn recreate(&self, old: &SubscriptionSet) -> TaplineResult<SubscriptionSet> {
        old.cancel().await;
        let listeners = old.listeners().await;
        self.create_inner(old.interval, old.requested.clone(), listeners)
            .await
    }

    async fn create_inner(
        &self,
        interval: Duration,
        requested: Vec<String>,
        listeners: Vec<Arc<dyn ChangeListener>>,
    ) -> TaplineResult<SubscriptionSet> {
        let id = SubscriptionSetId::new(self.next_id.fetch_add(1, Ordering::SeqCst));

        let state = Arc::new(DispatchState {
            set_id: id,
            stale: AtomicBool::new(false),
            listeners: RwLock::new(listeners),
            stats: Arc::clone(&self.stats),
        });
        let callback = Arc::new(DispatchCallback {
            state: Arc::clone(&state),
        });

        // Snapshot the epoch before touching the transport: if a
        // reconnect slips in after this point the set records the
        // older epoch and is detected as stale, never the reverse.
        let epoch = self.session.epoch();

        let handle = self.session.create_subscription(interval, callback).await?;

        let mut watched = Vec::with_capacity(requested.len());
        let mut tokens = HashMap::with_capacity(requested.len());
        for node_id in &requested {
            match handle.watch(&NodeRef::new(node_id.clone())).await {
                Ok(token) => {
                    tokens.insert(node_id.clone(), token);
                    watched.push(node_id.clone());
                }
                Err(e) => {
                    warn!(node_id = %node_id, error = %e, "watch failed, skipping node");
                    self.stats.record_watch_failure();
                }
            }
        }

        self.stats.record_set_created();
        debug!(
            set_id = %id,
            epoch,
            interval = ?interval,
            watched = watched.len(),
            requested = requested.len(),
            "subscription set created"
        );

        Ok(SubscriptionSet {
            id,
            epoch,
            interval,
            requested,
            watched,
            tokens,
            handle,
            state,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::session::{SessionConfig, SessionManager};
    use crate::client::sim::SimTransport;
    use crate::client::transport::Transport;
    use tapline_core::error::TaplineError;
    use tapline_core::types::TagValue;

    struct FailingListener;

    #[async_trait]
    impl ChangeListener for FailingListener {
        async fn on_change(&self, _record: &ChangeRecord) -> SubscriptionResult<()> {
            Err(SubscriptionError::dispatch_failed("boom"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    async fn connected() -> (Arc<SimTransport>, Arc<SessionManager>, SubscriptionDispatcher) {
        let transport = Arc::new(SimTransport::new("sim://sub"));
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.add_node(None, "n2", "n2", TagValue::Int(0));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&transport) as Arc<dyn crate::client::transport::Transport>,
            SessionConfig::for_testing().with_auto_reconnect(false),
        ));
        session.connect().await.unwrap();
        let dispatcher = SubscriptionDispatcher::new(Arc::clone(&session));
        (transport, session, dispatcher)
    }

    fn nodes(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let (_t, _s, dispatcher) = connected().await;
        let (listener, _rx) = ChannelListener::channel(8);
        let err = dispatcher
            .create(0, &nodes(&["n1"]), Arc::new(listener))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaplineError::Subscription(SubscriptionError::InvalidInterval { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_node_set_is_inert_not_error() {
        let (_t, _s, dispatcher) = connected().await;
        let (listener, _rx) = ChannelListener::channel(8);
        let set = dispatcher.create(100, &[], Arc::new(listener)).await.unwrap();
        assert!(set.is_inert());
        assert!(!set.is_stale());
    }

    #[tokio::test]
    async fn test_duplicate_nodes_ignored() {
        let (_t, _s, dispatcher) = connected().await;
        let (listener, _rx) = ChannelListener::channel(8);
        let set = dispatcher
            .create(100, &nodes(&["n1", "n2", "n1"]), Arc::new(listener))
            .await
            .unwrap();
        assert_eq!(set.requested_nodes(), &["n1", "n2"]);
        assert_eq!(set.watched_nodes().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_delivers_normalized_records() {
        let (transport, _s, dispatcher) = connected().await;
        let (listener, mut rx) = ChannelListener::channel(8);
        let _set = dispatcher
            .create(100, &nodes(&["n1"]), Arc::new(listener))
            .await
            .unwrap();

        transport.set_value("n1", TagValue::Int(7)).await.unwrap();

        let record = rx.recv().await.unwrap();
        assert_eq!(record.node_id, "n1");
        assert_eq!(record.value, TagValue::Int(7));
        assert_eq!(dispatcher.stats().notifications(), 1);
        assert_eq!(dispatcher.stats().dispatched(), 1);
    }

    #[tokio::test]
    async fn test_unwatched_node_not_delivered() {
        let (transport, _s, dispatcher) = connected().await;
        let (listener, mut rx) = ChannelListener::channel(8);
        let _set = dispatcher
            .create(100, &nodes(&["n1"]), Arc::new(listener))
            .await
            .unwrap();

        transport.set_value("n2", TagValue::Int(1)).await.unwrap();
        transport.set_value("n1", TagValue::Int(2)).await.unwrap();

        // Only the watched node comes through.
        let record = rx.recv().await.unwrap();
        assert_eq!(record.node_id, "n1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_others() {
        let (transport, _s, dispatcher) = connected().await;
        let (listener, mut rx) = ChannelListener::channel(8);
        let set = dispatcher
            .create(100, &nodes(&["n1"]), Arc::new(FailingListener))
            .await
            .unwrap();
        set.add_listener(Arc::new(listener)).await;

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        transport.set_value("n1", TagValue::Int(2)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().value, TagValue::Int(1));
        assert_eq!(rx.recv().await.unwrap().value, TagValue::Int(2));
        assert_eq!(dispatcher.stats().listener_errors(), 2);
        assert_eq!(dispatcher.stats().dispatched(), 2);
    }

    #[tokio::test]
    async fn test_stale_set_drops_deliveries() {
        let (transport, _s, dispatcher) = connected().await;
        let (listener, mut rx) = ChannelListener::channel(8);
        let set = dispatcher
            .create(100, &nodes(&["n1"]), Arc::new(listener))
            .await
            .unwrap();

        set.invalidate();
        transport.set_value("n1", TagValue::Int(9)).await.unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.stats().stale_drops(), 1);
        assert_eq!(dispatcher.stats().notifications(), 0);
    }

    #[tokio::test]
    async fn test_watch_failure_skips_node_keeps_rest() {
        let (transport, _s, dispatcher) = connected().await;
        transport.fail_watch_for("n1");

        let (listener, mut rx) = ChannelListener::channel(8);
        let set = dispatcher
            .create(100, &nodes(&["n1", "n2"]), Arc::new(listener))
            .await
            .unwrap();

        assert_eq!(set.watched_nodes(), &["n2"]);
        assert_eq!(dispatcher.stats().watch_failures(), 1);

        transport.set_value("n2", TagValue::Bool(true)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().node_id, "n2");
    }

    #[tokio::test]
    async fn test_epoch_staleness_and_recreate() {
        let (transport, session, dispatcher) = connected().await;
        let (listener, mut rx) = ChannelListener::channel(8);
        let set = dispatcher
            .create(100, &nodes(&["n1"]), Arc::new(listener))
            .await
            .unwrap();
        assert!(!set.is_stale_for(session.epoch()));

        // Reconnect invalidates the native subscription.
        session.connect().await.unwrap();
        assert!(set.is_stale_for(session.epoch()));

        let rebuilt = dispatcher.recreate(&set).await.unwrap();
        assert!(set.is_stale());
        assert!(!rebuilt.is_stale_for(session.epoch()));
        assert_eq!(rebuilt.requested_nodes(), set.requested_nodes());

        transport.set_value("n1", TagValue::Int(3)).await.unwrap();
        let record = rx.recv().await.unwrap();
        assert_eq!(record.value, TagValue::Int(3));
    }

    #[tokio::test]
    async fn test_normalize_fallbacks() {
        let record = normalize(RawChange::unresolved("<handle 7>", serde_json::json!("fast")));
        assert_eq!(record.node_id, "<handle 7>");
        assert_eq!(record.value, TagValue::Str("fast".to_string()));
        // No server timestamps: best_time falls back to observed_time.
        assert_eq!(record.best_time(), record.observed_time);
    }

    #[tokio::test]
    async fn test_broadcast_listener_fan_out() {
        let listener = BroadcastListener::new(16);
        let mut rx1 = listener.subscribe();
        let mut rx2 = listener.subscribe();

        let record = ChangeRecord::new("n1", TagValue::Int(5));
        listener.on_change(&record).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().node_id, "n1");
        assert_eq!(rx2.recv().await.unwrap().node_id, "n1");
    }
}
