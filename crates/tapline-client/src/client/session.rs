// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle management.
//!
//! The [`SessionManager`] owns exactly one transport and drives it
//! through connect, liveness monitoring, reconnection, and disconnect.
//! Each successful connect bumps the session epoch; subscriptions
//! record the epoch they were created under, which is how stale
//! handles are detected after a reconnect.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       SessionManager                            │
//! │        connect / disconnect / is_alive / read / write           │
//! └─────────────────────────────────────────────────────────────────┘
//!               │                                │
//!               ▼                                ▼
//! ┌───────────────────────────┐   ┌───────────────────────────────┐
//! │     Liveness monitor      │   │     SessionEvent broadcast    │
//! │  (probe every interval,   │   │  Connected / ConnectionLost / │
//! │   reconnect on failure)   │   │  Reconnected / Disconnected   │
//! └───────────────────────────┘   └───────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tapline_client::client::{SessionConfig, SessionManager};
//! use tapline_client::client::sim::SimTransport;
//!
//! let transport = Arc::new(SimTransport::new("sim://demo"));
//! let session = Arc::new(SessionManager::new(transport, SessionConfig::default()));
//!
//! session.connect().await?;
//! let value = session.read_value("ns=2;s=Temp").await?;
//! session.disconnect().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tapline_core::error::TransportResult;
use tapline_core::types::{NodeRef, SecuritySettings, SessionState, TagValue};

use crate::browse::{self, BrowseNode};
use crate::client::transport::{ChangeCallback, SubscriptionHandle, Transport};

// =============================================================================
// SessionConfig
// =============================================================================

fn default_auto_reconnect() -> bool {
    true
}

fn default_liveness_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Behavioral settings for a session.
///
/// The endpoint itself belongs to the transport; this struct only
/// carries how the session is driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Security triple applied before connecting, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySettings>,

    /// Whether the liveness monitor runs after a successful connect.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Probe cadence of the liveness monitor.
    #[serde(
        with = "tapline_core::serde_duration_secs",
        default = "default_liveness_interval"
    )]
    pub liveness_interval: Duration,

    /// Bound on waiting for the monitor to exit during disconnect.
    #[serde(
        with = "tapline_core::serde_duration_millis",
        default = "default_stop_timeout"
    )]
    pub stop_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            security: None,
            auto_reconnect: default_auto_reconnect(),
            liveness_interval: default_liveness_interval(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

impl SessionConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a config with short intervals for tests.
    pub fn for_testing() -> Self {
        Self {
            security: None,
            auto_reconnect: true,
            liveness_interval: Duration::from_millis(50),
            stop_timeout: Duration::from_millis(250),
        }
    }

    /// Sets the security triple.
    pub fn with_security(mut self, security: SecuritySettings) -> Self {
        self.security = Some(security);
        self
    }

    /// Enables or disables the liveness monitor.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Sets the probe cadence.
    pub fn with_liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval;
        self
    }
}

// =============================================================================
// SessionEvent
// =============================================================================

/// Lifecycle events broadcast to session observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// First successful connect of this manager, or a fresh explicit
    /// connect after a disconnect.
    Connected {
        /// Epoch assigned to the new connection.
        epoch: u64,
    },

    /// The liveness monitor recovered a lost connection. Subscription
    /// owners must rebuild their subscription sets.
    Reconnected {
        /// Epoch assigned to the new connection.
        epoch: u64,
    },

    /// A liveness probe failed on a previously connected session.
    ConnectionLost,

    /// Explicit disconnect completed.
    Disconnected,
}

// =============================================================================
// SessionStats
// =============================================================================

/// Atomic counters for session lifecycle activity.
#[derive(Debug, Default)]
pub struct SessionStats {
    connects: AtomicU64,
    reconnects: AtomicU64,
    disconnects: AtomicU64,
    failed_connects: AtomicU64,
    failed_probes: AtomicU64,
    last_connected: parking_lot::RwLock<Option<DateTime<Utc>>>,
}

impl SessionStats {
    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
        *self.last_connected.write() = Some(Utc::now());
    }

    fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        *self.last_connected.write() = Some(Utc::now());
    }

    fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed_connect(&self) {
        self.failed_connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed_probe(&self) {
        self.failed_probes.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of successful explicit connects.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of monitor-driven reconnects.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Returns the number of completed disconnects.
    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed connect attempts.
    pub fn failed_connects(&self) -> u64 {
        self.failed_connects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed liveness probes.
    pub fn failed_probes(&self) -> u64 {
        self.failed_probes.load(Ordering::Relaxed)
    }

    /// Takes a serializable snapshot.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            connects: self.connects(),
            reconnects: self.reconnects(),
            disconnects: self.disconnects(),
            failed_connects: self.failed_connects(),
            failed_probes: self.failed_probes(),
            last_connected: *self.last_connected.read(),
        }
    }
}

/// Point-in-time view of [`SessionStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    /// Successful explicit connects.
    pub connects: u64,
    /// Monitor-driven reconnects.
    pub reconnects: u64,
    /// Completed disconnects.
    pub disconnects: u64,
    /// Failed connect attempts.
    pub failed_connects: u64,
    /// Failed liveness probes.
    pub failed_probes: u64,
    /// When the session last connected.
    pub last_connected: Option<DateTime<Utc>>,
}

/// Serializable session status for the presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Endpoint address.
    pub endpoint: String,
    /// Current lifecycle state.
    pub state: String,
    /// Current session epoch (0 before the first connect).
    pub epoch: u64,
    /// Lifecycle counters.
    pub stats: SessionStatsSnapshot,
}

// =============================================================================
// SessionManager
// =============================================================================

struct MonitorHandle {
    task: JoinHandle<()>,
    stop: Arc<Notify>,
}

/// Owns one transport and drives its lifecycle.
///
/// # Thread Safety
///
/// All methods take `&self`; the manager is meant to be shared as
/// `Arc<SessionManager>`. Connect and disconnect take the operation
/// gate exclusively, so they never interleave with an in-flight
/// read/write/browse on the old connection.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    epoch: AtomicU64,
    /// Reads/writes/browses take this shared; connect/disconnect take
    /// it exclusively.
    op_gate: RwLock<()>,
    events: broadcast::Sender<SessionEvent>,
    monitor: Mutex<Option<MonitorHandle>>,
    stats: Arc<SessionStats>,
}

impl SessionManager {
    /// Creates a manager for the given transport.
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            transport,
            config,
            state: RwLock::new(SessionState::Disconnected),
            epoch: AtomicU64::new(0),
            op_gate: RwLock::new(()),
            events,
            monitor: Mutex::new(None),
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Returns the endpoint address.
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Returns the current session epoch.
    ///
    /// The epoch is bumped on every successful connect; a subscription
    /// created under an older epoch is stale.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Returns the lifecycle counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Returns a serializable status view.
    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            endpoint: self.transport.endpoint().to_string(),
            state: self.state().await.to_string(),
            epoch: self.epoch(),
            stats: self.stats.snapshot(),
        }
    }

    /// Establishes the session.
    ///
    /// Any existing connection is torn down first (best-effort). When
    /// the config carries a full security triple it is applied before
    /// connecting; application failure is logged and the connect
    /// proceeds unsecured. On success the epoch is bumped and, with
    /// `auto_reconnect` enabled, the liveness monitor starts.
    pub async fn connect(self: &Arc<Self>) -> TransportResult<()> {
        let epoch = self.connect_inner(false).await?;
        debug!(epoch, "connect complete");
        if self.config.auto_reconnect {
            self.ensure_monitor().await;
        }
        Ok(())
    }

    /// Tears the session down. Idempotent.
    ///
    /// Stops the liveness monitor first, waiting up to the configured
    /// bound for it to exit before aborting it, then disconnects the
    /// transport. Transport teardown errors are logged and swallowed
    /// since the connection is being discarded regardless.
    pub async fn disconnect(&self) {
        if let Some(mut monitor) = self.monitor.lock().await.take() {
            monitor.stop.notify_one();
            if tokio::time::timeout(self.config.stop_timeout, &mut monitor.task)
                .await
                .is_err()
            {
                warn!(
                    timeout = ?self.config.stop_timeout,
                    "liveness monitor did not exit in time, aborting"
                );
                monitor.task.abort();
            }
        }

        let _gate = self.op_gate.write().await;

        let was_connected = {
            let state = self.state.read().await;
            *state != SessionState::Disconnected
        };

        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "transport teardown failed, discarding handle anyway");
        }

        *self.state.write().await = SessionState::Disconnected;

        if was_connected {
            self.stats.record_disconnect();
            let _ = self.events.send(SessionEvent::Disconnected);
            info!(endpoint = self.transport.endpoint(), "session disconnected");
        }
    }

    /// Probes the connection by reading the address-space root.
    ///
    /// Returns `false` on any failure, including "not connected".
    pub async fn is_alive(&self) -> bool {
        let _gate = self.op_gate.read().await;
        self.transport.get_root().await.is_ok()
    }

    /// Reads a node's current value.
    pub async fn read_value(&self, node_id: &str) -> TransportResult<TagValue> {
        let _gate = self.op_gate.read().await;
        self.transport.get_value(node_id).await
    }

    /// Writes a node's value.
    pub async fn write_value(&self, node_id: &str, value: TagValue) -> TransportResult<()> {
        let _gate = self.op_gate.read().await;
        self.transport.set_value(node_id, value).await
    }

    /// Resolves a node by identifier.
    pub async fn get_node(&self, node_id: &str) -> TransportResult<NodeRef> {
        let _gate = self.op_gate.read().await;
        self.transport.get_node(node_id).await
    }

    /// Lists the direct children of a node, or of the root when
    /// `node_id` is `None`.
    pub async fn browse(&self, node_id: Option<&str>) -> TransportResult<Vec<NodeRef>> {
        let _gate = self.op_gate.read().await;
        browse::children(self.transport.as_ref(), node_id).await
    }

    /// Browses a subtree to a bounded depth.
    pub async fn browse_tree(
        &self,
        node_id: Option<&str>,
        max_depth: usize,
    ) -> TransportResult<BrowseNode> {
        let _gate = self.op_gate.read().await;
        browse::tree(self.transport.as_ref(), node_id, max_depth).await
    }

    /// Creates a native subscription on the live connection.
    pub async fn create_subscription(
        &self,
        interval: Duration,
        callback: Arc<dyn ChangeCallback>,
    ) -> TransportResult<Box<dyn SubscriptionHandle>> {
        let _gate = self.op_gate.read().await;
        self.transport.create_subscription(interval, callback).await
    }

    /// Connects, or reconnects, under the exclusive gate.
    ///
    /// Returns the new epoch. The gate is held for the whole attempt
    /// so no operation can observe a half-established connection; the
    /// monitor accepts this serialization as the cost of reconnecting.
    async fn connect_inner(&self, is_reconnect: bool) -> TransportResult<u64> {
        let _gate = self.op_gate.write().await;

        {
            let mut state = self.state.write().await;
            *state = if is_reconnect {
                SessionState::Reconnecting
            } else {
                SessionState::Connecting
            };
        }

        // Drop whatever handle remains from a previous attempt.
        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "teardown of previous handle failed, continuing");
        }

        if let Some(security) = self.config.security.as_ref() {
            match self.transport.configure_security(security).await {
                Ok(()) => info!(policy = %security.policy, "security configured"),
                Err(e) => {
                    warn!(error = %e, "security configuration failed, proceeding unsecured")
                }
            }
        }

        match self.transport.connect().await {
            Ok(()) => {
                let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                *self.state.write().await = SessionState::Connected;
                if is_reconnect {
                    self.stats.record_reconnect();
                    let _ = self.events.send(SessionEvent::Reconnected { epoch });
                } else {
                    self.stats.record_connect();
                    let _ = self.events.send(SessionEvent::Connected { epoch });
                }
                info!(endpoint = self.transport.endpoint(), epoch, "session connected");
                Ok(epoch)
            }
            Err(e) => {
                self.stats.record_failed_connect();
                let mut state = self.state.write().await;
                *state = if is_reconnect {
                    SessionState::Reconnecting
                } else {
                    SessionState::Disconnected
                };
                Err(e)
            }
        }
    }

    /// Starts the liveness monitor if it is not already running.
    async fn ensure_monitor(self: &Arc<Self>) {
        let mut slot = self.monitor.lock().await;
        if let Some(existing) = slot.as_ref() {
            if !existing.task.is_finished() {
                return;
            }
        }
        *slot = Some(self.spawn_monitor());
    }

    fn spawn_monitor(self: &Arc<Self>) -> MonitorHandle {
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let manager = Arc::clone(self);
        let period = self.config.liveness_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(interval = ?period, "liveness monitor started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if manager.is_alive().await {
                            continue;
                        }
                        manager.stats.record_failed_probe();

                        let lost_now = {
                            let mut state = manager.state.write().await;
                            let lost = *state == SessionState::Connected;
                            if lost {
                                *state = SessionState::Reconnecting;
                            }
                            lost
                        };
                        if lost_now {
                            warn!(
                                endpoint = manager.transport.endpoint(),
                                "liveness probe failed, link lost"
                            );
                            let _ = manager.events.send(SessionEvent::ConnectionLost);
                        }

                        match manager.connect_inner(true).await {
                            Ok(epoch) => info!(epoch, "reconnected"),
                            Err(e) => warn!(error = %e, "reconnect attempt failed"),
                        }
                    }
                    _ = stop_signal.notified() => {
                        debug!("liveness monitor stopping");
                        break;
                    }
                }
            }
        });

        MonitorHandle { task, stop }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoint", &self.transport.endpoint())
            .field("epoch", &self.epoch())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sim::SimTransport;
    use tapline_core::types::TagValue;

    fn manager(transport: Arc<SimTransport>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            transport,
            SessionConfig::for_testing().with_auto_reconnect(false),
        ))
    }

    #[tokio::test]
    async fn test_connect_sets_state_and_epoch() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = manager(transport);

        assert_eq!(session.state().await, SessionState::Disconnected);
        assert_eq!(session.epoch(), 0);

        session.connect().await.unwrap();
        assert_eq!(session.state().await, SessionState::Connected);
        assert_eq!(session.epoch(), 1);
        assert!(session.is_alive().await);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = manager(transport);

        session.connect().await.unwrap();
        session.disconnect().await;
        session.disconnect().await;

        assert_eq!(session.state().await, SessionState::Disconnected);
        assert!(!session.is_alive().await);
        assert_eq!(session.stats().disconnects(), 1);
    }

    #[tokio::test]
    async fn test_is_alive_tracks_last_operation() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = manager(Arc::clone(&transport));

        assert!(!session.is_alive().await);
        session.connect().await.unwrap();
        assert!(session.is_alive().await);
        session.disconnect().await;
        assert!(!session.is_alive().await);
        session.connect().await.unwrap();
        assert!(session.is_alive().await);

        transport.break_link();
        assert!(!session.is_alive().await);
    }

    #[tokio::test]
    async fn test_connect_fails_when_link_down() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        transport.break_link();
        let session = manager(transport);

        assert!(session.connect().await.is_err());
        assert_eq!(session.state().await, SessionState::Disconnected);
        assert_eq!(session.stats().failed_connects(), 1);
    }

    #[tokio::test]
    async fn test_monitor_reconnects_within_two_cycles() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            SessionConfig::for_testing(),
        ));
        let mut events = session.subscribe_events();

        session.connect().await.unwrap();
        assert_eq!(session.epoch(), 1);

        transport.break_link();
        // One cycle to notice, one to recover after the link returns.
        tokio::time::sleep(Duration::from_millis(75)).await;
        transport.restore_link();

        let deadline = Duration::from_millis(500);
        let reconnected = tokio::time::timeout(deadline, async {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Reconnected { epoch }) => break epoch,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("no reconnect within deadline");

        assert!(reconnected >= 2);
        assert!(session.is_alive().await);
        assert!(session.stats().reconnects() >= 1);
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_read_write_pass_through() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = manager(transport);
        session.connect().await.unwrap();

        session
            .write_value("ns=2;s=Setpoint", TagValue::Float(42.5))
            .await
            .unwrap();
        let value = session.read_value("ns=2;s=Setpoint").await.unwrap();
        assert_eq!(value, TagValue::Float(42.5));
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_operations_fail_when_disconnected() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = manager(transport);

        assert!(session.read_value("ns=2;s=Temp").await.is_err());
        assert!(session
            .write_value("ns=2;s=Temp", TagValue::Int(1))
            .await
            .is_err());
        assert!(session.browse(None).await.is_err());
    }

    #[tokio::test]
    async fn test_explicit_connect_emits_connected_event() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = manager(transport);
        let mut events = session.subscribe_events();

        session.connect().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected { epoch: 1 });

        session.disconnect().await;
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_bumps_epoch() {
        let transport = Arc::new(SimTransport::new("sim://test"));
        let session = manager(transport);

        session.connect().await.unwrap();
        assert_eq!(session.epoch(), 1);
        session.connect().await.unwrap();
        assert_eq!(session.epoch(), 2);
    }
}
