// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory transport simulator.
//!
//! [`SimTransport`] implements the full [`Transport`] contract against
//! a process-local address space, so session, subscription, and
//! pipeline code can be exercised without a live server. Writes are
//! delivered to watchers synchronously: when `set_value` returns, every
//! watching callback has already run.
//!
//! Fault injection is explicit. [`SimTransport::break_link`] drops the
//! link and the connection with it, so probes fail until a new connect
//! succeeds after [`SimTransport::restore_link`]. Per-node watch
//! rejection and security rejection have their own knobs.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tapline_client::client::sim::SimTransport;
//! use tapline_core::TagValue;
//!
//! let transport = SimTransport::new("sim://plant");
//! transport.add_node(None, "ns=2;s=Line1", "Line1", TagValue::Null);
//! transport.connect().await?;
//! transport.set_value("ns=2;s=Line1", TagValue::Float(21.5)).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use tapline_core::error::{TransportError, TransportResult};
use tapline_core::types::{NodeRef, SecuritySettings, TagValue};

use crate::client::transport::{
    ChangeCallback, RawChange, SubscriptionHandle, Transport, WatchToken,
};

/// Node id of the simulated address space root.
pub const ROOT_NODE_ID: &str = "root";

// =============================================================================
// Address Space
// =============================================================================

#[derive(Debug, Clone)]
struct SimNode {
    browse_name: String,
    value: TagValue,
    children: Vec<String>,
}

struct SimSubscriptionState {
    id: u32,
    callback: Arc<dyn ChangeCallback>,
    // token value -> watched node id
    watches: RwLock<HashMap<u64, String>>,
    active: AtomicBool,
}

struct SimShared {
    endpoint: String,
    connected: AtomicBool,
    link_up: AtomicBool,
    reject_security: AtomicBool,
    emit_timestamps: AtomicBool,
    nodes: RwLock<HashMap<String, SimNode>>,
    subscriptions: RwLock<HashMap<u32, Arc<SimSubscriptionState>>>,
    fail_watch: RwLock<HashSet<String>>,
    next_subscription_id: AtomicU32,
    next_token: AtomicU64,
}

impl SimShared {
    fn ensure_online(&self) -> TransportResult<()> {
        if !self.link_up.load(Ordering::SeqCst) {
            return Err(TransportError::unavailable("link down"));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    fn drop_subscriptions(&self) {
        let mut subs = self.subscriptions.write();
        for sub in subs.values() {
            sub.active.store(false, Ordering::SeqCst);
        }
        subs.clear();
    }
}

// =============================================================================
// SimTransport
// =============================================================================

/// Simulated transport backed by an in-memory node tree.
///
/// All control-plane methods (`add_node`, `break_link`, the fault
/// knobs) take `&self` and can be called from tests while a session
/// owns the transport through the trait object.
pub struct SimTransport {
    shared: Arc<SimShared>,
}

impl SimTransport {
    /// Creates a simulator with an empty address space under
    /// [`ROOT_NODE_ID`].
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_NODE_ID.to_string(),
            SimNode {
                browse_name: "Root".to_string(),
                value: TagValue::Null,
                children: Vec::new(),
            },
        );
        Self {
            shared: Arc::new(SimShared {
                endpoint: endpoint.into(),
                connected: AtomicBool::new(false),
                link_up: AtomicBool::new(true),
                reject_security: AtomicBool::new(false),
                emit_timestamps: AtomicBool::new(true),
                nodes: RwLock::new(nodes),
                subscriptions: RwLock::new(HashMap::new()),
                fail_watch: RwLock::new(HashSet::new()),
                next_subscription_id: AtomicU32::new(1),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Adds a node under `parent` (the root when `None`). An unknown
    /// parent falls back to the root. Re-adding an existing id updates
    /// its name and value but keeps its children.
    pub fn add_node(&self, parent: Option<&str>, id: &str, browse_name: &str, value: TagValue) {
        let mut nodes = self.shared.nodes.write();
        if let Some(existing) = nodes.get_mut(id) {
            existing.browse_name = browse_name.to_string();
            existing.value = value;
            return;
        }
        nodes.insert(
            id.to_string(),
            SimNode {
                browse_name: browse_name.to_string(),
                value,
                children: Vec::new(),
            },
        );
        let parent_id = match parent {
            Some(p) if nodes.contains_key(p) => p,
            _ => ROOT_NODE_ID,
        };
        if let Some(parent_node) = nodes.get_mut(parent_id) {
            parent_node.children.push(id.to_string());
        }
    }

    /// Severs the link. The connection dies with it: every operation
    /// fails until the link is restored and a new connect succeeds,
    /// and all watchers are gone.
    pub fn break_link(&self) {
        self.shared.link_up.store(false, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.drop_subscriptions();
        debug!(endpoint = %self.shared.endpoint, "sim link broken");
    }

    /// Restores the link. Does not reconnect; callers must connect
    /// again.
    pub fn restore_link(&self) {
        self.shared.link_up.store(true, Ordering::SeqCst);
        debug!(endpoint = %self.shared.endpoint, "sim link restored");
    }

    /// Returns `true` while a connection is established.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Makes every `watch` on `node_id` fail.
    pub fn fail_watch_for(&self, node_id: &str) {
        self.shared.fail_watch.write().insert(node_id.to_string());
    }

    /// Makes `configure_security` reject the next settings.
    pub fn set_reject_security(&self, reject: bool) {
        self.shared.reject_security.store(reject, Ordering::SeqCst);
    }

    /// Controls whether deliveries carry source and server timestamps.
    /// Disabling them exercises the observed-time fallback downstream.
    pub fn set_emit_timestamps(&self, emit: bool) {
        self.shared.emit_timestamps.store(emit, Ordering::SeqCst);
    }

    /// Returns the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.read().len()
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn connect(&self) -> TransportResult<()> {
        if !self.shared.link_up.load(Ordering::SeqCst) {
            return Err(TransportError::unavailable("link down"));
        }
        // A fresh connection starts with no watchers.
        self.shared.drop_subscriptions();
        self.shared.connected.store(true, Ordering::SeqCst);
        debug!(endpoint = %self.shared.endpoint, "sim connected");
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.drop_subscriptions();
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    async fn get_root(&self) -> TransportResult<NodeRef> {
        self.shared.ensure_online()?;
        Ok(NodeRef::with_browse_name(ROOT_NODE_ID, "Root"))
    }

    async fn get_node(&self, node_id: &str) -> TransportResult<NodeRef> {
        self.shared.ensure_online()?;
        let nodes = self.shared.nodes.read();
        let node = nodes
            .get(node_id)
            .ok_or_else(|| TransportError::node_not_found(node_id))?;
        Ok(NodeRef::with_browse_name(node_id, node.browse_name.clone()))
    }

    async fn browse_children(&self, node_id: &str) -> TransportResult<Vec<NodeRef>> {
        self.shared.ensure_online()?;
        let nodes = self.shared.nodes.read();
        let node = nodes
            .get(node_id)
            .ok_or_else(|| TransportError::node_not_found(node_id))?;
        Ok(node
            .children
            .iter()
            .filter_map(|child_id| {
                nodes.get(child_id).map(|child| {
                    NodeRef::with_browse_name(child_id.clone(), child.browse_name.clone())
                })
            })
            .collect())
    }

    async fn get_value(&self, node_id: &str) -> TransportResult<TagValue> {
        self.shared.ensure_online()?;
        let nodes = self.shared.nodes.read();
        nodes
            .get(node_id)
            .map(|node| node.value.clone())
            .ok_or_else(|| TransportError::node_not_found(node_id))
    }

    async fn set_value(&self, node_id: &str, value: TagValue) -> TransportResult<()> {
        self.shared.ensure_online()?;
        {
            let mut nodes = self.shared.nodes.write();
            if let Some(node) = nodes.get_mut(node_id) {
                node.value = value.clone();
            } else {
                // Unknown ids are created on write, as children of the
                // root, so tests can drive values without fixtures.
                nodes.insert(
                    node_id.to_string(),
                    SimNode {
                        browse_name: node_id.to_string(),
                        value: value.clone(),
                        children: Vec::new(),
                    },
                );
                if let Some(root) = nodes.get_mut(ROOT_NODE_ID) {
                    root.children.push(node_id.to_string());
                }
            }
        }

        let mut change = RawChange::new(node_id, value.to_json());
        if self.shared.emit_timestamps.load(Ordering::SeqCst) {
            let now = Utc::now();
            change = change.with_source_time(now).with_server_time(now);
        }

        let callbacks: Vec<Arc<dyn ChangeCallback>> = {
            let subs = self.shared.subscriptions.read();
            subs.values()
                .filter(|sub| {
                    sub.active.load(Ordering::SeqCst)
                        && sub.watches.read().values().any(|watched| watched == node_id)
                })
                .map(|sub| Arc::clone(&sub.callback))
                .collect()
        };
        for callback in callbacks {
            callback.on_raw_change(change.clone()).await;
        }
        Ok(())
    }

    async fn create_subscription(
        &self,
        interval: Duration,
        callback: Arc<dyn ChangeCallback>,
    ) -> TransportResult<Box<dyn SubscriptionHandle>> {
        self.shared.ensure_online()?;
        let id = self.shared.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(SimSubscriptionState {
            id,
            callback,
            watches: RwLock::new(HashMap::new()),
            active: AtomicBool::new(true),
        });
        self.shared
            .subscriptions
            .write()
            .insert(id, Arc::clone(&state));
        debug!(subscription_id = id, ?interval, "sim subscription created");
        Ok(Box::new(SimSubscriptionHandle {
            shared: Arc::clone(&self.shared),
            state,
        }))
    }

    async fn configure_security(&self, settings: &SecuritySettings) -> TransportResult<()> {
        if self.shared.reject_security.load(Ordering::SeqCst) {
            return Err(TransportError::security_rejected(format!(
                "policy {} not supported by simulator",
                settings.policy
            )));
        }
        debug!(policy = %settings.policy, "sim security configured");
        Ok(())
    }
}

impl std::fmt::Debug for SimTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimTransport")
            .field("endpoint", &self.shared.endpoint)
            .field("connected", &self.is_connected())
            .field("link_up", &self.shared.link_up.load(Ordering::SeqCst))
            .field("nodes", &self.shared.nodes.read().len())
            .finish()
    }
}

// =============================================================================
// SimSubscriptionHandle
// =============================================================================

struct SimSubscriptionHandle {
    shared: Arc<SimShared>,
    state: Arc<SimSubscriptionState>,
}

#[async_trait]
impl SubscriptionHandle for SimSubscriptionHandle {
    async fn watch(&self, node: &NodeRef) -> TransportResult<WatchToken> {
        self.shared.ensure_online()?;
        if !self.state.active.load(Ordering::SeqCst) {
            return Err(TransportError::subscribe_failed("subscription cancelled"));
        }
        if self.shared.fail_watch.read().contains(node.id()) {
            return Err(TransportError::watch_failed(node.id(), "watch rejected"));
        }
        if !self.shared.nodes.read().contains_key(node.id()) {
            return Err(TransportError::node_not_found(node.id()));
        }
        let token = WatchToken::new(self.shared.next_token.fetch_add(1, Ordering::SeqCst));
        self.state
            .watches
            .write()
            .insert(token.value(), node.id().to_string());
        Ok(token)
    }

    async fn unwatch(&self, token: WatchToken) -> TransportResult<()> {
        self.state.watches.write().remove(&token.value());
        Ok(())
    }

    async fn cancel(&self) -> TransportResult<()> {
        self.state.active.store(false, Ordering::SeqCst);
        self.state.watches.write().clear();
        self.shared.subscriptions.write().remove(&self.state.id);
        Ok(())
    }

    fn id(&self) -> u32 {
        self.state.id
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<RawChange>>,
    }

    #[async_trait]
    impl ChangeCallback for Recorder {
        async fn on_raw_change(&self, change: RawChange) {
            self.seen.lock().push(change);
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<RawChange> {
            std::mem::take(&mut self.seen.lock())
        }
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let transport = SimTransport::new("sim://test");
        assert!(matches!(
            transport.get_value("root").await,
            Err(TransportError::NotConnected)
        ));

        transport.connect().await.unwrap();
        assert_eq!(transport.get_root().await.unwrap().id(), ROOT_NODE_ID);
    }

    #[tokio::test]
    async fn test_connect_fails_while_link_down() {
        let transport = SimTransport::new("sim://test");
        transport.break_link();
        assert!(transport.connect().await.is_err());

        transport.restore_link();
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_break_link_kills_connection() {
        let transport = SimTransport::new("sim://test");
        transport.connect().await.unwrap();
        transport.break_link();

        assert!(!transport.is_connected());
        assert!(transport.get_root().await.is_err());

        // Restoring the link is not enough; a new connect is needed.
        transport.restore_link();
        assert!(transport.get_root().await.is_err());
        transport.connect().await.unwrap();
        assert!(transport.get_root().await.is_ok());
    }

    #[tokio::test]
    async fn test_write_auto_creates_node_under_root() {
        let transport = SimTransport::new("sim://test");
        transport.connect().await.unwrap();

        transport
            .set_value("ns=2;s=New", TagValue::Int(3))
            .await
            .unwrap();

        assert_eq!(
            transport.get_value("ns=2;s=New").await.unwrap(),
            TagValue::Int(3)
        );
        let children = transport.browse_children(ROOT_NODE_ID).await.unwrap();
        assert!(children.iter().any(|n| n.id() == "ns=2;s=New"));
    }

    #[tokio::test]
    async fn test_browse_children_in_insertion_order() {
        let transport = SimTransport::new("sim://test");
        transport.add_node(None, "b", "B", TagValue::Null);
        transport.add_node(None, "a", "A", TagValue::Null);
        transport.add_node(Some("a"), "a.x", "X", TagValue::Null);
        transport.connect().await.unwrap();

        let children = transport.browse_children(ROOT_NODE_ID).await.unwrap();
        let ids: Vec<&str> = children.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let under_a = transport.browse_children("a").await.unwrap();
        assert_eq!(under_a.len(), 1);
        assert_eq!(under_a[0].browse_name(), Some("X"));
    }

    #[tokio::test]
    async fn test_watch_delivers_only_watched_nodes() {
        let transport = SimTransport::new("sim://test");
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.add_node(None, "n2", "n2", TagValue::Int(0));
        transport.connect().await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let handle = transport
            .create_subscription(Duration::from_millis(100), Arc::clone(&recorder) as _)
            .await
            .unwrap();
        handle.watch(&NodeRef::new("n1")).await.unwrap();

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        transport.set_value("n2", TagValue::Int(2)).await.unwrap();

        let seen = recorder.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].node_id.as_deref(), Some("n1"));
        assert_eq!(seen[0].value, serde_json::json!(1));
        assert!(seen[0].source_time.is_some());
    }

    #[tokio::test]
    async fn test_unwatch_stops_delivery() {
        let transport = SimTransport::new("sim://test");
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.connect().await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let handle = transport
            .create_subscription(Duration::from_millis(100), Arc::clone(&recorder) as _)
            .await
            .unwrap();
        let token = handle.watch(&NodeRef::new("n1")).await.unwrap();
        handle.unwatch(token).await.unwrap();

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        assert!(recorder.take().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_removes_subscription() {
        let transport = SimTransport::new("sim://test");
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.connect().await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let handle = transport
            .create_subscription(Duration::from_millis(100), Arc::clone(&recorder) as _)
            .await
            .unwrap();
        handle.watch(&NodeRef::new("n1")).await.unwrap();
        handle.cancel().await.unwrap();

        assert_eq!(transport.subscription_count(), 0);
        assert!(handle.watch(&NodeRef::new("n1")).await.is_err());
        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        assert!(recorder.take().is_empty());
    }

    #[tokio::test]
    async fn test_fail_watch_knob() {
        let transport = SimTransport::new("sim://test");
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.connect().await.unwrap();
        transport.fail_watch_for("n1");

        let handle = transport
            .create_subscription(Duration::from_millis(100), Arc::new(Recorder::default()) as _)
            .await
            .unwrap();
        assert!(matches!(
            handle.watch(&NodeRef::new("n1")).await,
            Err(TransportError::WatchFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_timestamps_can_be_suppressed() {
        let transport = SimTransport::new("sim://test");
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.connect().await.unwrap();
        transport.set_emit_timestamps(false);

        let recorder = Arc::new(Recorder::default());
        let handle = transport
            .create_subscription(Duration::from_millis(100), Arc::clone(&recorder) as _)
            .await
            .unwrap();
        handle.watch(&NodeRef::new("n1")).await.unwrap();

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        let seen = recorder.take();
        assert!(seen[0].source_time.is_none());
        assert!(seen[0].server_time.is_none());
    }

    #[tokio::test]
    async fn test_security_rejection_knob() {
        let transport = SimTransport::new("sim://test");
        let settings = SecuritySettings::new("Basic256Sha256", "/tls/cert.der", "/tls/key.pem");
        transport.configure_security(&settings).await.unwrap();

        transport.set_reject_security(true);
        assert!(matches!(
            transport.configure_security(&settings).await,
            Err(TransportError::SecurityRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_security_failure_then_unsecured_connect() {
        let transport = SimTransport::new("sim://test");
        transport.set_reject_security(true);

        assert!(transport
            .configure_security(&SecuritySettings::new("Basic256", "/c", "/k"))
            .await
            .is_err());
        // The connection itself still comes up.
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
    }
}
