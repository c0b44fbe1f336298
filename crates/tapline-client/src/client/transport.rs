// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport abstraction for industrial server connections.
//!
//! The transport is an opaque capability: it knows how to reach one
//! endpoint, resolve nodes, move values, and hand out native
//! subscriptions. Everything above it (session lifecycle, dispatch,
//! the historian) is written against this trait, so the same stack
//! runs unchanged over the in-memory [`SimTransport`] used by tests
//! and demos.
//!
//! [`SimTransport`]: crate::client::sim::SimTransport
//!
//! # Thread Safety
//!
//! Implementations use interior mutability; every method takes `&self`
//! so consumers can share the transport as `Arc<dyn Transport>`. The
//! session manager serializes connect/disconnect against in-flight
//! operations, so implementations do not need their own coarse lock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tapline_core::error::TransportResult;
use tapline_core::types::{NodeRef, SecuritySettings, TagValue};

// =============================================================================
// WatchToken
// =============================================================================

/// Token identifying one per-node watch inside a native subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchToken(u64);

impl WatchToken {
    /// Creates a new watch token.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw token value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

impl From<u64> for WatchToken {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// =============================================================================
// RawChange
// =============================================================================

/// A change notification as the transport delivers it, before
/// normalization.
///
/// `node_id` may be absent when the server did not resolve the
/// originating node; `display` then carries a best-effort string
/// rendering of the native handle. Timestamps are optional because not
/// every server stamps its notifications.
#[derive(Debug, Clone)]
pub struct RawChange {
    /// Resolved node identifier, when available.
    pub node_id: Option<String>,

    /// Fallback rendering of the native node handle.
    pub display: String,

    /// The raw value, still in the transport's variant shape.
    pub value: serde_json::Value,

    /// Timestamp assigned at the data source.
    pub source_time: Option<DateTime<Utc>>,

    /// Timestamp assigned by the server.
    pub server_time: Option<DateTime<Utc>>,
}

impl RawChange {
    /// Creates a change with a resolved node id and no timestamps.
    pub fn new(node_id: impl Into<String>, value: serde_json::Value) -> Self {
        let node_id = node_id.into();
        Self {
            display: node_id.clone(),
            node_id: Some(node_id),
            value,
            source_time: None,
            server_time: None,
        }
    }

    /// Creates a change where only the display fallback is known.
    pub fn unresolved(display: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            node_id: None,
            display: display.into(),
            value,
            source_time: None,
            server_time: None,
        }
    }

    /// Sets the source timestamp.
    pub fn with_source_time(mut self, time: DateTime<Utc>) -> Self {
        self.source_time = Some(time);
        self
    }

    /// Sets the server timestamp.
    pub fn with_server_time(mut self, time: DateTime<Utc>) -> Self {
        self.server_time = Some(time);
        self
    }
}

// =============================================================================
// ChangeCallback
// =============================================================================

/// Receiver for raw change notifications.
///
/// Invoked by the transport on its own delivery task. Implementations
/// must not panic and should return quickly; anything slow belongs
/// behind a channel.
#[async_trait]
pub trait ChangeCallback: Send + Sync {
    /// Handles one raw change notification.
    async fn on_raw_change(&self, change: RawChange);
}

// =============================================================================
// SubscriptionHandle
// =============================================================================

/// Handle to one native subscription on a live connection.
///
/// A handle is only valid for the connection it was created on.
/// After a reconnect it must be discarded and re-created; its watch
/// tokens must not be reused against the new connection.
#[async_trait]
pub trait SubscriptionHandle: Send + Sync {
    /// Registers a watch on one node. Changes to the node's value are
    /// delivered to the subscription's callback.
    async fn watch(&self, node: &NodeRef) -> TransportResult<WatchToken>;

    /// Removes a previously registered watch.
    async fn unwatch(&self, token: WatchToken) -> TransportResult<()>;

    /// Cancels the subscription and all of its watches.
    async fn cancel(&self) -> TransportResult<()>;

    /// Returns the server-assigned subscription id.
    fn id(&self) -> u32;
}

// =============================================================================
// Transport
// =============================================================================

/// Object-safe connection capability for one endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the connection.
    async fn connect(&self) -> TransportResult<()>;

    /// Tears the connection down. Native subscriptions created on this
    /// connection become invalid.
    async fn disconnect(&self) -> TransportResult<()>;

    /// Returns the endpoint address, for logs.
    fn endpoint(&self) -> &str;

    /// Returns the root of the server's address space.
    async fn get_root(&self) -> TransportResult<NodeRef>;

    /// Resolves a node by identifier.
    async fn get_node(&self, node_id: &str) -> TransportResult<NodeRef>;

    /// Lists the direct children of a node.
    async fn browse_children(&self, node_id: &str) -> TransportResult<Vec<NodeRef>>;

    /// Reads a node's current value.
    async fn get_value(&self, node_id: &str) -> TransportResult<TagValue>;

    /// Writes a node's value.
    async fn set_value(&self, node_id: &str, value: TagValue) -> TransportResult<()>;

    /// Creates a native subscription publishing at the given interval.
    async fn create_subscription(
        &self,
        interval: Duration,
        callback: Arc<dyn ChangeCallback>,
    ) -> TransportResult<Box<dyn SubscriptionHandle>>;

    /// Applies security settings ahead of `connect`.
    ///
    /// The default implementation accepts anything and does nothing;
    /// transports with a real security layer override it.
    async fn configure_security(&self, settings: &SecuritySettings) -> TransportResult<()> {
        let _ = settings;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_token_display() {
        let token = WatchToken::new(7);
        assert_eq!(token.to_string(), "watch-7");
        assert_eq!(token.value(), 7);
        assert_eq!(WatchToken::from(7), token);
    }

    #[test]
    fn test_raw_change_resolved() {
        let change = RawChange::new("ns=2;s=Temp", serde_json::json!(21.5));
        assert_eq!(change.node_id.as_deref(), Some("ns=2;s=Temp"));
        assert_eq!(change.display, "ns=2;s=Temp");
        assert!(change.source_time.is_none());
    }

    #[test]
    fn test_raw_change_unresolved_keeps_display() {
        let change = RawChange::unresolved("<handle 0x3f>", serde_json::json!(1));
        assert!(change.node_id.is_none());
        assert_eq!(change.display, "<handle 0x3f>");
    }

    #[test]
    fn test_raw_change_timestamps() {
        let now = Utc::now();
        let change = RawChange::new("n1", serde_json::json!(0))
            .with_source_time(now)
            .with_server_time(now);
        assert_eq!(change.source_time, Some(now));
        assert_eq!(change.server_time, Some(now));
    }
}
