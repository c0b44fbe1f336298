// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builder patterns for constructing test objects with sensible
//! defaults. The [`StackBuilder`] wires a complete in-process stack
//! (simulated transport, session, historian, memory sink, registry)
//! the way `tapline run` does, scaled down for tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use tapline_api::{ApiConfig, AppState};
use tapline_client::{SessionConfig, SessionManager, SimTransport, Transport};
use tapline_config::ServerRegistry;
use tapline_core::retry::RetryPolicy;
use tapline_core::types::{ChangeRecord, TagValue};
use tapline_historian::{HistorianConfig, HistorianPipeline};
use tapline_store::{HistorySink, MemorySink};

// =============================================================================
// Record Builder
// =============================================================================

/// Builder for change records.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    node_id: Option<String>,
    value: Option<TagValue>,
    source_time: Option<DateTime<Utc>>,
    server_time: Option<DateTime<Utc>>,
    observed_time: Option<DateTime<Utc>>,
}

impl RecordBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the node id (required).
    pub fn node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Sets the value.
    pub fn value(mut self, value: TagValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets a float value.
    pub fn float_value(mut self, value: f64) -> Self {
        self.value = Some(TagValue::Float(value));
        self
    }

    /// Sets an integer value.
    pub fn int_value(mut self, value: i64) -> Self {
        self.value = Some(TagValue::Int(value));
        self
    }

    /// Sets a boolean value.
    pub fn bool_value(mut self, value: bool) -> Self {
        self.value = Some(TagValue::Bool(value));
        self
    }

    /// Sets the source timestamp.
    pub fn source_time(mut self, ts: DateTime<Utc>) -> Self {
        self.source_time = Some(ts);
        self
    }

    /// Sets the server timestamp.
    pub fn server_time(mut self, ts: DateTime<Utc>) -> Self {
        self.server_time = Some(ts);
        self
    }

    /// Sets the observation timestamp.
    pub fn observed_time(mut self, ts: DateTime<Utc>) -> Self {
        self.observed_time = Some(ts);
        self
    }

    /// Builds the record, panicking when the node id is missing.
    pub fn build(self) -> ChangeRecord {
        self.try_build()
            .expect("RecordBuilder requires a node_id before build()")
    }

    /// Builds the record, returning `None` when the node id is missing.
    pub fn try_build(self) -> Option<ChangeRecord> {
        let node_id = self.node_id?;
        let value = self.value.unwrap_or(TagValue::Null);
        let mut record = ChangeRecord::new(node_id, value);
        if let Some(ts) = self.source_time {
            record = record.with_source_time(ts);
        }
        if let Some(ts) = self.server_time {
            record = record.with_server_time(ts);
        }
        if let Some(ts) = self.observed_time {
            record = record.with_observed_time(ts);
        }
        Some(record)
    }
}

// =============================================================================
// Retry Policy Presets
// =============================================================================

/// Retry policy presets for tests.
pub struct TestRetryPolicies;

impl TestRetryPolicies {
    /// No retries: the first failure is final.
    pub fn single_attempt() -> RetryPolicy {
        RetryPolicy::for_testing().with_max_attempts(1)
    }

    /// Fast backoff with the given attempt budget.
    pub fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::for_testing().with_max_attempts(max_attempts)
    }
}

// =============================================================================
// Session Helper
// =============================================================================

/// Builds a simulated transport and a session over it.
///
/// The session uses testing timings with the liveness monitor
/// disabled, so tests control reconnection explicitly. Stacks that
/// need the monitor go through [`StackBuilder`].
pub fn sim_session(endpoint: &str) -> (Arc<SimTransport>, Arc<SessionManager>) {
    let transport = Arc::new(SimTransport::new(endpoint));
    let session = Arc::new(SessionManager::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        SessionConfig::for_testing().with_auto_reconnect(false),
    ));
    (transport, session)
}

// =============================================================================
// Stack Builder
// =============================================================================

/// Builder for a complete in-process test stack.
pub struct StackBuilder {
    endpoint: String,
    session_config: SessionConfig,
    historian_config: HistorianConfig,
    nodes: Vec<(String, TagValue)>,
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StackBuilder {
    /// Creates a builder with testing timings and no seeded nodes.
    pub fn new() -> Self {
        Self {
            endpoint: "sim://stack".to_string(),
            session_config: SessionConfig::for_testing(),
            historian_config: HistorianConfig::for_testing(),
            nodes: Vec::new(),
        }
    }

    /// Sets the simulated endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Enables or disables the liveness monitor.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.session_config = self.session_config.with_auto_reconnect(enabled);
        self
    }

    /// Replaces the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Replaces the historian configuration.
    pub fn historian_config(mut self, config: HistorianConfig) -> Self {
        self.historian_config = config;
        self
    }

    /// Pushes the flush cadence out of the test window so only
    /// explicit flushes (or stop) write to the sink.
    pub fn manual_flush(mut self) -> Self {
        self.historian_config = self
            .historian_config
            .with_flush_interval(Duration::from_secs(3600));
        self
    }

    /// Sets the sink write retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.historian_config = self.historian_config.with_retry(policy);
        self
    }

    /// Seeds a node under the root before the stack starts.
    pub fn node(mut self, id: &str, value: TagValue) -> Self {
        self.nodes.push((id.to_string(), value));
        self
    }

    /// Seeds several nodes under the root.
    pub fn nodes(mut self, pairs: &[(&str, TagValue)]) -> Self {
        for (id, value) in pairs {
            self.nodes.push((id.to_string(), value.clone()));
        }
        self
    }

    /// Builds the stack.
    pub fn build(self) -> TestStack {
        let transport = Arc::new(SimTransport::new(self.endpoint));
        for (id, value) in &self.nodes {
            transport.add_node(None, id, id, value.clone());
        }

        let session = Arc::new(SessionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            self.session_config,
        ));

        let sink = Arc::new(MemorySink::new());
        let pipeline = Arc::new(HistorianPipeline::new(
            Arc::clone(&session),
            Arc::clone(&sink) as Arc<dyn HistorySink>,
            self.historian_config,
        ));

        let temp_dir = tempfile::Builder::new()
            .prefix("tapline_stack_")
            .tempdir()
            .expect("Failed to create temp directory");
        let registry = Arc::new(ServerRegistry::new(temp_dir.path().join("servers.json")));

        TestStack {
            transport,
            session,
            sink,
            pipeline,
            registry,
            temp_dir,
        }
    }
}

/// A complete in-process stack over a simulated transport.
pub struct TestStack {
    /// The simulated server.
    pub transport: Arc<SimTransport>,
    /// Session over the transport.
    pub session: Arc<SessionManager>,
    /// Memory sink the pipeline flushes into.
    pub sink: Arc<MemorySink>,
    /// Collection pipeline wired to the session and sink.
    pub pipeline: Arc<HistorianPipeline>,
    /// Saved-server registry backed by a temp file.
    pub registry: Arc<ServerRegistry>,
    temp_dir: TempDir,
}

impl TestStack {
    /// Returns the stack's scratch directory.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Builds API state over this stack.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            ApiConfig::for_testing(),
            Arc::clone(&self.session),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.registry),
        )
    }

    /// Starts collecting the given nodes, panicking on failure.
    pub async fn start_historian(&self, ids: &[&str], interval_ms: u64) {
        let nodes = super::fixtures::node_ids(ids);
        self.pipeline
            .start(&nodes, interval_ms)
            .await
            .expect("historian start");
    }

    /// Injects a server-side value change, panicking on failure.
    pub async fn inject(&self, node_id: &str, value: TagValue) {
        self.transport
            .set_value(node_id, value)
            .await
            .expect("sim value injection");
    }
}
