// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;

use tapline_client::client::SessionManager;
use tapline_config::ServerRegistry;
use tapline_historian::HistorianPipeline;
use tapline_store::HistorySink;

use crate::config::ApiConfig;

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
///
/// Passed to every handler via Axum's state extraction. The pieces are
/// all `Arc`ed, so cloning the state per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// The session the API operates on.
    pub session: Arc<SessionManager>,
    /// The collection pipeline.
    pub historian: Arc<HistorianPipeline>,
    /// Saved server registry.
    pub registry: Arc<ServerRegistry>,
}

impl AppState {
    /// Creates the state over an already wired session and pipeline.
    ///
    /// The pipeline must collect through `session`; handlers assume the
    /// two agree on the endpoint.
    pub fn new(
        config: ApiConfig,
        session: Arc<SessionManager>,
        historian: Arc<HistorianPipeline>,
        registry: Arc<ServerRegistry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session,
            historian,
            registry,
        }
    }

    /// Returns the history sink queries run against.
    pub fn sink(&self) -> &Arc<dyn HistorySink> {
        self.historian.sink()
    }
}

// =============================================================================
// Test Support
// =============================================================================

/// Handler test fixtures.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tapline_client::client::{SessionConfig, SimTransport, Transport};
    use tapline_core::types::TagValue;
    use tapline_historian::HistorianConfig;
    use tapline_store::MemorySink;

    /// Everything a handler test needs, dropped in reverse wiring
    /// order. The tempdir backs the registry file and must outlive the
    /// state.
    pub(crate) struct TestHarness {
        pub(crate) transport: Arc<SimTransport>,
        pub(crate) sink: Arc<MemorySink>,
        #[allow(dead_code)]
        dir: tempfile::TempDir,
        pub(crate) state: AppState,
    }

    /// Builds a full state over a two-node sim transport, an in-memory
    /// sink, and a tempdir-backed registry.
    pub(crate) fn harness() -> TestHarness {
        let transport = Arc::new(SimTransport::new("sim://api"));
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.add_node(None, "n2", "n2", TagValue::Int(0));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            SessionConfig::for_testing(),
        ));
        let sink = Arc::new(MemorySink::new());
        let historian = Arc::new(HistorianPipeline::new(
            Arc::clone(&session),
            Arc::clone(&sink) as Arc<dyn HistorySink>,
            HistorianConfig::for_testing(),
        ));
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ServerRegistry::new(dir.path().join("servers.json")));
        let state = AppState::new(ApiConfig::for_testing(), session, historian, registry);
        TestHarness {
            transport,
            sink,
            dir,
            state,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
