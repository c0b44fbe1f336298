// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Health check handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use tapline_store::HistorySink;

use crate::response::{ComponentStatus, HealthResponse, ReadinessResponse};
use crate::state::AppState;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Simple liveness check. Returns 200 OK if the service is running.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::healthy())
}

// =============================================================================
// Readiness Check
// =============================================================================

/// GET /ready
///
/// Readiness check over the session, pipeline, sink, and registry.
/// Session and pipeline states are informational: a disconnected
/// session is still servable since connect is an API operation. The
/// sink and registry are probed for real.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = Vec::new();

    components.push(ComponentStatus {
        name: "session".to_string(),
        healthy: true,
        message: Some(format!(
            "{} ({})",
            state.session.endpoint(),
            state.session.state().await
        )),
    });

    components.push(ComponentStatus {
        name: "historian".to_string(),
        healthy: true,
        message: Some(state.historian.state().await.to_string()),
    });

    let sink_healthy = state.sink().ensure_schema().await.is_ok();
    components.push(ComponentStatus {
        name: "store".to_string(),
        healthy: sink_healthy,
        message: if sink_healthy {
            Some(state.sink().name().to_string())
        } else {
            Some("history sink unreachable".to_string())
        },
    });

    let registry_healthy = state.registry.list_servers().is_ok();
    components.push(ComponentStatus {
        name: "registry".to_string(),
        healthy: registry_healthy,
        message: if registry_healthy {
            None
        } else {
            Some("registry file unreadable".to_string())
        },
    });

    let all_healthy = components.iter().all(|c| c.healthy);
    let response = ReadinessResponse {
        ready: all_healthy,
        components,
    };

    if all_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

// =============================================================================
// Tests
// =============================================================================
