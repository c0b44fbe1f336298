// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle handlers.
//!
//! The process owns exactly one session, wired at startup; these
//! endpoints drive its lifecycle rather than selecting endpoints. To
//! point at a different server, restart with a different config (the
//! registry holds the saved candidates).

use axum::{extract::State, Json};
use tapline_client::client::SessionStatus;

use crate::error::ApiResult;
use crate::response::ApiResponse;
use crate::state::AppState;

// =============================================================================
// Connect
// =============================================================================

/// POST /api/v1/session/connect
///
/// Establishes the session against the configured endpoint. Repeated
/// calls reconnect. With auto-reconnect configured, the liveness
/// monitor starts alongside.
pub async fn connect_session(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<SessionStatus>>> {
    state.session.connect().await?;
    Ok(Json(ApiResponse::success(state.session.status().await)))
}

// =============================================================================
// Disconnect
// =============================================================================

/// POST /api/v1/session/disconnect
///
/// Tears the session down. Idempotent; disconnecting an already
/// disconnected session succeeds and reports the unchanged status.
pub async fn disconnect_session(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<SessionStatus>>> {
    state.session.disconnect().await;
    Ok(Json(ApiResponse::success(state.session.status().await)))
}

// =============================================================================
// Status
// =============================================================================

/// GET /api/v1/session
///
/// Reports the session's endpoint, lifecycle state, epoch, and
/// counters without touching the connection.
pub async fn session_status(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<SessionStatus>>> {
    Ok(Json(ApiResponse::success(state.session.status().await)))
}

// =============================================================================
// Tests
// =============================================================================
