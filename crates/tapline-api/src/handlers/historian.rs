// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Historian pipeline handlers.

use axum::{extract::State, Json};
use serde::Deserialize;

use tapline_core::error::HistorianError;
use tapline_historian::{HistorianState, HistorianStatus};

use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

// =============================================================================
// Start
// =============================================================================

/// Start request body.
#[derive(Debug, Deserialize)]
pub struct StartHistorianRequest {
    /// Node ids to collect.
    pub nodes: Vec<String>,
    /// Publishing interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

/// POST /api/v1/historian/start
///
/// Starts collection for the given nodes. A running pipeline is
/// restarted with the new node set; this is how tag-set changes are
/// applied.
pub async fn start_historian(
    State(state): State<AppState>,
    Json(request): Json<StartHistorianRequest>,
) -> ApiResult<Json<ApiResponse<HistorianStatus>>> {
    if request.nodes.is_empty() {
        return Err(ApiError::bad_request("nodes must not be empty"));
    }
    state
        .historian
        .start(&request.nodes, request.interval_ms)
        .await?;
    Ok(Json(ApiResponse::success(state.historian.status().await)))
}

// =============================================================================
// Stop
// =============================================================================

/// POST /api/v1/historian/stop
///
/// Stops collection and flushes whatever is buffered. Stopping a
/// pipeline that is not running is reported as a conflict so callers
/// notice out-of-order automation.
pub async fn stop_historian(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<HistorianStatus>>> {
    match state.historian.state().await {
        HistorianState::Stopped => return Err(HistorianError::NotRunning.into()),
        HistorianState::Stopping => return Err(HistorianError::AlreadyStopping.into()),
        HistorianState::Starting | HistorianState::Running => {}
    }
    state.historian.stop().await;
    Ok(Json(ApiResponse::success(state.historian.status().await)))
}

// =============================================================================
// Status
// =============================================================================

/// GET /api/v1/historian
///
/// Reports pipeline state, sink, watched nodes, and counters.
pub async fn historian_status(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<HistorianStatus>>> {
    Ok(Json(ApiResponse::success(state.historian.status().await)))
}

// =============================================================================
// Tests
// =============================================================================
