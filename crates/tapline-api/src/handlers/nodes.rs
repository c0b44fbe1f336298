// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node read, write, and browse handlers.
//!
//! Node ids land as URL path segments, so clients percent-encode ids
//! that carry `/` or `;`. Writes accept any JSON scalar; string
//! payloads additionally go through the fixed coercion precedence
//! (integer parse, then float parse, then literal) so `"42"` writes an
//! integer.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use tapline_core::convert::{coerce_scalar, coerce_str};
use tapline_core::types::{NodeRef, TagValue};

use crate::error::ApiResult;
use crate::response::{ApiResponse, ResponseMeta};
use crate::state::AppState;

// =============================================================================
// Node Types
// =============================================================================

/// A node's current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeValueResponse {
    /// Node identifier.
    pub node_id: String,
    /// Current value.
    pub value: TagValue,
}

/// Write request body.
#[derive(Debug, Deserialize)]
pub struct WriteNodeRequest {
    /// Value to write; any JSON scalar.
    pub value: serde_json::Value,
}

/// Query parameters for root browsing.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseParams {
    /// Parent node to list; root when absent.
    pub parent: Option<String>,
}

// =============================================================================
// Read Node Value
// =============================================================================

/// GET /api/v1/nodes/{node_id}/value
///
/// Reads the node's current value.
pub async fn read_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> ApiResult<Json<ApiResponse<NodeValueResponse>>> {
    let value = state.session.read_value(&node_id).await?;
    Ok(Json(ApiResponse::success(NodeValueResponse {
        node_id,
        value,
    })))
}

// =============================================================================
// Write Node Value
// =============================================================================

/// POST /api/v1/nodes/{node_id}/value
///
/// Writes a value to the node and echoes the coerced form.
pub async fn write_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Json(request): Json<WriteNodeRequest>,
) -> ApiResult<Json<ApiResponse<NodeValueResponse>>> {
    let value = match &request.value {
        serde_json::Value::String(s) => coerce_str(s),
        other => coerce_scalar(other),
    };
    state.session.write_value(&node_id, value.clone()).await?;
    Ok(Json(ApiResponse::success(NodeValueResponse {
        node_id,
        value,
    })))
}

// =============================================================================
// Browse
// =============================================================================

/// GET /api/v1/nodes
///
/// Lists the direct children of `parent`, or of the address-space
/// root when no parent is given.
pub async fn browse_nodes(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> ApiResult<Json<ApiResponse<Vec<NodeRef>>>> {
    let children = state.session.browse(params.parent.as_deref()).await?;
    let meta = ResponseMeta::count(children.len() as u64);
    Ok(Json(ApiResponse::success(children).with_meta(meta)))
}

/// GET /api/v1/nodes/{node_id}/children
///
/// Lists the direct children of the node.
pub async fn browse_children(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<NodeRef>>>> {
    let children = state.session.browse(Some(&node_id)).await?;
    let meta = ResponseMeta::count(children.len() as u64);
    Ok(Json(ApiResponse::success(children).with_meta(meta)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use axum::http::StatusCode;

    async fn connected() -> testing::TestHarness {
        let harness = testing::harness();
        harness.state.session.connect().await.unwrap();
        harness
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let harness = connected().await;

        let written = write_node(
            State(harness.state.clone()),
            Path("n1".to_string()),
            Json(WriteNodeRequest {
                value: serde_json::json!(27.5),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(written.data.unwrap().value, TagValue::Float(27.5));

        let read = read_node(State(harness.state), Path("n1".to_string()))
            .await
            .unwrap()
            .0;
        assert_eq!(read.data.unwrap().value, TagValue::Float(27.5));
    }

    #[tokio::test]
    async fn test_write_coerces_string_payloads() {
        let harness = connected().await;

        let written = write_node(
            State(harness.state.clone()),
            Path("n1".to_string()),
            Json(WriteNodeRequest {
                value: serde_json::json!("42"),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(written.data.unwrap().value, TagValue::Int(42));

        let written = write_node(
            State(harness.state),
            Path("n1".to_string()),
            Json(WriteNodeRequest {
                value: serde_json::json!("setpoint-a"),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(
            written.data.unwrap().value,
            TagValue::Str("setpoint-a".to_string())
        );
    }

    #[tokio::test]
    async fn test_read_unknown_node_is_not_found() {
        let harness = connected().await;
        let err = read_node(State(harness.state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_read_without_connection_is_unavailable() {
        let harness = testing::harness();
        let err = read_node(State(harness.state), Path("n1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_browse_root_lists_children() {
        let harness = connected().await;
        let response = browse_nodes(State(harness.state), Query(BrowseParams::default()))
            .await
            .unwrap()
            .0;
        let children = response.data.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(response.meta.unwrap().total, Some(2));
    }
}
