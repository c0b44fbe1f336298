// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Saved-server registry handlers.
//!
//! CRUD over the registry file: server entries keyed by name, each
//! carrying an endpoint, optional security settings, and the node ids
//! watched on it. The entry name always comes from the URL path; a
//! name in the body is not accepted.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use tapline_config::SavedServer;
use tapline_core::types::SecuritySettings;

use crate::error::{ApiError, ApiResult};
use crate::response::{ApiResponse, ResponseMeta};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request body for creating or replacing a server entry.
#[derive(Debug, Deserialize)]
pub struct UpsertServerRequest {
    /// Server endpoint URL.
    pub endpoint: String,
    /// Security triple to apply when connecting.
    #[serde(default)]
    pub security: Option<SecuritySettings>,
    /// Node ids watched on this server.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for saving a tag on a server.
#[derive(Debug, Deserialize)]
pub struct AddTagRequest {
    /// Node id to save.
    pub node_id: String,
}

/// Tag listing for one server.
#[derive(Debug, Serialize)]
pub struct TagListResponse {
    /// Owning server name.
    pub server: String,
    /// Saved node ids.
    pub tags: Vec<String>,
}

// =============================================================================
// Servers
// =============================================================================

/// GET /api/v1/servers
///
/// Lists all saved servers.
pub async fn list_servers(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<SavedServer>>>> {
    let servers = state.registry.list_servers()?;
    let meta = ResponseMeta::count(servers.len() as u64);
    Ok(Json(ApiResponse::success(servers).with_meta(meta)))
}

/// GET /api/v1/servers/{name}
///
/// Returns one saved server.
pub async fn get_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApiResponse<SavedServer>>> {
    let server = state
        .registry
        .get_server(&name)?
        .ok_or_else(|| ApiError::not_found(format!("server '{}'", name)))?;
    Ok(Json(ApiResponse::success(server)))
}

/// PUT /api/v1/servers/{name}
///
/// Creates or replaces a server entry under the path name.
pub async fn upsert_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UpsertServerRequest>,
) -> ApiResult<Json<ApiResponse<SavedServer>>> {
    let server = SavedServer {
        name,
        endpoint: request.endpoint,
        security: request.security,
        tags: request.tags,
    };
    state.registry.upsert_server(server.clone())?;
    Ok(Json(ApiResponse::success(server)))
}

/// DELETE /api/v1/servers/{name}
///
/// Removes a server entry.
pub async fn remove_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.registry.remove_server(&name)? {
        return Err(ApiError::not_found(format!("server '{}'", name)));
    }
    Ok(Json(ApiResponse::success(())))
}

// =============================================================================
// Tags
// =============================================================================

/// GET /api/v1/servers/{name}/tags
///
/// Lists the node ids saved on a server.
pub async fn list_server_tags(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApiResponse<TagListResponse>>> {
    let tags = state.registry.list_tags(&name)?;
    Ok(Json(ApiResponse::success(TagListResponse {
        server: name,
        tags,
    })))
}

/// POST /api/v1/servers/{name}/tags
///
/// Saves a node id on a server. Returns the updated list.
pub async fn add_server_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<AddTagRequest>,
) -> ApiResult<Json<ApiResponse<TagListResponse>>> {
    state.registry.add_tag(&name, &request.node_id)?;
    let tags = state.registry.list_tags(&name)?;
    Ok(Json(ApiResponse::success(TagListResponse {
        server: name,
        tags,
    })))
}

/// DELETE /api/v1/servers/{name}/tags/{node_id}
///
/// Removes a saved node id. Returns the remaining list.
pub async fn remove_server_tag(
    State(state): State<AppState>,
    Path((name, node_id)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<TagListResponse>>> {
    if !state.registry.remove_tag(&name, &node_id)? {
        return Err(ApiError::not_found(format!(
            "tag '{}' on server '{}'",
            node_id, name
        )));
    }
    let tags = state.registry.list_tags(&name)?;
    Ok(Json(ApiResponse::success(TagListResponse {
        server: name,
        tags,
    })))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use axum::http::StatusCode;

    fn upsert_body(endpoint: &str) -> UpsertServerRequest {
        UpsertServerRequest {
            endpoint: endpoint.to_string(),
            security: None,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_get_round_trip() {
        let harness = testing::harness();

        let saved = upsert_server(
            State(harness.state.clone()),
            Path("line1".to_string()),
            Json(upsert_body("opc.tcp://plc:4840")),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();
        assert_eq!(saved.name, "line1");

        let response = get_server(State(harness.state.clone()), Path("line1".to_string()))
            .await
            .unwrap()
            .0;
        assert_eq!(response.data.unwrap().endpoint, "opc.tcp://plc:4840");

        let listing = list_servers(State(harness.state)).await.unwrap().0;
        assert_eq!(listing.meta.unwrap().total, Some(1));
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_path_name() {
        let harness = testing::harness();
        for endpoint in ["opc.tcp://old:4840", "opc.tcp://new:4840"] {
            upsert_server(
                State(harness.state.clone()),
                Path("line1".to_string()),
                Json(upsert_body(endpoint)),
            )
            .await
            .unwrap();
        }

        let servers = list_servers(State(harness.state)).await.unwrap().0.data.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].endpoint, "opc.tcp://new:4840");
    }

    #[tokio::test]
    async fn test_upsert_empty_endpoint_rejected() {
        let harness = testing::harness();
        let err = upsert_server(
            State(harness.state),
            Path("line1".to_string()),
            Json(upsert_body("")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_server_not_found() {
        let harness = testing::harness();
        let err = get_server(State(harness.state), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_remove_server_idempotence_boundary() {
        let harness = testing::harness();
        upsert_server(
            State(harness.state.clone()),
            Path("line1".to_string()),
            Json(upsert_body("sim://x")),
        )
        .await
        .unwrap();

        remove_server(State(harness.state.clone()), Path("line1".to_string()))
            .await
            .unwrap();
        let err = remove_server(State(harness.state), Path("line1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tag_lifecycle() {
        let harness = testing::harness();
        upsert_server(
            State(harness.state.clone()),
            Path("line1".to_string()),
            Json(upsert_body("sim://x")),
        )
        .await
        .unwrap();

        let listing = add_server_tag(
            State(harness.state.clone()),
            Path("line1".to_string()),
            Json(AddTagRequest {
                node_id: "temp".to_string(),
            }),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();
        assert_eq!(listing.tags, vec!["temp"]);

        // Duplicate save conflicts.
        let err = add_server_tag(
            State(harness.state.clone()),
            Path("line1".to_string()),
            Json(AddTagRequest {
                node_id: "temp".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let remaining = remove_server_tag(
            State(harness.state.clone()),
            Path(("line1".to_string(), "temp".to_string())),
        )
        .await
        .unwrap()
        .0
        .data
        .unwrap();
        assert!(remaining.tags.is_empty());

        let err = remove_server_tag(
            State(harness.state),
            Path(("line1".to_string(), "temp".to_string())),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tags_on_unknown_server_not_found() {
        let harness = testing::harness();
        let err = list_server_tags(State(harness.state), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
