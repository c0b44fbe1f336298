// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::handlers;
use crate::state::AppState;

// =============================================================================
// ApiServer
// =============================================================================

/// The API server.
///
/// This is the main entry point for creating and running the HTTP server.
pub struct ApiServer {
    state: AppState,
    config: Arc<ApiConfig>,
}

impl ApiServer {
    /// Creates a new API server with the given state.
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        Self { state, config }
    }

    /// Creates the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let cors = create_cors_layer(&self.config);

        // Build the middleware stack
        let middleware_stack = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(cors);

        Router::new()
            // Health endpoints
            .route("/health", get(handlers::health))
            .route("/ready", get(handlers::ready))
            // Session endpoints
            .route("/api/v1/session", get(handlers::session_status))
            .route("/api/v1/session/connect", post(handlers::connect_session))
            .route("/api/v1/session/disconnect", post(handlers::disconnect_session))
            // Node endpoints
            .route("/api/v1/nodes", get(handlers::browse_nodes))
            .route(
                "/api/v1/nodes/{node_id}/value",
                get(handlers::read_node).post(handlers::write_node),
            )
            .route("/api/v1/nodes/{node_id}/children", get(handlers::browse_children))
            // Historian endpoints
            .route("/api/v1/historian", get(handlers::historian_status))
            .route("/api/v1/historian/start", post(handlers::start_historian))
            .route("/api/v1/historian/stop", post(handlers::stop_historian))
            // History queries
            .route("/api/v1/history/{node_id}", get(handlers::query_history))
            // Saved-server registry
            .route("/api/v1/servers", get(handlers::list_servers))
            .route(
                "/api/v1/servers/{name}",
                get(handlers::get_server)
                    .put(handlers::upsert_server)
                    .delete(handlers::remove_server),
            )
            .route(
                "/api/v1/servers/{name}/tags",
                get(handlers::list_server_tags).post(handlers::add_server_tag),
            )
            .route(
                "/api/v1/servers/{name}/tags/{node_id}",
                delete(handlers::remove_server_tag),
            )
            // Apply middleware and state
            .layer(middleware_stack)
            .with_state(self.state.clone())
    }

    /// Runs the server.
    pub async fn run(self) -> ApiResult<()> {
        let addr = self.config.socket_addr();
        let router = self.router();

        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::ApiError::internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| crate::error::ApiError::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Runs the server with graceful shutdown.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let addr = self.config.socket_addr();
        let router = self.router();

        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::ApiError::internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| crate::error::ApiError::internal(format!("Server error: {}", e)))?;

        info!("API server shutdown complete");

        Ok(())
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.config.socket_addr()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Creates the CORS layer from configuration.
fn create_cors_layer(config: &ApiConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors.allows_any_origin() {
        layer = layer.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer = layer.allow_origin(origins);
    }

    layer
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_creation() {
        let harness = testing::harness();
        let server = ApiServer::new(harness.state.clone());

        let _router = server.router();
        assert_eq!(server.addr().port(), 0);
    }

    #[tokio::test]
    async fn test_health_route_end_to_end() {
        let harness = testing::harness();
        let router = ApiServer::new(harness.state.clone()).router();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_route_end_to_end() {
        let harness = testing::harness();
        let router = ApiServer::new(harness.state.clone()).router();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_error_status_passes_through_router() {
        let harness = testing::harness();
        let router = ApiServer::new(harness.state.clone()).router();

        // No connection: live reads answer 503 in the standard envelope.
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/nodes/n1/value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_cors_layer() {
        let config = ApiConfig::default();
        let _layer = create_cors_layer(&config);

        let mut restricted = ApiConfig::default();
        restricted.cors.allowed_origins = vec!["https://hmi.plant.local".to_string()];
        let _layer = create_cors_layer(&restricted);
    }
}
