// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error types and handling.
//!
//! Handler errors converge on [`ApiError`], which carries the HTTP
//! status mapping and renders as the standard response envelope with
//! `success: false`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use tapline_config::ConfigError;
use tapline_core::error::{
    HistorianError, StoreError, SubscriptionError, TaplineError, TransportError,
};

use crate::response::ApiResponse;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ApiError
// =============================================================================

/// API error type with HTTP status code mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// Bad request (400).
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Validation error (422).
    #[error("Validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
    },

    /// Conflict (409).
    #[error("Conflict: {message}")]
    Conflict {
        /// Error message.
        message: String,
    },

    /// Service unavailable (503).
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message.
        message: String,
    },

    /// Internal server error (500).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message (for logging, not user-facing).
        message: String,
    },

    /// Domain error from the session, historian, or store layers.
    #[error(transparent)]
    Core(#[from] TaplineError),

    /// Registry or configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a service unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Core(e) => core_status(e),
            ApiError::Config(e) => config_status(e),
        }
    }

    /// Returns the error code for categorization.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
            ApiError::Core(e) => match e {
                TaplineError::Transport(_) => "TRANSPORT_ERROR",
                TaplineError::Subscription(_) => "SUBSCRIPTION_ERROR",
                TaplineError::Historian(_) => "HISTORIAN_ERROR",
                TaplineError::Store(_) => "STORE_ERROR",
            },
            ApiError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Returns a user-friendly error message.
    ///
    /// This message is safe to show to end users and does not expose
    /// internal implementation details.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotFound { resource } => format!("{}을(를) 찾을 수 없습니다", resource),
            ApiError::BadRequest { message } => message.clone(),
            ApiError::Validation { message } => format!("입력 검증 실패: {}", message),
            ApiError::Conflict { message } => message.clone(),
            ApiError::ServiceUnavailable { .. } => {
                "서비스를 일시적으로 사용할 수 없습니다".to_string()
            }
            ApiError::Internal { .. } => "서버 내부 오류가 발생했습니다".to_string(),
            ApiError::Core(e) => e.user_message(),
            ApiError::Config(e) => e.user_message(),
        }
    }

    /// Returns `true` if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Status mapping for domain errors, with API-level refinements the
/// core does not distinguish: a stop race is a conflict, not an
/// outage, and a bad timestamp is the caller's fault.
fn core_status(error: &TaplineError) -> StatusCode {
    match error {
        TaplineError::Historian(HistorianError::NotRunning)
        | TaplineError::Historian(HistorianError::AlreadyStopping) => StatusCode::CONFLICT,
        TaplineError::Store(StoreError::InvalidTimestamp { .. }) => StatusCode::BAD_REQUEST,
        TaplineError::Store(StoreError::Unsupported { .. }) => StatusCode::BAD_REQUEST,
        other => {
            StatusCode::from_u16(other.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn config_status(error: &ConfigError) -> StatusCode {
    match error {
        ConfigError::ServerNotFound { .. } => StatusCode::NOT_FOUND,
        ConfigError::DuplicateServer { .. } | ConfigError::DuplicateTag { .. } => {
            StatusCode::CONFLICT
        }
        ConfigError::Validation { .. }
        | ConfigError::MissingField { .. }
        | ConfigError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// From Implementations
// =============================================================================

// Route the per-concern enums through the root so handlers can use `?`
// on any domain Result.

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Core(err.into())
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        ApiError::Core(err.into())
    }
}

impl From<HistorianError> for ApiError {
    fn from(err: HistorianError) -> Self {
        ApiError::Core(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Core(err.into())
    }
}

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.user_message();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = error_code,
                status = %status,
                "Server error occurred"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = error_code,
                status = %status,
                "Client error occurred"
            );
        }

        let body: ApiResponse<()> = ApiResponse::error(error_code, message);
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Tests
// =============================================================================
