// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for tapline.
//!
//! # Error Hierarchy
//!
//! ```text
//! TaplineError (root)
//! ├── TransportError     - Connection and node operations
//! ├── SubscriptionError  - Subscription lifecycle and dispatch
//! ├── HistorianError     - Buffer/flush pipeline
//! └── StoreError         - Persistent storage sinks
//! ```
//!
//! Every concern has its own enum so callers can match precisely, plus
//! constructor helpers so call sites stay one line. Nothing in this
//! hierarchy is permitted to terminate the process; all failure paths
//! resolve to logging plus a state transition or a returned error.
//!
//! # Examples
//!
//! ```
//! use tapline_core::error::{TaplineError, TransportError};
//!
//! let error = TransportError::unavailable("endpoint unreachable");
//! assert!(error.is_retryable());
//!
//! let root: TaplineError = error.into();
//! assert_eq!(root.error_type(), "transport");
//! ```

use thiserror::Error;

// =============================================================================
// TaplineError - Root Error Type
// =============================================================================

/// The root error type for tapline.
#[derive(Debug, Error)]
pub enum TaplineError {
    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Subscription error.
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Historian pipeline error.
    #[error("Historian error: {0}")]
    Historian(#[from] HistorianError),

    /// Storage sink error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl TaplineError {
    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            TaplineError::Transport(e) => e.is_retryable(),
            TaplineError::Subscription(e) => e.is_retryable(),
            TaplineError::Historian(e) => e.is_retryable(),
            TaplineError::Store(e) => e.is_retryable(),
        }
    }

    /// Returns the error type as a string for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            TaplineError::Transport(_) => "transport",
            TaplineError::Subscription(_) => "subscription",
            TaplineError::Historian(_) => "historian",
            TaplineError::Store(_) => "store",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TaplineError::Transport(e) => e.status_code(),
            TaplineError::Subscription(e) => e.status_code(),
            TaplineError::Historian(_) => 503,
            TaplineError::Store(_) => 503,
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TaplineError::Transport(e) => format!("서버 통신 오류: {}", e.user_message()),
            TaplineError::Subscription(e) => format!("구독 오류: {}", e.user_message()),
            TaplineError::Historian(_) => "수집 파이프라인 오류가 발생했습니다".to_string(),
            TaplineError::Store(_) => "데이터 저장 오류가 발생했습니다".to_string(),
        }
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Transport-level errors: connection lifecycle and node operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint cannot be reached or the connection attempt failed.
    #[error("Transport unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// An operation was attempted without a live connection.
    #[error("Not connected")]
    NotConnected,

    /// The requested node does not exist in the address space.
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// The missing node identifier.
        node_id: String,
    },

    /// A value read failed.
    #[error("Read failed for '{node_id}': {message}")]
    ReadFailed {
        /// The node that failed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// A value write failed.
    #[error("Write failed for '{node_id}': {message}")]
    WriteFailed {
        /// The node that failed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// A browse operation failed.
    #[error("Browse failed for '{node_id}': {message}")]
    BrowseFailed {
        /// The node that failed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// Creating a native subscription failed.
    #[error("Subscribe failed: {message}")]
    SubscribeFailed {
        /// Error message.
        message: String,
    },

    /// Registering a per-node watch failed.
    #[error("Watch failed for '{node_id}': {message}")]
    WatchFailed {
        /// The node that failed.
        node_id: String,
        /// Error message.
        message: String,
    },

    /// The server rejected the requested security configuration.
    #[error("Security configuration rejected: {message}")]
    SecurityRejected {
        /// Error message.
        message: String,
    },
}

impl TransportError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a node not found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Creates a read failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a write failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a browse failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a subscribe failed error.
    pub fn subscribe_failed(message: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            message: message.into(),
        }
    }

    /// Creates a watch failed error.
    pub fn watch_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WatchFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a security rejected error.
    pub fn security_rejected(message: impl Into<String>) -> Self {
        Self::SecurityRejected {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Connection-level faults are transient by assumption (the liveness
    /// monitor recovers them); per-node faults are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Unavailable { .. } | TransportError::NotConnected
        )
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TransportError::Unavailable { .. } | TransportError::NotConnected => 503,
            TransportError::NodeNotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            TransportError::Unavailable { .. } => "unavailable",
            TransportError::NotConnected => "not_connected",
            TransportError::NodeNotFound { .. } => "node_not_found",
            TransportError::ReadFailed { .. } => "read_failed",
            TransportError::WriteFailed { .. } => "write_failed",
            TransportError::BrowseFailed { .. } => "browse_failed",
            TransportError::SubscribeFailed { .. } => "subscribe_failed",
            TransportError::WatchFailed { .. } => "watch_failed",
            TransportError::SecurityRejected { .. } => "security_rejected",
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Unavailable { .. } => "서버에 연결할 수 없습니다".to_string(),
            TransportError::NotConnected => "서버가 연결되어 있지 않습니다".to_string(),
            TransportError::NodeNotFound { node_id } => {
                format!("노드를 찾을 수 없습니다: {}", node_id)
            }
            TransportError::ReadFailed { node_id, .. } => format!("값 읽기 실패 ({})", node_id),
            TransportError::WriteFailed { node_id, .. } => format!("값 쓰기 실패 ({})", node_id),
            TransportError::BrowseFailed { node_id, .. } => {
                format!("노드 탐색 실패 ({})", node_id)
            }
            TransportError::SubscribeFailed { .. } => "구독 생성에 실패했습니다".to_string(),
            TransportError::WatchFailed { node_id, .. } => {
                format!("노드 감시 등록 실패 ({})", node_id)
            }
            TransportError::SecurityRejected { .. } => {
                "보안 설정이 거부되었습니다".to_string()
            }
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription lifecycle and dispatch errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The subscription belongs to a session epoch that has since been
    /// replaced; it must be re-created, not reused.
    #[error("Subscription {id} is stale (created in epoch {created_epoch}, session is at {current_epoch})")]
    Stale {
        /// The stale subscription identifier.
        id: u32,
        /// Epoch the subscription was created in.
        created_epoch: u64,
        /// Current session epoch.
        current_epoch: u64,
    },

    /// The requested publishing interval is not positive.
    #[error("Invalid interval: {interval_ms} ms (must be > 0)")]
    InvalidInterval {
        /// The rejected interval.
        interval_ms: u64,
    },

    /// A listener returned an error during dispatch.
    #[error("Listener dispatch failed: {message}")]
    DispatchFailed {
        /// Error message.
        message: String,
    },

    /// The subscription does not exist.
    #[error("Subscription not found: {id}")]
    NotFound {
        /// The missing subscription identifier.
        id: u32,
    },
}

impl SubscriptionError {
    /// Creates a stale subscription error.
    pub fn stale(id: u32, created_epoch: u64, current_epoch: u64) -> Self {
        Self::Stale {
            id,
            created_epoch,
            current_epoch,
        }
    }

    /// Creates an invalid interval error.
    pub fn invalid_interval(interval_ms: u64) -> Self {
        Self::InvalidInterval { interval_ms }
    }

    /// Creates a dispatch failed error.
    pub fn dispatch_failed(message: impl Into<String>) -> Self {
        Self::DispatchFailed {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(id: u32) -> Self {
        Self::NotFound { id }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// A stale subscription is recoverable by re-creating it against the
    /// current session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubscriptionError::Stale { .. })
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            SubscriptionError::Stale { .. } => 409,
            SubscriptionError::InvalidInterval { .. } => 400,
            SubscriptionError::NotFound { .. } => 404,
            SubscriptionError::DispatchFailed { .. } => 500,
        }
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            SubscriptionError::Stale { .. } => "stale",
            SubscriptionError::InvalidInterval { .. } => "invalid_interval",
            SubscriptionError::DispatchFailed { .. } => "dispatch_failed",
            SubscriptionError::NotFound { .. } => "not_found",
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            SubscriptionError::Stale { id, .. } => {
                format!("구독이 만료되었습니다 (sub-{}), 다시 생성해 주세요", id)
            }
            SubscriptionError::InvalidInterval { interval_ms } => {
                format!("잘못된 수집 주기: {}ms", interval_ms)
            }
            SubscriptionError::DispatchFailed { .. } => "알림 전달에 실패했습니다".to_string(),
            SubscriptionError::NotFound { id } => format!("구독을 찾을 수 없습니다: sub-{}", id),
        }
    }
}

// =============================================================================
// HistorianError
// =============================================================================

/// Historian pipeline errors.
#[derive(Debug, Error)]
pub enum HistorianError {
    /// An operation requires a running pipeline.
    #[error("Historian is not running")]
    NotRunning,

    /// A stop is already in progress.
    #[error("Historian is already stopping")]
    AlreadyStopping,

    /// Opening the collection session failed.
    #[error("Session setup failed: {message}")]
    SessionFailed {
        /// Error message.
        message: String,
    },

    /// The storage sink could not be prepared.
    #[error("Sink unavailable: {message}")]
    SinkUnavailable {
        /// Error message.
        message: String,
    },
}

impl HistorianError {
    /// Creates a session failed error.
    pub fn session_failed(message: impl Into<String>) -> Self {
        Self::SessionFailed {
            message: message.into(),
        }
    }

    /// Creates a sink unavailable error.
    pub fn sink_unavailable(message: impl Into<String>) -> Self {
        Self::SinkUnavailable {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HistorianError::SessionFailed { .. } | HistorianError::SinkUnavailable { .. }
        )
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            HistorianError::NotRunning => "not_running",
            HistorianError::AlreadyStopping => "already_stopping",
            HistorianError::SessionFailed { .. } => "session_failed",
            HistorianError::SinkUnavailable { .. } => "sink_unavailable",
        }
    }
}

// =============================================================================
// StoreError
// =============================================================================

/// Persistent storage sink errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A batch insert failed.
    #[error("Write failure: {message}")]
    WriteFailure {
        /// Error message.
        message: String,
    },

    /// A query failed.
    #[error("Query failed: {message}")]
    QueryFailed {
        /// Error message.
        message: String,
    },

    /// Schema creation or migration failed.
    #[error("Schema setup failed: {message}")]
    SchemaFailed {
        /// Error message.
        message: String,
    },

    /// Opening the store connection failed.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
    },

    /// The sink does not support the requested operation.
    #[error("Operation not supported by '{sink}': {operation}")]
    Unsupported {
        /// Sink name.
        sink: String,
        /// The unsupported operation.
        operation: String,
    },

    /// A timestamp argument could not be normalized.
    #[error("Invalid timestamp: {message}")]
    InvalidTimestamp {
        /// Error message.
        message: String,
    },
}

impl StoreError {
    /// Creates a write failure error.
    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::WriteFailure {
            message: message.into(),
        }
    }

    /// Creates a query failed error.
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    /// Creates a schema failed error.
    pub fn schema_failed(message: impl Into<String>) -> Self {
        Self::SchemaFailed {
            message: message.into(),
        }
    }

    /// Creates a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(sink: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            sink: sink.into(),
            operation: operation.into(),
        }
    }

    /// Creates an invalid timestamp error.
    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::WriteFailure { .. } | StoreError::ConnectionFailed { .. }
        )
    }

    /// Returns the error type for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            StoreError::WriteFailure { .. } => "write_failure",
            StoreError::QueryFailed { .. } => "query_failed",
            StoreError::SchemaFailed { .. } => "schema_failed",
            StoreError::ConnectionFailed { .. } => "connection_failed",
            StoreError::Unsupported { .. } => "unsupported",
            StoreError::InvalidTimestamp { .. } => "invalid_timestamp",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with TaplineError.
pub type TaplineResult<T> = Result<T, TaplineError>;

/// A Result type with TransportError.
pub type TransportResult<T> = Result<T, TransportError>;

/// A Result type with SubscriptionError.
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// A Result type with HistorianError.
pub type HistorianResult<T> = Result<T, HistorianError>;

/// A Result type with StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Tests
// =============================================================================
