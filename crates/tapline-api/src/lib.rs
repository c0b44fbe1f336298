// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tapline-api
//!
//! REST surface over a running Tapline stack: session lifecycle, live
//! node reads and writes, address-space browsing, historian control,
//! stored history queries, and the saved-server registry.
//!
//! Every response uses one JSON envelope (`success`, `data`, `error`,
//! `meta`); errors carry a machine code and a user-facing message. The
//! server is plain HTTP behind [`axum`] with request tracing, a
//! request timeout, and CORS from configuration.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tapline_api::{ApiConfig, ApiServer, AppState};
//!
//! let state = AppState::new(config, session, historian, registry);
//! ApiServer::new(state).run_with_shutdown(shutdown).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;

pub use config::{ApiConfig, CorsConfig};
pub use error::{ApiError, ApiResult};
pub use response::{
    ApiResponse, ComponentStatus, ErrorDetails, HealthResponse, ReadinessResponse, ResponseMeta,
};
pub use server::ApiServer;
pub use state::AppState;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
