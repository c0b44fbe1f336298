// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tapline-config
//!
//! Configuration management for Tapline: the file-configuration
//! schema with validation, multi-format loading, and the saved-server
//! registry.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tapline_config::loader::load_config;
//!
//! let config = load_config("tapline.yaml").unwrap();
//! println!("Endpoint: {}", config.client.endpoint);
//! println!("Nodes: {}", config.historian.nodes.len());
//! ```
//!
//! ## Configuration Schema
//!
//! - `client` - target server endpoint, security, reconnect behavior
//! - `historian` - collected nodes, publish and flush cadence
//! - `store` - history backend (sqlite, csv, or memory)
//! - `api` - REST server settings
//! - `logging` - level, format, optional file output
//!
//! ## Environment Variables
//!
//! Values can be overridden via environment variables:
//!
//! ```text
//! TAPLINE_CLIENT_ENDPOINT=opc.tcp://plant:4840
//! TAPLINE_API_PORT=9090
//! TAPLINE_LOG_LEVEL=debug
//! ```
//!
//! Config files can also reference environment variables inline:
//!
//! ```yaml
//! client:
//!   endpoint: "${PLANT_ENDPOINT:sim://demo}"
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod registry;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use registry::{SavedServer, ServerRegistry};
pub use schema::{
    ApiConfig, ClientConfig, CorsConfig, CsvStoreConfig, HistorianConfig, LogFormat, LogLevel,
    LoggingConfig, SqliteStoreConfig, StoreConfig, TaplineConfig,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

// =============================================================================
// Prelude
// =============================================================================

/// Convenience re-exports for common use cases.
pub mod prelude {
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::loader::{load_config, ConfigLoader};
    pub use crate::registry::{SavedServer, ServerRegistry};
    pub use crate::schema::{StoreConfig, TaplineConfig};
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "tapline-config");
    }

    #[test]
    fn test_prelude_imports() {
        use prelude::*;
        let _config = TaplineConfig::for_testing();
    }
}
