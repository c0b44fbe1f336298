// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for Tapline.
//!
//! Defines the complete file-configuration structure: the target
//! server and session behavior, historian collection settings, the
//! history store backend, the REST API server, and logging.
//!
//! # Schema Structure
//!
//! ```text
//! TaplineConfig
//! ├── client: ClientConfig
//! ├── historian: HistorianConfig
//! ├── store: StoreConfig
//! ├── api: ApiConfig
//! └── logging: LoggingConfig
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tapline_core::types::SecuritySettings;

// =============================================================================
// Constants
// =============================================================================

/// Default subscription publish interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Minimum subscription publish interval in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 1;

/// Maximum subscription publish interval in milliseconds (1 hour).
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Default flush cadence in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Default sink write attempt budget per batch.
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

/// Default liveness probe interval in seconds.
pub const DEFAULT_LIVENESS_INTERVAL_SECS: u64 = 5;

/// Default API port.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default SQLite history database URL.
pub const DEFAULT_SQLITE_URL: &str = "sqlite://data/history.db";

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for Tapline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaplineConfig {
    /// Target server and session behavior.
    pub client: ClientConfig,

    /// Historian collection settings.
    #[serde(default)]
    pub historian: HistorianConfig,

    /// History store backend.
    #[serde(default)]
    pub store: StoreConfig,

    /// REST API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TaplineConfig {
    /// Validates the entire configuration.
    ///
    /// Each section validates itself; the first failure is returned
    /// with the offending field path.
    pub fn validate(&self) -> ConfigResult<()> {
        self.client.validate()?;
        self.historian.validate()?;
        self.store.validate()?;
        self.api.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Creates a config aimed at the in-memory simulator, for tests.
    pub fn for_testing() -> Self {
        Self {
            client: ClientConfig {
                endpoint: "sim://test".to_string(),
                security: None,
                auto_reconnect: true,
                liveness_interval_secs: DEFAULT_LIVENESS_INTERVAL_SECS,
            },
            historian: HistorianConfig::default(),
            store: StoreConfig::Memory,
            api: ApiConfig {
                enabled: false,
                ..ApiConfig::default()
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TaplineConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            historian: HistorianConfig::default(),
            store: StoreConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Target server and session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Server endpoint URL (e.g. `opc.tcp://plant:4840` or `sim://demo`).
    pub endpoint: String,

    /// Security triple; applied best-effort when all fields are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySettings>,

    /// Whether the liveness monitor reconnects automatically.
    #[serde(default = "default_enabled")]
    pub auto_reconnect: bool,

    /// Liveness probe cadence in seconds.
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,
}

fn default_liveness_interval_secs() -> u64 {
    DEFAULT_LIVENESS_INTERVAL_SECS
}

fn default_enabled() -> bool {
    true
}

impl ClientConfig {
    /// Validates the client configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::validation("client.endpoint", "cannot be empty"));
        }
        if self.liveness_interval_secs == 0 {
            return Err(ConfigError::validation(
                "client.liveness_interval_secs",
                "cannot be zero",
            ));
        }
        if let Some(ref security) = self.security {
            if security.policy.is_empty() {
                return Err(ConfigError::validation(
                    "client.security.policy",
                    "cannot be empty",
                ));
            }
            if security.certificate_path.is_empty() {
                return Err(ConfigError::validation(
                    "client.security.certificate_path",
                    "cannot be empty",
                ));
            }
            if security.private_key_path.is_empty() {
                return Err(ConfigError::validation(
                    "client.security.private_key_path",
                    "cannot be empty",
                ));
            }
        }
        Ok(())
    }

    /// Returns the liveness probe interval as a Duration.
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            security: None,
            auto_reconnect: default_enabled(),
            liveness_interval_secs: default_liveness_interval_secs(),
        }
    }
}

// =============================================================================
// Historian Configuration
// =============================================================================

/// Historian collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorianConfig {
    /// Node ids to collect.
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Subscription publish interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Flush cadence in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Sink write attempt budget per batch (first try included).
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,

    /// Whether `run` starts collection at boot.
    #[serde(default = "default_enabled")]
    pub autostart: bool,
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_write_attempts() -> u32 {
    DEFAULT_WRITE_ATTEMPTS
}

impl HistorianConfig {
    /// Validates the historian configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms < MIN_INTERVAL_MS || self.interval_ms > MAX_INTERVAL_MS {
            return Err(ConfigError::out_of_range(
                "historian.interval_ms",
                self.interval_ms,
                MIN_INTERVAL_MS,
                MAX_INTERVAL_MS,
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::validation(
                "historian.flush_interval_ms",
                "cannot be zero",
            ));
        }
        if self.write_attempts == 0 {
            return Err(ConfigError::validation(
                "historian.write_attempts",
                "cannot be zero",
            ));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.is_empty() {
                return Err(ConfigError::validation(
                    "historian.nodes",
                    "node id cannot be empty",
                ));
            }
            if !seen.insert(node) {
                return Err(ConfigError::validation(
                    "historian.nodes",
                    format!("duplicate node id '{}'", node),
                ));
            }
        }
        Ok(())
    }

    /// Returns the flush cadence as a Duration.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            interval_ms: default_interval_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            write_attempts: default_write_attempts(),
            autostart: default_enabled(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// History store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// SQLite store, the durable default.
    Sqlite(SqliteStoreConfig),

    /// Append-only CSV export; range queries are unsupported.
    Csv(CsvStoreConfig),

    /// In-process store; nothing survives a restart.
    Memory,
}

impl StoreConfig {
    /// Validates the store configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            StoreConfig::Sqlite(config) => config.validate(),
            StoreConfig::Csv(config) => config.validate(),
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Returns the backend name.
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Sqlite(_) => "sqlite",
            StoreConfig::Csv(_) => "csv",
            StoreConfig::Memory => "memory",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite(SqliteStoreConfig::default())
    }
}

/// SQLite store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// sqlx SQLite URL; the database file is created when missing.
    #[serde(default = "default_sqlite_url")]
    pub url: String,
}

fn default_sqlite_url() -> String {
    DEFAULT_SQLITE_URL.to_string()
}

impl SqliteStoreConfig {
    /// Validates the SQLite store settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.url.is_empty() {
            return Err(ConfigError::validation("store.url", "cannot be empty"));
        }
        if !self.url.starts_with("sqlite:") {
            return Err(ConfigError::validation(
                "store.url",
                "must start with 'sqlite:'",
            ));
        }
        Ok(())
    }
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            url: default_sqlite_url(),
        }
    }
}

/// CSV store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvStoreConfig {
    /// Output file path.
    pub path: PathBuf,
}

impl CsvStoreConfig {
    /// Validates the CSV store settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::validation("store.path", "cannot be empty"));
        }
        Ok(())
    }
}

// =============================================================================
// API Configuration
// =============================================================================

/// REST API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Whether the API server runs.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listen port.
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// CORS settings.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_request_timeout() -> u64 {
    30
}

impl ApiConfig {
    /// Validates the API configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.enabled && self.port == 0 {
            return Err(ConfigError::validation("api.port", "cannot be zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "api.request_timeout_secs",
                "cannot be zero",
            ));
        }
        Ok(())
    }

    /// Returns the socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Returns the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bind_address: default_bind_address(),
            port: default_api_port(),
            cors: CorsConfig::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// CORS settings for the API server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Log file path; stdout when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Include span targets in logs.
    #[serde(default = "default_enabled")]
    pub with_target: bool,
}

impl LoggingConfig {
    /// Validates the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            file: None,
            with_target: default_enabled(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the level as a tracing directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty format for development.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for production.
    Json,
}

// =============================================================================
// Path resolution
// =============================================================================

impl TaplineConfig {
    /// Rewrites relative paths against `base`.
    ///
    /// Applies to the CSV store path, the log file, and the security
    /// certificate/key paths; the SQLite URL is left as written.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let StoreConfig::Csv(ref mut csv) = self.store {
            if csv.path.is_relative() {
                csv.path = base.join(&csv.path);
            }
        }

        if let Some(ref mut file) = self.logging.file {
            if file.is_relative() {
                *file = base.join(&file);
            }
        }

        if let Some(ref mut security) = self.client.security {
            resolve_string_path(&mut security.certificate_path, base);
            resolve_string_path(&mut security.private_key_path, base);
        }
    }
}

fn resolve_string_path(value: &mut String, base: &Path) {
    let path = Path::new(value.as_str());
    if path.is_relative() {
        *value = base.join(path).to_string_lossy().into_owned();
    }
}

// =============================================================================
// Tests
// =============================================================================
