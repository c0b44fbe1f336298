// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for Tapline.
//!
//! Loads configuration files in YAML, TOML, or JSON format with
//! environment variable support.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and resolve `${VAR}` / `${VAR:default}` placeholders
//! 2. Parse by extension into [`TaplineConfig`]
//! 3. Apply `TAPLINE_*` environment overrides
//! 4. Resolve relative paths against the config file's directory
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! TAPLINE_CLIENT_ENDPOINT=opc.tcp://plant:4840
//! TAPLINE_API_PORT=9090
//! TAPLINE_LOG_LEVEL=debug
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogLevel, StoreConfig, TaplineConfig};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for Tapline.
///
/// # Examples
///
/// ```no_run
/// use tapline_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("tapline.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,

    /// Whether to resolve relative paths.
    resolve_paths: bool,
}

impl ConfigLoader {
    /// Creates a loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: "TAPLINE".to_string(),
            resolve_env_vars: true,
            resolve_paths: true,
        }
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables relative path resolution.
    pub fn with_path_resolution(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`,
    /// `.toml`, or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<TaplineConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        if self.resolve_paths {
            config.resolve_paths(&base_path);
        }

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!(
            endpoint = %config.client.endpoint,
            nodes = config.historian.nodes.len(),
            store = config.store.backend_name(),
            "configuration summary"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(
        &self,
        content: &str,
        format: ConfigFormat,
    ) -> ConfigResult<TaplineConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };

        let mut config = self.parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<TaplineConfig> {
        // Placeholders are resolved on the raw text so they work in
        // every format and position.
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)?
        } else {
            content.to_string()
        };

        self.parse_str(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    fn parse_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<TaplineConfig> {
        match format {
            ConfigFormat::Yaml => yaml_parse(content),
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
            }
        }
    }

    /// Resolves `${VAR}` / `${VAR:default}` placeholders.
    fn resolve_env_placeholders(&self, content: &str) -> ConfigResult<String> {
        let mut result = String::with_capacity(content.len());
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_content = String::new();
                let mut found_close = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        found_close = true;
                        break;
                    }
                    var_content.push(c);
                }

                if !found_close {
                    result.push('$');
                    result.push('{');
                    result.push_str(&var_content);
                    continue;
                }

                let (var_name, default_value) = if let Some(idx) = var_content.find(':') {
                    (&var_content[..idx], Some(&var_content[idx + 1..]))
                } else {
                    (var_content.as_str(), None)
                };

                match env::var(var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => {
                        if let Some(default) = default_value {
                            result.push_str(default);
                        } else {
                            warn!("Environment variable '{}' not found", var_name);
                            result.push_str(&format!("${{{}}}", var_name));
                        }
                    }
                }
            } else {
                result.push(c);
            }
        }

        Ok(result)
    }

    /// Applies `<PREFIX>_*` environment overrides.
    fn apply_env_overrides(&self, config: &mut TaplineConfig) -> ConfigResult<()> {
        if let Ok(value) = env::var(format!("{}_CLIENT_ENDPOINT", self.env_prefix)) {
            config.client.endpoint = value;
        }

        if let Ok(value) = env::var(format!("{}_API_PORT", self.env_prefix)) {
            config.api.port = value.parse().map_err(|_| {
                ConfigError::invalid_env_var(
                    format!("{}_API_PORT", self.env_prefix),
                    "expected valid port number",
                )
            })?;
        }
        if let Ok(value) = env::var(format!("{}_API_ENABLED", self.env_prefix)) {
            config.api.enabled = parse_bool(&value);
        }

        if let Ok(value) = env::var(format!("{}_LOG_LEVEL", self.env_prefix)) {
            if let Some(level) = parse_log_level(&value) {
                config.logging.level = level;
            }
        }

        if let Ok(value) = env::var(format!("{}_HISTORIAN_AUTOSTART", self.env_prefix)) {
            config.historian.autostart = parse_bool(&value);
        }

        if let Ok(value) = env::var(format!("{}_STORE_URL", self.env_prefix)) {
            match config.store {
                StoreConfig::Sqlite(ref mut sqlite) => sqlite.url = value,
                _ => warn!(
                    backend = config.store.backend_name(),
                    "{}_STORE_URL ignored for non-sqlite backend", self.env_prefix
                ),
            }
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parses a string to bool.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// Parses a log level string.
fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let parsed = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    parsed
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
///
/// # Examples
///
/// ```no_run
/// use tapline_config::loader::load_config;
///
/// let config = load_config("tapline.yaml").unwrap();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<TaplineConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<TaplineConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_yaml() -> String {
        r#"
client:
  endpoint: sim://demo
  auto_reconnect: true

historian:
  nodes:
    - line1.temperature
    - line1.pressure
  interval_ms: 500

store:
  backend: memory

api:
  enabled: true
  port: 8080

logging:
  level: info
"#
        .to_string()
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(test_yaml().as_bytes()).unwrap();

        let loader = ConfigLoader::new();
        let config = loader.load(file.path()).unwrap();

        assert_eq!(config.client.endpoint, "sim://demo");
        assert_eq!(config.historian.nodes.len(), 2);
        assert_eq!(config.historian.interval_ms, 500);
        assert_eq!(config.store.backend_name(), "memory");
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_load_toml() {
        let toml_content = r#"
[client]
endpoint = "opc.tcp://plant:4840"

[historian]
nodes = ["n1"]

[store]
backend = "sqlite"
url = "sqlite://history.db"
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = ConfigLoader::new().load(file.path()).unwrap();
        assert_eq!(config.client.endpoint, "opc.tcp://plant:4840");
        assert_eq!(config.store.backend_name(), "sqlite");
    }

    #[test]
    fn test_load_json() {
        let json = r#"{"client": {"endpoint": "sim://j"}, "store": {"backend": "memory"}}"#;
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = ConfigLoader::new().load(file.path()).unwrap();
        assert_eq!(config.client.endpoint, "sim://j");
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("tapline.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("tapline.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("tapline.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("tapline.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("tapline.txt")).is_err());
        assert!(ConfigFormat::from_path(Path::new("tapline")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let loader = ConfigLoader::new();
        let result = loader
            .resolve_env_placeholders("endpoint: ${TAPLINE_NONEXISTENT_VAR:sim://fallback}")
            .unwrap();
        assert_eq!(result, "endpoint: sim://fallback");
    }

    #[test]
    fn test_env_placeholder_resolution() {
        let loader = ConfigLoader::new();
        // PATH is set in any reasonable test environment.
        let result = loader.resolve_env_placeholders("value: ${PATH}").unwrap();
        assert!(result.starts_with("value: "));
        assert!(!result.contains("${PATH}"));
    }

    #[test]
    fn test_unclosed_placeholder_kept() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_env_placeholders("value: ${UNCLOSED").unwrap();
        assert_eq!(result, "value: ${UNCLOSED");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Some(LogLevel::Trace));
        assert_eq!(parse_log_level("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("warning"), Some(LogLevel::Warn));
        assert_eq!(parse_log_level("invalid"), None);
    }

    #[test]
    fn test_load_from_str() {
        let loader = ConfigLoader::new().with_env_vars(false);
        let config = loader
            .load_from_str(&test_yaml(), ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.client.endpoint, "sim://demo");
    }

    #[test]
    fn test_file_not_found() {
        let loader = ConfigLoader::new();
        let result = loader.load("/nonexistent/path/tapline.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_config_rejected_on_load() {
        let yaml = "client:\n  endpoint: \"\"\n";
        let loader = ConfigLoader::new().with_env_vars(false);
        let err = loader.load_from_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(b"client: [not a map").unwrap();

        let err = ConfigLoader::new().load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
